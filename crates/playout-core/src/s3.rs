//! S3 implementation of [`BlobStore`].
//!
//! SDK errors are classified into the gateway taxonomy:
//! - `AccessDenied`-style codes and HTTP 403 become [`Error::AccessDenied`]
//! - `NoSuchKey`/`NoSuchBucket` and HTTP 404 become [`Error::NotFound`]
//! - Throttling, timeouts, dispatch failures and 5xx become [`Error::Unavailable`]
//! - Everything else is [`Error::Storage`]

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_types::DateTime as SmithyDateTime;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::{BlobStore, ListPage, ObjectAcl, ObjectMeta};

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AllAccessDisabled",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
    "AccountProblem",
];

const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NoSuchBucket", "NotFound"];

const RETRYABLE_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestTimeout",
    "RequestTimeTooSkewed",
    "InternalError",
    "ServiceUnavailable",
];

/// S3 bucket gateway.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Backend {
    /// Creates a gateway over `bucket` using an already configured client.
    #[must_use]
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Creates a gateway using the default credential chain of the process.
    pub async fn from_environment(bucket: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config), bucket)
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3Backend {
    fn root_uri(&self) -> String {
        format!("s3://{}", self.bucket)
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error("GetObject", key, e))?;

        let body = output.body.collect().await.map_err(|e| Error::Unavailable {
            message: format!("failed to read body of s3://{}/{key}", self.bucket),
            source: Some(Box::new(e)),
        })?;
        Ok(body.into_bytes())
    }

    async fn put(&self, key: &str, data: Bytes, acl: ObjectAcl) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if acl == ObjectAcl::BucketOwnerFullControl {
            request = request.acl(ObjectCannedAcl::BucketOwnerFullControl);
        }

        request
            .send()
            .await
            .map_err(|e| classify_sdk_error("PutObject", key, e))?;
        debug!(bucket = %self.bucket, key, ?acl, "object written");
        Ok(())
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| classify_sdk_error("ListObjectsV2", prefix, e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                Some(ObjectMeta {
                    key,
                    size: object
                        .size()
                        .and_then(|s| u64::try_from(s).ok())
                        .unwrap_or_default(),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        // S3 sets the token only when `IsTruncated` is true.
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }
}

fn to_chrono(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    let nanos = value.subsec_nanos();
    DateTime::<Utc>::from_timestamp(value.secs(), nanos)
}

/// Maps an SDK error onto the gateway taxonomy.
pub(crate) fn classify_sdk_error<E>(
    operation: &str,
    target: &str,
    err: SdkError<E, HttpResponse>,
) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);
    let message = format!(
        "{operation} {target} failed (code={}, status={})",
        code.as_deref().unwrap_or("-"),
        status.map_or_else(|| "-".to_string(), |s| s.to_string()),
    );

    if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
        return Error::Unavailable {
            message,
            source: Some(Box::new(err)),
        };
    }

    let code = code.as_deref();
    if code.is_some_and(|c| ACCESS_DENIED_CODES.contains(&c)) || status == Some(403) {
        return Error::AccessDenied { message };
    }
    if code.is_some_and(|c| NOT_FOUND_CODES.contains(&c)) || status == Some(404) {
        return Error::NotFound(message);
    }
    if code.is_some_and(|c| RETRYABLE_CODES.contains(&c))
        || matches!(status, Some(429 | 500..=599))
    {
        return Error::Unavailable {
            message,
            source: Some(Box::new(err)),
        };
    }

    Error::storage_with_source(message, err)
}
