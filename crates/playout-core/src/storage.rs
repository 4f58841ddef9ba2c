//! Blob store abstraction for object storage (S3, memory).
//!
//! This module defines the contract every gateway implements:
//! - Whole-object reads and writes
//! - Optional owner-transfer on write (destination account gets full control)
//! - Prefix listing with metadata, paginated internally
//!
//! The pipeline and the completion poller depend only on [`BlobStore`]; whether
//! a gateway targets the primary account or a cross-account role is decided by
//! whoever constructs it.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{Error, Result};

/// Ownership semantics applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectAcl {
    /// Keep the store's default ownership.
    #[default]
    Private,
    /// Grant the bucket owner full control over the written object.
    BucketOwnerFullControl,
}

/// Metadata about a listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp reported by the store.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Returns the final `/`-separated segment of the key.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in store order.
    pub objects: Vec<ObjectMeta>,
    /// Token for the next page; `None` when the listing is complete.
    pub next_token: Option<String>,
}

/// Blob store gateway.
///
/// Implementations must be usable concurrently but the relay only ever drives
/// one call at a time per invocation.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Returns the store URI root (e.g. `s3://bucket`), used to render locations.
    fn root_uri(&self) -> String;

    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Writes an entire object, replacing any existing one.
    async fn put(&self, key: &str, data: Bytes, acl: ObjectAcl) -> Result<()>;

    /// Fetches a single page of objects under `prefix`.
    ///
    /// `token` is `None` for the first page and the previous page's
    /// `next_token` afterwards.
    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage>;

    /// Lists every object under `prefix`, following pagination to completion.
    ///
    /// The stream is lazy: pages are fetched as the consumer advances. It yields
    /// objects in discovery order and ends after the last page. A page error is
    /// yielded once and terminates the stream.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, Result<ObjectMeta>> {
        stream::try_unfold(Some(None), move |cursor: Option<Option<String>>| async move {
            let Some(token) = cursor else {
                return Ok::<_, Error>(None);
            };
            let page = self.list_page(prefix, token).await?;
            let next = page.next_token.map(Some);
            let objects = stream::iter(page.objects.into_iter().map(Ok::<_, Error>));
            Ok::<_, Error>(Some((objects, next)))
        })
        .try_flatten()
        .boxed()
    }

    /// Collects the full listing under `prefix`.
    async fn list_all(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.list(prefix).try_collect().await
    }

    /// Renders the URI of `key` within this store.
    fn uri(&self, key: &str) -> String {
        format!("{}/{key}", self.root_uri())
    }
}

/// In-memory blob store for tests and local runs.
///
/// Thread-safe via `RwLock`. Keys are kept sorted, so listings come back in
/// lexicographic order the way S3 returns them.
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    page_size: usize,
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    acl: ObjectAcl,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBackend {
    /// Default number of objects per listing page (matches S3).
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    /// Creates a new empty memory backend named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_size: Self::DEFAULT_PAGE_SIZE,
            objects: Arc::default(),
        }
    }

    /// Sets the listing page size (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stores an object with an explicit last-modified stamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn insert_at(&self, key: &str, data: Bytes, last_modified: DateTime<Utc>) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(
                key.to_string(),
                StoredObject {
                    data,
                    last_modified,
                    acl: ObjectAcl::Private,
                },
            );
        Ok(())
    }

    /// Returns the ACL an object was written with, if it exists.
    #[must_use]
    pub fn acl(&self, key: &str) -> Option<ObjectAcl> {
        self.objects.read().ok()?.get(key).map(|o| o.acl)
    }

    /// Returns all stored keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    fn root_uri(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {key}")))
    }

    async fn put(&self, key: &str, data: Bytes, acl: ObjectAcl) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
                acl,
            },
        );
        Ok(())
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        // The token is the last key of the previous page.
        let mut matching = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| token.as_deref().is_none_or(|after| k.as_str() > after));

        let page: Vec<ObjectMeta> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, obj)| ObjectMeta {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect();

        let next_token = if matching.next().is_some() {
            page.last().map(|m| m.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }
}
