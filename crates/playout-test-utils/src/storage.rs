//! Test blob store with operation recording and fault injection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use playout_core::clock::{Clock, SystemClock};
use playout_core::error::{Error, Result};
use playout_core::storage::{BlobStore, ListPage, ObjectAcl, ObjectMeta};

/// Record of a store operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Get operation.
    Get {
        /// Key that was read.
        key: String,
    },
    /// Put operation.
    Put {
        /// Key that was written.
        key: String,
        /// Size of data written.
        size: usize,
        /// ACL requested.
        acl: ObjectAcl,
    },
    /// One page of a listing.
    ListPage {
        /// Prefix that was listed.
        prefix: String,
        /// Continuation token, `None` for the first page.
        token: Option<String>,
    },
}

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `Error::NotFound`.
    NotFound,
    /// `Error::AccessDenied`.
    AccessDenied,
    /// `Error::Unavailable` (retryable).
    Unavailable,
    /// `Error::Storage` (fatal, not a permission fault).
    Storage,
}

impl Fault {
    fn to_error(self, target: &str) -> Error {
        let message = format!("injected {self:?} for {target}");
        match self {
            Self::NotFound => Error::NotFound(message),
            Self::AccessDenied => Error::access_denied(message),
            Self::Unavailable => Error::unavailable(message),
            Self::Storage => Error::storage(message),
        }
    }
}

#[derive(Debug, Clone)]
struct InjectedFault {
    prefix: String,
    fault: Fault,
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: Option<DateTime<Utc>>,
    acl: ObjectAcl,
    visible_after_listings: u32,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    operations: Vec<StoreOp>,
    faults: Vec<InjectedFault>,
    listings: u32,
}

/// In-memory blob store that records every operation.
///
/// Listings count as one per first-page request; objects inserted with
/// [`RecordingStore::insert_after_listings`] stay invisible until that many
/// listings have been served.
#[derive(Clone)]
pub struct RecordingStore {
    name: String,
    page_size: usize,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for RecordingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStore")
            .field("name", &self.name)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RecordingStore {
    /// Creates an empty store named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_size: 1000,
            clock: Arc::new(SystemClock),
            state: Arc::default(),
        }
    }

    /// Sets the listing page size (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stamps writes with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stores an object with an explicit last-modified stamp.
    pub fn insert(&self, key: &str, data: impl Into<Bytes>, last_modified: Option<DateTime<Utc>>) {
        self.insert_after_listings(key, data, last_modified, 0);
    }

    /// Stores an object that becomes visible to listings only after
    /// `listings` first-page listings have been served.
    pub fn insert_after_listings(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: Option<DateTime<Utc>>,
        listings: u32,
    ) {
        let mut state = self.state.lock().unwrap();
        let visible_after_listings = state.listings + listings;
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
                acl: ObjectAcl::Private,
                visible_after_listings,
            },
        );
    }

    /// Fails every operation whose key or prefix starts with `prefix`.
    pub fn inject_failure(&self, prefix: impl Into<String>, fault: Fault) {
        self.push_fault(prefix.into(), fault, None);
    }

    /// Fails the next `times` matching operations, then recovers.
    pub fn inject_failure_times(&self, prefix: impl Into<String>, fault: Fault, times: u32) {
        self.push_fault(prefix.into(), fault, Some(times));
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().unwrap().faults.clear();
    }

    /// Returns all recorded operations.
    pub fn operations(&self) -> Vec<StoreOp> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Returns the keys written, in order.
    pub fn puts(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::Put { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of first-page listings served for `prefix`.
    pub fn listings_of(&self, prefix: &str) -> usize {
        self.operations()
            .iter()
            .filter(|op| {
                matches!(op, StoreOp::ListPage { prefix: p, token: None } if p == prefix)
            })
            .count()
    }

    /// Returns the ACL an object was written with.
    pub fn acl(&self, key: &str) -> Option<ObjectAcl> {
        self.state.lock().unwrap().objects.get(key).map(|o| o.acl)
    }

    /// Returns the stored bytes of an object.
    pub fn data(&self, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|o| o.data.clone())
    }

    fn push_fault(&self, prefix: String, fault: Fault, remaining: Option<u32>) {
        self.state.lock().unwrap().faults.push(InjectedFault {
            prefix,
            fault,
            remaining,
        });
    }

    fn check_failure(state: &mut State, target: &str) -> Result<()> {
        let Some(index) = state
            .faults
            .iter()
            .position(|f| target.starts_with(&f.prefix) && f.remaining != Some(0))
        else {
            return Ok(());
        };
        let injected = &mut state.faults[index];
        if let Some(remaining) = injected.remaining.as_mut() {
            *remaining -= 1;
        }
        Err(injected.fault.to_error(target))
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    fn root_uri(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(StoreOp::Get {
            key: key.to_string(),
        });
        Self::check_failure(&mut state, key)?;
        state
            .objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {key}")))
    }

    async fn put(&self, key: &str, data: Bytes, acl: ObjectAcl) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        state.operations.push(StoreOp::Put {
            key: key.to_string(),
            size: data.len(),
            acl,
        });
        Self::check_failure(&mut state, key)?;
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Some(now),
                acl,
                visible_after_listings: 0,
            },
        );
        Ok(())
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(StoreOp::ListPage {
            prefix: prefix.to_string(),
            token: token.clone(),
        });
        Self::check_failure(&mut state, prefix)?;
        if token.is_none() {
            state.listings += 1;
        }
        let listings = state.listings;

        let mut matching = state
            .objects
            .iter()
            .filter(|(k, o)| k.starts_with(prefix) && o.visible_after_listings < listings)
            .filter(|(k, _)| token.as_deref().is_none_or(|after| k.as_str() > after));

        let objects: Vec<ObjectMeta> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, o)| ObjectMeta {
                key: key.clone(),
                size: o.data.len() as u64,
                last_modified: o.last_modified,
            })
            .collect();

        let next_token = if matching.next().is_some() {
            objects.last().map(|m| m.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_token,
        })
    }
}
