//! Recording doubles for the relay's external collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use playout_core::credentials::CredentialBroker;
use playout_core::error::{Error, Result};
use playout_core::storage::BlobStore;
use playout_core::work_order::{WorkOrderReporter, WorkOrderStatus};
use uuid::Uuid;

/// Work-order reporter that records every update.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<(Uuid, WorkOrderStatus)>>,
    fail: bool,
}

impl RecordingReporter {
    /// Creates a reporter that accepts every update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reporter that records and then fails every update.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Returns the recorded updates.
    pub fn updates(&self) -> Vec<(Uuid, WorkOrderStatus)> {
        self.updates.lock().unwrap().clone()
    }

    /// Returns only the recorded statuses.
    pub fn statuses(&self) -> Vec<WorkOrderStatus> {
        self.updates().into_iter().map(|(_, s)| s).collect()
    }
}

#[async_trait]
impl WorkOrderReporter for RecordingReporter {
    async fn update_status(&self, id: Uuid, status: WorkOrderStatus) -> Result<()> {
        self.updates.lock().unwrap().push((id, status));
        if self.fail {
            return Err(Error::unavailable("work order ledger unavailable"));
        }
        Ok(())
    }
}

/// Credential broker that hands out a fixed store, or refuses.
#[derive(Debug)]
pub struct StaticBroker<S> {
    store: Option<Arc<S>>,
    calls: AtomicUsize,
}

impl<S> StaticBroker<S> {
    /// Grants access to `store` on every exchange.
    pub fn granting(store: Arc<S>) -> Self {
        Self {
            store: Some(store),
            calls: AtomicUsize::new(0),
        }
    }

    /// Denies every exchange.
    pub fn denying() -> Self {
        Self {
            store: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of exchanges attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: BlobStore> CredentialBroker for StaticBroker<S> {
    async fn assume_cross_account(&self) -> Result<Arc<dyn BlobStore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.store {
            Some(store) => Ok(store.clone()),
            None => Err(Error::Credentials {
                message: "AssumeRole rejected: external id mismatch".into(),
                denied: true,
            }),
        }
    }
}
