//! In-memory draft store.
//!
//! Used for sessions where no durable storage is provisioned, and as a
//! controllable store in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{DraftStore, StoreError};
use crate::models::{Draft, DraftId, SyncStatus};

#[derive(Default)]
pub struct MemoryDraftStore {
    records: Mutex<HashMap<DraftId, Draft>>,
    unavailable: AtomicBool,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `StoreError::Unavailable`,
    /// simulating quota exhaustion or restricted storage mode.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("memory store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn put(&self, draft: &Draft) -> Result<(), StoreError> {
        self.check_available()?;
        self.records
            .lock()
            .await
            .insert(draft.id.clone(), draft.clone());
        Ok(())
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Draft>, StoreError> {
        self.check_available()?;
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn get_all(&self, status: Option<SyncStatus>) -> Result<Vec<Draft>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|d| status.is_none() || status == Some(d.sync_status))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &DraftId) -> Result<(), StoreError> {
        self.check_available()?;
        self.records.lock().await.remove(id);
        Ok(())
    }
}
