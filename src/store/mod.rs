//! Durable local draft storage, independent of network reachability.

mod fs;
mod memory;

pub use fs::FsDraftStore;
pub use memory::MemoryDraftStore;

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Draft, DraftId, SyncStatus};

/// Errors that can occur during local draft store operations.
///
/// None of these are fatal to an editing session: callers degrade to
/// memory-only editing rather than aborting.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store cannot accept writes at all (quota exhaustion, restricted
    /// storage mode, store not provisioned).
    #[error("local draft store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, #[source] io::Error),

    #[error("corrupt draft record {0}: {1}")]
    Corrupt(PathBuf, #[source] serde_json::Error),
}

impl StoreError {
    /// True when the store should be treated as gone for the rest of the
    /// session rather than retried.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// A keyed record store for drafts with atomic per-record operations.
///
/// `put` has upsert semantics: there is never more than one live record per
/// draft id, and no partial write is ever observable.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn put(&self, draft: &Draft) -> Result<(), StoreError>;

    async fn get(&self, id: &DraftId) -> Result<Option<Draft>, StoreError>;

    /// Lists stored drafts, optionally filtered by sync status.
    async fn get_all(&self, status: Option<SyncStatus>) -> Result<Vec<Draft>, StoreError>;

    /// Deleting a missing record is not an error.
    async fn delete(&self, id: &DraftId) -> Result<(), StoreError>;
}
