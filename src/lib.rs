//! Jobdraft
//!
//! Offline-capable draft persistence and synchronization engine for long,
//! multi-step data-entry sessions (daily job sheets, QA packs). Keeps
//! in-progress form state durable across page reloads, connectivity loss and
//! device interruption, and eventually reconciles locally-buffered edits
//! with the remote authoritative store.
//!
//! The engine coordinates two independently-failing backends with no shared
//! transaction boundary: a durable local store ([`store::FsDraftStore`]) and
//! the remote gateway ([`gateway::DraftGateway`]). Saves are dual-path
//! (remote first when online, local fallback marked pending); a background
//! worker ([`sync::ReconcileWorker`]) drains pending drafts on a timer and
//! on reconnect. Conflict resolution is deliberately simple: on resume the
//! remote copy wins, and the last successful write overwrites the prior
//! remote value.

pub mod config;
pub mod connectivity;
pub mod gateway;
pub mod models;
pub mod session;
pub mod store;
pub mod sync;

pub use config::{ConfigError, EngineConfig};
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivityWatch};
pub use gateway::{DraftGateway, GatewayError, HttpDraftGateway};
pub use models::{Draft, DraftId, FormKind, SyncStatus};
pub use session::{
    resume_session, EditSession, ResumeSource, ResumedDraft, SaveOutcome, SaveTarget,
};
pub use store::{DraftStore, FsDraftStore, MemoryDraftStore, StoreError};
pub use sync::{Advisory, ReconcileHandle, ReconcileWorker};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
