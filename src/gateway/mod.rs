//! Remote draft gateway: the authoritative save/load collaborator.

mod http;

pub use http::HttpDraftGateway;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Draft, FormKind};

/// Errors from the remote gateway, split by whether a retry can succeed.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The remote is unreachable or returned a transient failure. Retrying
    /// later may succeed.
    #[error("remote unreachable: {0}")]
    Network(String),

    /// The remote was reached but refused the write (validation, permission).
    /// Retrying the same record will not succeed.
    #[error("remote rejected draft: {0}")]
    Rejected(String),
}

/// Authoritative remote store for drafts.
///
/// `save` must be an upsert keyed by `(kind, parent_entity_id)`: a retried
/// save after a lost response must never create a duplicate server-side
/// record.
#[async_trait]
pub trait DraftGateway: Send + Sync {
    async fn save(&self, draft: &Draft) -> Result<(), GatewayError>;

    async fn load(
        &self,
        kind: FormKind,
        parent_entity_id: &str,
    ) -> Result<Option<Draft>, GatewayError>;
}
