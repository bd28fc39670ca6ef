//! Resume resolution: which copy of a draft starts the session.

use crate::gateway::DraftGateway;
use crate::models::{Draft, DraftId, FormKind};
use crate::store::DraftStore;

/// Which copy won the resume decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    Remote,
    Local,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct ResumedDraft {
    pub draft: Draft,
    pub source: ResumeSource,
}

/// Decides the authoritative starting state for a (re)opened session.
///
/// The remote copy, when present, wins unconditionally: it is the most
/// recent state confirmed across all devices, and it replaces any local
/// pending copy for the same id even if the local copy has a newer
/// `last_saved_at`. This trades cross-device edit history for a
/// collision-free resume protocol. If the remote call fails or returns
/// nothing, the local copy is used; failing that, a fresh draft starts at
/// step 1.
pub async fn resume_session(
    store: &dyn DraftStore,
    gateway: &dyn DraftGateway,
    kind: FormKind,
    parent_entity_id: &str,
) -> ResumedDraft {
    let id = DraftId::new(kind, parent_entity_id);

    match gateway.load(kind, parent_entity_id).await {
        Ok(Some(mut remote)) => {
            remote.mark_synced();
            // Replace any stale local copy with the adopted remote state.
            if let Err(e) = store.put(&remote).await {
                tracing::debug!(draft = %id, "could not refresh local copy on resume: {}", e);
            }
            return ResumedDraft {
                draft: remote,
                source: ResumeSource::Remote,
            };
        }
        Ok(None) => {}
        Err(e) => {
            tracing::debug!(draft = %id, "remote draft load failed, trying local: {}", e);
        }
    }

    match store.get(&id).await {
        Ok(Some(local)) => ResumedDraft {
            draft: local,
            source: ResumeSource::Local,
        },
        Ok(None) => fresh(kind, parent_entity_id),
        Err(e) => {
            tracing::warn!(draft = %id, "local draft load failed, starting fresh: {}", e);
            fresh(kind, parent_entity_id)
        }
    }
}

fn fresh(kind: FormKind, parent_entity_id: &str) -> ResumedDraft {
    ResumedDraft {
        draft: Draft::fresh(kind, parent_entity_id),
        source: ResumeSource::Fresh,
    }
}
