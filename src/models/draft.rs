use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of multi-step form a draft belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    JobSheet,
    QaPack,
}

impl FormKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::JobSheet => "jobsheet",
            FormKind::QaPack => "qapack",
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identity of a draft, derived from the form kind and the business
/// entity the form is scoped to. There is at most one live draft per id in
/// each store: one job-sheet draft per job, one QA-pack draft per job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId {
    kind: FormKind,
    parent_entity_id: String,
}

impl DraftId {
    pub fn new(kind: FormKind, parent_entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            parent_entity_id: parent_entity_id.into(),
        }
    }

    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn parent_entity_id(&self) -> &str {
        &self.parent_entity_id
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.parent_entity_id)
    }
}

/// Whether the latest local edit has been confirmed by the remote store.
///
/// `Pending` only advances to `Synced` on a confirmed remote write; any
/// local edit after that resets the draft to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
}

/// The persisted snapshot of one in-progress multi-step form.
///
/// The engine treats `payload` as an opaque serialized blob; its shape is
/// owned by the form layer and the remote submission API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub parent_entity_id: String,
    /// Current position in the multi-step flow (first step is 1).
    pub step_index: u32,
    pub payload: serde_json::Value,
    /// Monotonically increasing per draft id across accepted writes.
    pub last_saved_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl Draft {
    /// Creates a fresh draft at step 1 with an empty payload.
    pub fn fresh(kind: FormKind, parent_entity_id: impl Into<String>) -> Self {
        let parent = parent_entity_id.into();
        Self {
            id: DraftId::new(kind, parent.clone()),
            parent_entity_id: parent,
            step_index: 1,
            payload: serde_json::Value::Object(serde_json::Map::new()),
            last_saved_at: Utc::now(),
            sync_status: SyncStatus::Pending,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_step(mut self, step_index: u32) -> Self {
        self.step_index = step_index;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }

    /// Marks the draft as confirmed by the remote store.
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Synced;
    }

    /// Records a new local edit. Resets `Synced` back to `Pending`.
    pub fn touch(&mut self, step_index: u32, payload: serde_json::Value) {
        self.step_index = step_index;
        self.payload = payload;
        self.last_saved_at = Utc::now();
        self.sync_status = SyncStatus::Pending;
    }
}
