mod draft;

pub use draft::{Draft, DraftId, FormKind, SyncStatus};
