//! Editing-session lifecycle: autosave scheduling and draft resume.

mod autosave;
mod resume;

pub use autosave::{EditSession, SaveOutcome, SaveTarget};
pub use resume::{resume_session, ResumeSource, ResumedDraft};
