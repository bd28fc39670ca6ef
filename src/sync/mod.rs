//! Background reconciliation: pushes locally-pending drafts to the remote
//! store.

mod reconcile;

pub use reconcile::{Advisory, ReconcileHandle, ReconcileWorker};
