//! Reconciliation worker.
//!
//! Runs on a fixed interval and on every connectivity-restored event, and
//! drains pending drafts to the remote gateway. Delivery is at-least-once:
//! the gateway save is an upsert, so a retry after a lost response cannot
//! duplicate a server-side record. Failures never surface as errors to the
//! editing session; persistent ones raise a non-blocking advisory.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::EngineConfig;
use crate::connectivity::{ConnectivityEvent, ConnectivityWatch};
use crate::gateway::{DraftGateway, GatewayError};
use crate::models::{Draft, DraftId, SyncStatus};
use crate::store::DraftStore;

/// Non-blocking advisory for the UI layer. Never fatal, never interrupts
/// editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The same draft failed several consecutive sync attempts.
    PersistentSyncFailure { id: DraftId, failed_attempts: u32 },
    /// The remote refused the draft; it will not be retried until edited
    /// again.
    RejectedByRemote { id: DraftId, reason: String },
}

#[derive(Default)]
struct RetryState {
    failures: u32,
    /// Cycles to skip before the next attempt (bounded exponential backoff).
    skip: u32,
    advised: bool,
    /// Set when the remote rejected this exact record; cleared once the
    /// record changes.
    rejected_for: Option<DateTime<Utc>>,
}

/// Cycles skipped after `failures` consecutive failed attempts:
/// 0, 1, 3, then capped at 7.
fn backoff_cycles(failures: u32) -> u32 {
    let shift = failures.saturating_sub(1).min(3);
    (1u32 << shift) - 1
}

pub struct ReconcileWorker {
    store: Arc<dyn DraftStore>,
    gateway: Arc<dyn DraftGateway>,
    connectivity: ConnectivityWatch,
    interval: Duration,
    retention_after_sync: bool,
    advisory_after: u32,
    retry: HashMap<DraftId, RetryState>,
    advisories: mpsc::UnboundedSender<Advisory>,
}

/// Owned handle to a running reconciliation worker. `stop` cancels the
/// timers deterministically; a cycle already running finishes its in-flight
/// write first. Dropping the handle aborts the worker outright.
pub struct ReconcileHandle {
    task: Option<JoinHandle<()>>,
    shutdown: Arc<Notify>,
    kick: Arc<Notify>,
}

impl ReconcileHandle {
    /// Requests an immediate reconcile pass in addition to the scheduled
    /// ones.
    pub fn request_sync(&self) {
        self.kick.notify_one();
    }

    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ReconcileHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl ReconcileWorker {
    /// Spawns the background worker. Returns its handle and the advisory
    /// channel.
    pub fn start(
        store: Arc<dyn DraftStore>,
        gateway: Arc<dyn DraftGateway>,
        connectivity: ConnectivityWatch,
        config: &EngineConfig,
    ) -> (ReconcileHandle, mpsc::UnboundedReceiver<Advisory>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            store,
            gateway,
            connectivity,
            interval: config.sync_interval(),
            retention_after_sync: config.retention_after_sync,
            advisory_after: config.advisory_after_failures,
            retry: HashMap::new(),
            advisories: tx,
        };

        let shutdown = Arc::new(Notify::new());
        let kick = Arc::new(Notify::new());
        let task = tokio::spawn(worker.run(shutdown.clone(), kick.clone()));

        (
            ReconcileHandle {
                task: Some(task),
                shutdown,
                kick,
            },
            rx,
        )
    }

    async fn run(mut self, shutdown: Arc<Notify>, kick: Arc<Notify>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the interval's immediate first tick; the first scheduled pass
        // is one full period out.
        interval.tick().await;

        let mut events = self.connectivity.clone();
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = kick.notified() => {
                    self.run_cycle().await;
                }
                _ = interval.tick() => {
                    if self.connectivity.is_online() {
                        self.run_cycle().await;
                    }
                }
                event = events.next_event(), if events_open => match event {
                    Some(ConnectivityEvent::Restored) => {
                        tracing::info!("connectivity restored, reconciling pending drafts");
                        self.run_cycle().await;
                    }
                    Some(ConnectivityEvent::Lost) => {}
                    None => events_open = false,
                }
            }
        }
    }

    async fn run_cycle(&mut self) {
        let pending = match self.store.get_all(Some(SyncStatus::Pending)).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::debug!("reconcile pass skipped, store unreadable: {}", e);
                return;
            }
        };
        if pending.is_empty() {
            return;
        }

        let mut synced = 0usize;
        let mut failed = 0usize;
        for draft in pending {
            if self.try_sync(draft).await {
                synced += 1;
            } else {
                failed += 1;
            }
        }
        tracing::debug!(synced, failed, "reconcile cycle complete");
    }

    /// Attempts one remote save for a pending draft. Returns true when the
    /// draft reached the remote store.
    async fn try_sync(&mut self, draft: Draft) -> bool {
        {
            let entry = self.retry.entry(draft.id.clone()).or_default();
            match entry.rejected_for {
                // Retrying an unchanged rejected record cannot succeed.
                Some(at) if at == draft.last_saved_at => return false,
                // The record was edited since the rejection; start over.
                Some(_) => *entry = RetryState::default(),
                None => {}
            }
            if entry.skip > 0 {
                entry.skip -= 1;
                return false;
            }
        }

        match self.gateway.save(&draft).await {
            Ok(()) => {
                self.settle_local(&draft).await;
                self.retry.remove(&draft.id);
                true
            }
            Err(GatewayError::Rejected(reason)) => {
                tracing::warn!(draft = %draft.id, "remote rejected draft: {}", reason);
                let entry = self.retry.entry(draft.id.clone()).or_default();
                entry.rejected_for = Some(draft.last_saved_at);
                let _ = self.advisories.send(Advisory::RejectedByRemote {
                    id: draft.id,
                    reason,
                });
                false
            }
            Err(GatewayError::Network(e)) => {
                let advisory_after = self.advisory_after;
                let entry = self.retry.entry(draft.id.clone()).or_default();
                entry.failures += 1;
                entry.skip = backoff_cycles(entry.failures);
                tracing::debug!(
                    draft = %draft.id,
                    failures = entry.failures,
                    "reconcile attempt failed: {}", e
                );
                if entry.failures >= advisory_after && !entry.advised {
                    entry.advised = true;
                    let _ = self.advisories.send(Advisory::PersistentSyncFailure {
                        id: draft.id.clone(),
                        failed_attempts: entry.failures,
                    });
                }
                false
            }
        }
    }

    /// After a confirmed remote write, the local copy is refreshed as synced
    /// or purged, per retention policy.
    async fn settle_local(&self, draft: &Draft) {
        let result = if self.retention_after_sync {
            let mut synced = draft.clone();
            synced.mark_synced();
            self.store.put(&synced).await
        } else {
            self.store.delete(&draft.id).await
        };
        if let Err(e) = result {
            // The draft stays pending locally; the next cycle re-saves it,
            // which the upsert gateway absorbs.
            tracing::warn!(draft = %draft.id, "local copy not updated after sync: {}", e);
        }
    }
}
