//! Autosave scheduling for an active editing session.
//!
//! An [`EditSession`] owns the in-memory form state and a fixed-interval
//! autosave timer. Each tick (and each manual save) serializes the state
//! into a draft and performs a dual-path write: remote first when
//! connectivity is believed available, local fallback otherwise. Writes for
//! one draft id are strictly serialized by an in-flight guard; a save that
//! finds another save in flight adopts that save's outcome instead of
//! starting a concurrent write.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::EngineConfig;
use crate::connectivity::ConnectivityWatch;
use crate::gateway::DraftGateway;
use crate::models::{Draft, DraftId, SyncStatus};
use crate::store::{DraftStore, StoreError};

/// Where a dual-path write landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Remote,
    Local,
}

/// Outcome of one save attempt. `SavedTo(Local)` means persistence is
/// degraded but real; `Failed` means the draft only survives in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    SavedTo(SaveTarget),
    Failed,
}

struct FormState {
    step_index: u32,
    payload: serde_json::Value,
    last_saved_at: DateTime<Utc>,
}

struct SessionInner {
    store: Arc<dyn DraftStore>,
    gateway: Arc<dyn DraftGateway>,
    connectivity: ConnectivityWatch,
    id: DraftId,
    state: Mutex<FormState>,
    /// In-flight guard: at most one outstanding save per draft id.
    save_lock: Mutex<()>,
    /// Sequence + outcome of the most recently completed save, for callers
    /// that coalesce with an in-flight write.
    outcome: watch::Sender<(u64, Option<SaveOutcome>)>,
    /// Set once the local store reports unavailable; the session continues
    /// memory-only for its remainder.
    degraded: AtomicBool,
    retention_after_sync: bool,
}

/// One active editing session for a single draft.
///
/// The autosave timer lives exactly as long as this object: `stop` (or
/// dropping the session) cancels it on every exit path. A save already in
/// flight when the session stops runs to completion.
pub struct EditSession {
    inner: Arc<SessionInner>,
    task: Option<JoinHandle<()>>,
    shutdown: Arc<Notify>,
}

impl EditSession {
    /// Starts a session seeded with `draft` (normally the result of
    /// [`resume_session`](crate::session::resume_session)) and schedules the
    /// autosave timer.
    pub fn start(
        store: Arc<dyn DraftStore>,
        gateway: Arc<dyn DraftGateway>,
        connectivity: ConnectivityWatch,
        draft: Draft,
        config: &EngineConfig,
    ) -> Self {
        let inner = Arc::new(SessionInner {
            store,
            gateway,
            connectivity,
            id: draft.id.clone(),
            state: Mutex::new(FormState {
                step_index: draft.step_index,
                payload: draft.payload,
                last_saved_at: draft.last_saved_at,
            }),
            save_lock: Mutex::new(()),
            outcome: watch::channel((0, None)).0,
            degraded: AtomicBool::new(false),
            retention_after_sync: config.retention_after_sync,
        });

        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(autosave_loop(
            inner.clone(),
            shutdown.clone(),
            config.autosave_interval(),
        ));

        Self {
            inner,
            task: Some(task),
            shutdown,
        }
    }

    pub fn id(&self) -> &DraftId {
        &self.inner.id
    }

    /// True once the session has fallen back to memory-only editing.
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::Relaxed)
    }

    /// Records a form edit (step navigation or field change).
    pub async fn update(&self, step_index: u32, payload: serde_json::Value) {
        let mut state = self.inner.state.lock().await;
        state.step_index = step_index;
        state.payload = payload;
    }

    /// Current form state as a draft snapshot, without persisting it.
    pub async fn current_draft(&self) -> Draft {
        let state = self.inner.state.lock().await;
        Draft {
            id: self.inner.id.clone(),
            parent_entity_id: self.inner.id.parent_entity_id().to_string(),
            step_index: state.step_index,
            payload: state.payload.clone(),
            last_saved_at: state.last_saved_at,
            sync_status: SyncStatus::Pending,
        }
    }

    /// Manual save. Goes through the same guarded write pipeline as the
    /// autosave timer.
    pub async fn save_now(&self) -> SaveOutcome {
        self.inner.save().await
    }

    /// Ends the session: cancels the autosave timer and waits for any tick
    /// already running to finish.
    pub async fn stop(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn autosave_loop(inner: Arc<SessionInner>, shutdown: Arc<Notify>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately; the first
    // real autosave should be one full period after the session starts.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = interval.tick() => {
                let outcome = inner.save().await;
                tracing::debug!(draft = %inner.id, ?outcome, "autosave tick");
            }
        }
    }
}

impl SessionInner {
    /// Single write pipeline per draft id, entered by the timer or by a
    /// manual save.
    async fn save(&self) -> SaveOutcome {
        let seen = self.outcome.borrow().0;
        match self.save_lock.try_lock() {
            Ok(_guard) => {
                let outcome = self.write_once().await;
                self.outcome.send_modify(|(seq, last)| {
                    *seq += 1;
                    *last = Some(outcome);
                });
                outcome
            }
            Err(_) => {
                // A save for this id is already in flight; coalesce with it.
                let mut rx = self.outcome.subscribe();
                loop {
                    {
                        let (seq, last) = *rx.borrow_and_update();
                        if seq > seen {
                            return last.unwrap_or(SaveOutcome::Failed);
                        }
                    }
                    if rx.changed().await.is_err() {
                        return SaveOutcome::Failed;
                    }
                }
            }
        }
    }

    async fn write_once(&self) -> SaveOutcome {
        let draft = self.serialize_state().await;

        if self.connectivity.is_online() {
            match self.gateway.save(&draft).await {
                Ok(()) => {
                    self.settle_local_after_remote(&draft).await;
                    return SaveOutcome::SavedTo(SaveTarget::Remote);
                }
                Err(e) => {
                    tracing::debug!(
                        draft = %self.id,
                        "remote save failed, falling back to local: {}", e
                    );
                }
            }
        }

        self.put_local(&draft).await
    }

    async fn serialize_state(&self) -> Draft {
        let mut state = self.state.lock().await;
        let mut now = Utc::now();
        // last_saved_at never regresses, even if the clock does or two
        // saves land in the same instant.
        if now <= state.last_saved_at {
            now = state.last_saved_at + chrono::Duration::milliseconds(1);
        }
        state.last_saved_at = now;

        Draft {
            id: self.id.clone(),
            parent_entity_id: self.id.parent_entity_id().to_string(),
            step_index: state.step_index,
            payload: state.payload.clone(),
            last_saved_at: now,
            sync_status: SyncStatus::Pending,
        }
    }

    /// After a confirmed remote write the local copy is either refreshed as
    /// synced or purged, per retention policy.
    async fn settle_local_after_remote(&self, draft: &Draft) {
        if self.degraded.load(Ordering::Relaxed) {
            return;
        }
        let result = if self.retention_after_sync {
            let mut synced = draft.clone();
            synced.mark_synced();
            self.store.put(&synced).await
        } else {
            self.store.delete(&draft.id).await
        };
        if let Err(e) = result {
            self.note_store_error(&e);
        }
    }

    async fn put_local(&self, draft: &Draft) -> SaveOutcome {
        if self.degraded.load(Ordering::Relaxed) {
            return SaveOutcome::Failed;
        }
        match self.store.put(draft).await {
            Ok(()) => SaveOutcome::SavedTo(SaveTarget::Local),
            Err(e) => {
                self.note_store_error(&e);
                SaveOutcome::Failed
            }
        }
    }

    fn note_store_error(&self, e: &StoreError) {
        if e.is_unavailable() {
            if !self.degraded.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    draft = %self.id,
                    "local draft store unavailable, editing continues memory-only: {}", e
                );
            }
        } else {
            tracing::warn!(draft = %self.id, "local draft write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::gateway::GatewayError;
    use crate::models::FormKind;
    use crate::store::MemoryDraftStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU64;

    struct FakeGateway {
        save_calls: AtomicU64,
        fail_network: AtomicBool,
        slow: bool,
        saved: Mutex<Vec<Draft>>,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                save_calls: AtomicU64::new(0),
                fail_network: AtomicBool::new(false),
                slow: false,
                saved: Mutex::new(Vec::new()),
            }
        }

        fn slow() -> Self {
            Self {
                slow: true,
                ..Self::new()
            }
        }

        fn calls(&self) -> u64 {
            self.save_calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl DraftGateway for FakeGateway {
        async fn save(&self, draft: &Draft) -> Result<(), GatewayError> {
            self.save_calls.fetch_add(1, Ordering::Relaxed);
            if self.slow {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            if self.fail_network.load(Ordering::Relaxed) {
                return Err(GatewayError::Network("connection refused".to_string()));
            }
            self.saved.lock().await.push(draft.clone());
            Ok(())
        }

        async fn load(
            &self,
            _kind: FormKind,
            _parent_entity_id: &str,
        ) -> Result<Option<Draft>, GatewayError> {
            Ok(None)
        }
    }

    fn short_config() -> EngineConfig {
        EngineConfig {
            autosave_interval_ms: 1_000,
            ..EngineConfig::default()
        }
    }

    fn session_with(
        online: bool,
        store: Arc<MemoryDraftStore>,
        gateway: Arc<FakeGateway>,
        config: &EngineConfig,
    ) -> (EditSession, ConnectivityMonitor) {
        let monitor = ConnectivityMonitor::new(online);
        let draft = Draft::fresh(FormKind::JobSheet, "J-100");
        let session = EditSession::start(store, gateway, monitor.watch(), draft, config);
        (session, monitor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_tick_writes_local_pending() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (session, _monitor) =
            session_with(false, store.clone(), gateway.clone(), &short_config());

        session.update(1, json!({"client": "Acme"})).await;
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let saved = store.get(session.id()).await.unwrap().unwrap();
        assert_eq!(saved.step_index, 1);
        assert_eq!(saved.sync_status, SyncStatus::Pending);
        assert_eq!(saved.payload, json!({"client": "Acme"}));
        // Offline: the remote gateway was never attempted.
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_save_prefers_remote_when_online() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (session, _monitor) =
            session_with(true, store.clone(), gateway.clone(), &short_config());

        session.update(2, json!({"step": 2})).await;
        let outcome = session.save_now().await;

        assert_eq!(outcome, SaveOutcome::SavedTo(SaveTarget::Remote));
        assert_eq!(gateway.calls(), 1);
        // Retention keeps the local copy, marked synced.
        let local = store.get(session.id()).await.unwrap().unwrap();
        assert_eq!(local.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_success_purges_local_when_retention_off() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let config = EngineConfig {
            retention_after_sync: false,
            ..short_config()
        };
        let (session, _monitor) = session_with(true, store.clone(), gateway.clone(), &config);

        // Seed a stale pending copy, then save remotely.
        store
            .put(&Draft::fresh(FormKind::JobSheet, "J-100"))
            .await
            .unwrap();
        let outcome = session.save_now().await;

        assert_eq!(outcome, SaveOutcome::SavedTo(SaveTarget::Remote));
        assert!(store.get(session.id()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_falls_back_to_local() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        gateway.fail_network.store(true, Ordering::Relaxed);
        let (session, _monitor) =
            session_with(true, store.clone(), gateway.clone(), &short_config());

        let outcome = session.save_now().await;

        assert_eq!(outcome, SaveOutcome::SavedTo(SaveTarget::Local));
        let local = store.get(session.id()).await.unwrap().unwrap();
        assert_eq!(local.sync_status, SyncStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_unavailable_degrades_without_crashing() {
        let store = Arc::new(MemoryDraftStore::new());
        store.set_unavailable(true);
        let gateway = Arc::new(FakeGateway::new());
        let (session, _monitor) =
            session_with(false, store.clone(), gateway.clone(), &short_config());

        // A tick fires against the unavailable store and must not panic.
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(session.is_degraded());

        // A manual save surfaces the degraded outcome; editing continues.
        let outcome = session.save_now().await;
        assert_eq!(outcome, SaveOutcome::Failed);
        session.update(2, json!({"still": "editable"})).await;
        assert_eq!(session.current_draft().await.step_index, 2);

        // Memory-only for the remainder of the session, even if the store
        // comes back.
        store.set_unavailable(false);
        assert_eq!(session.save_now().await, SaveOutcome::Failed);
        assert!(store.get(session.id()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_manual_saves_coalesce() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::slow());
        let (session, _monitor) =
            session_with(true, store.clone(), gateway.clone(), &short_config());

        session.update(3, json!({"step": 3})).await;
        let (first, second) = tokio::join!(session.save_now(), session.save_now());

        // Two triggers inside the same in-flight window: exactly one write.
        assert_eq!(gateway.calls(), 1);
        assert_eq!(first, SaveOutcome::SavedTo(SaveTarget::Remote));
        assert_eq!(second, SaveOutcome::SavedTo(SaveTarget::Remote));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_saved_at_never_regresses() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (session, _monitor) =
            session_with(false, store.clone(), gateway.clone(), &short_config());

        let mut previous = None;
        for step in 1..=4 {
            session.update(step, json!({ "step": step })).await;
            assert_eq!(
                session.save_now().await,
                SaveOutcome::SavedTo(SaveTarget::Local)
            );
            let saved = store.get(session.id()).await.unwrap().unwrap();
            if let Some(prev) = previous {
                assert!(saved.last_saved_at > prev);
            }
            previous = Some(saved.last_saved_at);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_the_timer() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (session, _monitor) =
            session_with(false, store.clone(), gateway.clone(), &short_config());

        session.stop().await;

        // No further ticks: nothing ever reaches the store.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.get_all(None).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_writes_latest_state() {
        let store = Arc::new(MemoryDraftStore::new());
        let gateway = Arc::new(FakeGateway::new());
        let (session, _monitor) =
            session_with(false, store.clone(), gateway.clone(), &short_config());

        session.update(1, json!({"v": 1})).await;
        session.update(2, json!({"v": 2})).await;
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let saved = store.get(session.id()).await.unwrap().unwrap();
        assert_eq!(saved.step_index, 2);
        assert_eq!(saved.payload, json!({"v": 2}));

        // Exactly one live record regardless of how many ticks ran.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get_all(None).await.unwrap().len(), 1);
    }
}
