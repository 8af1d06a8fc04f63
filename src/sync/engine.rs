//! Per-view sync engine.
//!
//! The engine is the only mutator of a view's state copy:
//! - `update` merges a patch, stamps it, persists it and broadcasts it
//! - `on_remote_update` replaces the local copy with a received snapshot
//!
//! Remote snapshots are never merged, re-broadcast or re-persisted, so two
//! views cannot echo a message back and forth. Observers (renderers, the
//! manager's history) learn about every change through `subscribe_changes`.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::channel::{BroadcastChannel, Subscription};
use super::protocol::SyncMessage;
use super::{new_view_id, ViewId, ViewRole};
use crate::quiz::{reconcile, QuizPatch, QuizState};
use crate::storage::StateStore;

/// Capacity of the per-engine change notification channel
const CHANGE_CAPACITY: usize = 64;

/// Where a state change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// This view called `update`
    Local,
    /// A broadcast from another view was applied
    Remote,
}

/// Notification sent to observers after every committed change
#[derive(Debug, Clone)]
pub struct StateChange {
    pub state: QuizState,
    pub origin: ChangeOrigin,
}

/// Sync engine owned by one view
pub struct SyncEngine {
    view_id: ViewId,
    role: ViewRole,
    state: RwLock<QuizState>,
    store: Arc<dyn StateStore>,
    channel: Arc<BroadcastChannel>,
    subscription: Mutex<Option<Subscription>>,
    changes: broadcast::Sender<StateChange>,
    remote_epoch: AtomicU64,
}

impl SyncEngine {
    /// Hydrate from the durable store and join the broadcast channel
    pub fn initialize(
        role: ViewRole,
        store: Arc<dyn StateStore>,
        channel: Arc<BroadcastChannel>,
    ) -> Arc<Self> {
        let view_id = new_view_id(role);
        let state = store.load();
        let subscription = channel.subscribe(&view_id);
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

        info!(
            "View {} initialized: {} questions, status {}",
            view_id,
            state.questions.len(),
            state.status
        );

        Arc::new(Self {
            view_id,
            role,
            state: RwLock::new(state),
            store,
            channel,
            subscription: Mutex::new(Some(subscription)),
            changes,
            remote_epoch: AtomicU64::new(0),
        })
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    pub fn role(&self) -> ViewRole {
        self.role
    }

    /// Snapshot of the current local state
    pub fn state(&self) -> QuizState {
        self.state.read().clone()
    }

    /// Number of remote snapshots applied so far
    pub fn remote_epoch(&self) -> u64 {
        self.remote_epoch.load(Ordering::Acquire)
    }

    /// Observe committed changes
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Merge `patch` over the current state, persist and broadcast the result
    pub fn update(&self, patch: QuizPatch) -> QuizState {
        let mut state = self.state.write();

        let previous_stamp = state.last_update;
        let mut next = state.clone();
        next.apply(patch);
        if reconcile(&mut next) {
            debug!(
                "View {} reconciled index/status to {}/{}",
                self.view_id, next.current_question_index, next.status
            );
        }
        // Strictly increasing within one view even if the clock stalls
        next.last_update = chrono::Utc::now()
            .timestamp_millis()
            .max(previous_stamp + 1);

        if let Err(e) = self.store.save(&next) {
            warn!("View {} failed to persist state: {}", self.view_id, e);
        }

        let delivered = self
            .channel
            .publish(&self.view_id, &SyncMessage::sync_state(next.clone()));
        debug!(
            "View {} broadcast state (status {}) to {} views",
            self.view_id, next.status, delivered
        );

        *state = next.clone();
        drop(state);

        self.notify(next.clone(), ChangeOrigin::Local);
        next
    }

    /// Replace local state wholesale with a received snapshot
    pub fn on_remote_update(&self, msg: SyncMessage) {
        let incoming = msg.into_payload();
        {
            let mut state = self.state.write();
            *state = incoming.clone();
            self.remote_epoch.fetch_add(1, Ordering::AcqRel);
        }
        debug!(
            "View {} applied remote state: status {}, index {}",
            self.view_id, incoming.status, incoming.current_question_index
        );
        self.notify(incoming, ChangeOrigin::Remote);
    }

    /// Apply every message already queued for this view
    pub fn pump(&self) -> usize {
        let mut applied = 0;
        loop {
            let next = match self.subscription.lock().as_mut() {
                Some(sub) => sub.try_recv(),
                None => None,
            };
            match next {
                Some(msg) => {
                    self.on_remote_update(msg);
                    applied += 1;
                }
                None => break,
            }
        }
        applied
    }

    /// Apply remote updates as they arrive until shutdown or teardown.
    ///
    /// The subscription is released when the loop ends.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let Some(mut subscription) = self.subscription.lock().take() else {
            warn!("View {} listener already running or closed", self.view_id);
            return;
        };

        loop {
            tokio::select! {
                msg = subscription.recv() => match msg {
                    Some(msg) => self.on_remote_update(msg),
                    None => break,
                },
                _ = shutdown.recv() => {
                    info!("View {} listener shutting down", self.view_id);
                    break;
                }
            }
        }

        drop(subscription);
        debug!("View {} left channel {}", self.view_id, self.channel.name());
    }

    /// Leave the broadcast channel without waiting for a running listener
    pub fn close(&self) {
        if self.subscription.lock().take().is_some() {
            debug!("View {} closed", self.view_id);
        } else {
            self.channel.unsubscribe(&self.view_id);
        }
    }

    fn notify(&self, state: QuizState, origin: ChangeOrigin) {
        // No observers is fine
        let _ = self.changes.send(StateChange { state, origin });
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("view_id", &self.view_id)
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::quiz::tests::question;
    use crate::quiz::{AnimationStyle, SessionStatus, NO_QUESTION};
    use crate::storage::{test_store, QuizStore};
    use crate::sync::CHANNEL_NAME;
    use tempfile::TempDir;

    pub(crate) struct Harness {
        _dir: TempDir,
        pub store: Arc<QuizStore>,
        pub channel: Arc<BroadcastChannel>,
    }

    impl Harness {
        pub(crate) fn new() -> Self {
            let (dir, store) = test_store();
            Self {
                _dir: dir,
                store: Arc::new(store),
                channel: BroadcastChannel::new(CHANNEL_NAME),
            }
        }

        pub(crate) fn view(&self, role: ViewRole) -> Arc<SyncEngine> {
            SyncEngine::initialize(role, self.store.clone(), self.channel.clone())
        }
    }

    #[test]
    fn test_initialize_defaults_without_stored_state() {
        let harness = Harness::new();
        let engine = harness.view(ViewRole::Manager);

        let state = engine.state();
        assert!(state.questions.is_empty());
        assert_eq!(state.current_question_index, NO_QUESTION);
        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.animation_style, AnimationStyle::Slide);
        assert!(harness.channel.is_subscribed(engine.view_id()));
    }

    #[test]
    fn test_update_merges_persists_and_broadcasts() {
        let harness = Harness::new();
        let manager = harness.view(ViewRole::Manager);
        let presenter = harness.view(ViewRole::Presenter);

        let state = manager.update(QuizPatch::new().questions(vec![question("q1")]));
        assert_eq!(state.status, SessionStatus::Waiting);

        assert_eq!(harness.store.load(), state);
        assert_eq!(presenter.pump(), 1);
        assert_eq!(presenter.state(), state);
        // Publisher does not hear its own broadcast
        assert_eq!(manager.pump(), 0);
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let harness = Harness::new();
        let engine = harness.view(ViewRole::Manager);
        engine.update(QuizPatch::new().questions(vec![question("a"), question("b")]));

        let state = engine.update(QuizPatch::new().status(SessionStatus::Waiting));
        assert_eq!(state.questions.len(), 2);

        let state = engine.update(QuizPatch::new().animation_style(AnimationStyle::Zoom));
        assert_eq!(state.questions.len(), 2);
        assert_eq!(state.status, SessionStatus::Waiting);
    }

    #[test]
    fn test_last_update_strictly_increases() {
        let harness = Harness::new();
        let engine = harness.view(ViewRole::Manager);

        let mut previous = engine.state().last_update;
        for _ in 0..20 {
            let stamp = engine
                .update(QuizPatch::new().animation_style(AnimationStyle::Fade))
                .last_update;
            assert!(stamp > previous);
            previous = stamp;
        }
    }

    #[test]
    fn test_index_stays_in_bounds() {
        let harness = Harness::new();
        let engine = harness.view(ViewRole::Manager);

        let patches = vec![
            QuizPatch::new().index(4),
            QuizPatch::new().questions(vec![question("a"), question("b")]),
            QuizPatch::new().index(1).status(SessionStatus::ShowingQuestion),
            QuizPatch::new().questions(vec![question("c")]),
            QuizPatch::new().index(-7),
            QuizPatch::new().index(0).status(SessionStatus::RevealingAnswer),
            QuizPatch::new().questions(Vec::new()),
            QuizPatch::new().status(SessionStatus::ShowingQuestion),
        ];

        for patch in patches {
            let state = engine.update(patch);
            let idx = state.current_question_index;
            assert!(idx == NO_QUESTION || (idx >= 0 && (idx as usize) < state.questions.len()));
            if state.status.needs_question() {
                assert!(state.current_question().is_some());
            }
        }
    }

    #[test]
    fn test_remote_update_replaces_wholesale() {
        let harness = Harness::new();
        let a = harness.view(ViewRole::Manager);
        let b = harness.view(ViewRole::Manager);

        b.update(QuizPatch::new().questions(vec![question("1"), question("2"), question("3")]));
        a.pump();
        assert_eq!(a.state().questions.len(), 3);

        let fewer = QuizState {
            questions: vec![question("only")],
            status: SessionStatus::Waiting,
            ..QuizState::default()
        };
        a.on_remote_update(SyncMessage::sync_state(fewer.clone()));

        assert_eq!(a.state(), fewer);
        assert_eq!(a.remote_epoch(), 2);
    }

    #[test]
    fn test_remote_update_is_not_echoed_or_persisted() {
        let harness = Harness::new();
        let a = harness.view(ViewRole::Manager);
        let b = harness.view(ViewRole::Presenter);

        let remote = QuizState {
            status: SessionStatus::GameOver,
            ..QuizState::default()
        };
        b.on_remote_update(SyncMessage::sync_state(remote));

        assert_eq!(a.pump(), 0);
        assert_eq!(harness.store.load().status, SessionStatus::Idle);
    }

    #[test]
    fn test_late_view_hydrates_from_store() {
        let harness = Harness::new();
        let manager = harness.view(ViewRole::Manager);
        let committed = manager.update(
            QuizPatch::new()
                .questions(vec![question("q1")])
                .animation_style(AnimationStyle::Zoom),
        );

        let late = harness.view(ViewRole::Presenter);
        assert_eq!(late.state(), committed);
    }

    #[test]
    fn test_concurrent_updates_last_delivery_wins() {
        let harness = Harness::new();
        let a = harness.view(ViewRole::Manager);
        let b = harness.view(ViewRole::Manager);

        // Same tick, conflicting patches, neither has seen the other
        a.update(QuizPatch::new().animation_style(AnimationStyle::Fade));
        let b_state = b.update(QuizPatch::new().animation_style(AnimationStyle::Zoom));

        // b's broadcast is the last one delivered to a
        a.pump();
        assert_eq!(a.state(), b_state);

        // a's broadcast is the last one delivered to b: b ends with a's patch
        b.pump();
        assert_eq!(b.state().animation_style, AnimationStyle::Fade);
    }

    #[test]
    fn test_convergence_after_latest_broadcast() {
        let harness = Harness::new();
        let a = harness.view(ViewRole::Manager);
        let b = harness.view(ViewRole::Manager);
        let presenter = harness.view(ViewRole::Presenter);

        a.update(QuizPatch::new().questions(vec![question("from-a")]));
        b.update(QuizPatch::new().questions(vec![question("from-b")]));
        a.pump();
        presenter.pump();

        let a_state = a.state();
        assert_eq!(a_state.questions[0].text, "from-b");
        assert_eq!(presenter.state(), a_state);
        assert_eq!(a_state.questions.len(), 1);
    }

    #[test]
    fn test_change_notifications() {
        let harness = Harness::new();
        let a = harness.view(ViewRole::Manager);
        let b = harness.view(ViewRole::Presenter);
        let mut a_changes = a.subscribe_changes();
        let mut b_changes = b.subscribe_changes();

        a.update(QuizPatch::new().status(SessionStatus::GameOver));
        b.pump();

        let local = a_changes.try_recv().unwrap();
        assert_eq!(local.origin, ChangeOrigin::Local);
        let remote = b_changes.try_recv().unwrap();
        assert_eq!(remote.origin, ChangeOrigin::Remote);
        assert_eq!(remote.state.status, SessionStatus::GameOver);
    }

    #[test]
    fn test_close_leaves_channel() {
        let harness = Harness::new();
        let engine = harness.view(ViewRole::Presenter);
        engine.close();

        assert!(!harness.channel.is_subscribed(engine.view_id()));
        assert_eq!(engine.pump(), 0);
    }

    #[tokio::test]
    async fn test_run_applies_remote_updates_until_shutdown() {
        let harness = Harness::new();
        let manager = harness.view(ViewRole::Manager);
        let presenter = harness.view(ViewRole::Presenter);
        let mut changes = presenter.subscribe_changes();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let listener = tokio::spawn(presenter.clone().run(shutdown_rx));

        manager.update(QuizPatch::new().questions(vec![question("live")]));
        let change = changes.recv().await.unwrap();
        assert_eq!(change.state.questions[0].text, "live");

        shutdown_tx.send(()).unwrap();
        listener.await.unwrap();
        assert!(!harness.channel.is_subscribed(presenter.view_id()));
    }
}
