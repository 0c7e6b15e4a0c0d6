//! Per-entity sync state store
//!
//! One [`SyncStateStore`] per domain holds a sync state machine for every
//! wallet, account or integration id it has heard about. The store is the
//! only writer; UI observers get a [`SyncStateReader`], which can take
//! snapshots and subscribe to changes but never mutate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::status::SyncStatus;

/// Channel capacity for store change notifications
const BROADCAST_CAPACITY: usize = 256;

/// Error recorded when a failure carries no message
pub const DEFAULT_FAILURE_MESSAGE: &str = "Sync failed";

/// Sync state of a single entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncState {
    pub id: String,
    pub status: SyncStatus,
    /// 0..=100
    pub progress: u8,
    pub message: Option<String>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub synced_data: Option<Vec<String>>,
    /// `startedAt` as reported by the backend. `started_at` may be a local
    /// stamp, which is never compared against backend timestamps.
    #[serde(skip)]
    reported_started_at: Option<DateTime<Utc>>,
}

impl EntitySyncState {
    fn new(id: &str, status: SyncStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            progress: 0,
            message: None,
            error: None,
            started_at: None,
            completed_at: None,
            synced_data: None,
            reported_started_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn begin_attempt(&mut self, reported: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.progress = 0;
        self.message = None;
        self.error = None;
        self.completed_at = None;
        self.synced_data = None;
        self.started_at = Some(reported.unwrap_or(now));
        self.reported_started_at = reported;
    }
}

/// A progress report for one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Raw progress; clamped to 0..=100 when applied
    pub progress: Option<f64>,
    /// Canonical status, already normalized
    pub status: Option<SyncStatus>,
    pub message: Option<String>,
    /// When the backend started this attempt, if it says
    pub started_at: Option<DateTime<Utc>>,
}

impl ProgressUpdate {
    pub fn new(progress: Option<f64>) -> Self {
        Self {
            progress,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn with_started_at(mut self, started_at: Option<DateTime<Utc>>) -> Self {
        self.started_at = started_at;
        self
    }

    /// A progress report after a terminal state opens a new attempt only if
    /// it is `queued`/`syncing` and is not older than the finished attempt.
    /// Only backend-reported start times are compared.
    fn opens_new_attempt(&self, current: &EntitySyncState) -> bool {
        match self.status {
            Some(status) if status.starts_attempt() => {}
            _ => return false,
        }
        match (self.started_at, current.reported_started_at) {
            (Some(incoming), Some(previous)) => incoming > previous,
            _ => true,
        }
    }
}

/// What a write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// First event for this id
    Created,
    Updated,
    /// Terminal entity restarted; progress was reset
    NewAttempt,
    /// Late progress for a finished attempt; nothing changed
    IgnoredTerminal,
}

/// Change notification published after every write
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUpdate {
    Changed(EntitySyncState),
    Cleared(String),
    ClearedAll,
}

/// Aggregate counts over a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl SyncSummary {
    /// Every known entity completed, and there is at least one
    pub fn all_synced(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

struct StoreInner {
    entities: DashMap<String, EntitySyncState>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl StoreInner {
    fn publish(&self, update: StoreUpdate) {
        // Ignore send errors (no observers)
        let _ = self.updates.send(update);
    }
}

fn clamp_progress(progress: f64) -> u8 {
    if progress.is_nan() {
        return 0;
    }
    progress.clamp(0.0, 100.0).round() as u8
}

/// Single writer for one domain's entity sync states
pub struct SyncStateStore {
    inner: Arc<StoreInner>,
}

impl Default for SyncStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStateStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                entities: DashMap::new(),
                updates,
            }),
        }
    }

    /// Read-only handle for observers
    pub fn reader(&self) -> SyncStateReader {
        SyncStateReader {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Apply a progress report, creating the entity on first sight
    pub fn update_progress(&self, id: &str, update: ProgressUpdate) -> UpdateOutcome {
        match update.status {
            Some(SyncStatus::Completed) => return self.complete(id, None),
            Some(SyncStatus::Failed) => {
                let error = update
                    .message
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                return self.fail(id, error);
            }
            _ => {}
        }

        let now = Utc::now();
        let incoming = update.progress.map(clamp_progress);

        let (outcome, snapshot) = match self.inner.entities.entry(id.to_string()) {
            Entry::Vacant(slot) => {
                let mut state = EntitySyncState::new(id, update.status.unwrap_or_default());
                state.progress = incoming.unwrap_or(0);
                state.message = update.message;
                state.started_at = Some(update.started_at.unwrap_or(now));
                state.reported_started_at = update.started_at;
                slot.insert(state.clone());
                (UpdateOutcome::Created, state)
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                let outcome = if state.is_terminal() {
                    if !update.opens_new_attempt(state) {
                        tracing::debug!(
                            entity_id = %id,
                            status = %state.status,
                            "Ignoring late progress for finished sync"
                        );
                        return UpdateOutcome::IgnoredTerminal;
                    }
                    state.begin_attempt(update.started_at, now);
                    UpdateOutcome::NewAttempt
                } else {
                    if state.started_at.is_none() {
                        state.started_at = Some(update.started_at.unwrap_or(now));
                    }
                    if state.reported_started_at.is_none() {
                        state.reported_started_at = update.started_at;
                    }
                    UpdateOutcome::Updated
                };

                if let Some(progress) = incoming {
                    state.progress = state.progress.max(progress);
                }
                if let Some(status) = update.status {
                    state.status = status;
                }
                if update.message.is_some() {
                    state.message = update.message;
                }
                (outcome, state.clone())
            }
        };

        self.inner.publish(StoreUpdate::Changed(snapshot));
        outcome
    }

    /// Mark an entity completed; repeated calls only refresh the timestamp
    pub fn complete(&self, id: &str, synced_data: Option<Vec<String>>) -> UpdateOutcome {
        self.complete_at(id, synced_data, None)
    }

    /// Like [`complete`](Self::complete), keeping the backend's `completedAt`
    /// when it reports one
    pub fn complete_at(
        &self,
        id: &str,
        synced_data: Option<Vec<String>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> UpdateOutcome {
        let now = completed_at.unwrap_or_else(Utc::now);
        let (outcome, snapshot) = match self.inner.entities.entry(id.to_string()) {
            Entry::Vacant(slot) => {
                let mut state = EntitySyncState::new(id, SyncStatus::Completed);
                state.progress = 100;
                state.completed_at = Some(now);
                state.synced_data = synced_data;
                slot.insert(state.clone());
                (UpdateOutcome::Created, state)
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                state.status = SyncStatus::Completed;
                state.progress = 100;
                state.error = None;
                state.completed_at = Some(now);
                if synced_data.is_some() {
                    state.synced_data = synced_data;
                }
                (UpdateOutcome::Updated, state.clone())
            }
        };

        self.inner.publish(StoreUpdate::Changed(snapshot));
        outcome
    }

    /// Mark an entity failed, keeping the progress it reached
    pub fn fail(&self, id: &str, error: impl Into<String>) -> UpdateOutcome {
        let now = Utc::now();
        let error = error.into();
        let (outcome, snapshot) = match self.inner.entities.entry(id.to_string()) {
            Entry::Vacant(slot) => {
                let mut state = EntitySyncState::new(id, SyncStatus::Failed);
                state.error = Some(error);
                state.completed_at = Some(now);
                slot.insert(state.clone());
                (UpdateOutcome::Created, state)
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                state.status = SyncStatus::Failed;
                state.error = Some(error);
                state.completed_at = Some(now);
                (UpdateOutcome::Updated, state.clone())
            }
        };

        self.inner.publish(StoreUpdate::Changed(snapshot));
        outcome
    }

    /// Forget one entity (e.g. a dismissed badge)
    pub fn clear(&self, id: &str) -> Option<EntitySyncState> {
        let removed = self.inner.entities.remove(id).map(|(_, state)| state);
        if removed.is_some() {
            self.inner.publish(StoreUpdate::Cleared(id.to_string()));
        }
        removed
    }

    /// Forget every completed or failed entity, returning how many went
    pub fn clear_terminal(&self) -> usize {
        let finished: Vec<String> = self
            .inner
            .entities
            .iter()
            .filter(|e| e.value().is_terminal())
            .map(|e| e.key().clone())
            .collect();

        finished
            .iter()
            .filter(|id| self.clear(id).is_some())
            .count()
    }

    pub fn clear_all(&self) {
        self.inner.entities.clear();
        self.inner.publish(StoreUpdate::ClearedAll);
    }
}

/// Read-only view of a [`SyncStateStore`]
#[derive(Clone)]
pub struct SyncStateReader {
    inner: Arc<StoreInner>,
}

impl SyncStateReader {
    /// Snapshot of one entity; `None` means no event was seen for it
    pub fn get(&self, id: &str) -> Option<EntitySyncState> {
        self.inner.entities.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of every entity, sorted by id
    pub fn get_all(&self) -> Vec<EntitySyncState> {
        self.collect(|_| true)
    }

    /// Entities with a non-terminal status
    pub fn active(&self) -> Vec<EntitySyncState> {
        self.collect(|s| s.status.is_active())
    }

    pub fn completed(&self) -> Vec<EntitySyncState> {
        self.collect(|s| s.status == SyncStatus::Completed)
    }

    pub fn failed(&self) -> Vec<EntitySyncState> {
        self.collect(|s| s.status == SyncStatus::Failed)
    }

    pub fn summary(&self) -> SyncSummary {
        self.inner
            .entities
            .iter()
            .fold(SyncSummary::default(), |mut summary, entry| {
                summary.total += 1;
                match entry.value().status {
                    SyncStatus::Completed => summary.completed += 1,
                    SyncStatus::Failed => summary.failed += 1,
                    _ => summary.active += 1,
                }
                summary
            })
    }

    pub fn all_synced(&self) -> bool {
        self.summary().all_synced()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner
            .entities
            .iter()
            .any(|e| e.value().status.is_active())
    }

    /// Mean progress over entities that have not failed
    pub fn overall_progress(&self) -> Option<f64> {
        let (sum, count) = self
            .inner
            .entities
            .iter()
            .filter(|e| e.value().status != SyncStatus::Failed)
            .fold((0u32, 0u32), |(sum, count), e| {
                (sum + u32::from(e.value().progress), count + 1)
            });
        (count > 0).then(|| f64::from(sum) / f64::from(count))
    }

    pub fn len(&self) -> usize {
        self.inner.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entities.is_empty()
    }

    /// Receive a [`StoreUpdate`] after every write
    pub fn subscribe(&self) -> broadcast::Receiver<StoreUpdate> {
        self.inner.updates.subscribe()
    }

    fn collect(&self, keep: impl Fn(&EntitySyncState) -> bool) -> Vec<EntitySyncState> {
        let mut states: Vec<EntitySyncState> = self
            .inner
            .entities
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn progress(p: f64, status: SyncStatus) -> ProgressUpdate {
        ProgressUpdate::new(Some(p)).with_status(status)
    }

    #[test]
    fn test_first_update_creates_entity() {
        let store = SyncStateStore::new();
        let reader = store.reader();

        assert!(reader.get("w1").is_none());
        let outcome = store.update_progress("w1", ProgressUpdate::new(Some(5.0)));

        assert_eq!(outcome, UpdateOutcome::Created);
        let state = reader.get("w1").unwrap();
        assert_eq!(state.status, SyncStatus::Queued);
        assert_eq!(state.progress, 5);
        assert!(state.started_at.is_some());
    }

    #[test]
    fn test_progress_is_monotonic_while_active() {
        let store = SyncStateStore::new();
        store.update_progress("w1", progress(40.0, SyncStatus::SyncingAssets));
        store.update_progress("w1", progress(25.0, SyncStatus::SyncingNfts));

        let state = store.reader().get("w1").unwrap();
        assert_eq!(state.progress, 40);
        assert_eq!(state.status, SyncStatus::SyncingNfts);
    }

    #[test]
    fn test_progress_is_clamped() {
        let store = SyncStateStore::new();
        store.update_progress("w1", ProgressUpdate::new(Some(250.0)));
        store.update_progress("w2", ProgressUpdate::new(Some(-3.0)));
        store.update_progress("w3", ProgressUpdate::new(Some(f64::NAN)));

        let reader = store.reader();
        assert_eq!(reader.get("w1").unwrap().progress, 100);
        assert_eq!(reader.get("w2").unwrap().progress, 0);
        assert_eq!(reader.get("w3").unwrap().progress, 0);
    }

    #[test]
    fn test_wallet_scenario_progress_then_complete() {
        let store = SyncStateStore::new();
        store.update_progress("w1", progress(40.0, SyncStatus::SyncingAssets));
        store.complete("w1", Some(vec!["assets".into(), "nfts".into()]));

        let state = store.reader().get("w1").unwrap();
        assert_eq!(state.status, SyncStatus::Completed);
        assert_eq!(state.progress, 100);
        assert_eq!(
            state.synced_data,
            Some(vec!["assets".to_string(), "nfts".to_string()])
        );
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn test_complete_is_idempotent() {
        let store = SyncStateStore::new();
        store.complete("w1", Some(vec!["assets".into()]));
        let first = store.reader().get("w1").unwrap();

        store.complete("w1", None);
        let second = store.reader().get("w1").unwrap();

        assert_eq!(second.status, SyncStatus::Completed);
        assert_eq!(second.progress, 100);
        assert_eq!(second.synced_data, first.synced_data);
        assert!(second.completed_at >= first.completed_at);
    }

    #[test]
    fn test_fail_is_distinct_from_missing() {
        let store = SyncStateStore::new();
        store.update_progress("a1", progress(30.0, SyncStatus::Syncing));
        store.fail("a1", "Bank timeout");

        let reader = store.reader();
        let failed = reader.get("a1").unwrap();
        assert_eq!(failed.status, SyncStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Bank timeout"));
        assert_eq!(failed.progress, 30);
        assert!(failed.completed_at.is_some());
        assert!(reader.get("a2").is_none());
    }

    #[test]
    fn test_late_progress_after_complete_is_ignored() {
        let store = SyncStateStore::new();
        store.update_progress("w1", progress(40.0, SyncStatus::SyncingAssets));
        store.complete("w1", None);

        let outcome = store.update_progress("w1", progress(60.0, SyncStatus::SyncingNfts));

        assert_eq!(outcome, UpdateOutcome::IgnoredTerminal);
        let state = store.reader().get("w1").unwrap();
        assert_eq!(state.status, SyncStatus::Completed);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn test_new_attempt_after_terminal_resets_progress() {
        let store = SyncStateStore::new();
        store.update_progress("w1", progress(80.0, SyncStatus::SyncingDefi));
        store.fail("w1", "rpc error");

        let outcome = store.update_progress("w1", progress(0.0, SyncStatus::Queued));
        assert_eq!(outcome, UpdateOutcome::NewAttempt);

        let state = store.reader().get("w1").unwrap();
        assert_eq!(state.status, SyncStatus::Queued);
        assert_eq!(state.progress, 0);
        assert!(state.error.is_none());
        assert!(state.completed_at.is_none());

        store.update_progress("w1", progress(10.0, SyncStatus::Syncing));
        assert_eq!(store.reader().get("w1").unwrap().progress, 10);
    }

    #[test]
    fn test_new_attempt_progress_starts_from_zero_not_previous() {
        let store = SyncStateStore::new();
        store.complete("w1", None);

        store.update_progress("w1", progress(15.0, SyncStatus::Syncing));
        assert_eq!(store.reader().get("w1").unwrap().progress, 15);
    }

    #[test]
    fn test_older_attempt_start_is_treated_as_stray() {
        let store = SyncStateStore::new();
        let started = Utc::now();
        store.update_progress(
            "w1",
            progress(10.0, SyncStatus::Syncing).with_started_at(Some(started)),
        );
        store.complete("w1", None);

        let stale = progress(50.0, SyncStatus::Syncing).with_started_at(Some(started));
        assert_eq!(store.update_progress("w1", stale), UpdateOutcome::IgnoredTerminal);

        let fresh = progress(5.0, SyncStatus::Syncing)
            .with_started_at(Some(started + Duration::seconds(30)));
        assert_eq!(store.update_progress("w1", fresh), UpdateOutcome::NewAttempt);
    }

    #[test]
    fn test_local_start_stamp_is_not_compared_with_backend_clock() {
        let store = SyncStateStore::new();
        store.update_progress("w1", progress(10.0, SyncStatus::Syncing));
        store.complete("w1", None);

        // Backend clock runs behind ours
        let skewed = Utc::now() - Duration::seconds(5);
        let restart = progress(0.0, SyncStatus::Queued).with_started_at(Some(skewed));
        assert_eq!(store.update_progress("w1", restart), UpdateOutcome::NewAttempt);

        let state = store.reader().get("w1").unwrap();
        assert_eq!(state.status, SyncStatus::Queued);
        assert_eq!(state.progress, 0);
        assert_eq!(state.started_at, Some(skewed));

        let next = progress(20.0, SyncStatus::Syncing).with_started_at(Some(skewed));
        assert_eq!(store.update_progress("w1", next), UpdateOutcome::Updated);
        assert_eq!(store.reader().get("w1").unwrap().progress, 20);
    }

    #[test]
    fn test_complete_at_keeps_reported_time() {
        let store = SyncStateStore::new();
        let finished = Utc::now() - Duration::minutes(2);
        store.complete_at("w1", None, Some(finished));
        assert_eq!(store.reader().get("w1").unwrap().completed_at, Some(finished));
    }

    #[test]
    fn test_terminal_status_in_progress_update_is_routed() {
        let store = SyncStateStore::new();
        store.update_progress("a1", progress(20.0, SyncStatus::Syncing));
        store.update_progress(
            "a1",
            ProgressUpdate::new(None)
                .with_status(SyncStatus::Failed)
                .with_message(Some("Invalid credentials".into())),
        );

        let state = store.reader().get("a1").unwrap();
        assert_eq!(state.status, SyncStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_all_synced_requires_every_entity_completed() {
        let store = SyncStateStore::new();
        let reader = store.reader();
        assert!(!reader.all_synced());

        for id in ["w1", "w2", "w3"] {
            store.update_progress(id, progress(10.0, SyncStatus::Syncing));
        }
        store.complete("w1", None);
        store.complete("w2", None);
        store.fail("w3", "boom");

        let summary = reader.summary();
        assert_eq!(
            summary,
            SyncSummary {
                total: 3,
                active: 0,
                completed: 2,
                failed: 1
            }
        );
        assert!(!reader.all_synced());

        store.clear("w3");
        assert!(reader.all_synced());
    }

    #[test]
    fn test_aggregate_views() {
        let store = SyncStateStore::new();
        store.update_progress("b", progress(50.0, SyncStatus::Syncing));
        store.update_progress("a", progress(20.0, SyncStatus::SyncingBalance));
        store.complete("c", None);
        store.fail("d", "x");

        let reader = store.reader();
        let active: Vec<String> = reader.active().into_iter().map(|s| s.id).collect();
        assert_eq!(active, vec!["a", "b"]);
        assert_eq!(reader.completed().len(), 1);
        assert_eq!(reader.failed().len(), 1);
        assert!(reader.is_syncing());
        // (50 + 20 + 100) / 3, the failed entity does not count
        let overall = reader.overall_progress().unwrap();
        assert!((overall - 170.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clear_operations() {
        let store = SyncStateStore::new();
        store.complete("w1", None);
        store.fail("w2", "x");
        store.update_progress("w3", progress(1.0, SyncStatus::Syncing));

        assert_eq!(store.clear_terminal(), 2);
        assert_eq!(store.reader().len(), 1);

        store.clear_all();
        assert!(store.reader().is_empty());
        assert!(store.clear("w3").is_none());
    }

    #[tokio::test]
    async fn test_observers_receive_updates() {
        let store = SyncStateStore::new();
        let mut rx = store.reader().subscribe();

        store.update_progress("w1", progress(10.0, SyncStatus::Syncing));
        store.complete("w1", None);
        store.clear("w1");

        match rx.recv().await.unwrap() {
            StoreUpdate::Changed(state) => assert_eq!(state.progress, 10),
            other => panic!("unexpected update: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            StoreUpdate::Changed(state) => assert_eq!(state.status, SyncStatus::Completed),
            other => panic!("unexpected update: {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap(), StoreUpdate::Cleared("w1".into()));
    }

    #[test]
    fn test_ignored_update_publishes_nothing() {
        let store = SyncStateStore::new();
        store.complete("w1", None);
        let mut rx = store.reader().subscribe();

        store.update_progress("w1", progress(30.0, SyncStatus::SyncingAssets));
        assert!(rx.try_recv().is_err());
    }
}
