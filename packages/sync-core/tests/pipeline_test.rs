//! End-to-end tests of the sync pipeline
//!
//! Frames flow from a scripted transport through the connection manager and
//! router into the domain adapters and their state stores.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    eventually, line, wait_for_state, MockTransport, RecordingInvalidator, RecordingNotifier,
    ENDPOINT,
};
use fintrack_sync::{
    BankingSyncAdapter, ConnectionManager, Credentials, CryptoSyncAdapter, IntegrationSyncAdapter,
    NotificationLevel, QueryKey, ReconnectPolicy, StoreUpdate, StreamHandle, SyncStatus,
};
use fintrack_test_utils::SyncEventFixture;
use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;

struct Pipeline {
    transport: Arc<MockTransport>,
    live: UnboundedSender<String>,
    // Keeps the stream open
    _manager: ConnectionManager,
    handle: StreamHandle,
    crypto: Arc<CryptoSyncAdapter>,
    banking: Arc<BankingSyncAdapter>,
    integrations: Arc<IntegrationSyncAdapter>,
    invalidator: Arc<RecordingInvalidator>,
    notifier: Arc<RecordingNotifier>,
    _subscriptions: Vec<fintrack_sync::AdapterSubscriptions>,
}

impl Pipeline {
    async fn start() -> Self {
        let transport = MockTransport::new();
        let live = transport.push_live();
        let manager = ConnectionManager::with_shared_transport(transport.clone())
            .with_policy(ReconnectPolicy::fixed(3, Duration::from_secs(3)));

        let invalidator = RecordingInvalidator::new();
        let notifier = RecordingNotifier::new();
        let crypto = Arc::new(CryptoSyncAdapter::new(invalidator.clone()));
        let banking = Arc::new(BankingSyncAdapter::new(
            invalidator.clone(),
            notifier.clone(),
        ));
        let integrations = Arc::new(IntegrationSyncAdapter::new(invalidator.clone()));

        let handle = manager
            .connect(ENDPOINT, Credentials::bearer("token"))
            .unwrap();
        let subscriptions = vec![
            crypto.attach(&handle),
            banking.attach(&handle),
            integrations.attach(&handle),
        ];
        wait_for_state(&handle, |s| s.connected).await;

        Self {
            transport,
            live,
            _manager: manager,
            handle,
            crypto,
            banking,
            integrations,
            invalidator,
            notifier,
            _subscriptions: subscriptions,
        }
    }

    fn send(&self, frame: serde_json::Value) {
        self.live.send(line(frame)).unwrap();
    }

    fn send_raw(&self, raw: &str) {
        self.live.send(raw.to_string()).unwrap();
    }

    /// Send a marker frame and wait for it, so everything before it was applied
    async fn flush(&self) {
        let marker = format!("marker-{}", uuid::Uuid::new_v4());
        self.send(SyncEventFixture::wallet_progress(&marker, 0.0, "queued"));
        let reader = self.crypto.reader();
        eventually("marker applied", || reader.get(&marker).is_some()).await;
        self.crypto.clear(&marker);
    }
}

#[tokio::test(start_paused = true)]
async fn test_wallet_progress_then_completion() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::wallet_progress("w1", 40.0, "syncing_assets"));
    pipeline.send(SyncEventFixture::wallet_completed("w1", &["assets", "nfts"]));
    pipeline.flush().await;

    let state = pipeline.crypto.reader().get("w1").unwrap();
    assert_eq!(state.status, SyncStatus::Completed);
    assert_eq!(state.progress, 100);
    assert_eq!(
        state.synced_data,
        Some(vec!["assets".to_string(), "nfts".to_string()])
    );

    let keys = pipeline.invalidator.keys();
    assert!(keys.contains(&QueryKey::Wallet("w1".into())));
    assert!(keys.contains(&QueryKey::Portfolio));
    assert!(keys.contains(&QueryKey::NetWorth));
}

#[tokio::test(start_paused = true)]
async fn test_adapters_observe_connection() {
    let pipeline = Pipeline::start().await;

    assert!(pipeline.crypto.is_connected());
    assert!(pipeline.banking.is_connected());
    assert!(pipeline.integrations.is_connected());
    assert_eq!(pipeline.transport.tokens(), vec![Some("token".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_stray_progress_after_completion_is_ignored() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::wallet_progress("w1", 40.0, "syncing_assets"));
    pipeline.send(SyncEventFixture::wallet_completed("w1", &["assets"]));
    pipeline.send(SyncEventFixture::wallet_progress("w1", 60.0, "syncing_nfts"));
    pipeline.flush().await;

    let state = pipeline.crypto.reader().get("w1").unwrap();
    assert_eq!(state.status, SyncStatus::Completed);
    assert_eq!(state.progress, 100);
}

#[tokio::test(start_paused = true)]
async fn test_new_attempt_after_failure_resets_progress() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::wallet_progress("w1", 70.0, "syncing_defi"));
    pipeline.send(SyncEventFixture::wallet_failed("w1", "rpc timeout"));
    pipeline.send(SyncEventFixture::wallet_progress("w1", 5.0, "syncing"));
    pipeline.flush().await;

    let state = pipeline.crypto.reader().get("w1").unwrap();
    assert_eq!(state.status, SyncStatus::Syncing);
    assert_eq!(state.progress, 5);
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_do_not_stop_the_stream() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::wallet_progress("w1", 10.0, "syncing"));
    pipeline.send_raw("{\"type\": \"wallet_sync_progress\", ");
    pipeline.send_raw("not json at all");
    pipeline.send(json!({ "walletId": "w1", "progress": 90 }));
    pipeline.send(SyncEventFixture::wallet_progress("w1", 30.0, "syncing"));
    pipeline.flush().await;

    let state = pipeline.crypto.reader().get("w1").unwrap();
    assert_eq!(state.progress, 30);
    assert_eq!(pipeline.transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_banking_normalization_and_notifications() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::account_progress(
        "a1",
        20.0,
        "syncing_transactions_bank",
    ));
    pipeline.flush().await;
    let state = pipeline.banking.reader().get("a1").unwrap();
    assert_eq!(state.status, SyncStatus::SyncingTransactions);

    pipeline.send(SyncEventFixture::account_completed("a1"));
    pipeline.send(SyncEventFixture::wallet_completed("w1", &["assets"]));
    pipeline.send(SyncEventFixture::account_failed("a2", "Bank timeout"));
    pipeline.flush().await;

    let notifications = pipeline.notifier.notifications();
    assert_eq!(notifications.len(), 2, "crypto completion must stay silent");
    assert_eq!(notifications[0].level, NotificationLevel::Success);
    assert_eq!(notifications[1].level, NotificationLevel::Error);
    assert_eq!(notifications[1].message, "Bank timeout");

    let summary = pipeline.banking.reader().summary();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    assert!(pipeline.crypto.reader().all_synced());
    assert!(!pipeline.banking.reader().all_synced());
}

#[tokio::test(start_paused = true)]
async fn test_integration_events_share_crypto_channel() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::integration_progress(
        "i1",
        "coinbase",
        50.0,
        "Importing trades",
    ));
    pipeline.send(json!({
        "type": "integration_sync_started",
        "integrationId": "i1",
        "channel": "crypto_sync"
    }));
    pipeline.send(json!({
        "type": "portfolio_refreshed",
        "integrationId": "i9",
        "channel": "crypto_sync"
    }));
    pipeline.send(SyncEventFixture::integration_completed("i1", "coinbase"));
    pipeline.flush().await;

    let integrations = pipeline.integrations.reader();
    assert_eq!(integrations.len(), 1);
    assert_eq!(integrations.get("i1").unwrap().status, SyncStatus::Completed);
    assert!(integrations.get("i9").is_none());

    // Wallet store never sees integration ids
    assert!(pipeline.crypto.reader().get("i1").is_none());
    assert!(pipeline
        .invalidator
        .keys()
        .contains(&QueryKey::Integration("i1".into())));
}

#[tokio::test(start_paused = true)]
async fn test_completing_one_entity_leaves_connection_state_alone() {
    let pipeline = Pipeline::start().await;
    let mut states = pipeline.handle.watch_state();
    let before = states.borrow_and_update().clone();

    pipeline.send(SyncEventFixture::wallet_progress("w1", 30.0, "syncing_assets"));
    pipeline.send(SyncEventFixture::wallet_progress("w2", 60.0, "syncing_nfts"));
    pipeline.send(SyncEventFixture::account_progress("a1", 20.0, "syncing_bank"));
    pipeline.send(SyncEventFixture::wallet_completed("w1", &["assets"]));
    pipeline.flush().await;

    let crypto = pipeline.crypto.reader();
    assert_eq!(crypto.get("w1").unwrap().status, SyncStatus::Completed);
    assert_eq!(crypto.get("w2").unwrap().status, SyncStatus::SyncingNfts);
    assert!(pipeline.banking.reader().is_syncing());

    assert_eq!(pipeline.handle.state(), before);
    assert!(!states.has_changed().unwrap());
    assert!(pipeline.crypto.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_observers_see_every_write() {
    let pipeline = Pipeline::start().await;
    let mut updates = pipeline.banking.reader().subscribe();

    pipeline.send(SyncEventFixture::account_syncing_transactions("a1", 10.0));
    pipeline.send(SyncEventFixture::account_completed("a1"));
    pipeline.flush().await;

    let mut statuses = Vec::new();
    while let Ok(update) = updates.try_recv() {
        if let StoreUpdate::Changed(state) = update {
            statuses.push(state.status);
        }
    }
    assert_eq!(
        statuses,
        vec![SyncStatus::SyncingTransactions, SyncStatus::Completed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_is_distinct_from_entity_failure() {
    let pipeline = Pipeline::start().await;

    pipeline.send(SyncEventFixture::account_progress("a1", 40.0, "syncing_bank"));
    pipeline.flush().await;

    // Server drops the stream; every reconnect is refused
    let Pipeline {
        live,
        banking,
        transport,
        _manager,
        _subscriptions,
        ..
    } = pipeline;
    drop(live);

    eventually("banking sees disconnect", || !banking.is_connected()).await;
    eventually("bound reached", || transport.opens() == 4).await;

    let state = banking.reader().get("a1").unwrap();
    assert_eq!(state.status, SyncStatus::Syncing);
    assert!(state.error.is_none());
    drop(_subscriptions);
}
