use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fintrack_sync::{
    BankingSyncAdapter, ConnectionManager, CryptoSyncAdapter, HttpStreamTransport,
    IntegrationSyncAdapter, StoreUpdate, StreamHandle, SyncStateReader,
};

mod config;
mod sinks;

use config::Config;
use sinks::{LogInvalidator, LogNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fintrack_sync_agent=debug,fintrack_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!(
        url = %config.stream_url(),
        environment = %config.sync.environment,
        "Starting Fintrack sync agent"
    );

    let transport = HttpStreamTransport::new(&config.sync.stream)
        .context("Failed to build stream transport")?;
    let manager = ConnectionManager::new(transport).with_policy(config.reconnect_policy());
    let handle = manager.connect(config.stream_url(), config.credentials())?;

    let invalidator = Arc::new(LogInvalidator);
    let crypto = Arc::new(CryptoSyncAdapter::new(invalidator.clone()));
    let banking = Arc::new(BankingSyncAdapter::new(
        invalidator.clone(),
        Arc::new(LogNotifier),
    ));
    let integrations = Arc::new(IntegrationSyncAdapter::new(invalidator));

    let subscriptions = vec![
        crypto.attach(&handle),
        banking.attach(&handle),
        integrations.attach(&handle),
    ];

    let readers = [
        ("wallet", crypto.reader()),
        ("account", banking.reader()),
        ("integration", integrations.reader()),
    ];
    for (kind, reader) in &readers {
        tokio::spawn(log_store_updates(*kind, reader.clone()));
    }
    tokio::spawn(log_connection_state(handle.clone()));

    if config.status_interval_secs > 0 {
        tokio::spawn(log_status(
            readers.clone(),
            Duration::from_secs(config.status_interval_secs),
        ));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down sync agent");

    for subscription in subscriptions {
        subscription.detach();
    }
    drop(handle);

    Ok(())
}

async fn log_store_updates(kind: &'static str, reader: SyncStateReader) {
    let mut updates = reader.subscribe();
    loop {
        match updates.recv().await {
            Ok(StoreUpdate::Changed(state)) => tracing::debug!(
                kind,
                id = %state.id,
                status = %state.status,
                progress = state.progress,
                "Sync state changed"
            ),
            Ok(StoreUpdate::Cleared(id)) => tracing::debug!(kind, id = %id, "Sync state cleared"),
            Ok(StoreUpdate::ClearedAll) => tracing::debug!(kind, "Sync states cleared"),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(kind, skipped, "Store update logger lagged")
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn log_connection_state(handle: StreamHandle) {
    let mut state = handle.watch_state();
    drop(handle);

    while state.changed().await.is_ok() {
        let current = state.borrow_and_update().clone();
        if current.connected {
            tracing::info!("Sync stream connected");
        } else if let Some(error) = &current.error {
            tracing::warn!(
                error = %error,
                reconnect_attempts = current.reconnect_attempts,
                "Sync stream disconnected"
            );
        }
    }
}

async fn log_status(readers: [(&'static str, SyncStateReader); 3], every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;
        for (kind, reader) in &readers {
            let summary = reader.summary();
            if summary.total == 0 {
                continue;
            }
            tracing::info!(
                kind,
                total = summary.total,
                active = summary.active,
                completed = summary.completed,
                failed = summary.failed,
                progress = ?reader.overall_progress(),
                "Sync status"
            );
        }
    }
}
