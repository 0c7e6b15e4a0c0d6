//! Banking account sync adapter

use std::sync::Arc;

use super::{
    failure_message, AdapterCore, AdapterSubscriptions, CacheInvalidator, Notification, Notifier,
    QueryKey,
};
use crate::channel::Channel;
use crate::connection::StreamHandle;
use crate::events::{AccountSyncPayload, SyncEvent};
use crate::router::{ChannelHandler, RoutedEvent};
use crate::status::{SyncDomain, SyncStatus};
use crate::store::{EntitySyncState, ProgressUpdate, SyncStateReader};

/// Projects banking events and tells the user how each sync ended
pub struct BankingSyncAdapter {
    core: AdapterCore,
    notifier: Arc<dyn Notifier>,
}

impl BankingSyncAdapter {
    pub fn new(invalidator: Arc<dyn CacheInvalidator>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            core: AdapterCore::new(SyncDomain::Banking, invalidator),
            notifier,
        }
    }

    /// Subscribe to the banking and connection channels of `handle`
    pub fn attach(self: &Arc<Self>, handle: &StreamHandle) -> AdapterSubscriptions {
        AdapterSubscriptions::attach(Arc::clone(self) as _, handle, Channel::BANKING_SYNC)
    }

    pub fn reader(&self) -> SyncStateReader {
        self.core.reader.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    pub fn clear(&self, account_id: &str) -> Option<EntitySyncState> {
        self.core.clear(account_id)
    }

    pub fn clear_finished(&self) -> usize {
        self.core.clear_terminal()
    }

    fn on_progress(&self, payload: &AccountSyncPayload, implied: Option<SyncStatus>) {
        let status =
            self.core
                .resolve_status(&payload.account_id, payload.status.as_deref(), implied);

        match status {
            Some(SyncStatus::Completed) => return self.on_completed(payload),
            Some(SyncStatus::Failed) => return self.on_failed(payload),
            _ => {}
        }

        let mut update = ProgressUpdate::new(payload.progress)
            .with_message(payload.message.clone())
            .with_started_at(payload.started_at);
        update.status = status;
        self.core.store.update_progress(&payload.account_id, update);
    }

    fn on_completed(&self, payload: &AccountSyncPayload) {
        let id = &payload.account_id;
        let already_done = self.core.current_status(id) == Some(SyncStatus::Completed);

        tracing::info!(account_id = %id, "Bank account sync completed");
        self.core
            .store
            .complete_at(id, payload.synced_data.clone(), payload.completed_at);
        self.core.invalidate(&[
            QueryKey::AccountList,
            QueryKey::Account(id.clone()),
            QueryKey::Transactions(id.clone()),
            QueryKey::Budgets,
            QueryKey::NetWorth,
        ]);

        if !already_done {
            let message = payload
                .message
                .clone()
                .unwrap_or_else(|| "Your account balances and transactions are up to date".into());
            self.notifier
                .notify(Notification::success("Bank sync complete", message));
        }
    }

    fn on_failed(&self, payload: &AccountSyncPayload) {
        let id = &payload.account_id;
        let already_failed = self.core.current_status(id) == Some(SyncStatus::Failed);
        let error = failure_message(payload.error.as_ref(), payload.message.as_ref());

        tracing::warn!(account_id = %id, error = %error, "Bank account sync failed");
        self.core.store.fail(id, error.clone());

        if !already_failed {
            self.notifier.notify(Notification::error("Bank sync failed", error));
        }
    }
}

impl ChannelHandler for BankingSyncAdapter {
    fn handle(&self, event: &RoutedEvent) {
        if self.core.observe_connection(&event.event) {
            return;
        }

        match &event.event {
            SyncEvent::SyncProgress(payload) => self.on_progress(payload, None),
            SyncEvent::SyncingBank(payload) => {
                self.on_progress(payload, Some(SyncStatus::Syncing))
            }
            SyncEvent::SyncingTransactionsBank(payload) => {
                self.on_progress(payload, Some(SyncStatus::SyncingTransactions))
            }
            SyncEvent::SyncCompleted(payload) => self.on_completed(payload),
            SyncEvent::FailedBank(payload) => self.on_failed(payload),
            _ => {
                tracing::trace!(event_type = %event.event_type, "Banking adapter ignoring event");
            }
        }
    }
}
