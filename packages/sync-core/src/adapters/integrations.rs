//! Third-party integration sync adapter

use std::sync::Arc;

use super::{failure_message, AdapterCore, AdapterSubscriptions, CacheInvalidator, QueryKey};
use crate::channel::Channel;
use crate::connection::StreamHandle;
use crate::events::{IntegrationSyncPayload, SyncEvent, INTEGRATION_EVENT_PREFIX};
use crate::router::{ChannelHandler, RoutedEvent};
use crate::status::{SyncDomain, SyncStatus};
use crate::store::{EntitySyncState, ProgressUpdate, SyncStateReader};

/// Projects `integration_sync_*` events sharing the crypto channel
pub struct IntegrationSyncAdapter {
    core: AdapterCore,
}

impl IntegrationSyncAdapter {
    pub fn new(invalidator: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            core: AdapterCore::new(SyncDomain::Integration, invalidator),
        }
    }

    /// Subscribe to the crypto and connection channels of `handle`
    pub fn attach(self: &Arc<Self>, handle: &StreamHandle) -> AdapterSubscriptions {
        AdapterSubscriptions::attach(Arc::clone(self) as _, handle, Channel::CRYPTO_SYNC)
    }

    pub fn reader(&self) -> SyncStateReader {
        self.core.reader.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    pub fn clear(&self, integration_id: &str) -> Option<EntitySyncState> {
        self.core.clear(integration_id)
    }

    pub fn clear_finished(&self) -> usize {
        self.core.clear_terminal()
    }

    fn on_progress(&self, payload: &IntegrationSyncPayload) {
        let status =
            self.core
                .resolve_status(&payload.integration_id, payload.status.as_deref(), None);

        match status {
            Some(SyncStatus::Completed) => return self.on_completed(payload),
            Some(SyncStatus::Failed) => return self.on_failed(payload),
            _ => {}
        }

        let message = payload
            .current_step
            .clone()
            .or_else(|| payload.message.clone());
        let mut update = ProgressUpdate::new(payload.progress)
            .with_message(message)
            .with_started_at(payload.started_at);
        update.status = status;
        self.core.store.update_progress(&payload.integration_id, update);
    }

    fn on_completed(&self, payload: &IntegrationSyncPayload) {
        tracing::info!(
            integration_id = %payload.integration_id,
            provider = payload.provider.as_deref().unwrap_or("unknown"),
            "Integration sync completed"
        );
        self.core
            .store
            .complete_at(
                &payload.integration_id,
                payload.synced_data.clone(),
                payload.completed_at,
            );
        self.core.invalidate(&[
            QueryKey::IntegrationList,
            QueryKey::Integration(payload.integration_id.clone()),
            QueryKey::AllCrypto,
            QueryKey::Portfolio,
        ]);
    }

    fn on_failed(&self, payload: &IntegrationSyncPayload) {
        let error = failure_message(payload.error.as_ref(), payload.message.as_ref());
        tracing::warn!(
            integration_id = %payload.integration_id,
            provider = payload.provider.as_deref().unwrap_or("unknown"),
            error = %error,
            "Integration sync failed"
        );
        self.core.store.fail(&payload.integration_id, error);
    }
}

impl ChannelHandler for IntegrationSyncAdapter {
    fn handle(&self, event: &RoutedEvent) {
        if self.core.observe_connection(&event.event) {
            return;
        }
        if !event.event_type.starts_with(INTEGRATION_EVENT_PREFIX) {
            return;
        }

        match &event.event {
            SyncEvent::IntegrationSyncProgress(payload) => self.on_progress(payload),
            SyncEvent::IntegrationSyncCompleted(payload) => self.on_completed(payload),
            SyncEvent::IntegrationSyncFailed(payload) => self.on_failed(payload),
            _ => {
                tracing::debug!(
                    event_type = %event.event_type,
                    "Unrecognised integration event"
                );
            }
        }
    }
}
