//! Wire-format sync event fixtures
//!
//! Builders for the JSON frames a sync backend emits, shaped exactly as
//! they appear on the stream (camelCase fields, `type` discriminator).

use serde_json::{json, Value};

/// Factory for sync stream frames
pub struct SyncEventFixture;

impl SyncEventFixture {
    pub fn connection_established() -> Value {
        json!({ "type": "connection_established", "connectionId": "test-connection" })
    }

    pub fn error(message: &str) -> Value {
        json!({ "type": "error", "message": message })
    }

    // ----- crypto wallets -----

    pub fn wallet_progress(wallet_id: &str, progress: f64, status: &str) -> Value {
        json!({
            "type": "wallet_sync_progress",
            "walletId": wallet_id,
            "progress": progress,
            "status": status
        })
    }

    pub fn wallet_completed(wallet_id: &str, synced_data: &[&str]) -> Value {
        json!({
            "type": "wallet_sync_completed",
            "walletId": wallet_id,
            "syncedData": synced_data
        })
    }

    pub fn wallet_failed(wallet_id: &str, error: &str) -> Value {
        json!({
            "type": "wallet_sync_failed",
            "walletId": wallet_id,
            "error": error
        })
    }

    // ----- banking accounts -----

    pub fn account_progress(account_id: &str, progress: f64, status: &str) -> Value {
        json!({
            "type": "sync_progress",
            "accountId": account_id,
            "progress": progress,
            "status": status
        })
    }

    pub fn account_syncing_transactions(account_id: &str, progress: f64) -> Value {
        json!({
            "type": "syncing_transactions_bank",
            "accountId": account_id,
            "progress": progress
        })
    }

    pub fn account_completed(account_id: &str) -> Value {
        json!({ "type": "sync_completed", "accountId": account_id })
    }

    pub fn account_failed(account_id: &str, error: &str) -> Value {
        json!({ "type": "failed_bank", "accountId": account_id, "error": error })
    }

    // ----- integrations -----

    pub fn integration_progress(
        integration_id: &str,
        provider: &str,
        progress: f64,
        current_step: &str,
    ) -> Value {
        json!({
            "type": "integration_sync_progress",
            "integrationId": integration_id,
            "provider": provider,
            "progress": progress,
            "status": "in_progress",
            "currentStep": current_step
        })
    }

    pub fn integration_completed(integration_id: &str, provider: &str) -> Value {
        json!({
            "type": "integration_sync_completed",
            "integrationId": integration_id,
            "provider": provider
        })
    }

    pub fn integration_failed(integration_id: &str, provider: &str, error: &str) -> Value {
        json!({
            "type": "integration_sync_failed",
            "integrationId": integration_id,
            "provider": provider,
            "error": error
        })
    }
}
