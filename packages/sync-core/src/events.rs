//! Wire format for sync events
//!
//! Every frame is a JSON object discriminated on its `type` field. Known
//! types decode into a closed [`SyncEvent`] enum; anything else becomes
//! [`SyncEvent::Unknown`], which every consumer may safely ignore.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Channel;
use crate::error::{SyncError, SyncResult};

/// Prefix that marks integration events on the shared crypto channel
pub const INTEGRATION_EVENT_PREFIX: &str = "integration_sync_";

// =============================================================================
// Events
// =============================================================================

/// Events received on the sync stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Transport opened (also synthesized locally on every successful open)
    ConnectionEstablished {
        #[serde(default, rename = "connectionId")]
        connection_id: Option<String>,
    },

    /// Transport dropped
    ConnectionClosed {
        #[serde(default)]
        reason: Option<String>,
    },

    /// Stream-level error report
    Error {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },

    // ----- crypto wallets -----
    WalletSyncProgress(WalletSyncPayload),
    WalletSyncCompleted(WalletSyncPayload),
    WalletSyncFailed(WalletSyncPayload),

    // ----- banking accounts -----
    SyncProgress(AccountSyncPayload),
    SyncCompleted(AccountSyncPayload),
    FailedBank(AccountSyncPayload),
    SyncingBank(AccountSyncPayload),
    SyncingTransactionsBank(AccountSyncPayload),

    // ----- third-party integrations -----
    IntegrationSyncProgress(IntegrationSyncPayload),
    IntegrationSyncCompleted(IntegrationSyncPayload),
    IntegrationSyncFailed(IntegrationSyncPayload),

    /// Any `type` this core does not recognise
    #[serde(other)]
    Unknown,
}

impl SyncEvent {
    /// Channel an event belongs to when the frame does not name one
    pub fn default_channel(&self) -> Option<Channel> {
        match self {
            Self::ConnectionEstablished { .. } | Self::ConnectionClosed { .. } => {
                Some(Channel::CONNECTION)
            }
            Self::Error { .. } => Some(Channel::ERROR),
            Self::WalletSyncProgress(_)
            | Self::WalletSyncCompleted(_)
            | Self::WalletSyncFailed(_)
            | Self::IntegrationSyncProgress(_)
            | Self::IntegrationSyncCompleted(_)
            | Self::IntegrationSyncFailed(_) => Some(Channel::CRYPTO_SYNC),
            Self::SyncProgress(_)
            | Self::SyncCompleted(_)
            | Self::FailedBank(_)
            | Self::SyncingBank(_)
            | Self::SyncingTransactionsBank(_) => Some(Channel::BANKING_SYNC),
            Self::Unknown => None,
        }
    }

    /// Wallet, account or integration id the event refers to
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::WalletSyncProgress(p) | Self::WalletSyncCompleted(p) | Self::WalletSyncFailed(p) => {
                Some(&p.wallet_id)
            }
            Self::SyncProgress(p)
            | Self::SyncCompleted(p)
            | Self::FailedBank(p)
            | Self::SyncingBank(p)
            | Self::SyncingTransactionsBank(p) => Some(&p.account_id),
            Self::IntegrationSyncProgress(p)
            | Self::IntegrationSyncCompleted(p)
            | Self::IntegrationSyncFailed(p) => Some(&p.integration_id),
            _ => None,
        }
    }

    pub fn connection_established() -> Self {
        Self::ConnectionEstablished {
            connection_id: None,
        }
    }

    pub fn connection_closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: Some(reason.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code: None,
        }
    }

    /// The `type` tag this event serializes with
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::Error { .. } => "error",
            Self::WalletSyncProgress(_) => "wallet_sync_progress",
            Self::WalletSyncCompleted(_) => "wallet_sync_completed",
            Self::WalletSyncFailed(_) => "wallet_sync_failed",
            Self::SyncProgress(_) => "sync_progress",
            Self::SyncCompleted(_) => "sync_completed",
            Self::FailedBank(_) => "failed_bank",
            Self::SyncingBank(_) => "syncing_bank",
            Self::SyncingTransactionsBank(_) => "syncing_transactions_bank",
            Self::IntegrationSyncProgress(_) => "integration_sync_progress",
            Self::IntegrationSyncCompleted(_) => "integration_sync_completed",
            Self::IntegrationSyncFailed(_) => "integration_sync_failed",
            Self::Unknown => "unknown",
        }
    }
}

// =============================================================================
// Payload Types
// =============================================================================

/// Crypto wallet sync payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSyncPayload {
    pub wallet_id: String,
    /// 0..100, may be fractional
    pub progress: Option<f64>,
    /// Raw status string
    pub status: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    /// Data kinds refreshed by the sync (e.g. "assets", "nfts")
    pub synced_data: Option<Vec<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Banking account sync payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSyncPayload {
    pub account_id: String,
    pub progress: Option<f64>,
    /// Raw banking sub-status, normalized before it reaches the store
    pub status: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub synced_data: Option<Vec<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Third-party integration sync payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSyncPayload {
    pub integration_id: String,
    /// Provider name, e.g. "coinbase"
    pub provider: Option<String>,
    pub progress: Option<f64>,
    pub status: Option<String>,
    /// Human-readable step, shown as the progress message
    pub current_step: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub synced_data: Option<Vec<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Frames
// =============================================================================

/// A decoded wire frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Raw `type` tag as sent, kept for prefix filtering of unknown events
    pub event_type: String,
    /// Channel named by the frame, or inferred from the event
    pub channel: Option<Channel>,
    pub event: SyncEvent,
}

impl Frame {
    /// Decode one NDJSON line
    pub fn parse(raw: &str) -> SyncResult<Self> {
        let mut value: Value = serde_json::from_str(raw.trim())?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| SyncError::MalformedFrame("frame is not a JSON object".into()))?;

        let event_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::MalformedFrame("frame has no string `type`".into()))?
            .to_string();

        let named_channel = object
            .remove("channel")
            .and_then(|v| v.as_str().map(Channel::from));

        let event: SyncEvent = serde_json::from_value(value)?;
        let channel = named_channel.or_else(|| event.default_channel());

        Ok(Self {
            event_type,
            channel,
            event,
        })
    }
}
