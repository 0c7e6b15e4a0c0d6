//! Canonical sync statuses and raw-status normalization
//!
//! Each domain may report its own raw sub-statuses. They are mapped onto the
//! canonical set through explicit tables; a raw status that is neither in the
//! table nor already canonical normalizes to `None` instead of leaking an
//! invalid state into the store.

use serde::{Deserialize, Serialize};

/// Canonical per-entity sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Queued,
    Syncing,
    SyncingAssets,
    SyncingTransactions,
    SyncingNfts,
    SyncingDefi,
    SyncingBalance,
    Completed,
    Failed,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 9] = [
        Self::Queued,
        Self::Syncing,
        Self::SyncingAssets,
        Self::SyncingTransactions,
        Self::SyncingNfts,
        Self::SyncingDefi,
        Self::SyncingBalance,
        Self::Completed,
        Self::Failed,
    ];

    /// `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Statuses that may open a new attempt after a terminal state
    pub fn starts_attempt(&self) -> bool {
        matches!(self, Self::Queued | Self::Syncing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Syncing => "syncing",
            Self::SyncingAssets => "syncing_assets",
            Self::SyncingTransactions => "syncing_transactions",
            Self::SyncingNfts => "syncing_nfts",
            Self::SyncingDefi => "syncing_defi",
            Self::SyncingBalance => "syncing_balance",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a canonical name; raw domain statuses go through [`normalize_status`]
    pub fn from_canonical(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain that produced a raw status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDomain {
    Crypto,
    Banking,
    Integration,
}

impl std::fmt::Display for SyncDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypto => write!(f, "crypto"),
            Self::Banking => write!(f, "banking"),
            Self::Integration => write!(f, "integration"),
        }
    }
}

const BANKING_STATUS_MAP: &[(&str, SyncStatus)] = &[
    ("pending", SyncStatus::Queued),
    ("queued_bank", SyncStatus::Queued),
    ("syncing_bank", SyncStatus::Syncing),
    ("syncing_transactions_bank", SyncStatus::SyncingTransactions),
    ("syncing_balance_bank", SyncStatus::SyncingBalance),
    ("completed_bank", SyncStatus::Completed),
    ("synced", SyncStatus::Completed),
    ("failed_bank", SyncStatus::Failed),
];

const CRYPTO_STATUS_MAP: &[(&str, SyncStatus)] = &[
    ("pending", SyncStatus::Queued),
    ("syncing_tokens", SyncStatus::SyncingAssets),
];

const INTEGRATION_STATUS_MAP: &[(&str, SyncStatus)] = &[
    ("pending", SyncStatus::Queued),
    ("in_progress", SyncStatus::Syncing),
];

fn status_table(domain: SyncDomain) -> &'static [(&'static str, SyncStatus)] {
    match domain {
        SyncDomain::Crypto => CRYPTO_STATUS_MAP,
        SyncDomain::Banking => BANKING_STATUS_MAP,
        SyncDomain::Integration => INTEGRATION_STATUS_MAP,
    }
}

/// Map a raw domain status onto the canonical set
///
/// Table entries win; otherwise the raw value passes through only if it is
/// already a canonical name. Matching ignores ASCII case and surrounding
/// whitespace.
pub fn normalize_status(domain: SyncDomain, raw: &str) -> Option<SyncStatus> {
    let raw = raw.trim().to_ascii_lowercase();
    status_table(domain)
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, status)| *status)
        .or_else(|| SyncStatus::from_canonical(&raw))
}
