//! Auto-sync prompt scheduling
//!
//! When the staleness policy says data is old, the scheduler offers a bulk
//! sync once per session. The offer withdraws itself after a timeout unless
//! the user accepts or dismisses it first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use fintrack_shared_config::AutoSyncConfig;

use crate::adapters::{Notification, Notifier};
use crate::error::{SyncError, SyncResult};

/// Where the prompt is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSyncPhase {
    Idle,
    Prompted,
    Accepted,
    Dismissed,
    AutoDismissed,
}

impl AutoSyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Prompted => "prompted",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
            Self::AutoDismissed => "auto_dismissed",
        }
    }
}

/// Output of the external staleness policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StalenessSignal {
    pub should_auto_sync: bool,
    /// Entities considered stale
    pub stale_count: usize,
}

/// Result of kicking off one entity's sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncOutcome {
    pub entity_id: String,
    pub success: bool,
    pub error: Option<String>,
}

impl EntitySyncOutcome {
    pub fn succeeded(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(entity_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Backend call that starts a sync of every stale entity
#[async_trait]
pub trait BulkSyncStarter: Send + Sync + 'static {
    async fn start_bulk_sync(&self) -> SyncResult<Vec<EntitySyncOutcome>>;
}

/// Aggregated bulk sync kickoff result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkSyncSummary {
    pub successful: usize,
    pub failed: usize,
}

impl BulkSyncSummary {
    pub fn from_outcomes(outcomes: &[EntitySyncOutcome]) -> Self {
        let successful = outcomes.iter().filter(|o| o.success).count();
        Self {
            successful,
            failed: outcomes.len() - successful,
        }
    }

    /// User-facing summary line
    pub fn message(&self) -> String {
        format!("{} successful, {} failed", self.successful, self.failed)
    }
}

struct SchedulerInner {
    phase: watch::Sender<AutoSyncPhase>,
    has_shown_prompt: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    prompt_timeout: Duration,
    starter: Arc<dyn BulkSyncStarter>,
    notifier: Arc<dyn Notifier>,
}

impl SchedulerInner {
    /// Move `from -> to` atomically; returns false if the phase was not `from`
    fn transition(&self, from: AutoSyncPhase, to: AutoSyncPhase) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == from {
                *phase = to;
                true
            } else {
                false
            }
        })
    }

    fn current(&self) -> AutoSyncPhase {
        *self.phase.borrow()
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }
}

/// Once-per-session auto-sync prompt
pub struct AutoSyncScheduler {
    inner: Arc<SchedulerInner>,
}

impl AutoSyncScheduler {
    pub fn new(
        starter: Arc<dyn BulkSyncStarter>,
        notifier: Arc<dyn Notifier>,
        config: &AutoSyncConfig,
    ) -> Self {
        Self::with_timeout(
            starter,
            notifier,
            Duration::from_secs(config.prompt_timeout_secs),
        )
    }

    pub fn with_timeout(
        starter: Arc<dyn BulkSyncStarter>,
        notifier: Arc<dyn Notifier>,
        prompt_timeout: Duration,
    ) -> Self {
        let (phase, _) = watch::channel(AutoSyncPhase::Idle);
        Self {
            inner: Arc::new(SchedulerInner {
                phase,
                has_shown_prompt: AtomicBool::new(false),
                timer: Mutex::new(None),
                prompt_timeout,
                starter,
                notifier,
            }),
        }
    }

    pub fn phase(&self) -> AutoSyncPhase {
        self.inner.current()
    }

    pub fn watch_phase(&self) -> watch::Receiver<AutoSyncPhase> {
        self.inner.phase.subscribe()
    }

    pub fn has_shown_prompt(&self) -> bool {
        self.inner.has_shown_prompt.load(Ordering::SeqCst)
    }

    /// Consider prompting; returns true if this call showed the prompt
    ///
    /// Must be called from within a Tokio runtime, which runs the timeout.
    pub fn evaluate(&self, signal: StalenessSignal) -> bool {
        if !signal.should_auto_sync || signal.stale_count == 0 {
            return false;
        }
        if self
            .inner
            .has_shown_prompt
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::trace!("Auto-sync prompt already shown this session");
            return false;
        }
        if !self
            .inner
            .transition(AutoSyncPhase::Idle, AutoSyncPhase::Prompted)
        {
            return false;
        }

        tracing::info!(
            stale_count = signal.stale_count,
            timeout_secs = self.inner.prompt_timeout.as_secs(),
            "Offering auto-sync"
        );

        let weak: Weak<SchedulerInner> = Arc::downgrade(&self.inner);
        let timeout = self.inner.prompt_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                if inner.transition(AutoSyncPhase::Prompted, AutoSyncPhase::AutoDismissed) {
                    tracing::info!("Auto-sync prompt timed out");
                }
            }
        });
        *self.inner.timer.lock() = Some(timer);
        true
    }

    /// Accept the prompt and start a bulk sync
    pub async fn accept(&self) -> SyncResult<BulkSyncSummary> {
        self.leave_prompt(AutoSyncPhase::Accepted, "accept")?;

        let outcomes = match self.inner.starter.start_bulk_sync().await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                e.log();
                self.inner
                    .notifier
                    .notify(Notification::error("Sync failed", e.to_string()));
                return Err(e);
            }
        };

        let summary = BulkSyncSummary::from_outcomes(&outcomes);
        tracing::info!(
            successful = summary.successful,
            failed = summary.failed,
            "Bulk sync started"
        );
        let notification = if summary.failed == 0 {
            Notification::success("Sync started", summary.message())
        } else {
            Notification::error("Sync started with errors", summary.message())
        };
        self.inner.notifier.notify(notification);
        Ok(summary)
    }

    /// Dismiss the prompt without syncing
    pub fn dismiss(&self) -> SyncResult<()> {
        self.leave_prompt(AutoSyncPhase::Dismissed, "dismiss")?;
        tracing::debug!("Auto-sync prompt dismissed");
        Ok(())
    }

    fn leave_prompt(&self, to: AutoSyncPhase, action: &'static str) -> SyncResult<()> {
        if !self.inner.transition(AutoSyncPhase::Prompted, to) {
            return Err(SyncError::InvalidTransition {
                from: self.inner.current().as_str(),
                action,
            });
        }
        self.inner.cancel_timer();
        Ok(())
    }
}

impl Drop for AutoSyncScheduler {
    fn drop(&mut self) {
        self.inner.cancel_timer();
    }
}
