//! Log-backed collaborators for the sync adapters
//!
//! The agent has no data cache or UI, so invalidations and notifications
//! are written to the log instead.

use fintrack_sync::{CacheInvalidator, Notification, NotificationLevel, Notifier, QueryKey};

/// Logs every invalidated query key
pub struct LogInvalidator;

impl CacheInvalidator for LogInvalidator {
    fn invalidate(&self, keys: &[QueryKey]) {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        tracing::info!(keys = ?keys, "Read models invalidated");
    }
}

/// Logs notifications at a level matching their severity
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(
                title = %notification.title,
                "{}",
                notification.message
            ),
            NotificationLevel::Error => tracing::warn!(
                title = %notification.title,
                "{}",
                notification.message
            ),
        }
    }
}
