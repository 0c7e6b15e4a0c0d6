//! Error handling for the realtime sync core
//!
//! Connection-level problems (the stream itself) and entity-level problems
//! (a wallet or account failed to sync) are different things: entity
//! failures are data in the state store, never a `SyncError`.

use thiserror::Error;

/// Main error type for the sync core
#[derive(Error, Debug)]
pub enum SyncError {
    // ========== Endpoint Errors ==========
    /// Endpoint is not a valid absolute URL
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    // ========== Frame Errors ==========
    /// A frame could not be decoded into a sync event
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// JSON decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ========== Scheduler Errors ==========
    /// Operation not allowed in the current auto-sync phase
    #[error("invalid transition from {from} via {action}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    /// The bulk sync kickoff call failed
    #[error("bulk sync failed: {0}")]
    BulkSync(String),
}

impl SyncError {
    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidEndpoint { .. } => ErrorSeverity::Critical,
            Self::BulkSync(_) => ErrorSeverity::Error,
            Self::MalformedFrame(_) | Self::Json(_) => ErrorSeverity::Warning,
            Self::InvalidTransition { .. } => ErrorSeverity::Info,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => {
                tracing::error!(error = %self, "Sync error");
            }
            ErrorSeverity::Warning => {
                tracing::warn!(error = %self, "Sync warning");
            }
            ErrorSeverity::Info => {
                tracing::info!(error = %self, "Sync notice");
            }
        }
    }

    /// Create an invalid endpoint error
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

/// Result type alias for sync core operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_severity_levels() {
        assert_eq!(
            SyncError::invalid_endpoint("nope", "relative URL").severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(
            SyncError::BulkSync("503".into()).severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            SyncError::MalformedFrame("{".into()).severity(),
            ErrorSeverity::Warning
        );
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::InvalidTransition {
            from: "idle",
            action: "accept",
        };
        assert_eq!(err.to_string(), "invalid transition from idle via accept");

        let err = SyncError::invalid_endpoint("ftp:x", "not a hierarchical URL");
        assert_eq!(
            err.to_string(),
            "invalid endpoint 'ftp:x': not a hierarchical URL"
        );
    }

    #[traced_test]
    #[test]
    fn test_log_uses_severity() {
        SyncError::BulkSync("sync-all returned 503".into()).log();
        assert!(logs_contain("sync-all returned 503"));
    }
}
