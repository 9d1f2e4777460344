//! Error types for library reconciliation

use std::fmt;

use super::apply::{ApplyReport, SyncAction};

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Which of the two libraries an operation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibrarySide {
    Local,
    Remote,
}

impl fmt::Display for LibrarySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibrarySide::Local => f.write_str("local"),
            LibrarySide::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Reading one of the libraries failed
    #[error("Failed to read {side} library: {source:#}")]
    Fetch {
        side: LibrarySide,
        #[source]
        source: anyhow::Error,
    },

    /// One or more add/remove operations failed while applying an action
    #[error(
        "{action} sync failed: {} of {} operations failed",
        .report.failures.len(),
        .report.attempted()
    )]
    Apply {
        action: SyncAction,
        report: ApplyReport,
    },

    /// A request that can never succeed as issued
    #[error("Invalid sync request: {0}")]
    Validation(String),

    /// A newer sync request replaced this one before it finished
    #[error("Sync request was superseded by a newer request")]
    Superseded,
}

impl ReconcileError {
    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Apply { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_names_side() {
        let err = ReconcileError::Fetch {
            side: LibrarySide::Remote,
            source: anyhow::anyhow!("connection refused"),
        };

        assert_eq!(
            err.to_string(),
            "Failed to read remote library: connection refused"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = ReconcileError::Validation("unknown action".into());
        assert!(!err.is_retryable());
        assert!(!ReconcileError::Superseded.is_retryable());
    }
}
