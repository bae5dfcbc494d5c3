use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the batch conversion engine.
///
/// Provider failures carry a `transient` flag computed once at the call
/// boundary; everything downstream branches on [`BatchError::is_retryable`]
/// instead of re-inspecting message text.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Empty or unreadable source bytes. Fails the file immediately, no retry.
    #[error("Invalid input: {0}")]
    Input(String),

    /// A provider call failed.
    #[error("Conversion provider error: {message}")]
    Provider { message: String, transient: bool },

    /// A provider call exceeded its time budget.
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The provider reported success but returned zero bytes.
    #[error("Provider returned empty output")]
    EmptyOutput,

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Archive error: {0}")]
    Archive(String),
}

impl BatchError {
    /// Whether the single automatic retry applies.
    ///
    /// Timeouts and empty outputs share the failure path (cooldown included)
    /// but are never classified transient, so they fail permanently.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BatchError::Provider { transient: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_provider_errors_retry() {
        assert!(BatchError::Provider {
            message: "x".into(),
            transient: true
        }
        .is_retryable());
        assert!(!BatchError::Provider {
            message: "x".into(),
            transient: false
        }
        .is_retryable());
        assert!(!BatchError::Timeout(Duration::from_secs(120)).is_retryable());
        assert!(!BatchError::EmptyOutput.is_retryable());
        assert!(!BatchError::Input("empty".into()).is_retryable());
    }
}
