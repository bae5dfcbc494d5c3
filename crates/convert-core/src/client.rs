//! External conversion provider contract
//!
//! The provider is an opaque capability: upload bytes, submit a conversion,
//! poll for the result, fetch the output. The wire format is the client
//! implementation's business; the orchestrator only sees opaque references
//! and [`BatchError`] values classified at this boundary.

use async_trait::async_trait;

use crate::error::BatchError;

/// Provider phrase signalling a transiently rejected request.
///
/// Message-content matching is a fragile, provider-version-dependent
/// heuristic; it stands in until the provider exposes structured error codes.
pub const TRANSIENT_SIGNATURE: &str = "Request could not be completed";

/// Handle to bytes uploaded to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef(pub String);

/// Location of a submitted conversion job on the provider side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLocation(pub String);

/// Handle to a finished conversion result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRef(pub String);

/// Classify a provider error message, once, at the call boundary.
pub fn provider_error(message: impl Into<String>) -> BatchError {
    let message = message.into();
    let transient = message.contains(TRANSIENT_SIGNATURE);
    BatchError::Provider { message, transient }
}

/// The four provider calls the per-file pipeline is built from.
///
/// Every call is bounded by the orchestrator's per-call timeout. Dropping the
/// returned future cancels an in-flight request for async implementations; an
/// implementation that offloads a blocking SDK call to a worker thread cannot
/// be cancelled mid-call, and its late result is discarded instead.
#[async_trait]
pub trait ConversionClient: Send + Sync {
    /// Upload source bytes, producing a provider-side asset handle.
    async fn upload(&self, bytes: &[u8]) -> Result<AssetRef, BatchError>;

    /// Submit a conversion of a previously uploaded asset.
    async fn submit(&self, asset: &AssetRef) -> Result<JobLocation, BatchError>;

    /// Wait for the remote conversion to finish and return a result handle.
    async fn poll_result(&self, location: &JobLocation) -> Result<ResultRef, BatchError>;

    /// Download the converted output.
    async fn fetch_content(&self, result: &ResultRef) -> Result<Vec<u8>, BatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification_happens_at_boundary() {
        let err = provider_error("Request could not be completed due to load");
        assert!(err.is_retryable());

        let err = provider_error("Invalid credentials");
        assert!(!err.is_retryable());
    }
}
