pub mod safety;
pub mod normalize;
pub mod embedding;
pub mod retrieval;
pub mod diagnosis;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::models::ValidationError;

#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Symptom constellation is empty")]
    EmptyConstellation,

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis worker failed: {0}")]
    WorkerFailed(String),
}

impl DiagnosticError {
    /// Stable error code for callers and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::EmptyConstellation => "empty_constellation",
            Self::Cancelled => "cancelled",
            Self::WorkerFailed(_) => "worker_failed",
        }
    }

    /// Provider failures an outer resilience layer may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingUnavailable(_) | Self::IndexUnavailable(_))
    }
}

/// Caller-driven cancellation, checked at each external-call boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called on any clone.
    pub fn check(&self) -> Result<(), DiagnosticError> {
        if self.is_cancelled() {
            Err(DiagnosticError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_retryable() {
        assert!(DiagnosticError::EmbeddingUnavailable("down".into()).is_retryable());
        assert!(DiagnosticError::IndexUnavailable("down".into()).is_retryable());
        assert!(!DiagnosticError::EmptyConstellation.is_retryable());
        assert!(!DiagnosticError::InvalidInput(ValidationError::NoSymptoms).is_retryable());
    }

    #[test]
    fn kinds_are_snake_case_codes() {
        assert_eq!(DiagnosticError::Cancelled.kind(), "cancelled");
        assert_eq!(
            DiagnosticError::InvalidInput(ValidationError::NoSymptoms).kind(),
            "invalid_input"
        );
    }

    #[test]
    fn validation_error_converts() {
        let err: DiagnosticError = ValidationError::EmptyChiefComplaint.into();
        assert!(matches!(err, DiagnosticError::InvalidInput(_)));
        assert!(err.to_string().contains("Chief complaint"));
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let worker = flag.clone();
        assert!(worker.check().is_ok());
        flag.cancel();
        assert!(worker.is_cancelled());
        assert!(matches!(worker.check(), Err(DiagnosticError::Cancelled)));
    }
}
