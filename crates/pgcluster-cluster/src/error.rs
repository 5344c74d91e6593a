//! Reconcile error types

use pgcluster_workload::SynthesisError;

/// A pass that could not issue any platform call
///
/// Per-object platform failures are not errors; they are recorded in the
/// pass's [`ReconcileReport`](crate::ReconcileReport).
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{0}")]
    Synthesis(#[from] SynthesisError),

    #[error("failed to load credentials for {cluster}: {source}")]
    Credentials {
        cluster: String,
        source: pgcluster_common::Error,
    },
}

impl ReconcileError {
    /// True when the cluster resource itself is invalid
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Synthesis(_))
    }

    /// True when retrying the same resource can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Synthesis(_) => false,
            Self::Credentials { source, .. } => source.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_error_is_not_retryable() {
        let err = ReconcileError::from(SynthesisError::InvalidQuantity {
            cluster: "acid-test".to_string(),
            field: "spec.resources.cpu".to_string(),
            value: "not-a-quantity".to_string(),
            expected: "a CPU quantity",
        });
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("spec.resources.cpu"));
    }

    #[test]
    fn test_credential_error_is_retryable() {
        let err = ReconcileError::Credentials {
            cluster: "default/acid-test".to_string(),
            source: pgcluster_common::Error::internal_with_context("credentials", "store unavailable"),
        };
        assert!(!err.is_configuration());
        assert!(err.is_retryable());
    }
}
