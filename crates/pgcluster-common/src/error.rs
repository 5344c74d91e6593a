//! Error types for the Postgres cluster operator
//!
//! Errors carry the cluster and field they relate to so a failed pass can be
//! traced back to the offending part of the custom resource.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The cluster resource cannot be turned into desired objects
    #[error("configuration error for {cluster}: {field}: {message}")]
    Configuration {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// The invalid field path (e.g., "spec.resources.cpu")
        field: String,
        /// Description of what's invalid
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "credentials", "controller")
        context: String,
    },
}

impl Error {
    /// Create a configuration error for a specific cluster field
    pub fn configuration(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            cluster: cluster.into(),
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration errors need a change to the cluster resource; retrying
    /// them only repeats the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Configuration { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the offending field path for configuration errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Configuration { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_field() {
        let err = Error::configuration("acid-test", "spec.resources.cpu", "invalid quantity");
        assert_eq!(err.field(), Some("spec.resources.cpu"));
        assert_eq!(
            err.to_string(),
            "configuration error for acid-test: spec.resources.cpu: invalid quantity"
        );
    }

    #[test]
    fn test_configuration_error_not_retryable() {
        let err = Error::configuration("acid-test", "spec.numberOfInstances", "must be >= 1");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal_error_retryable() {
        let err = Error::internal_with_context("credentials", "store unavailable");
        assert!(err.is_retryable());
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_kube_client_errors_not_retryable() {
        let err = Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        }));
        assert!(!err.is_retryable());

        let err = Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "etcd timeout".to_string(),
            reason: "InternalError".to_string(),
            code: 500,
        }));
        assert!(err.is_retryable());
    }
}
