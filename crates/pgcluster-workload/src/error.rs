//! Synthesis error types

/// Error raised while building desired objects
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// A resource request is not a valid Kubernetes quantity
    #[error("cluster '{cluster}' {field}: invalid quantity '{value}' (expected e.g., {expected})")]
    InvalidQuantity {
        /// Cluster being synthesized
        cluster: String,
        /// Field path of the offending value (e.g., "spec.resources.cpu")
        field: String,
        /// The rejected value
        value: String,
        /// Example of accepted syntax
        expected: &'static str,
    },

    /// Two credentials would be stored in the same Secret
    #[error("cluster '{cluster}': roles '{first}' and '{second}' share secret '{secret}'")]
    RoleCollision {
        /// Cluster being synthesized
        cluster: String,
        /// Role that claimed the name first
        first: String,
        /// Colliding role
        second: String,
        /// The shared Secret name
        secret: String,
    },
}

/// Pseudo field path reported for credential problems
pub const CREDENTIALS_FIELD: &str = "credentials";

impl SynthesisError {
    /// Field path of the value that failed synthesis
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidQuantity { field, .. } => field,
            Self::RoleCollision { .. } => CREDENTIALS_FIELD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_field_and_value() {
        let err = SynthesisError::InvalidQuantity {
            cluster: "acid-test".to_string(),
            field: "spec.resources.cpu".to_string(),
            value: "lots".to_string(),
            expected: "'100m', '1', '0.5'",
        };
        assert_eq!(err.field(), "spec.resources.cpu");
        assert_eq!(
            err.to_string(),
            "cluster 'acid-test' spec.resources.cpu: invalid quantity 'lots' (expected e.g., '100m', '1', '0.5')"
        );
    }
}
