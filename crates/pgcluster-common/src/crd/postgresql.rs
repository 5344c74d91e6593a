//! Postgresql CRD types
//!
//! Defines `Postgresql`, the declarative description of one replicated
//! database cluster. The operator derives a StatefulSet, Service, Endpoints
//! and per-role credential Secrets from it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Phase
// =============================================================================

/// Lifecycle phase of a Postgresql cluster as observed by the operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterPhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Last pass converged every object
    Running,
    /// Last pass left at least one object unconverged
    Degraded,
    /// The spec cannot be synthesized into objects
    Invalid,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}

// =============================================================================
// Resources
// =============================================================================

/// CPU and memory requests for the database container
///
/// Empty strings are treated the same as absent values.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourcesSpec {
    /// CPU quantity (e.g., "100m", "1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g., "128Mi", "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

// =============================================================================
// CRD
// =============================================================================

/// Replicated PostgreSQL cluster specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "acid.zalan.do",
    version = "v1",
    kind = "Postgresql",
    plural = "postgresqls",
    shortname = "pg",
    namespaced,
    status = "PostgresqlStatus",
    printcolumn = r#"{"name":"Instances","type":"integer","jsonPath":".spec.numberOfInstances"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PostgresqlSpec {
    /// Number of database pods (primary plus replicas)
    #[serde(default = "default_instances")]
    pub number_of_instances: i32,

    /// Resource requests for the database container
    #[serde(default)]
    pub resources: ResourcesSpec,

    /// Container image override; the operator default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,

    /// Coordination service (etcd) address override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd_host: Option<String>,
}

fn default_instances() -> i32 {
    1
}

/// Observed state written back by the operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostgresqlStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Human-readable detail about the last pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the spec the last pass was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl PostgresqlStatus {
    /// Build a status for the given phase and message
    pub fn new(phase: ClusterPhase, message: impl Into<String>, generation: Option<i64>) -> Self {
        Self {
            phase,
            message: Some(message.into()),
            observed_generation: generation,
        }
    }
}
