//! Common types for the Postgres cluster operator: CRDs, the cluster model, errors

#![deny(missing_docs)]

pub mod cluster;
pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use cluster::{
    cluster_key, ClusterDefaults, ClusterSpec, Credential, ResourceRequests, Role,
};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager recorded on objects this operator writes
pub const FIELD_MANAGER: &str = "pgcluster-operator";

/// Label key naming the application every managed object belongs to
pub const LABEL_APPLICATION: &str = "application";

/// Value of [`LABEL_APPLICATION`] on every managed object
pub const LABEL_APPLICATION_SPILO: &str = "spilo";

/// Label key carrying the owning cluster's name
pub const LABEL_CLUSTER: &str = "spilo-cluster";

/// Management (Patroni REST API) port exposed by every database pod
pub const PATRONI_PORT: i32 = 8008;

/// PostgreSQL protocol port
pub const POSTGRES_PORT: i32 = 5432;
