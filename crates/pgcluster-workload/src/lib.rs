//! Desired-state synthesis for Postgres clusters
//!
//! Turns a resolved [`ClusterSpec`](pgcluster_common::ClusterSpec) plus the
//! role credentials into the Kubernetes objects one cluster needs: a
//! StatefulSet, a ClusterIP Service, an empty Endpoints placeholder and one
//! Secret per role. Everything here is a pure function; applying the objects
//! is the driver's job.
//!
//! # Usage
//!
//! ```rust,ignore
//! let desired = synthesize_all(&spec, &credentials)?;
//! for object in desired.into_objects() {
//!     println!("{} {}", object.kind(), object.name());
//! }
//! ```

mod compiled;
mod compiler;
mod env;
pub mod error;
pub mod naming;
pub mod resources;

pub use compiled::{DesiredObject, DesiredObjects, ObjectKind};
pub use compiler::{
    synthesize_all, synthesize_endpoint, synthesize_secret, synthesize_service,
    synthesize_workload, DATA_DIRECTORY, DATA_VOLUME_NAME, INITIALIZED_ANNOTATION,
    TERMINATION_GRACE_PERIOD_SECONDS,
};
pub use env::{ENV_ETCD_HOST, ENV_PGPASSWORD_STANDBY, ENV_PGPASSWORD_SUPERUSER, PGROOT};
pub use error::SynthesisError;
