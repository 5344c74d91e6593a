//! Reconcile driver for Postgres clusters
//!
//! Takes the objects synthesized by `pgcluster-workload` and converges them
//! against the platform through an [`ObjectClient`]. Every pass returns a
//! [`ReconcileReport`] so callers can tell full success from partial failure.

pub mod client;
pub mod credentials;
pub mod driver;
pub mod error;
pub mod locks;
pub mod outcome;

#[cfg(test)]
mod testing;

pub use client::{ClientError, KubeObjectClient, ObjectClient};
pub use credentials::{
    CredentialStore, GeneratedCredentials, RoleUsernames, StaticCredentials,
    DEFAULT_REPLICATION_NAME, DEFAULT_SUPERUSER_NAME,
};
pub use driver::{
    reconcile_endpoint, reconcile_secret, reconcile_secrets, reconcile_service,
    reconcile_workload, ClusterReconciler,
};
pub use error::ReconcileError;
pub use locks::ClusterLocks;
pub use pgcluster_workload::ObjectKind;
pub use outcome::{
    FailureClass, Mutation, ObjectOutcome, ObjectStatus, PassState, ReconcileReport, SkipReason,
};
