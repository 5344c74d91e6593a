//! Reconcile driver
//!
//! Applies synthesized objects against the platform. Each kind has its own
//! convergence protocol:
//!
//! - Secret: create, and on `AlreadyExists` overwrite with an update. Each
//!   role is handled independently; one failure does not stop the others.
//! - Service / Endpoints: get first; create only on a genuine `NotFound`.
//!   An existing object is left untouched.
//! - StatefulSet: get first; create on `NotFound`, otherwise update carrying
//!   the live `resourceVersion`.
//!
//! Every attempt is logged and returned as an [`ObjectOutcome`].

use std::future::Future;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use pgcluster_common::ClusterSpec;
use pgcluster_workload::{synthesize_all, ObjectKind};

use crate::{
    ClientError, ClusterLocks, CredentialStore, Mutation, ObjectClient, ObjectOutcome,
    ReconcileError, ReconcileReport, SkipReason,
};

/// Runs full reconcile passes, one at a time per cluster
#[derive(Clone)]
pub struct ClusterReconciler {
    client: Arc<dyn ObjectClient>,
    credentials: Arc<dyn CredentialStore>,
    locks: ClusterLocks,
}

impl ClusterReconciler {
    /// Create a reconciler serializing passes through `locks`
    pub fn new(
        client: Arc<dyn ObjectClient>,
        credentials: Arc<dyn CredentialStore>,
        locks: ClusterLocks,
    ) -> Self {
        Self {
            client,
            credentials,
            locks,
        }
    }

    /// Drop per-cluster state of a deleted cluster
    ///
    /// Waits for a running pass to finish first. A later cluster with the
    /// same key starts from scratch: fresh credentials are resolved and a
    /// new lock entry is created.
    pub async fn forget(&self, key: &str) {
        drop(self.locks.lock(key).await);
        self.credentials.forget(key);
        self.locks.forget(key);
        debug!(cluster = %key, tracked = self.locks.len(), "forgot cluster");
    }

    /// Run one full pass for a cluster
    ///
    /// Credentials are fetched and every object is synthesized before the
    /// first platform call, so an invalid resource fails without touching
    /// the platform. Objects are then applied in the order endpoint,
    /// service, secrets, workload set.
    #[instrument(skip_all, fields(cluster = %spec.key()))]
    pub async fn reconcile_cluster(
        &self,
        spec: &ClusterSpec,
    ) -> Result<ReconcileReport, ReconcileError> {
        let key = spec.key();
        let _guard = self.locks.lock(&key).await;

        let credentials = self
            .credentials
            .credentials(spec)
            .await
            .map_err(|source| ReconcileError::Credentials {
                cluster: key.clone(),
                source,
            })?;
        let desired = synthesize_all(spec, &credentials).inspect_err(|e| {
            warn!(field = %e.field(), error = %e, "cluster cannot be synthesized");
        })?;

        let client = self.client.as_ref();
        let mut report = ReconcileReport::new(key);
        report.push(reconcile_endpoint(client, spec, &desired.endpoint).await);
        report.push(reconcile_service(client, spec, &desired.service).await);
        report.extend(reconcile_secrets(client, spec, &desired.secrets).await);
        report.push(reconcile_workload(client, spec, &desired.workload).await);

        debug!(state = ?report.state(), summary = %report.summary(), "pass finished");
        Ok(report)
    }
}

/// Create or overwrite one credential Secret
pub async fn reconcile_secret(
    client: &dyn ObjectClient,
    spec: &ClusterSpec,
    secret: &Secret,
) -> ObjectOutcome {
    let kind = ObjectKind::CredentialSecret;
    let name = secret.name_any();

    match client.create_secret(&spec.namespace, secret).await {
        Ok(_) => {
            info!(cluster = %spec.name, kind = %kind, name = %name, "created");
            ObjectOutcome::applied(kind, name, Mutation::Created)
        }
        Err(ClientError::AlreadyExists) => {
            match client.update_secret(&spec.namespace, secret).await {
                Ok(_) => {
                    info!(cluster = %spec.name, kind = %kind, name = %name, "updated");
                    ObjectOutcome::applied(kind, name, Mutation::Updated)
                }
                Err(e) => {
                    error!(cluster = %spec.name, kind = %kind, name = %name, error = %e, "update failed");
                    ObjectOutcome::failed(kind, name, &e)
                }
            }
        }
        Err(e) => {
            error!(cluster = %spec.name, kind = %kind, name = %name, error = %e, "create failed");
            ObjectOutcome::failed(kind, name, &e)
        }
    }
}

/// Reconcile every credential Secret, continuing past individual failures
pub async fn reconcile_secrets(
    client: &dyn ObjectClient,
    spec: &ClusterSpec,
    secrets: &[Secret],
) -> Vec<ObjectOutcome> {
    let mut outcomes = Vec::with_capacity(secrets.len());
    for secret in secrets {
        outcomes.push(reconcile_secret(client, spec, secret).await);
    }
    outcomes
}

/// Create the Service if it does not exist
pub async fn reconcile_service(
    client: &dyn ObjectClient,
    spec: &ClusterSpec,
    service: &Service,
) -> ObjectOutcome {
    let name = service.name_any();
    let probe = client.get_service(&spec.namespace, &name).await.map(|_| ());
    create_if_absent(spec, ObjectKind::NetworkService, name, probe, || {
        client.create_service(&spec.namespace, service)
    })
    .await
}

/// Create the Endpoints placeholder if it does not exist
pub async fn reconcile_endpoint(
    client: &dyn ObjectClient,
    spec: &ClusterSpec,
    endpoints: &Endpoints,
) -> ObjectOutcome {
    let name = endpoints.name_any();
    let probe = client.get_endpoints(&spec.namespace, &name).await.map(|_| ());
    create_if_absent(spec, ObjectKind::NetworkEndpoint, name, probe, || {
        client.create_endpoints(&spec.namespace, endpoints)
    })
    .await
}

async fn create_if_absent<T, F, Fut>(
    spec: &ClusterSpec,
    kind: ObjectKind,
    name: String,
    probe: Result<(), ClientError>,
    create: F,
) -> ObjectOutcome
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    match probe {
        Ok(()) => {
            debug!(cluster = %spec.name, kind = %kind, name = %name, "already exists");
            ObjectOutcome::skipped(kind, name, SkipReason::AlreadyExists)
        }
        Err(ClientError::NotFound) => match create().await {
            Ok(_) => {
                info!(cluster = %spec.name, kind = %kind, name = %name, "created");
                ObjectOutcome::applied(kind, name, Mutation::Created)
            }
            Err(ClientError::AlreadyExists) => {
                debug!(cluster = %spec.name, kind = %kind, name = %name, "created concurrently");
                ObjectOutcome::skipped(kind, name, SkipReason::AlreadyExists)
            }
            Err(e) => {
                error!(cluster = %spec.name, kind = %kind, name = %name, error = %e, "create failed");
                ObjectOutcome::failed(kind, name, &e)
            }
        },
        Err(e) => {
            warn!(
                cluster = %spec.name,
                kind = %kind,
                name = %name,
                error = %e,
                "existence check failed, not creating"
            );
            ObjectOutcome::skipped(kind, name, SkipReason::ProbeFailed(e.to_string()))
        }
    }
}

/// Create the StatefulSet, or overwrite it if it exists
pub async fn reconcile_workload(
    client: &dyn ObjectClient,
    spec: &ClusterSpec,
    sts: &StatefulSet,
) -> ObjectOutcome {
    let kind = ObjectKind::WorkloadSet;
    let name = sts.name_any();

    match client.get_stateful_set(&spec.namespace, &name).await {
        Err(ClientError::NotFound) => match client.create_stateful_set(&spec.namespace, sts).await {
            Ok(_) => {
                info!(cluster = %spec.name, kind = %kind, name = %name, "created");
                ObjectOutcome::applied(kind, name, Mutation::Created)
            }
            Err(ClientError::AlreadyExists) => {
                warn!(cluster = %spec.name, kind = %kind, name = %name, "created concurrently");
                ObjectOutcome::skipped(kind, name, SkipReason::AlreadyExists)
            }
            Err(e) => {
                error!(cluster = %spec.name, kind = %kind, name = %name, error = %e, "create failed");
                ObjectOutcome::failed(kind, name, &e)
            }
        },
        Ok(live) => {
            let mut desired = sts.clone();
            desired.metadata.resource_version = live.metadata.resource_version;
            match client.update_stateful_set(&spec.namespace, &desired).await {
                Ok(_) => {
                    info!(cluster = %spec.name, kind = %kind, name = %name, "updated");
                    ObjectOutcome::applied(kind, name, Mutation::Updated)
                }
                Err(e) => {
                    error!(cluster = %spec.name, kind = %kind, name = %name, error = %e, "update failed");
                    ObjectOutcome::failed(kind, name, &e)
                }
            }
        }
        Err(e) => {
            error!(cluster = %spec.name, kind = %kind, name = %name, error = %e, "get failed");
            ObjectOutcome::failed(kind, name, &e)
        }
    }
}
