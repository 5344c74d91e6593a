//! Postgresql controller
//!
//! Resolves each `Postgresql` resource into a [`ClusterSpec`], runs one
//! reconcile pass and records the result in the resource status. The pass
//! report decides when the resource is looked at again. A finalizer keeps
//! deleted resources visible until the per-cluster state held by the
//! reconciler has been dropped.

use std::sync::Arc;

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, warn};

#[cfg(test)]
use mockall::automock;

use pgcluster_cluster::{ClusterReconciler, PassState, ReconcileError, ReconcileReport};
use pgcluster_common::crd::{ClusterPhase, Postgresql, PostgresqlStatus};
use pgcluster_common::kube_utils::{add_finalizer, patch_resource_status, remove_finalizer};
use pgcluster_common::{cluster_key, ClusterSpec, Error};

use crate::config::OperatorConfig;

/// Finalizer placed on every `Postgresql` the controller has seen
pub const POSTGRESQL_FINALIZER: &str = "acid.zalan.do/pgcluster-operator";

/// Errors returned from [`reconcile`]
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The pass could not run
    #[error("reconcile failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// The cluster resource could not be updated
    #[error("cluster resource update failed: {0}")]
    Resource(#[from] Error),
}

impl ControllerError {
    /// True when retrying soon can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Reconcile(e) => e.is_retryable(),
            Self::Resource(e) => e.is_retryable(),
        }
    }
}

/// Writes to `Postgresql` resources
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PostgresqlClient: Send + Sync {
    /// Replace the status of a cluster resource
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &PostgresqlStatus,
    ) -> Result<(), Error>;

    /// Add a finalizer to a cluster resource
    async fn add_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error>;

    /// Remove a finalizer from a cluster resource
    async fn remove_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error>;
}

/// [`PostgresqlClient`] backed by the Kubernetes API
pub struct KubePostgresqlClient {
    client: Client,
}

impl KubePostgresqlClient {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PostgresqlClient for KubePostgresqlClient {
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &PostgresqlStatus,
    ) -> Result<(), Error> {
        patch_resource_status::<Postgresql>(&self.client, name, namespace, status).await?;
        Ok(())
    }

    async fn add_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        add_finalizer::<Postgresql>(&self.client, name, namespace, finalizer).await?;
        Ok(())
    }

    async fn remove_finalizer(
        &self,
        name: &str,
        namespace: &str,
        finalizer: &str,
    ) -> Result<(), Error> {
        remove_finalizer::<Postgresql>(&self.client, name, namespace, finalizer).await?;
        Ok(())
    }
}

/// Shared controller state
pub struct Context {
    /// Reconcile driver
    pub reconciler: ClusterReconciler,
    /// Cluster resource writer
    pub client: Arc<dyn PostgresqlClient>,
    /// Operator configuration
    pub config: OperatorConfig,
}

impl Context {
    /// Create a context
    pub fn new(
        reconciler: ClusterReconciler,
        client: Arc<dyn PostgresqlClient>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            reconciler,
            client,
            config,
        }
    }
}

/// Reconcile one `Postgresql` resource
pub async fn reconcile(pg: Arc<Postgresql>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let name = pg.name_any();
    let namespace = pg.namespace().unwrap_or_default();
    let generation = pg.metadata.generation;

    if pg.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&pg, &ctx).await;
    }

    if !has_finalizer(&pg) {
        info!(cluster = %name, namespace = %namespace, "adding finalizer");
        ctx.client
            .add_finalizer(&name, &namespace, POSTGRESQL_FINALIZER)
            .await?;
    }

    let spec = match ClusterSpec::from_resource(&pg, &ctx.config.defaults) {
        Ok(spec) => spec,
        Err(e) => {
            warn!(
                cluster = %name,
                field = e.field().unwrap_or_default(),
                error = %e,
                "invalid cluster resource"
            );
            let status = PostgresqlStatus::new(ClusterPhase::Invalid, e.to_string(), generation);
            update_status(&pg, ctx.client.as_ref(), status).await?;
            return Ok(Action::await_change());
        }
    };

    match ctx.reconciler.reconcile_cluster(&spec).await {
        Ok(report) => {
            let state = report.state();
            if state == PassState::Converged {
                info!(cluster = %spec.key(), summary = %report.summary(), "cluster converged");
            } else {
                warn!(cluster = %spec.key(), state = ?state, summary = %report.summary(), "cluster not converged");
            }
            update_status(&pg, ctx.client.as_ref(), status_for_report(&report, generation)).await?;
            Ok(requeue_for(state, &ctx.config))
        }
        Err(e) if e.is_configuration() => {
            warn!(cluster = %spec.key(), error = %e, "cluster spec cannot be synthesized");
            let status = PostgresqlStatus::new(ClusterPhase::Invalid, e.to_string(), generation);
            update_status(&pg, ctx.client.as_ref(), status).await?;
            Ok(Action::await_change())
        }
        Err(e) => Err(e.into()),
    }
}

/// Error policy for Postgresql reconciliation
///
/// Errors that will not clear on their own wait for the resync interval.
pub fn error_policy(pg: Arc<Postgresql>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        retryable = error.is_retryable(),
        cluster = %pg.name_any(),
        namespace = %pg.namespace().unwrap_or_default(),
        "cluster reconciliation failed"
    );
    if error.is_retryable() {
        Action::requeue(ctx.config.retry_period)
    } else {
        Action::requeue(ctx.config.resync_period)
    }
}

/// Status reflecting a finished pass
pub fn status_for_report(report: &ReconcileReport, generation: Option<i64>) -> PostgresqlStatus {
    let phase = match report.state() {
        PassState::Converged => ClusterPhase::Running,
        PassState::Partial | PassState::Failed => ClusterPhase::Degraded,
    };
    PostgresqlStatus::new(phase, report.summary(), generation)
}

/// When to look at a cluster again after a pass
pub fn requeue_for(state: PassState, config: &OperatorConfig) -> Action {
    match state {
        PassState::Converged => Action::requeue(config.resync_period),
        PassState::Partial | PassState::Failed => Action::requeue(config.retry_period),
    }
}

fn has_finalizer(pg: &Postgresql) -> bool {
    pg.finalizers().iter().any(|f| f == POSTGRESQL_FINALIZER)
}

/// Drop the reconciler's state for a deleted cluster, then let it go
///
/// Child objects are left in place; nothing here deletes them.
async fn handle_deletion(pg: &Postgresql, ctx: &Context) -> Result<Action, ControllerError> {
    let name = pg.name_any();
    let namespace = pg.namespace().unwrap_or_default();

    if !has_finalizer(pg) {
        debug!(cluster = %name, "no finalizer, allowing deletion");
        return Ok(Action::await_change());
    }

    ctx.reconciler.forget(&cluster_key(&namespace, &name)).await;
    info!(cluster = %name, namespace = %namespace, "cluster deleted, removing finalizer");
    ctx.client
        .remove_finalizer(&name, &namespace, POSTGRESQL_FINALIZER)
        .await?;
    Ok(Action::await_change())
}

/// Write the status unless the resource already carries it
///
/// Every status write is a watch event for this controller, so an unchanged
/// status is not written again.
async fn update_status(
    pg: &Postgresql,
    client: &dyn PostgresqlClient,
    status: PostgresqlStatus,
) -> Result<(), Error> {
    if pg.status.as_ref() == Some(&status) {
        return Ok(());
    }
    let namespace = pg.namespace().unwrap_or_default();
    client.patch_status(&pg.name_any(), &namespace, &status).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::StatefulSet;
    use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
    use kube::api::ObjectMeta;
    use pgcluster_cluster::{
        ClientError, ClusterLocks, CredentialStore, Mutation, ObjectClient, ObjectKind,
        ObjectOutcome, SkipReason, StaticCredentials,
    };
    use pgcluster_common::crd::{PostgresqlSpec, ResourcesSpec};
    use pgcluster_common::{Credential, Role};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Object client for which every object already exists
    struct PresentClient;

    #[async_trait]
    impl ObjectClient for PresentClient {
        async fn get_secret(&self, _: &str, _: &str) -> Result<Secret, ClientError> {
            Ok(Secret::default())
        }
        async fn create_secret(&self, _: &str, _: &Secret) -> Result<Secret, ClientError> {
            Err(ClientError::AlreadyExists)
        }
        async fn update_secret(&self, _: &str, s: &Secret) -> Result<Secret, ClientError> {
            Ok(s.clone())
        }
        async fn get_service(&self, _: &str, _: &str) -> Result<Service, ClientError> {
            Ok(Service::default())
        }
        async fn create_service(&self, _: &str, _: &Service) -> Result<Service, ClientError> {
            Err(ClientError::AlreadyExists)
        }
        async fn update_service(&self, _: &str, s: &Service) -> Result<Service, ClientError> {
            Ok(s.clone())
        }
        async fn get_endpoints(&self, _: &str, _: &str) -> Result<Endpoints, ClientError> {
            Ok(Endpoints::default())
        }
        async fn create_endpoints(&self, _: &str, _: &Endpoints) -> Result<Endpoints, ClientError> {
            Err(ClientError::AlreadyExists)
        }
        async fn update_endpoints(&self, _: &str, e: &Endpoints) -> Result<Endpoints, ClientError> {
            Ok(e.clone())
        }
        async fn get_stateful_set(&self, _: &str, _: &str) -> Result<StatefulSet, ClientError> {
            Ok(StatefulSet::default())
        }
        async fn create_stateful_set(
            &self,
            _: &str,
            _: &StatefulSet,
        ) -> Result<StatefulSet, ClientError> {
            Err(ClientError::AlreadyExists)
        }
        async fn update_stateful_set(
            &self,
            _: &str,
            s: &StatefulSet,
        ) -> Result<StatefulSet, ClientError> {
            Ok(s.clone())
        }
    }

    /// Credential store remembering which clusters it was told to forget
    #[derive(Default)]
    struct RecordingCredentials {
        forgotten: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CredentialStore for RecordingCredentials {
        async fn credentials(&self, _: &ClusterSpec) -> Result<Vec<Credential>, Error> {
            Ok(credentials())
        }

        fn forget(&self, cluster_key: &str) {
            self.forgotten.lock().unwrap().push(cluster_key.to_string());
        }
    }

    fn credentials() -> Vec<Credential> {
        vec![
            Credential::new(Role::Superuser, "postgres", "a"),
            Credential::new(Role::Replication, "standby", "b"),
        ]
    }

    fn resource(cpu: Option<&str>) -> Postgresql {
        let mut pg = Postgresql::new(
            "acid-test",
            PostgresqlSpec {
                number_of_instances: 2,
                resources: ResourcesSpec {
                    cpu: cpu.map(str::to_string),
                    memory: Some("1Gi".to_string()),
                },
                docker_image: None,
                etcd_host: None,
            },
        );
        pg.metadata = ObjectMeta {
            name: Some("acid-test".to_string()),
            namespace: Some("default".to_string()),
            generation: Some(3),
            finalizers: Some(vec![POSTGRESQL_FINALIZER.to_string()]),
            ..Default::default()
        };
        pg
    }

    fn deleted(mut pg: Postgresql) -> Postgresql {
        pg.metadata.deletion_timestamp = serde_json::from_value(serde_json::json!(
            "2026-01-01T00:00:00Z"
        ))
        .unwrap();
        pg
    }

    fn context(client: MockPostgresqlClient) -> Arc<Context> {
        let reconciler = ClusterReconciler::new(
            Arc::new(PresentClient),
            Arc::new(StaticCredentials::new(credentials())),
            ClusterLocks::new(),
        );
        Arc::new(Context::new(
            reconciler,
            Arc::new(client),
            OperatorConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_converged_pass_marks_running() {
        let mut status = MockPostgresqlClient::new();
        status
            .expect_patch_status()
            .withf(|_, _, s| s.phase == ClusterPhase::Running && s.observed_generation == Some(3))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let action = reconcile(Arc::new(resource(None)), context(status))
            .await
            .unwrap();
        assert_eq!(
            action,
            Action::requeue(OperatorConfig::default().resync_period)
        );
    }

    #[tokio::test]
    async fn test_invalid_quantity_marks_invalid() {
        let mut status = MockPostgresqlClient::new();
        status
            .expect_patch_status()
            .withf(|_, _, s| {
                s.phase == ClusterPhase::Invalid
                    && s.message
                        .as_deref()
                        .is_some_and(|m| m.contains("spec.resources.cpu"))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let action = reconcile(Arc::new(resource(Some("lots"))), context(status))
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_rewritten() {
        let mut pg = resource(None);
        pg.status = Some(PostgresqlStatus::new(
            ClusterPhase::Running,
            "5 objects converged",
            Some(3),
        ));

        let mut status = MockPostgresqlClient::new();
        status.expect_patch_status().never();

        reconcile(Arc::new(pg), context(status)).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_write_failure_is_an_error() {
        let mut status = MockPostgresqlClient::new();
        status
            .expect_patch_status()
            .returning(|_, _, _| Err(Error::internal_with_context("status", "apiserver unavailable")));

        let err = reconcile(Arc::new(resource(None)), context(status))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::Resource(_)));
    }

    #[tokio::test]
    async fn test_first_pass_adds_finalizer() {
        let mut pg = resource(None);
        pg.metadata.finalizers = None;

        let mut client = MockPostgresqlClient::new();
        client
            .expect_add_finalizer()
            .withf(|name, namespace, finalizer| {
                name == "acid-test" && namespace == "default" && finalizer == POSTGRESQL_FINALIZER
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        client.expect_patch_status().returning(|_, _, _| Ok(()));

        reconcile(Arc::new(pg), context(client)).await.unwrap();
    }

    #[tokio::test]
    async fn test_deleted_cluster_drops_lock_and_credentials() {
        let locks = ClusterLocks::new();
        let credentials = Arc::new(RecordingCredentials::default());
        let reconciler =
            ClusterReconciler::new(Arc::new(PresentClient), credentials.clone(), locks.clone());

        let mut client = MockPostgresqlClient::new();
        client.expect_patch_status().returning(|_, _, _| Ok(()));
        client
            .expect_remove_finalizer()
            .withf(|name, _, finalizer| name == "acid-test" && finalizer == POSTGRESQL_FINALIZER)
            .times(1)
            .returning(|_, _, _| Ok(()));
        let ctx = Arc::new(Context::new(
            reconciler,
            Arc::new(client),
            OperatorConfig::default(),
        ));

        reconcile(Arc::new(resource(None)), ctx.clone()).await.unwrap();
        assert_eq!(locks.len(), 1);

        let action = reconcile(Arc::new(deleted(resource(None))), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());
        assert!(locks.is_empty());
        assert_eq!(
            *credentials.forgotten.lock().unwrap(),
            vec!["default/acid-test".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deleted_cluster_without_finalizer_is_left_alone() {
        let mut pg = deleted(resource(None));
        pg.metadata.finalizers = None;

        // any call on this mock panics
        let client = MockPostgresqlClient::new();
        let action = reconcile(Arc::new(pg), context(client)).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[test]
    fn test_error_policy_backs_off_on_permanent_errors() {
        let config = OperatorConfig {
            retry_period: Duration::from_secs(7),
            resync_period: Duration::from_secs(300),
            ..Default::default()
        };
        let ctx = Arc::new(Context::new(
            ClusterReconciler::new(
                Arc::new(PresentClient),
                Arc::new(StaticCredentials::new(credentials())),
                ClusterLocks::new(),
            ),
            Arc::new(MockPostgresqlClient::new()),
            config,
        ));
        let pg = Arc::new(resource(None));

        let transient = ControllerError::Resource(Error::internal_with_context(
            "status",
            "apiserver unavailable",
        ));
        assert_eq!(
            error_policy(pg.clone(), &transient, ctx.clone()),
            Action::requeue(Duration::from_secs(7))
        );

        let forbidden = ControllerError::Resource(Error::from(kube::Error::Api(
            kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "forbidden".to_string(),
                reason: "Forbidden".to_string(),
                code: 403,
            },
        )));
        assert_eq!(
            error_policy(pg, &forbidden, ctx),
            Action::requeue(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_partial_report_is_degraded_and_retried_soon() {
        let mut report = ReconcileReport::new("default/acid-test");
        report.push(ObjectOutcome::applied(
            ObjectKind::NetworkEndpoint,
            "acid-test",
            Mutation::Created,
        ));
        report.push(ObjectOutcome::skipped(
            ObjectKind::NetworkService,
            "acid-test",
            SkipReason::ProbeFailed("timeout".to_string()),
        ));

        let status = status_for_report(&report, Some(1));
        assert_eq!(status.phase, ClusterPhase::Degraded);
        assert!(status.message.unwrap().contains("probe failed"));

        let config = OperatorConfig {
            retry_period: Duration::from_secs(7),
            ..Default::default()
        };
        assert_eq!(
            requeue_for(report.state(), &config),
            Action::requeue(Duration::from_secs(7))
        );
    }
}
