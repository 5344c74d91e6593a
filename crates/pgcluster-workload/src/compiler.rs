//! Object builders
//!
//! Each builder takes the cluster identity explicitly and derives names and
//! labels through [`crate::naming`], so all objects of one cluster agree.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, Endpoints, PodSpec, PodTemplateSpec,
    ResourceRequirements, Secret, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use pgcluster_common::{ClusterSpec, Credential, Role, PATRONI_PORT, POSTGRES_PORT};

use crate::env::{build_env, PASSWORD_KEY, USERNAME_KEY};
use crate::naming::{credential_secret_name, object_name, ownership_labels};
use crate::resources::build_requests;
use crate::{DesiredObjects, SynthesisError};

/// Grace period given to database pods on shutdown
pub const TERMINATION_GRACE_PERIOD_SECONDS: i64 = 30;

/// Pod annotation marking the template as initialized
pub const INITIALIZED_ANNOTATION: &str = "pod.alpha.kubernetes.io/initialized";

/// Name of the data volume
pub const DATA_VOLUME_NAME: &str = "pgdata";

/// Mount path of the data volume
pub const DATA_DIRECTORY: &str = "/home/postgres/pgdata";

const PROTOCOL_TCP: &str = "TCP";

/// Build every object for one pass.
///
/// Fails before returning anything if the workload cannot be built or two
/// roles would share a credential Secret, so a malformed spec never yields a
/// partial set of objects.
pub fn synthesize_all(
    spec: &ClusterSpec,
    credentials: &[Credential],
) -> Result<DesiredObjects, SynthesisError> {
    let workload = synthesize_workload(spec)?;
    check_secret_names(spec, credentials)?;
    Ok(DesiredObjects {
        workload,
        service: synthesize_service(spec),
        endpoint: synthesize_endpoint(spec),
        secrets: credentials
            .iter()
            .map(|c| synthesize_secret(spec, c))
            .collect(),
    })
}

/// Reject credential sets whose roles map to the same Secret name
///
/// Secret names are case-folded, so `Custom("Superuser")` would overwrite
/// the built-in superuser Secret.
fn check_secret_names(spec: &ClusterSpec, credentials: &[Credential]) -> Result<(), SynthesisError> {
    let mut claimed: BTreeMap<String, &Role> = BTreeMap::new();
    for credential in credentials {
        let secret = credential_secret_name(&spec.name, &credential.role);
        if let Some(first) = claimed.get(&secret) {
            return Err(SynthesisError::RoleCollision {
                cluster: spec.name.clone(),
                first: first.to_string(),
                second: credential.role.to_string(),
                secret,
            });
        }
        claimed.insert(secret, &credential.role);
    }
    Ok(())
}

/// Build the StatefulSet running the database pods
pub fn synthesize_workload(spec: &ClusterSpec) -> Result<StatefulSet, SynthesisError> {
    let name = object_name(&spec.name);
    let labels = ownership_labels(&spec.name);
    let requests = build_requests(&spec.name, &spec.resources)?;

    let container = Container {
        name: name.clone(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some("Always".to_string()),
        resources: Some(ResourceRequirements {
            requests,
            ..Default::default()
        }),
        ports: Some(vec![
            container_port("patroni", PATRONI_PORT),
            container_port("postgresql", POSTGRES_PORT),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: DATA_VOLUME_NAME.to_string(),
            mount_path: DATA_DIRECTORY.to_string(),
            ..Default::default()
        }]),
        env: Some(build_env(spec)),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD_SECONDS),
        volumes: Some(vec![Volume {
            name: DATA_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }]),
        containers: vec![container],
        ..Default::default()
    };

    let template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels.clone()),
            annotations: Some(BTreeMap::from([(
                INITIALIZED_ANNOTATION.to_string(),
                "true".to_string(),
            )])),
            ..Default::default()
        }),
        spec: Some(pod_spec),
    };

    let mut sts_spec = StatefulSetSpec {
        replicas: Some(spec.instances),
        selector: LabelSelector {
            match_labels: Some(labels.clone()),
            ..Default::default()
        },
        template,
        ..Default::default()
    };
    sts_spec.service_name = name.clone().into();

    Ok(StatefulSet {
        metadata: object_meta(spec, name, labels),
        spec: Some(sts_spec),
        status: None,
    })
}

/// Build the ClusterIP Service exposing the database port
///
/// The Service has no selector; its Endpoints object is maintained by the
/// database pods themselves.
pub fn synthesize_service(spec: &ClusterSpec) -> Service {
    let name = object_name(&spec.name);
    Service {
        metadata: object_meta(spec, name, ownership_labels(&spec.name)),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                name: Some("postgresql".to_string()),
                port: POSTGRES_PORT,
                target_port: Some(IntOrString::Int(POSTGRES_PORT)),
                protocol: Some(PROTOCOL_TCP.to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

/// Build the empty Endpoints placeholder backing the Service
pub fn synthesize_endpoint(spec: &ClusterSpec) -> Endpoints {
    let name = object_name(&spec.name);
    Endpoints {
        metadata: object_meta(spec, name, ownership_labels(&spec.name)),
        subsets: None,
    }
}

/// Build the opaque Secret holding one role's username and password
pub fn synthesize_secret(spec: &ClusterSpec, credential: &Credential) -> Secret {
    let name = credential_secret_name(&spec.name, &credential.role);
    Secret {
        metadata: object_meta(spec, name, ownership_labels(&spec.name)),
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([
            (
                USERNAME_KEY.to_string(),
                ByteString(credential.username.clone()),
            ),
            (
                PASSWORD_KEY.to_string(),
                ByteString(credential.password.clone()),
            ),
        ])),
        ..Default::default()
    }
}

fn object_meta(spec: &ClusterSpec, name: String, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(spec.namespace.clone()),
        labels: Some(labels),
        ..Default::default()
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some(PROTOCOL_TCP.to_string()),
        ..Default::default()
    }
}
