//! Environment contract injected into database pods
//!
//! Pod IP and namespace come from downward field references; passwords
//! come from secret key references. Credential material is never inlined.

use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector, SecretKeySelector};
use pgcluster_common::{ClusterSpec, Role};

use crate::naming::credential_secret_name;

/// Scope (cluster) identifier variable
pub const ENV_SCOPE: &str = "SCOPE";
/// Data root path variable
pub const ENV_PGROOT: &str = "PGROOT";
/// Coordination service address variable
pub const ENV_ETCD_HOST: &str = "ETCD_HOST";
/// Pod IP variable
pub const ENV_POD_IP: &str = "POD_IP";
/// Pod namespace variable
pub const ENV_POD_NAMESPACE: &str = "POD_NAMESPACE";
/// Superuser password variable
pub const ENV_PGPASSWORD_SUPERUSER: &str = "PGPASSWORD_SUPERUSER";
/// Replication user password variable
pub const ENV_PGPASSWORD_STANDBY: &str = "PGPASSWORD_STANDBY";

/// Fixed data root inside the data volume
pub const PGROOT: &str = "/home/postgres/pgdata/pgroot";

/// Secret key holding the password
pub(crate) const PASSWORD_KEY: &str = "password";
/// Secret key holding the username
pub(crate) const USERNAME_KEY: &str = "username";

/// Build the seven environment variables every database container gets
pub(crate) fn build_env(spec: &ClusterSpec) -> Vec<EnvVar> {
    vec![
        literal(ENV_SCOPE, &spec.name),
        literal(ENV_PGROOT, PGROOT),
        literal(ENV_ETCD_HOST, &spec.etcd_host),
        field_ref(ENV_POD_IP, "status.podIP"),
        field_ref(ENV_POD_NAMESPACE, "metadata.namespace"),
        secret_password(ENV_PGPASSWORD_SUPERUSER, &spec.name, &Role::Superuser),
        secret_password(ENV_PGPASSWORD_STANDBY, &spec.name, &Role::Replication),
    ]
}

fn literal(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

fn field_ref(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: Some("v1".to_string()),
                field_path: field_path.to_string(),
            }),
            ..Default::default()
        }),
    }
}

fn secret_password(name: &str, cluster: &str, role: &Role) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: credential_secret_name(cluster, role).into(),
                key: PASSWORD_KEY.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}
