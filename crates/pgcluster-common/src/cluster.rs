//! Cluster Spec Model
//!
//! The read-only inputs of one reconciliation pass: the resolved cluster
//! configuration and the credential material per database role. Both are
//! plain values; nothing here talks to the API server.

use std::fmt;

use kube::ResourceExt;

use crate::crd::Postgresql;
use crate::Error;

// =============================================================================
// Resource requests
// =============================================================================

/// Optional CPU and memory requests.
///
/// `None` means "no request", never zero. Empty strings coming from the
/// custom resource are folded into `None` on construction; anything else is
/// kept verbatim for validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceRequests {
    /// CPU quantity, if requested
    pub cpu: Option<String>,
    /// Memory quantity, if requested
    pub memory: Option<String>,
}

impl ResourceRequests {
    /// Build requests, treating empty values as absent
    pub fn new(cpu: Option<&str>, memory: Option<&str>) -> Self {
        Self {
            cpu: present(cpu),
            memory: present(memory),
        }
    }
}

fn present(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

// =============================================================================
// Cluster spec
// =============================================================================

/// Operator-level fallbacks for values a cluster resource may omit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDefaults {
    /// Container image used when the resource sets none
    pub image: String,
    /// Coordination service address used when the resource sets none
    pub etcd_host: String,
}

/// Resolved desired configuration of one database cluster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Cluster name, unique within the namespace; every child object name derives from it
    pub name: String,
    /// Namespace all child objects live in
    pub namespace: String,
    /// Desired number of database pods (>= 1)
    pub instances: i32,
    /// Container resource requests
    pub resources: ResourceRequests,
    /// Container image reference
    pub image: String,
    /// Coordination service address handed to every pod
    pub etcd_host: String,
}

impl ClusterSpec {
    /// Resolve a `Postgresql` resource into the model, filling gaps from `defaults`
    pub fn from_resource(
        resource: &Postgresql,
        defaults: &ClusterDefaults,
    ) -> Result<Self, Error> {
        let name = resource.name_any();
        if name.is_empty() {
            return Err(Error::configuration(
                crate::error::UNKNOWN_CONTEXT,
                "metadata.name",
                "cluster name cannot be empty",
            ));
        }

        let namespace = resource
            .namespace()
            .ok_or_else(|| Error::configuration(&name, "metadata.namespace", "missing namespace"))?;

        let spec = &resource.spec;
        if spec.number_of_instances < 1 {
            return Err(Error::configuration(
                &name,
                "spec.numberOfInstances",
                format!("must be at least 1, got {}", spec.number_of_instances),
            ));
        }

        let image = spec
            .docker_image
            .as_deref()
            .filter(|i| !i.is_empty())
            .unwrap_or(defaults.image.as_str())
            .to_string();
        let etcd_host = spec
            .etcd_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.etcd_host.as_str())
            .to_string();

        Ok(Self {
            name,
            namespace,
            instances: spec.number_of_instances,
            resources: ResourceRequests::new(
                spec.resources.cpu.as_deref(),
                spec.resources.memory.as_deref(),
            ),
            image,
            etcd_host,
        })
    }

    /// Key used to serialize passes for this cluster (`namespace/name`)
    pub fn key(&self) -> String {
        cluster_key(&self.namespace, &self.name)
    }
}

/// Per-cluster state key (`namespace/name`)
pub fn cluster_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

// =============================================================================
// Credentials
// =============================================================================

/// Database role a credential belongs to
///
/// The two built-in roles are referenced by the workload's environment;
/// anything else is carried through as a custom role.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Database superuser
    Superuser,
    /// Streaming replication user
    Replication,
    /// Any other externally supplied role
    Custom(String),
}

impl Role {
    /// Get the string identifier of this role
    pub fn as_str(&self) -> &str {
        match self {
            Self::Superuser => "superuser",
            Self::Replication => "replication",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "superuser" => Self::Superuser,
            "replication" => Self::Replication,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Username/password pair for one role, treated as opaque bytes
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Role identifier
    pub role: Role,
    /// Username bytes
    pub username: Vec<u8>,
    /// Password bytes
    pub password: Vec<u8>,
}

impl Credential {
    /// Create a credential from any byte-like username and password
    pub fn new(role: Role, username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            role,
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("role", &self.role)
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PostgresqlSpec, ResourcesSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn defaults() -> ClusterDefaults {
        ClusterDefaults {
            image: "registry.example/spilo:1".to_string(),
            etcd_host: "etcd-client.default.svc.cluster.local:2379".to_string(),
        }
    }

    fn resource(name: &str, namespace: Option<&str>, spec: PostgresqlSpec) -> Postgresql {
        Postgresql {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    fn spec(instances: i32, cpu: Option<&str>, memory: Option<&str>) -> PostgresqlSpec {
        PostgresqlSpec {
            number_of_instances: instances,
            resources: ResourcesSpec {
                cpu: cpu.map(str::to_string),
                memory: memory.map(str::to_string),
            },
            docker_image: None,
            etcd_host: None,
        }
    }

    #[test]
    fn test_resource_requests_fold_empty_to_absent() {
        let requests = ResourceRequests::new(Some(""), Some("1Gi"));
        assert_eq!(requests.cpu, None);
        assert_eq!(requests.memory.as_deref(), Some("1Gi"));

        assert_eq!(ResourceRequests::new(None, Some("")), ResourceRequests::default());
    }

    #[test]
    fn test_resource_requests_keep_values_verbatim() {
        let requests = ResourceRequests::new(Some(" 500m"), Some(" 1Gi "));
        assert_eq!(requests.cpu.as_deref(), Some(" 500m"));
        assert_eq!(requests.memory.as_deref(), Some(" 1Gi "));
    }

    #[test]
    fn test_from_resource_uses_defaults() {
        let pg = resource("acid-test", Some("default"), spec(2, Some(""), Some("1Gi")));
        let cluster = ClusterSpec::from_resource(&pg, &defaults()).unwrap();

        assert_eq!(cluster.name, "acid-test");
        assert_eq!(cluster.namespace, "default");
        assert_eq!(cluster.instances, 2);
        assert_eq!(cluster.resources, ResourceRequests::new(None, Some("1Gi")));
        assert_eq!(cluster.image, "registry.example/spilo:1");
        assert_eq!(cluster.etcd_host, "etcd-client.default.svc.cluster.local:2379");
        assert_eq!(cluster.key(), "default/acid-test");
    }

    #[test]
    fn test_from_resource_overrides_win() {
        let mut s = spec(1, None, None);
        s.docker_image = Some("example/pg:1".to_string());
        s.etcd_host = Some("etcd:2379".to_string());
        let pg = resource("acid-test", Some("default"), s);

        let cluster = ClusterSpec::from_resource(&pg, &defaults()).unwrap();
        assert_eq!(cluster.image, "example/pg:1");
        assert_eq!(cluster.etcd_host, "etcd:2379");
    }

    #[test]
    fn test_from_resource_rejects_zero_instances() {
        let pg = resource("acid-test", Some("default"), spec(0, None, None));
        let err = ClusterSpec::from_resource(&pg, &defaults()).unwrap_err();
        assert_eq!(err.field(), Some("spec.numberOfInstances"));
        assert!(err.to_string().contains("acid-test"));
    }

    #[test]
    fn test_from_resource_requires_namespace() {
        let pg = resource("acid-test", None, spec(1, None, None));
        let err = ClusterSpec::from_resource(&pg, &defaults()).unwrap_err();
        assert_eq!(err.field(), Some("metadata.namespace"));
    }

    #[test]
    fn test_role_round_trip_through_str() {
        assert_eq!(Role::from("superuser"), Role::Superuser);
        assert_eq!(Role::from("replication"), Role::Replication);
        assert_eq!(Role::from("app_owner"), Role::Custom("app_owner".to_string()));
        assert_eq!(Role::Replication.to_string(), "replication");
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let cred = Credential::new(Role::Superuser, "postgres", "s3cr3t");
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("postgres"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
