//! Desired objects produced by one synthesis pass

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};

/// Kind of object the synthesizer produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// StatefulSet running the database pods
    WorkloadSet,
    /// ClusterIP Service on the database port
    NetworkService,
    /// Endpoints placeholder filled in by the database pods
    NetworkEndpoint,
    /// Per-role username/password Secret
    CredentialSecret,
}

impl ObjectKind {
    /// Kubernetes kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkloadSet => "StatefulSet",
            Self::NetworkService => "Service",
            Self::NetworkEndpoint => "Endpoints",
            Self::CredentialSecret => "Secret",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One desired object
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredObject {
    /// StatefulSet
    WorkloadSet(StatefulSet),
    /// Service
    NetworkService(Service),
    /// Endpoints
    NetworkEndpoint(Endpoints),
    /// Secret
    CredentialSecret(Secret),
}

impl DesiredObject {
    /// Kind of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::WorkloadSet(_) => ObjectKind::WorkloadSet,
            Self::NetworkService(_) => ObjectKind::NetworkService,
            Self::NetworkEndpoint(_) => ObjectKind::NetworkEndpoint,
            Self::CredentialSecret(_) => ObjectKind::CredentialSecret,
        }
    }

    /// Object name
    pub fn name(&self) -> &str {
        let meta = match self {
            Self::WorkloadSet(o) => &o.metadata,
            Self::NetworkService(o) => &o.metadata,
            Self::NetworkEndpoint(o) => &o.metadata,
            Self::CredentialSecret(o) => &o.metadata,
        };
        meta.name.as_deref().unwrap_or_default()
    }
}

/// Every object one cluster needs, built fresh for a single pass
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredObjects {
    /// StatefulSet
    pub workload: StatefulSet,
    /// Service
    pub service: Service,
    /// Endpoints
    pub endpoint: Endpoints,
    /// One Secret per credential, in credential order
    pub secrets: Vec<Secret>,
}

impl DesiredObjects {
    /// Flatten into apply order: endpoint, service, secrets, workload
    pub fn into_objects(self) -> Vec<DesiredObject> {
        let mut objects = Vec::with_capacity(self.secrets.len() + 3);
        objects.push(DesiredObject::NetworkEndpoint(self.endpoint));
        objects.push(DesiredObject::NetworkService(self.service));
        objects.extend(self.secrets.into_iter().map(DesiredObject::CredentialSecret));
        objects.push(DesiredObject::WorkloadSet(self.workload));
        objects
    }
}
