//! Orchestration client used by the reconcile driver
//!
//! The driver talks to the platform only through [`ObjectClient`], which
//! exposes get/create/update per object kind, scoped by namespace. Errors are
//! classified into the two expected conditions the driver branches on
//! (`NotFound`, `AlreadyExists`) and everything else.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use pgcluster_common::kube_utils::{is_already_exists, is_not_found, status_code};
use pgcluster_common::FIELD_MANAGER;

/// Error returned by an [`ObjectClient`] call
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The object does not exist
    #[error("not found")]
    NotFound,

    /// A create was rejected because an object with that name exists
    #[error("already exists")]
    AlreadyExists,

    /// Any other transport or validation failure
    #[error("platform error{}: {message}", .code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    Platform {
        /// HTTP status code when the API server answered
        code: Option<u16>,
        /// Error message
        message: String,
    },
}

impl ClientError {
    /// Create a platform error without a status code
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            code: None,
            message: msg.into(),
        }
    }

    /// Create a platform error carrying an HTTP status code
    pub fn platform_with_code(code: u16, msg: impl Into<String>) -> Self {
        Self::Platform {
            code: Some(code),
            message: msg.into(),
        }
    }
}

impl From<kube::Error> for ClientError {
    fn from(err: kube::Error) -> Self {
        if is_not_found(&err) {
            Self::NotFound
        } else if is_already_exists(&err) {
            Self::AlreadyExists
        } else {
            Self::Platform {
                code: status_code(&err),
                message: err.to_string(),
            }
        }
    }
}

/// Get/create/update primitives for every object kind a cluster owns
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Get a Secret by name
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError>;
    /// Create a Secret
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClientError>;
    /// Replace a Secret
    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClientError>;

    /// Get a Service by name
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ClientError>;
    /// Create a Service
    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClientError>;
    /// Replace a Service
    async fn update_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClientError>;

    /// Get an Endpoints object by name
    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, ClientError>;
    /// Create an Endpoints object
    async fn create_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ClientError>;
    /// Replace an Endpoints object
    async fn update_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ClientError>;

    /// Get a StatefulSet by name
    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<StatefulSet, ClientError>;
    /// Create a StatefulSet
    async fn create_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, ClientError>;
    /// Replace a StatefulSet
    ///
    /// Carries whatever `resourceVersion` the object has, so a stale version
    /// is rejected by the API server.
    async fn update_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, ClientError>;
}

/// [`ObjectClient`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeObjectClient {
    client: Client,
}

impl KubeObjectClient {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K, ClientError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(namespace).get(name).await?)
    }

    async fn create<K>(&self, namespace: &str, obj: &K) -> Result<K, ClientError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        Ok(self.api::<K>(namespace).create(&post_params(), obj).await?)
    }

    async fn update<K>(&self, namespace: &str, obj: &K) -> Result<K, ClientError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let name = obj.name_any();
        if name.is_empty() {
            return Err(ClientError::platform("cannot replace an object without a name"));
        }
        Ok(self
            .api::<K>(namespace)
            .replace(&name, &post_params(), obj)
            .await?)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ObjectClient for KubeObjectClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        self.get(namespace, name).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClientError> {
        self.create(namespace, secret).await
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClientError> {
        self.update(namespace, secret).await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ClientError> {
        self.get(namespace, name).await
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClientError> {
        self.create(namespace, service).await
    }

    async fn update_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, ClientError> {
        self.update(namespace, service).await
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, ClientError> {
        self.get(namespace, name).await
    }

    async fn create_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ClientError> {
        self.create(namespace, endpoints).await
    }

    async fn update_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ClientError> {
        self.update(namespace, endpoints).await
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<StatefulSet, ClientError> {
        self.get(namespace, name).await
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, ClientError> {
        self.create(namespace, sts).await
    }

    async fn update_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, ClientError> {
        self.update(namespace, sts).await
    }
}
