//! In-memory object client for stateful driver tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use pgcluster_workload::{DesiredObject, ObjectKind};

use crate::{ClientError, ObjectClient};

type Key = (ObjectKind, String, String);

/// Stores objects by (kind, namespace, name) and counts mutating calls
#[derive(Default)]
pub struct InMemoryClient {
    objects: Mutex<HashMap<Key, DesiredObject>>,
    mutations: AtomicUsize,
}

fn meta_mut(obj: &mut DesiredObject) -> &mut ObjectMeta {
    match obj {
        DesiredObject::WorkloadSet(o) => &mut o.metadata,
        DesiredObject::NetworkService(o) => &mut o.metadata,
        DesiredObject::NetworkEndpoint(o) => &mut o.metadata,
        DesiredObject::CredentialSecret(o) => &mut o.metadata,
    }
}

macro_rules! expect_variant {
    ($result:expr, $variant:ident) => {
        $result.map(|obj| match obj {
            DesiredObject::$variant(o) => o,
            other => panic!("stored object has unexpected kind {}", other.kind()),
        })
    };
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of create and update calls seen, successful or not
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Store an object directly, bypassing the counters
    pub fn seed(&self, namespace: &str, obj: DesiredObject) {
        let key = (obj.kind(), namespace.to_string(), obj.name().to_string());
        self.objects.lock().unwrap().insert(key, obj);
    }

    fn get(&self, kind: ObjectKind, namespace: &str, name: &str) -> Result<DesiredObject, ClientError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    fn create(&self, namespace: &str, mut obj: DesiredObject) -> Result<DesiredObject, ClientError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let key = (obj.kind(), namespace.to_string(), obj.name().to_string());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(ClientError::AlreadyExists);
        }
        meta_mut(&mut obj).resource_version = Some("1".to_string());
        objects.insert(key, obj.clone());
        Ok(obj)
    }

    fn update(&self, namespace: &str, mut obj: DesiredObject) -> Result<DesiredObject, ClientError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let key = (obj.kind(), namespace.to_string(), obj.name().to_string());
        let mut objects = self.objects.lock().unwrap();
        let stored = objects.get_mut(&key).ok_or(ClientError::NotFound)?;

        let live_version = meta_mut(stored).resource_version.clone();
        let sent_version = meta_mut(&mut obj).resource_version.clone();
        if sent_version.is_some() && sent_version != live_version {
            return Err(ClientError::platform_with_code(409, "resourceVersion conflict"));
        }

        let next = live_version
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        meta_mut(&mut obj).resource_version = Some(next.to_string());
        *stored = obj.clone();
        Ok(obj)
    }
}

#[async_trait]
impl ObjectClient for InMemoryClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        expect_variant!(self.get(ObjectKind::CredentialSecret, namespace, name), CredentialSecret)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClientError> {
        let obj = DesiredObject::CredentialSecret(secret.clone());
        expect_variant!(self.create(namespace, obj), CredentialSecret)
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClientError> {
        let obj = DesiredObject::CredentialSecret(secret.clone());
        expect_variant!(self.update(namespace, obj), CredentialSecret)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service, ClientError> {
        expect_variant!(self.get(ObjectKind::NetworkService, namespace, name), NetworkService)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClientError> {
        let obj = DesiredObject::NetworkService(service.clone());
        expect_variant!(self.create(namespace, obj), NetworkService)
    }

    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service, ClientError> {
        let obj = DesiredObject::NetworkService(service.clone());
        expect_variant!(self.update(namespace, obj), NetworkService)
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints, ClientError> {
        expect_variant!(self.get(ObjectKind::NetworkEndpoint, namespace, name), NetworkEndpoint)
    }

    async fn create_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ClientError> {
        let obj = DesiredObject::NetworkEndpoint(endpoints.clone());
        expect_variant!(self.create(namespace, obj), NetworkEndpoint)
    }

    async fn update_endpoints(
        &self,
        namespace: &str,
        endpoints: &Endpoints,
    ) -> Result<Endpoints, ClientError> {
        let obj = DesiredObject::NetworkEndpoint(endpoints.clone());
        expect_variant!(self.update(namespace, obj), NetworkEndpoint)
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, ClientError> {
        expect_variant!(self.get(ObjectKind::WorkloadSet, namespace, name), WorkloadSet)
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, ClientError> {
        let obj = DesiredObject::WorkloadSet(sts.clone());
        expect_variant!(self.create(namespace, obj), WorkloadSet)
    }

    async fn update_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet, ClientError> {
        let obj = DesiredObject::WorkloadSet(sts.clone());
        expect_variant!(self.update(namespace, obj), WorkloadSet)
    }
}
