//! Credential stores
//!
//! The driver asks a [`CredentialStore`] for the role credentials of a
//! cluster at the start of every pass. Passwords are opaque bytes here.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Secret;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use pgcluster_common::{ClusterSpec, Credential, Error, Role};
use pgcluster_workload::naming::credential_secret_name;

use crate::{ClientError, ObjectClient};

/// Length of generated passwords
pub const PASSWORD_LENGTH: usize = 64;

/// Default username of the superuser role
pub const DEFAULT_SUPERUSER_NAME: &str = "postgres";

/// Default username of the replication role
pub const DEFAULT_REPLICATION_NAME: &str = "standby";

/// Supplies role credentials for a cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credentials for every role of `cluster`
    async fn credentials(&self, cluster: &ClusterSpec) -> Result<Vec<Credential>, Error>;

    /// Drop anything held for a deleted cluster (`namespace/name`)
    fn forget(&self, cluster_key: &str);
}

/// Fixed credential list, identical for every cluster
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    credentials: Vec<Credential>,
}

impl StaticCredentials {
    /// Serve `credentials` for every cluster
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn credentials(&self, _cluster: &ClusterSpec) -> Result<Vec<Credential>, Error> {
        Ok(self.credentials.clone())
    }

    fn forget(&self, _cluster_key: &str) {}
}

/// Usernames of the well-known roles
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleUsernames {
    /// Superuser username
    pub superuser: String,
    /// Replication username
    pub replication: String,
}

impl Default for RoleUsernames {
    fn default() -> Self {
        Self {
            superuser: DEFAULT_SUPERUSER_NAME.to_string(),
            replication: DEFAULT_REPLICATION_NAME.to_string(),
        }
    }
}

impl RoleUsernames {
    fn roles(&self) -> [(Role, &str); 2] {
        [
            (Role::Superuser, self.superuser.as_str()),
            (Role::Replication, self.replication.as_str()),
        ]
    }
}

/// Generates a random password per role the first time a cluster is seen
///
/// A password already stored in the cluster's credential Secret is adopted
/// instead, so an operator restart does not rotate every password. Results
/// are cached per cluster; repeated passes see the same credentials.
pub struct GeneratedCredentials {
    client: Arc<dyn ObjectClient>,
    usernames: RoleUsernames,
    cache: DashMap<String, Vec<Credential>>,
}

impl GeneratedCredentials {
    /// Create a store that looks up existing Secrets through `client`
    pub fn new(client: Arc<dyn ObjectClient>, usernames: RoleUsernames) -> Self {
        Self {
            client,
            usernames,
            cache: DashMap::new(),
        }
    }

    async fn resolve(&self, cluster: &ClusterSpec, role: Role, username: &str) -> Result<Credential, Error> {
        let secret_name = credential_secret_name(&cluster.name, &role);
        match self.client.get_secret(&cluster.namespace, &secret_name).await {
            Ok(secret) => {
                if let Some(password) = stored_password(&secret) {
                    debug!(
                        cluster = %cluster.name,
                        role = %role,
                        secret = %secret_name,
                        "adopting stored password"
                    );
                    return Ok(Credential::new(role, username, password));
                }
            }
            Err(ClientError::NotFound) => {}
            Err(e) => {
                return Err(Error::internal_with_context(
                    "credentials",
                    format!("failed to read secret {}: {}", secret_name, e),
                ))
            }
        }

        info!(cluster = %cluster.name, role = %role, "generating password");
        Ok(Credential::new(role, username, generate_password()))
    }
}

#[async_trait]
impl CredentialStore for GeneratedCredentials {
    async fn credentials(&self, cluster: &ClusterSpec) -> Result<Vec<Credential>, Error> {
        let key = cluster.key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let mut credentials = Vec::with_capacity(2);
        for (role, username) in self.usernames.roles() {
            credentials.push(self.resolve(cluster, role, username).await?);
        }

        Ok(self.cache.entry(key).or_insert(credentials).clone())
    }

    fn forget(&self, cluster_key: &str) {
        if self.cache.remove(cluster_key).is_some() {
            debug!(cluster = %cluster_key, "dropped cached credentials");
        }
    }
}

fn stored_password(secret: &Secret) -> Option<Vec<u8>> {
    secret
        .data
        .as_ref()?
        .get("password")
        .map(|b| b.0.clone())
        .filter(|p| !p.is_empty())
}

/// Random alphanumeric password of [`PASSWORD_LENGTH`] bytes
pub fn generate_password() -> Vec<u8> {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .collect()
}
