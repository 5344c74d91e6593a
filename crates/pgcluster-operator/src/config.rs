//! Flags, environment fallbacks and the resolved [`OperatorConfig`]

use std::time::Duration;

use clap::Args;

use pgcluster_cluster::{RoleUsernames, DEFAULT_REPLICATION_NAME, DEFAULT_SUPERUSER_NAME};
use pgcluster_common::ClusterDefaults;

/// Image used for clusters that do not set `dockerImage`
pub const DEFAULT_DOCKER_IMAGE: &str = "registry.opensource.zalan.do/acid/spilo-9.6:1.2-p12";

/// Coordination service used for clusters that do not set `etcdHost`
pub const DEFAULT_ETCD_HOST: &str = "etcd-client.default.svc.cluster.local:2379";

/// Seconds between passes once a cluster has converged
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 300;

/// Seconds before retrying a cluster that has not converged
pub const DEFAULT_RETRY_PERIOD_SECS: u64 = 15;

/// Errors in operator flags
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A flag that must not be empty is empty
    #[error("--{flag} cannot be empty")]
    Empty {
        /// Flag name
        flag: &'static str,
    },

    /// A period flag is zero
    #[error("--{flag} must be greater than zero")]
    ZeroPeriod {
        /// Flag name
        flag: &'static str,
    },
}

/// Controller flags; each falls back to an environment variable
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ControllerArgs {
    /// Only watch clusters in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Default database image
    #[arg(long, env = "DOCKER_IMAGE", default_value = DEFAULT_DOCKER_IMAGE)]
    pub docker_image: String,

    /// Default coordination service address
    #[arg(long, env = "ETCD_HOST", default_value = DEFAULT_ETCD_HOST)]
    pub etcd_host: String,

    /// Username of the superuser role
    #[arg(long, env = "SUPERUSER_NAME", default_value = DEFAULT_SUPERUSER_NAME)]
    pub superuser_name: String,

    /// Username of the replication role
    #[arg(long, env = "REPLICATION_NAME", default_value = DEFAULT_REPLICATION_NAME)]
    pub replication_name: String,

    /// Seconds between passes for a converged cluster
    #[arg(long, env = "RESYNC_PERIOD_SECS", default_value_t = DEFAULT_RESYNC_PERIOD_SECS)]
    pub resync_period_secs: u64,

    /// Seconds before retrying a cluster that did not converge
    #[arg(long, env = "RETRY_PERIOD_SECS", default_value_t = DEFAULT_RETRY_PERIOD_SECS)]
    pub retry_period_secs: u64,

    /// Do not install or update the CRD on startup
    #[arg(long, env = "SKIP_CRD_INSTALL")]
    pub skip_crd_install: bool,
}

/// Resolved operator configuration, passed explicitly to the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch, or all namespaces
    pub watch_namespace: Option<String>,
    /// Fallbacks for values a cluster resource may omit
    pub defaults: ClusterDefaults,
    /// Usernames of the well-known roles
    pub usernames: RoleUsernames,
    /// Requeue delay after a converged pass
    pub resync_period: Duration,
    /// Requeue delay after a pass that did not converge
    pub retry_period: Duration,
    /// Install the CRD on startup
    pub install_crd: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            defaults: ClusterDefaults {
                image: DEFAULT_DOCKER_IMAGE.to_string(),
                etcd_host: DEFAULT_ETCD_HOST.to_string(),
            },
            usernames: RoleUsernames::default(),
            resync_period: Duration::from_secs(DEFAULT_RESYNC_PERIOD_SECS),
            retry_period: Duration::from_secs(DEFAULT_RETRY_PERIOD_SECS),
            install_crd: true,
        }
    }
}

impl TryFrom<ControllerArgs> for OperatorConfig {
    type Error = ConfigError;

    fn try_from(args: ControllerArgs) -> Result<Self, Self::Error> {
        let non_empty = |value: String, flag: &'static str| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(ConfigError::Empty { flag })
            } else {
                Ok(value)
            }
        };
        let period = |secs: u64, flag: &'static str| {
            if secs == 0 {
                Err(ConfigError::ZeroPeriod { flag })
            } else {
                Ok(Duration::from_secs(secs))
            }
        };

        Ok(Self {
            watch_namespace: args
                .watch_namespace
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty()),
            defaults: ClusterDefaults {
                image: non_empty(args.docker_image, "docker-image")?,
                etcd_host: non_empty(args.etcd_host, "etcd-host")?,
            },
            usernames: RoleUsernames {
                superuser: non_empty(args.superuser_name, "superuser-name")?,
                replication: non_empty(args.replication_name, "replication-name")?,
            },
            resync_period: period(args.resync_period_secs, "resync-period-secs")?,
            retry_period: period(args.retry_period_secs, "retry-period-secs")?,
            install_crd: !args.skip_crd_install,
        })
    }
}
