//! Naming and labeling of every object owned by a cluster
//!
//! All builders call these with the cluster name passed explicitly, so the
//! same cluster always yields the same names and labels.

use std::collections::BTreeMap;

use pgcluster_common::{Role, LABEL_APPLICATION, LABEL_APPLICATION_SPILO, LABEL_CLUSTER};

/// Name of the StatefulSet, Service and Endpoints of a cluster
pub fn object_name(cluster: &str) -> String {
    cluster.to_string()
}

/// Name of the credential Secret for `role` in `cluster`
///
/// Role identifiers may contain characters that are not valid in object
/// names; they are lowercased and underscores become dashes.
pub fn credential_secret_name(cluster: &str, role: &Role) -> String {
    let role = role.as_str().to_ascii_lowercase().replace('_', "-");
    format!("{}.{}.credentials", role, cluster)
}

/// Ownership labels applied to every object of a cluster
pub fn ownership_labels(cluster: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            LABEL_APPLICATION.to_string(),
            LABEL_APPLICATION_SPILO.to_string(),
        ),
        (LABEL_CLUSTER.to_string(), cluster.to_string()),
    ])
}
