//! Startup tasks

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use pgcluster_common::crd::Postgresql;
use pgcluster_common::{Error, FIELD_MANAGER};

/// Install or update the Postgresql CRD with server-side apply
///
/// Keeps the served schema in step with the operator version.
pub async fn ensure_crd_installed(client: &Client) -> Result<(), Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let crd = Postgresql::crd();
    let name = crd.metadata.name.clone().unwrap_or_default();

    tracing::info!(crd = %name, "Installing Postgresql CRD...");
    crds.patch(&name, &params, &Patch::Apply(&crd)).await?;
    Ok(())
}
