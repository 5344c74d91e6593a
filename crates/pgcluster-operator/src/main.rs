//! pgcluster operator - replicated Postgres clusters on Kubernetes

use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::CustomResourceExt;

use pgcluster_cluster::{
    ClusterLocks, ClusterReconciler, GeneratedCredentials, KubeObjectClient,
};
use pgcluster_common::crd::Postgresql;
use pgcluster_common::kube_utils::create_client;
use pgcluster_common::telemetry::{init_telemetry, TelemetryConfig};
use pgcluster_operator::config::{ControllerArgs, OperatorConfig};
use pgcluster_operator::controller::{Context, KubePostgresqlClient};
use pgcluster_operator::runner::build_postgresql_controller;
use pgcluster_operator::startup::ensure_crd_installed;

/// Kubernetes operator for replicated Postgres clusters
#[derive(Parser, Debug)]
#[command(name = "pgcluster-operator", version, about, long_about = None)]
struct Cli {
    /// Print the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Postgresql::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_telemetry(TelemetryConfig::default())?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.controller).await,
    }
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let config = OperatorConfig::try_from(args)?;
    tracing::info!(
        watch_namespace = ?config.watch_namespace,
        image = %config.defaults.image,
        etcd_host = %config.defaults.etcd_host,
        "pgcluster controller starting..."
    );

    let client = create_client()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if config.install_crd {
        ensure_crd_installed(&client)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install Postgresql CRD: {}", e))?;
    }

    let objects = Arc::new(KubeObjectClient::new(client.clone()));
    let credentials = Arc::new(GeneratedCredentials::new(
        objects.clone(),
        config.usernames.clone(),
    ));
    let reconciler = ClusterReconciler::new(objects, credentials, ClusterLocks::new());
    let clusters = Arc::new(KubePostgresqlClient::new(client.clone()));
    let ctx = Arc::new(Context::new(reconciler, clusters, config));

    build_postgresql_controller(client, ctx).await;

    tracing::info!("pgcluster controller stopped");
    Ok(())
}
