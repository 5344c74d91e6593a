//! Controller construction

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use pgcluster_common::crd::Postgresql;

use crate::controller::{error_policy, reconcile, Context};

/// Server-side watch timeout in seconds
///
/// Kept below the client read timeout (`DEFAULT_READ_TIMEOUT`) so idle
/// watches are closed by the API server first.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the Postgresql controller future
///
/// Watches one namespace when `ctx.config.watch_namespace` is set, every
/// namespace otherwise. Completes on SIGTERM/SIGINT.
pub fn build_postgresql_controller(
    client: Client,
    ctx: Arc<Context>,
) -> impl Future<Output = ()> + Send {
    let clusters: Api<Postgresql> = match ctx.config.watch_namespace.as_deref() {
        Some(namespace) => {
            tracing::info!(namespace = %namespace, "- Postgresql controller (single namespace)");
            Api::namespaced(client, namespace)
        }
        None => {
            tracing::info!("- Postgresql controller (all namespaces)");
            Api::all(client)
        }
    };

    Controller::new(
        clusters,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result("Postgresql"))
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
