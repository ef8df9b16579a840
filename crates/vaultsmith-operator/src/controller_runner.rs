//! Controller runner - builds controller futures for each resource kind
//!
//! Each `build_*` function returns a Vec of boxed futures that can be composed
//! by the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use vaultsmith_claim::ClaimContext;
use vaultsmith_common::crd::{SecretClaim, SecretStore};
use vaultsmith_common::{LABEL_MANAGED_BY, LABEL_MANAGED_BY_VAULTSMITH};
use vaultsmith_generate::PropertySourcer;
use vaultsmith_provisioner::StoreContext;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// so the API server closes idle watches before the client times out.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Boxed controller future
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build the SecretClaim controller
pub fn build_claim_controllers(client: Client, sourcer: PropertySourcer) -> Vec<ControllerFuture> {
    let ctx = Arc::new(ClaimContext::new(client.clone(), sourcer));
    let claims: Api<SecretClaim> = Api::all(client);

    tracing::info!("- SecretClaim controller");

    vec![Box::pin(
        Controller::new(claims, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .shutdown_on_signal()
            .run(vaultsmith_claim::reconcile, vaultsmith_claim::error_policy, ctx)
            .for_each(log_reconcile_result("SecretClaim")),
    )]
}

/// Build the SecretStore controller, which also watches the Deployments it owns
pub fn build_store_controllers(client: Client, store_image: String) -> Vec<ControllerFuture> {
    let ctx = Arc::new(StoreContext::new(client.clone(), store_image));
    let stores: Api<SecretStore> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client);
    let managed = format!("{LABEL_MANAGED_BY}={LABEL_MANAGED_BY_VAULTSMITH}");

    tracing::info!("- SecretStore controller");

    vec![Box::pin(
        Controller::new(stores, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
            .owns(
                deployments,
                WatcherConfig::default()
                    .labels(&managed)
                    .timeout(WATCH_TIMEOUT_SECS),
            )
            .shutdown_on_signal()
            .run(
                vaultsmith_provisioner::reconcile,
                vaultsmith_provisioner::error_policy,
                ctx,
            )
            .for_each(log_reconcile_result("SecretStore")),
    )]
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
