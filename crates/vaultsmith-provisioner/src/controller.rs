//! SecretStore controller
//!
//! For each store: converge the workload-identity ServiceAccount when the
//! provider needs one, then the store Deployment. Either object that already
//! exists under another owner is left alone and the store is failed. The
//! controller owns the Deployments it creates, so edits to them trigger a
//! reconcile of the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, warn};
use vaultsmith_common::converge::{converge, ObjectStore};
use vaultsmith_common::crd::{SecretStore, SecretStoreStatus, StorePhase};
use vaultsmith_common::kube_utils::{timestamp_now, KubeObjectStore, FIELD_MANAGER};
use vaultsmith_common::ownership::owner_reference;
use vaultsmith_common::{Error, REQUEUE_ERROR_SECS, REQUEUE_INVALID_SECS, REQUEUE_SUCCESS_SECS};

#[cfg(test)]
use mockall::automock;

use crate::deployment::{new_deployment, DeploymentParams};
use crate::service_account::gcp_service_account;

/// Writes SecretStore status
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StoreStatusClient: Send + Sync {
    /// Replace the status of the named store
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SecretStoreStatus,
    ) -> Result<(), Error>;
}

/// [`StoreStatusClient`] using the status subresource
pub struct KubeStoreStatusClient {
    client: Client,
}

impl KubeStoreStatusClient {
    /// Create a status client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StoreStatusClient for KubeStoreStatusClient {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SecretStoreStatus,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({
            "status": {
                "phase": status.phase,
                "provider": status.provider,
                "message": status.message,
                "deployment": status.deployment,
                "observedGeneration": status.observed_generation,
                "lastUpdated": status.last_updated,
            }
        });
        let api: Api<SecretStore> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Shared state for the store controller
pub struct StoreContext {
    /// Where store Deployments are converged
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    /// Where workload-identity ServiceAccounts are converged
    pub service_accounts: Arc<dyn ObjectStore<ServiceAccount>>,
    /// Where store status is written
    pub status: Arc<dyn StoreStatusClient>,
    /// Image for stores that do not name one
    pub store_image: String,
}

impl StoreContext {
    /// Context backed by the Kubernetes API
    pub fn new(client: Client, store_image: impl Into<String>) -> Self {
        let objects = Arc::new(KubeObjectStore::new(client.clone()));
        Self {
            deployments: objects.clone(),
            service_accounts: objects,
            status: Arc::new(KubeStoreStatusClient::new(client)),
            store_image: store_image.into(),
        }
    }

    /// Context with injected stores, for tests
    pub fn for_testing(
        deployments: Arc<dyn ObjectStore<Deployment>>,
        service_accounts: Arc<dyn ObjectStore<ServiceAccount>>,
        status: Arc<dyn StoreStatusClient>,
        store_image: impl Into<String>,
    ) -> Self {
        Self {
            deployments,
            service_accounts,
            status,
            store_image: store_image.into(),
        }
    }
}

/// Reconcile a SecretStore
pub async fn reconcile(store: Arc<SecretStore>, ctx: Arc<StoreContext>) -> Result<Action, Error> {
    let name = store.name_any();
    info!(store = %name, "Reconciling SecretStore");

    if let Err(e) = store.spec.validate(&name) {
        warn!(store = %name, error = %e, "Invalid SecretStore spec");
        update_status(&store, &ctx, StorePhase::Failed, Some(e.to_string()), None).await?;
        return Ok(requeue_after(&e));
    }

    match provision(&store, &ctx).await {
        Ok(deployment) => {
            info!(store = %name, %deployment, "SecretStore is Ready");
            update_status(&store, &ctx, StorePhase::Ready, None, Some(deployment)).await?;
            Ok(Action::requeue(Duration::from_secs(REQUEUE_SUCCESS_SECS)))
        }
        Err(e) => {
            warn!(
                store = %name,
                error = %e,
                retryable = e.is_retryable(),
                "Failed to provision store"
            );
            update_status(&store, &ctx, StorePhase::Failed, Some(e.to_string()), None).await?;
            Ok(requeue_after(&e))
        }
    }
}

/// Converge the store's objects, returning the Deployment name
async fn provision(store: &SecretStore, ctx: &StoreContext) -> Result<String, Error> {
    let owner = owner_reference(store)?;

    if let Some(account) = gcp_service_account(store)? {
        let converged = converge(ctx.service_accounts.as_ref(), &owner, account).await?;
        debug!(
            store = %store.name_any(),
            service_account = %converged.object.name_any(),
            outcome = %converged.outcome,
            "converged workload identity service account"
        );
    }

    let params = DeploymentParams::for_store(store, &ctx.store_image)?;
    let converged = converge(ctx.deployments.as_ref(), &owner, new_deployment(params)).await?;
    debug!(
        store = %store.name_any(),
        deployment = %converged.object.name_any(),
        outcome = %converged.outcome,
        "converged store deployment"
    );
    Ok(converged.object.name_any())
}

/// Requeue policy for errors escaping [`reconcile`]
pub fn error_policy(store: Arc<SecretStore>, error: &Error, _ctx: Arc<StoreContext>) -> Action {
    error!(?error, store = %store.name_any(), "reconciliation failed");
    requeue_after(error)
}

fn requeue_after(error: &Error) -> Action {
    let secs = if error.is_retryable() {
        REQUEUE_ERROR_SECS
    } else {
        REQUEUE_INVALID_SECS
    };
    Action::requeue(Duration::from_secs(secs))
}

async fn update_status(
    store: &SecretStore,
    ctx: &StoreContext,
    phase: StorePhase,
    message: Option<String>,
    deployment: Option<String>,
) -> Result<(), Error> {
    let provider = store.spec.provider.kind().ok().map(|k| k.to_string());
    let generation = store.metadata.generation;
    if let Some(current) = &store.status {
        if current.phase == phase
            && current.message == message
            && current.provider == provider
            && current.deployment == deployment
            && current.observed_generation == generation
        {
            debug!(store = %store.name_any(), "Status unchanged, skipping update");
            return Ok(());
        }
    }

    let status = SecretStoreStatus {
        phase,
        provider,
        message,
        deployment,
        observed_generation: generation,
        last_updated: Some(timestamp_now()),
    };
    let namespace = store.namespace().unwrap_or_default();
    ctx.status
        .patch_status(&namespace, &store.name_any(), &status)
        .await
}
