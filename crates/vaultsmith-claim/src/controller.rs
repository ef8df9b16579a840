//! SecretClaim controller
//!
//! Validates the claim, hands it to the handler for its target kind and
//! records the outcome on the claim's status. Failures are reported on the
//! status and requeued: transient ones soon, configuration ones only on the
//! slow drift interval since they need a spec change.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, warn};
use vaultsmith_common::converge::ObjectStore;
use vaultsmith_common::crd::{ClaimPhase, SecretClaim, SecretClaimStatus};
use vaultsmith_common::kube_utils::{object_key, timestamp_now, KubeObjectStore, FIELD_MANAGER};
use vaultsmith_common::ownership::owner_reference;
use vaultsmith_common::{Error, REQUEUE_ERROR_SECS, REQUEUE_INVALID_SECS, REQUEUE_SUCCESS_SECS};
use vaultsmith_generate::PropertySourcer;

#[cfg(test)]
use mockall::automock;

use crate::create_claim_handler;

/// Writes SecretClaim status
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClaimStatusClient: Send + Sync {
    /// Replace the status of the named claim
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SecretClaimStatus,
    ) -> Result<(), Error>;
}

/// [`ClaimStatusClient`] using the status subresource
pub struct KubeClaimStatusClient {
    client: Client,
}

impl KubeClaimStatusClient {
    /// Create a status client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClaimStatusClient for KubeClaimStatusClient {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &SecretClaimStatus,
    ) -> Result<(), Error> {
        // Every field is written explicitly so merge patches clear stale values
        let patch = serde_json::json!({
            "status": {
                "phase": status.phase,
                "message": status.message,
                "secret": status.secret,
                "observedGeneration": status.observed_generation,
                "lastUpdated": status.last_updated,
            }
        });
        let api: Api<SecretClaim> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Shared state for the claim controller
pub struct ClaimContext {
    /// Where claim Secrets are converged
    pub secrets: Arc<dyn ObjectStore<Secret>>,
    /// Where claim status is written
    pub status: Arc<dyn ClaimStatusClient>,
    /// Resolves property sources
    pub sourcer: PropertySourcer,
}

impl ClaimContext {
    /// Context backed by the Kubernetes API
    pub fn new(client: Client, sourcer: PropertySourcer) -> Self {
        Self {
            secrets: Arc::new(KubeObjectStore::new(client.clone())),
            status: Arc::new(KubeClaimStatusClient::new(client)),
            sourcer,
        }
    }

    /// Context with injected stores, for tests
    pub fn for_testing(
        secrets: Arc<dyn ObjectStore<Secret>>,
        status: Arc<dyn ClaimStatusClient>,
        sourcer: PropertySourcer,
    ) -> Self {
        Self {
            secrets,
            status,
            sourcer,
        }
    }
}

/// Reconcile a SecretClaim
pub async fn reconcile(claim: Arc<SecretClaim>, ctx: Arc<ClaimContext>) -> Result<Action, Error> {
    let name = claim.name_any();
    info!(claim = %name, "Reconciling SecretClaim");

    if let Err(e) = claim.validate() {
        warn!(claim = %name, error = %e, "Invalid SecretClaim spec");
        update_status(&claim, &ctx, ClaimPhase::Failed, Some(e.to_string()), None).await?;
        return Ok(requeue_after(&e));
    }

    let owner = owner_reference(claim.as_ref())?;
    let result = match create_claim_handler(&claim, &ctx.sourcer, ctx.secrets.as_ref()) {
        Ok(handler) => handler.handle(&owner).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(converged) => {
            let secret = object_key(&converged.object);
            info!(claim = %name, %secret, outcome = %converged.outcome, "SecretClaim is Ready");
            update_status(&claim, &ctx, ClaimPhase::Ready, None, Some(secret)).await?;
            Ok(Action::requeue(Duration::from_secs(REQUEUE_SUCCESS_SECS)))
        }
        Err(e) => {
            warn!(
                claim = %name,
                error = %e,
                retryable = e.is_retryable(),
                "Failed to provision claim"
            );
            update_status(&claim, &ctx, ClaimPhase::Failed, Some(e.to_string()), None).await?;
            Ok(requeue_after(&e))
        }
    }
}

/// Requeue policy for errors escaping [`reconcile`]
pub fn error_policy(claim: Arc<SecretClaim>, error: &Error, _ctx: Arc<ClaimContext>) -> Action {
    error!(?error, claim = %claim.name_any(), "reconciliation failed");
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
    claim: &SecretClaim,
    ctx: &ClaimContext,
    phase: ClaimPhase,
    message: Option<String>,
    secret: Option<String>,
) -> Result<(), Error> {
    let generation = claim.metadata.generation;
    if let Some(current) = &claim.status {
        if current.phase == phase
            && current.message == message
            && current.secret == secret
            && current.observed_generation == generation
        {
            debug!(claim = %claim.name_any(), "Status unchanged, skipping update");
            return Ok(());
        }
    }

    let status = SecretClaimStatus {
        phase,
        message,
        secret,
        observed_generation: generation,
        last_updated: Some(timestamp_now()),
    };
    let namespace = claim.namespace().unwrap_or_default();
    ctx.status
        .patch_status(&namespace, &claim.name_any(), &status)
        .await
}
