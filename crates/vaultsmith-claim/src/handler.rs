//! Claim handler selection

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use vaultsmith_common::converge::{Converged, ObjectStore};
use vaultsmith_common::crd::SecretClaim;
use vaultsmith_common::Error;
use vaultsmith_generate::PropertySourcer;

use crate::kubernetes::KubernetesClaimHandler;

/// Materializes one claim into its target object
#[async_trait]
pub trait ClaimHandler: Send + Sync {
    /// Source every property and converge the target on behalf of `owner`.
    ///
    /// Fails before any write if a single property cannot be sourced.
    async fn handle(&self, owner: &OwnerReference) -> Result<Converged<Secret>, Error>;
}

/// Pick the handler for the claim's target kind
pub fn create_claim_handler<'a>(
    claim: &'a SecretClaim,
    sourcer: &'a PropertySourcer,
    secrets: &'a dyn ObjectStore<Secret>,
) -> Result<Box<dyn ClaimHandler + 'a>, Error> {
    if let Some(target) = &claim.spec.kubernetes {
        return Ok(Box::new(KubernetesClaimHandler::new(
            claim, target, sourcer, secrets,
        )));
    }
    Err(Error::validation_for_field(
        claim.name_any(),
        "spec",
        "unable to create claim handler: unable to determine claim type",
    ))
}
