//! Kubernetes Secret claims
//!
//! Every property is sourced up front. Only when all of them resolve is the
//! Secret assembled and handed to the convergence engine, so a claim with one
//! bad property never produces a partial Secret.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info};
use vaultsmith_common::converge::{converge, Converged, ObjectStore};
use vaultsmith_common::crd::{KubernetesClaim, SecretClaim};
use vaultsmith_common::hash::template_hash;
use vaultsmith_common::{
    Error, LABEL_MANAGED_BY, LABEL_MANAGED_BY_VAULTSMITH, SOURCE_HASH_ANNOTATION,
};
use vaultsmith_generate::PropertySourcer;

use crate::ClaimHandler;

/// Handler for claims targeting a Kubernetes Secret
pub struct KubernetesClaimHandler<'a> {
    claim: &'a SecretClaim,
    target: &'a KubernetesClaim,
    sourcer: &'a PropertySourcer,
    secrets: &'a dyn ObjectStore<Secret>,
}

impl<'a> KubernetesClaimHandler<'a> {
    /// Handler writing `target` through `secrets`
    pub fn new(
        claim: &'a SecretClaim,
        target: &'a KubernetesClaim,
        sourcer: &'a PropertySourcer,
        secrets: &'a dyn ObjectStore<Secret>,
    ) -> Self {
        Self {
            claim,
            target,
            sourcer,
            secrets,
        }
    }

    /// Resolve every property, failing on the first one that cannot be sourced
    pub fn source_properties(&self) -> Result<BTreeMap<String, ByteString>, Error> {
        let mut data = BTreeMap::new();
        for property in &self.target.properties {
            let value = self
                .sourcer
                .resolve(&property.source)
                .map_err(|e| e.for_property(&property.name))?;
            debug!(claim = %self.claim.name_any(), property = %property.name, "sourced property");
            data.insert(property.name.clone(), ByteString(value));
        }
        Ok(data)
    }

    /// Build the desired Secret with freshly sourced values
    pub fn expected_secret(&self) -> Result<Secret, Error> {
        let namespace = self.claim.target_namespace().ok_or_else(|| {
            Error::validation_for_field(
                self.claim.name_any(),
                "spec.kubernetes.namespace",
                "claim has no namespace and none was given for the secret",
            )
        })?;
        let data = self.source_properties()?;

        let mut labels = self.target.labels.clone();
        labels.insert(
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_VAULTSMITH.to_string(),
        );
        let mut annotations = self.target.annotations.clone();
        annotations.insert(
            SOURCE_HASH_ANNOTATION.to_string(),
            template_hash(&self.target.properties),
        );

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(self.target.name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                annotations: Some(annotations),
                ..Default::default()
            },
            data: Some(data),
            type_: self.target.secret_type.clone(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ClaimHandler for KubernetesClaimHandler<'_> {
    async fn handle(&self, owner: &OwnerReference) -> Result<Converged<Secret>, Error> {
        let expected = self.expected_secret()?;
        let converged = converge(self.secrets, owner, expected).await?;
        info!(
            claim = %self.claim.name_any(),
            secret = %self.target.name,
            outcome = %converged.outcome,
            "converged claim secret"
        );
        Ok(converged)
    }
}
