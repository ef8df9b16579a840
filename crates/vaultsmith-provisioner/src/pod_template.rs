//! Store pod template
//!
//! Every field is computed once from the SecretStore, with fixed precedence:
//!
//! - image: the image named on the SecretStore, else the operator default
//! - service account: the GCP workload identity account, else the namespace
//!   default
//! - labels: provider labels merged under the selector labels, so a provider
//!   label never replaces a label the Deployment selects on

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use vaultsmith_common::crd::{SecretStore, StoreProvider};
use vaultsmith_common::Error;
use vaultsmith_store::location_of;

use crate::deployment::selector_labels;

/// Name of the single container in a store pod
pub const STORE_CONTAINER_NAME: &str = "store-operator";

/// Pod label aad-pod-identity matches AzureIdentityBindings on
pub const AAD_POD_IDENTITY_LABEL: &str = "aadpodidbinding";

/// Env var naming the provider the store talks to
pub const ENV_PROVIDER: &str = "VAULTSMITH_PROVIDER";

/// Env var carrying the provider location (project id, vault name)
pub const ENV_LOCATION: &str = "VAULTSMITH_STORE_LOCATION";

/// Env var carrying the SecretStore name
pub const ENV_STORE_NAME: &str = "VAULTSMITH_STORE_NAME";

/// Everything that varies between store pods
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodTemplateParams {
    /// ServiceAccount the pod runs as
    pub service_account: Option<String>,
    /// Container image
    pub image: String,
    /// Container environment
    pub env: Vec<EnvVar>,
    /// Pod labels
    pub labels: BTreeMap<String, String>,
}

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// ServiceAccount bound to a GCP identity, if the provider uses one
fn workload_identity_account(provider: &StoreProvider) -> Option<String> {
    provider
        .gcp_secrets_manager
        .as_ref()
        .and_then(|gcp| gcp.auth.workload_identity.as_ref())
        .map(|identity| identity.service_account.clone())
}

/// Labels the provider's pod identity mechanism matches on
fn provider_labels(provider: &StoreProvider) -> BTreeMap<String, String> {
    provider
        .azure_key_vault
        .as_ref()
        .and_then(|azure| azure.auth.pod_identity.as_ref())
        .map(|identity| {
            BTreeMap::from([(
                AAD_POD_IDENTITY_LABEL.to_string(),
                identity.selector.clone(),
            )])
        })
        .unwrap_or_default()
}

/// Merge `extra` under `selector`: on a shared key the selector value wins.
fn pod_labels(
    selector: BTreeMap<String, String>,
    extra: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut labels = extra;
    labels.extend(selector);
    labels
}

impl PodTemplateParams {
    /// Parameters for the pod serving `store`
    pub fn for_store(store: &SecretStore, default_image: &str) -> Result<Self, Error> {
        let provider = &store.spec.provider;
        let kind = provider.kind()?;

        let mut env_vars = vec![env(ENV_PROVIDER, kind.to_string())];
        if let Some(location) = location_of(provider) {
            env_vars.push(env(ENV_LOCATION, location.location()));
        }
        env_vars.push(env(ENV_STORE_NAME, store.name_any()));

        Ok(Self {
            service_account: workload_identity_account(provider),
            image: store
                .spec
                .image
                .clone()
                .unwrap_or_else(|| default_image.to_string()),
            env: env_vars,
            labels: pod_labels(selector_labels(store), provider_labels(provider)),
        })
    }

    /// Build the pod template
    pub fn build(self) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(self.labels),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                service_account_name: self.service_account,
                containers: vec![Container {
                    name: STORE_CONTAINER_NAME.to_string(),
                    image: Some(self.image),
                    env: (!self.env.is_empty()).then_some(self.env),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        }
    }
}
