//! SecretStore CRD
//!
//! A SecretStore declares a cloud secret backend. For each store the
//! operator runs a store deployment authenticated against that backend.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// SecretStore declares a backend secret manager.
///
/// Example:
/// ```yaml
/// apiVersion: vaultsmith.dev/v1alpha1
/// kind: SecretStore
/// metadata:
///   name: gcp-prod
///   namespace: vaultsmith-system
/// spec:
///   provider:
///     gcpSecretsManager:
///       projectId: my-project
///       auth:
///         workloadIdentity:
///           serviceAccount: store-sa
///           gcpServiceAccount: secret-reader
/// ```
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "vaultsmith.dev",
    version = "v1alpha1",
    kind = "SecretStore",
    namespaced,
    status = "SecretStoreStatus",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".status.provider"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreSpec {
    /// Backend provider. Exactly one provider must be set.
    pub provider: StoreProvider,

    /// Store container image (defaults to the operator's configured image)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Number of store replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,
}

fn default_replicas() -> i32 {
    1
}

/// Backend provider selection
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreProvider {
    /// Google Cloud Secret Manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_secrets_manager: Option<GcpSecretsManagerProvider>,

    /// Azure Key Vault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_key_vault: Option<AzureKeyVaultProvider>,
}

/// Google Cloud Secret Manager configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GcpSecretsManagerProvider {
    /// GCP project holding the secrets
    pub project_id: String,

    /// How the store authenticates
    #[serde(default)]
    pub auth: GcpAuth,
}

/// GCP authentication
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GcpAuth {
    /// GKE workload identity binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload_identity: Option<WorkloadIdentity>,
}

/// GKE workload identity: a Kubernetes ServiceAccount bound to a GCP one
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadIdentity {
    /// Kubernetes ServiceAccount the store runs as
    pub service_account: String,

    /// GCP service account name (without the `@project.iam...` suffix)
    pub gcp_service_account: String,
}

/// Azure Key Vault configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultProvider {
    /// Key Vault name
    pub vault_name: String,

    /// How the store authenticates
    #[serde(default)]
    pub auth: AzureAuth,
}

/// Azure authentication
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureAuth {
    /// aad-pod-identity binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_identity: Option<PodIdentity>,
}

/// aad-pod-identity binding
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodIdentity {
    /// Value of the `aadpodidbinding` pod label
    pub selector: String,
}

/// Which provider a store uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Google Cloud Secret Manager
    GcpSecretsManager,
    /// Azure Key Vault
    AzureKeyVault,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GcpSecretsManager => write!(f, "gcpSecretsManager"),
            Self::AzureKeyVault => write!(f, "azureKeyVault"),
        }
    }
}

/// SecretStore status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreStatus {
    /// Current phase
    #[serde(default)]
    pub phase: StorePhase,

    /// Provider in use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Name of the store Deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    /// Generation of the spec last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time the status changed (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// SecretStore phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum StorePhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Store deployment converged
    Ready,
    /// Last reconcile failed
    Failed,
}

impl StoreProvider {
    /// The configured provider, if exactly one is set
    pub fn kind(&self) -> Result<ProviderKind, Error> {
        match (&self.gcp_secrets_manager, &self.azure_key_vault) {
            (Some(_), None) => Ok(ProviderKind::GcpSecretsManager),
            (None, Some(_)) => Ok(ProviderKind::AzureKeyVault),
            (None, None) => Err(Error::validation("no provider configured")),
            (Some(_), Some(_)) => Err(Error::validation(
                "gcpSecretsManager and azureKeyVault are mutually exclusive",
            )),
        }
    }
}

impl SecretStoreSpec {
    /// Validate the store declaration
    pub fn validate(&self, store: &str) -> Result<(), Error> {
        let kind = self.provider.kind().map_err(|e| {
            Error::validation_for_field(store, "spec.provider", e.to_string())
        })?;

        if self.replicas < 0 {
            return Err(Error::validation_for_field(
                store,
                "spec.replicas",
                "replicas cannot be negative",
            ));
        }

        match kind {
            ProviderKind::GcpSecretsManager => {
                let gcp = self.provider.gcp_secrets_manager.as_ref();
                if gcp.is_some_and(|g| g.project_id.trim().is_empty()) {
                    return Err(Error::validation_for_field(
                        store,
                        "spec.provider.gcpSecretsManager.projectId",
                        "projectId is required",
                    ));
                }
                let identity = gcp.and_then(|g| g.auth.workload_identity.as_ref());
                if identity.is_some_and(|w| {
                    w.service_account.is_empty() || w.gcp_service_account.is_empty()
                }) {
                    return Err(Error::validation_for_field(
                        store,
                        "spec.provider.gcpSecretsManager.auth.workloadIdentity",
                        "serviceAccount and gcpServiceAccount are required",
                    ));
                }
            }
            ProviderKind::AzureKeyVault => {
                let azure = self.provider.azure_key_vault.as_ref();
                if azure.is_some_and(|a| a.vault_name.trim().is_empty()) {
                    return Err(Error::validation_for_field(
                        store,
                        "spec.provider.azureKeyVault.vaultName",
                        "vaultName is required",
                    ));
                }
            }
        }
        Ok(())
    }
}

impl SecretStore {
    /// Name of the Deployment running this store
    pub fn deployment_name(&self) -> String {
        format!("{}-store", self.metadata.name.as_deref().unwrap_or_default())
    }
}
