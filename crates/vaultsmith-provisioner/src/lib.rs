//! Store provisioning for Vaultsmith
//!
//! Every SecretStore gets a Deployment running the store operator, wired to
//! its provider: GCP stores run under a workload-identity ServiceAccount,
//! Azure stores carry the aad-pod-identity binding label. The objects are
//! built fresh from the store spec on each reconcile and converged.

#![deny(missing_docs)]

pub mod controller;
pub mod deployment;
pub mod pod_template;
pub mod service_account;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::{
    error_policy, reconcile, KubeStoreStatusClient, StoreContext, StoreStatusClient,
};
pub use deployment::{new_deployment, selector_labels, DeploymentParams};
pub use pod_template::{PodTemplateParams, STORE_CONTAINER_NAME};
pub use service_account::{gcp_service_account, GKE_SERVICE_ACCOUNT_ANNOTATION};

/// Store operator image used when a SecretStore does not name one
pub const DEFAULT_STORE_IMAGE: &str = "ghcr.io/vaultsmith/store-operator:latest";

/// Label tying store objects to their SecretStore
pub const STORE_LABEL: &str = "vaultsmith.dev/secret-store";
