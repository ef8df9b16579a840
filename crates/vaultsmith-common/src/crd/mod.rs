//! Custom Resource Definitions for Vaultsmith
//!
//! This module contains all CRD definitions used by the Vaultsmith operator.

mod secret_claim;
mod secret_store;

pub use secret_claim::{
    ClaimPhase, KubernetesClaim, PasswordGenerator, Property, PropertyGenerator, PropertySource,
    SecretClaim, SecretClaimSpec, SecretClaimStatus,
};
pub use secret_store::{
    AzureAuth, AzureKeyVaultProvider, GcpAuth, GcpSecretsManagerProvider, PodIdentity,
    ProviderKind, SecretStore, SecretStoreSpec, SecretStoreStatus, StorePhase, StoreProvider,
    WorkloadIdentity,
};

/// Check that a string is a valid Secret data key (`[-._a-zA-Z0-9]+`).
pub(crate) fn is_valid_data_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Check that a string is a valid DNS-1123 subdomain (object names).
pub(crate) fn is_valid_object_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1])
        && bytes
            .iter()
            .all(|&b| edge_ok(b) || b == b'-' || b == b'.')
}
