//! Where a store keeps its secrets

use vaultsmith_common::crd::{AzureKeyVaultProvider, GcpSecretsManagerProvider, StoreProvider};

/// Resolves the backend-specific container for secrets
pub trait SecretLocation: Send + Sync {
    /// Project id, vault name, or equivalent
    fn location(&self) -> &str;
}

impl SecretLocation for GcpSecretsManagerProvider {
    fn location(&self) -> &str {
        &self.project_id
    }
}

impl SecretLocation for AzureKeyVaultProvider {
    fn location(&self) -> &str {
        &self.vault_name
    }
}

/// A location given directly, e.g. on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticLocation(pub String);

impl SecretLocation for StaticLocation {
    fn location(&self) -> &str {
        &self.0
    }
}

/// The location of whichever provider a store configures
pub fn location_of(provider: &StoreProvider) -> Option<&dyn SecretLocation> {
    if let Some(gcp) = &provider.gcp_secrets_manager {
        return Some(gcp);
    }
    if let Some(azure) = &provider.azure_key_vault {
        return Some(azure);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_location_is_vault_name() {
        let provider = AzureKeyVaultProvider {
            vault_name: "my-vault-name".to_string(),
            ..Default::default()
        };
        assert_eq!(provider.location(), "my-vault-name");
    }

    #[test]
    fn gcp_location_is_project_id() {
        let provider = GcpSecretsManagerProvider {
            project_id: "my-project".to_string(),
            ..Default::default()
        };
        assert_eq!(provider.location(), "my-project");
    }

    #[test]
    fn location_of_picks_the_configured_provider() {
        let provider = StoreProvider {
            gcp_secrets_manager: None,
            azure_key_vault: Some(AzureKeyVaultProvider {
                vault_name: "kv".to_string(),
                ..Default::default()
            }),
        };
        assert_eq!(location_of(&provider).map(|l| l.location()), Some("kv"));
        assert!(location_of(&StoreProvider::default()).is_none());
    }

    #[test]
    fn static_location() {
        assert_eq!(StaticLocation("ns".into()).location(), "ns");
    }
}
