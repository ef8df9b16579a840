//! `vaultsmith health`: probe a store's backend with a write/read round trip

use clap::Args;
use kube::{Api, Client};
use tracing::{error, info};
use vaultsmith_common::crd::SecretStore;
use vaultsmith_common::VAULTSMITH_SYSTEM_NAMESPACE;
use vaultsmith_store::{
    check_store_health, location_of, KubeSecretBackend, SecretBackend, SecretLocation,
    StaticLocation,
};

/// Arguments of the health subcommand.
///
/// The round trip always goes through the operator's Kubernetes Secret
/// backend in `--namespace`, keyed by the store's location. It does not
/// call the GCP or Azure API, so a passing check says nothing about the
/// cloud provider itself.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct HealthArgs {
    /// SecretStore whose location is probed (through the Kubernetes Secret
    /// backend, not the store's cloud provider)
    #[arg(long, conflicts_with = "location", required_unless_present = "location")]
    pub store: Option<String>,

    /// Probe this location (project id, vault name) directly
    #[arg(long)]
    pub location: Option<String>,

    /// Namespace of the SecretStore and of the backing Secrets
    #[arg(long, default_value = VAULTSMITH_SYSTEM_NAMESPACE)]
    pub namespace: String,
}

/// Location a SecretStore's provider keeps its secrets in
pub fn store_location(store: &SecretStore) -> anyhow::Result<StaticLocation> {
    location_of(&store.spec.provider)
        .map(|location| StaticLocation(location.location().to_string()))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "SecretStore {} has no provider configured",
                store.metadata.name.as_deref().unwrap_or_default()
            )
        })
}

/// Run the probe and turn its verdict into a process result
pub async fn probe(
    backend: &dyn SecretBackend,
    location: &dyn SecretLocation,
) -> anyhow::Result<()> {
    match check_store_health(backend, location).await {
        Ok(_) => {
            info!(location = location.location(), "store is healthy");
            Ok(())
        }
        Err(e) => {
            error!(
                location = location.location(),
                error = %e,
                consistency_fault = e.is_consistency_fault(),
                "store health check failed"
            );
            Err(e.into())
        }
    }
}

/// Entry point of `vaultsmith health`
pub async fn run_health_check(client: Client, args: &HealthArgs) -> anyhow::Result<()> {
    let location = match (&args.location, &args.store) {
        (Some(location), _) => StaticLocation(location.clone()),
        (None, Some(store)) => {
            let stores: Api<SecretStore> = Api::namespaced(client.clone(), &args.namespace);
            let store = stores
                .get(store)
                .await
                .map_err(|e| anyhow::anyhow!("failed to get SecretStore {}: {}", store, e))?;
            store_location(&store)?
        }
        (None, None) => anyhow::bail!("either --store or --location is required"),
    };

    let backend = KubeSecretBackend::new(client, args.namespace.clone());
    probe(&backend, &location).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use vaultsmith_common::crd::{AzureKeyVaultProvider, SecretStoreSpec, StoreProvider};
    use vaultsmith_store::{InMemoryBackend, HEALTH_KEY};

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        health: HealthArgs,
    }

    #[test]
    fn store_help_names_the_backend_actually_probed() {
        use clap::CommandFactory;
        let help = TestCli::command().render_long_help().to_string();
        assert!(help.contains("Kubernetes Secret backend"));
    }

    #[test]
    fn store_or_location_is_required() {
        assert!(TestCli::try_parse_from(["test"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--store", "a", "--location", "b"]).is_err());

        let cli = TestCli::try_parse_from(["test", "--store", "gcp-prod"]).unwrap();
        assert_eq!(cli.health.store.as_deref(), Some("gcp-prod"));
        assert_eq!(cli.health.namespace, VAULTSMITH_SYSTEM_NAMESPACE);
    }

    #[test]
    fn store_location_follows_provider() {
        let store = SecretStore::new(
            "kv",
            SecretStoreSpec {
                provider: StoreProvider {
                    azure_key_vault: Some(AzureKeyVaultProvider {
                        vault_name: "my-vault".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                image: None,
                replicas: 1,
            },
        );
        assert_eq!(store_location(&store).unwrap(), StaticLocation("my-vault".to_string()));

        let empty = SecretStore::new(
            "empty",
            SecretStoreSpec {
                provider: StoreProvider::default(),
                image: None,
                replicas: 1,
            },
        );
        assert!(store_location(&empty).is_err());
    }

    #[tokio::test]
    async fn probe_succeeds_against_consistent_backend() {
        let backend = InMemoryBackend::new();
        let location = StaticLocation("my-project".to_string());
        probe(&backend, &location).await.unwrap();
        assert!(backend.get("my-project", HEALTH_KEY).is_some());
    }
}
