//! Shared fixtures for provisioner tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use vaultsmith_common::converge::ObjectStore;
use vaultsmith_common::crd::{
    AzureAuth, AzureKeyVaultProvider, GcpAuth, GcpSecretsManagerProvider, PodIdentity,
    SecretStore, SecretStoreSpec, StoreProvider, WorkloadIdentity,
};
use vaultsmith_common::Error;

fn store(name: &str, provider: StoreProvider) -> SecretStore {
    let mut store = SecretStore::new(
        name,
        SecretStoreSpec {
            provider,
            image: None,
            replicas: 1,
        },
    );
    store.metadata.namespace = Some("vaultsmith-system".to_string());
    store.metadata.uid = Some(format!("{name}-uid"));
    store.metadata.generation = Some(1);
    store
}

/// GCP store in project `my-project`, optionally with workload identity
pub fn gcp_store(name: &str, workload_identity: bool) -> SecretStore {
    store(
        name,
        StoreProvider {
            gcp_secrets_manager: Some(GcpSecretsManagerProvider {
                project_id: "my-project".to_string(),
                auth: GcpAuth {
                    workload_identity: workload_identity.then(|| WorkloadIdentity {
                        service_account: "store-sa".to_string(),
                        gcp_service_account: "secret-reader".to_string(),
                    }),
                },
            }),
            azure_key_vault: None,
        },
    )
}

/// Azure store for vault `my-vault` bound to `<name>-identity`
pub fn azure_store(name: &str) -> SecretStore {
    store(
        name,
        StoreProvider {
            gcp_secrets_manager: None,
            azure_key_vault: Some(AzureKeyVaultProvider {
                vault_name: "my-vault".to_string(),
                auth: AzureAuth {
                    pod_identity: Some(PodIdentity {
                        selector: format!("{name}-identity"),
                    }),
                },
            }),
        },
    )
}

/// In-memory object store counting writes
pub struct MemoryObjects<K> {
    objects: Mutex<BTreeMap<(String, String), K>>,
    writes: AtomicUsize,
}

impl<K: Resource + Clone> MemoryObjects<K> {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn put(&self, object: &K) -> K {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut persisted = object.clone();
        persisted.meta_mut().uid = Some("object-uid".to_string());
        let key = (
            persisted.namespace().unwrap_or_default(),
            persisted.name_any(),
        );
        self.objects.lock().unwrap().insert(key, persisted.clone());
        persisted
    }
}

#[async_trait]
impl<K: Resource + Clone + Send + Sync + 'static> ObjectStore<K> for MemoryObjects<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, Error> {
        Ok(self.stored(namespace, name))
    }

    async fn create(&self, object: &K) -> Result<K, Error> {
        Ok(self.put(object))
    }

    async fn update(&self, object: &K) -> Result<K, Error> {
        Ok(self.put(object))
    }
}
