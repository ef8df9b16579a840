//! Shared fixtures for claim tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use vaultsmith_common::converge::ObjectStore;
use vaultsmith_common::crd::{
    KubernetesClaim, PasswordGenerator, Property, PropertyGenerator, PropertySource,
    SecretClaim, SecretClaimSpec,
};
use vaultsmith_common::Error;

/// Claim with a password and an hmac property
pub fn claim(name: &str, namespace: &str, secret: &str) -> SecretClaim {
    let mut claim = SecretClaim::new(
        name,
        SecretClaimSpec {
            kubernetes: Some(KubernetesClaim {
                name: secret.to_string(),
                labels: BTreeMap::from([("app".to_string(), "orders".to_string())]),
                secret_type: Some("Opaque".to_string()),
                properties: vec![
                    Property {
                        name: "password".to_string(),
                        source: PropertySource {
                            generator: Some(PropertyGenerator {
                                hmac: false,
                                password: Some(PasswordGenerator {
                                    length: 20,
                                    num_digits: 4,
                                    num_symbols: 2,
                                    allow_repeat: true,
                                    ..Default::default()
                                }),
                            }),
                        },
                    },
                    Property {
                        name: "signing-key".to_string(),
                        source: PropertySource {
                            generator: Some(PropertyGenerator {
                                hmac: true,
                                password: None,
                            }),
                        },
                    },
                ],
                ..Default::default()
            }),
        },
    );
    claim.metadata.namespace = Some(namespace.to_string());
    claim.metadata.uid = Some(format!("{name}-uid"));
    claim.metadata.generation = Some(1);
    claim
}

/// In-memory Secret store counting writes
#[derive(Default)]
pub struct MemorySecrets {
    objects: Mutex<BTreeMap<(String, String), Secret>>,
    writes: AtomicUsize,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, secret: Secret) {
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        self.objects.lock().unwrap().insert(key, secret);
    }

    pub fn stored(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.objects
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// A Secret created by someone else
    pub fn foreign(namespace: &str, name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: Some("foreign-uid".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStore<Secret> for MemorySecrets {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        Ok(self.stored(namespace, name))
    }

    async fn create(&self, object: &Secret) -> Result<Secret, Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut persisted = object.clone();
        persisted.metadata.uid = Some("secret-uid".to_string());
        persisted.metadata.resource_version = Some("1".to_string());
        self.seed(persisted.clone());
        Ok(persisted)
    }

    async fn update(&self, object: &Secret) -> Result<Secret, Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.seed(object.clone());
        Ok(object.clone())
    }
}
