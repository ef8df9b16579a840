//! Kubernetes-Secret-backed store
//!
//! Each location maps to one Secret in the backend's namespace; each key is
//! one entry of that Secret's data. Kubernetes Secrets are not versioned, so
//! only the latest value can be read.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, ObjectMeta, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;
use vaultsmith_common::kube_utils::{managed_labels, FIELD_MANAGER};

use crate::{BackendError, SecretBackend};

/// Prefix of the Secrets holding store values
pub const STORE_SECRET_PREFIX: &str = "vaultsmith-store-";

/// [`SecretBackend`] keeping values in Kubernetes Secrets
#[derive(Clone)]
pub struct KubeSecretBackend {
    client: Client,
    namespace: String,
}

impl KubeSecretBackend {
    /// Backend writing Secrets into `namespace`
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api(&self) -> Api<Secret> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// Name of the Secret backing a location
pub fn secret_name_for(location: &str) -> String {
    let sanitized: String = location
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{STORE_SECRET_PREFIX}{}", sanitized.trim_matches('-'))
}

fn backend_error(err: kube::Error) -> BackendError {
    match &err {
        kube::Error::Api(ae) if ae.code == 429 || ae.code >= 500 => {
            BackendError::Unavailable(err.to_string())
        }
        kube::Error::Api(_) => BackendError::Rejected(err.to_string()),
        _ => BackendError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl SecretBackend for KubeSecretBackend {
    async fn set_value(&self, location: &str, key: &str, value: &str) -> Result<(), BackendError> {
        let api = self.api();
        let name = secret_name_for(location);
        let data = BTreeMap::from([(key.to_string(), ByteString(value.as_bytes().to_vec()))]);

        match api.get_opt(&name).await.map_err(backend_error)? {
            None => {
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: Some(self.namespace.clone()),
                        labels: Some(managed_labels("vaultsmith-store")),
                        ..Default::default()
                    },
                    data: Some(data),
                    type_: Some("Opaque".to_string()),
                    ..Default::default()
                };
                let params = PostParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..Default::default()
                };
                api.create(&params, &secret).await.map_err(backend_error)?;
            }
            Some(_) => {
                let patch = serde_json::json!({ "data": data });
                let params = PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..Default::default()
                };
                api.patch(&name, &params, &Patch::Merge(&patch))
                    .await
                    .map_err(backend_error)?;
            }
        }
        debug!(secret = %name, key, "stored value");
        Ok(())
    }

    async fn get_value(
        &self,
        location: &str,
        key: &str,
        version: Option<String>,
    ) -> Result<String, BackendError> {
        if let Some(version) = version.filter(|v| v != "latest") {
            return Err(BackendError::Rejected(format!(
                "kubernetes secrets are not versioned, cannot read version '{version}'"
            )));
        }

        let not_found = || BackendError::NotFound {
            location: location.to_string(),
            key: key.to_string(),
        };
        let secret = self
            .api()
            .get_opt(&secret_name_for(location))
            .await
            .map_err(backend_error)?
            .ok_or_else(not_found)?;

        let bytes = secret
            .data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(not_found)?;
        String::from_utf8(bytes.0)
            .map_err(|_| BackendError::Rejected(format!("value under {key} is not valid UTF-8")))
    }
}
