//! Shared Kubernetes utilities using kube-rs

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::converge::ObjectStore;
use crate::{Error, LABEL_MANAGED_BY, LABEL_MANAGED_BY_VAULTSMITH, LABEL_NAME};

/// Field manager recorded on every write the operator makes
pub const FIELD_MANAGER: &str = "vaultsmith-operator";

/// Standard labels for objects Vaultsmith creates on behalf of `name`
pub fn managed_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), name.to_string()),
        (
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_VAULTSMITH.to_string(),
        ),
    ])
}

/// Current time as an RFC 3339 string, for status fields
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `namespace/name` of a resource, for logs and error messages
pub fn object_key<K: Resource>(object: &K) -> String {
    format!(
        "{}/{}",
        object.meta().namespace.as_deref().unwrap_or_default(),
        object.meta().name.as_deref().unwrap_or_default()
    )
}

/// [`ObjectStore`] backed by the Kubernetes API.
///
/// Updates use replace, so the persisted resourceVersion carried on the
/// object gives optimistic concurrency: a concurrent writer surfaces as a
/// 409 conflict.
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

fn identity<K: Resource>(object: &K) -> Result<(&str, &str), Error> {
    let meta = object.meta();
    match (meta.namespace.as_deref(), meta.name.as_deref()) {
        (Some(ns), Some(name)) => Ok((ns, name)),
        _ => Err(Error::internal_with_context(
            "kube_object_store",
            "object has no namespace or name",
        )),
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeObjectStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, Error> {
        trace!(kind = %K::kind(&()), namespace, name, "get");
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn create(&self, object: &K) -> Result<K, Error> {
        let (namespace, _) = identity(object)?;
        Ok(self
            .api::<K>(namespace)
            .create(&Self::post_params(), object)
            .await?)
    }

    async fn update(&self, object: &K) -> Result<K, Error> {
        let (namespace, name) = identity(object)?;
        Ok(self
            .api::<K>(namespace)
            .replace(name, &Self::post_params(), object)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;

    #[test]
    fn managed_labels_name_the_owner() {
        let labels = managed_labels("gcp-prod");
        assert_eq!(labels.get(LABEL_NAME).map(String::as_str), Some("gcp-prod"));
        assert_eq!(
            labels.get(LABEL_MANAGED_BY).map(String::as_str),
            Some("vaultsmith")
        );
    }

    #[test]
    fn object_key_formats_namespace_and_name() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("db".to_string()),
                namespace: Some("orders".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(object_key(&secret), "orders/db");
        assert_eq!(identity(&secret).unwrap(), ("orders", "db"));
        assert!(identity(&Secret::default()).is_err());
    }

    #[test]
    fn timestamp_is_rfc3339() {
        let ts = timestamp_now();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
