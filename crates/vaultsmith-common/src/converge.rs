//! Desired-state convergence for derived objects
//!
//! [`converge`] takes a freshly built expected object and makes the cluster
//! match it with at most one write:
//!
//! - absent: created with the owner reference attached
//! - present but not owned by the requester: refused, nothing written
//! - present with the same template hash: left alone, returned as persisted
//! - present with a different hash: replaced, keeping the persisted identity
//!   (uid, resourceVersion, creationTimestamp, ownerReferences)
//!
//! The template hash is stored in the [`TEMPLATE_HASH_LABEL`] label, so the
//! comparison only looks at what this operator wrote last time, never at
//! fields the API server defaults or mutates.
//!
//! Writes race with other writers only through the API server: a stale
//! resourceVersion on replace surfaces as a 409 for the caller's requeue
//! policy. Nothing here retries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::hash::template_hash;
use crate::ownership::authorize;
use crate::{Error, SOURCE_HASH_ANNOTATION, TEMPLATE_HASH_LABEL};

/// Persistence capability the engine writes through
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, Error>;

    /// Create an object, returning it as persisted
    async fn create(&self, object: &K) -> Result<K, Error>;

    /// Replace an existing object, returning it as persisted
    async fn update(&self, object: &K) -> Result<K, Error>;
}

/// Per-kind convergence behavior
pub trait Converge: Resource<DynamicType = ()> + Clone + Serialize + Send + Sync + 'static {
    /// Content hash of the desired state, ignoring any previous hash label
    fn fingerprint(&self) -> String {
        template_hash(&without_hash_label(self))
    }

    /// Build the object to write over `current`: the body of `expected` with
    /// the identity metadata of `current`.
    fn overwrite(current: &Self, expected: Self) -> Self {
        adopt_identity(current, expected)
    }
}

impl Converge for Deployment {}

impl Converge for ServiceAccount {
    fn overwrite(current: &Self, expected: Self) -> Self {
        let mut desired = adopt_identity(current, expected);
        // token secrets are filled in by the platform, not by us
        desired.secrets = current.secrets.clone();
        desired
    }
}

impl Converge for Secret {
    /// Generated payloads differ on every build. When the secret records the
    /// hash of the declaration its payload came from, that annotation stands
    /// in for the payload.
    fn fingerprint(&self) -> String {
        let mut shape = without_hash_label(self);
        if shape.annotations().contains_key(SOURCE_HASH_ANNOTATION) {
            shape.data = None;
            shape.string_data = None;
        }
        template_hash(&shape)
    }

    /// Metadata-only drift (labels, annotations) keeps the persisted payload
    /// as long as the declaration it came from is unchanged.
    fn overwrite(current: &Self, expected: Self) -> Self {
        let same_source =
            source_hash(current).is_some() && source_hash(current) == source_hash(&expected);
        let mut desired = adopt_identity(current, expected);
        if same_source {
            desired.data = current.data.clone();
            desired.string_data = None;
        }
        desired
    }
}

fn source_hash(secret: &Secret) -> Option<&str> {
    secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(SOURCE_HASH_ANNOTATION))
        .map(String::as_str)
}

/// What [`converge`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The object did not exist and was created
    Created,
    /// The object drifted and was replaced
    Updated,
    /// The object already matched; nothing was written
    Unchanged,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Result of a convergence pass
#[derive(Clone, Debug)]
pub struct Converged<K> {
    /// The object as it now exists in the cluster
    pub object: K,
    /// Which path was taken
    pub outcome: Outcome,
}

/// Read the template hash label of an object
pub fn hash_label<K: Resource>(object: &K) -> Option<&str> {
    object
        .meta()
        .labels
        .as_ref()
        .and_then(|labels| labels.get(TEMPLATE_HASH_LABEL))
        .map(String::as_str)
}

/// Push `expected` into the store on behalf of `owner`.
///
/// Performs exactly one write (create or update) or none when the persisted
/// object already carries the expected hash. An existing object is only
/// touched when `owner` is one of its owners, even when nothing would change.
pub async fn converge<K: Converge>(
    store: &dyn ObjectStore<K>,
    owner: &OwnerReference,
    mut expected: K,
) -> Result<Converged<K>, Error> {
    let kind = K::kind(&()).to_string();
    let name = expected.meta().name.clone().ok_or_else(|| {
        Error::internal_with_context("converge", format!("expected {kind} has no name"))
    })?;
    let namespace = expected.meta().namespace.clone().ok_or_else(|| {
        Error::internal_with_context("converge", format!("expected {kind} {name} has no namespace"))
    })?;

    let hash = expected.fingerprint();
    expected
        .meta_mut()
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(TEMPLATE_HASH_LABEL.to_string(), hash.clone());

    let Some(current) = store.get(&namespace, &name).await? else {
        expected.meta_mut().owner_references = Some(vec![owner.clone()]);
        let object = store.create(&expected).await?;
        info!(%kind, %namespace, %name, %hash, "created");
        return Ok(Converged {
            object,
            outcome: Outcome::Created,
        });
    };

    authorize(
        owner,
        &format!("{namespace}/{name}"),
        current.owner_references(),
    )?;

    if hash_label(&current) == Some(hash.as_str()) {
        debug!(%kind, %namespace, %name, "up to date");
        return Ok(Converged {
            object: current,
            outcome: Outcome::Unchanged,
        });
    }

    let desired = K::overwrite(&current, expected);
    let object = store.update(&desired).await?;
    info!(
        %kind,
        %namespace,
        %name,
        previous = hash_label(&current).unwrap_or("none"),
        %hash,
        "updated"
    );
    Ok(Converged {
        object,
        outcome: Outcome::Updated,
    })
}

fn without_hash_label<K: Resource + Clone>(object: &K) -> K {
    let mut copy = object.clone();
    if let Some(labels) = copy.meta_mut().labels.as_mut() {
        labels.remove(TEMPLATE_HASH_LABEL);
    }
    copy
}

fn adopt_identity<K: Resource>(current: &K, mut expected: K) -> K {
    let persisted = current.meta();
    let meta = expected.meta_mut();
    meta.uid = persisted.uid.clone();
    meta.resource_version = persisted.resource_version.clone();
    meta.creation_timestamp = persisted.creation_timestamp.clone();
    meta.owner_references = persisted.owner_references.clone();
    expected
}
