//! Store Deployment

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;
use vaultsmith_common::crd::SecretStore;
use vaultsmith_common::kube_utils::managed_labels;
use vaultsmith_common::Error;

use crate::pod_template::PodTemplateParams;
use crate::STORE_LABEL;

/// Old ReplicaSets are not kept around
const REVISION_HISTORY_LIMIT: i32 = 0;

/// Labels selecting the pods of a store's Deployment
pub fn selector_labels(store: &SecretStore) -> BTreeMap<String, String> {
    let mut labels = managed_labels(&store.deployment_name());
    labels.insert(STORE_LABEL.to_string(), store.name_any());
    labels
}

/// Everything that varies between store Deployments
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeploymentParams {
    /// Deployment name
    pub name: String,
    /// Deployment namespace
    pub namespace: String,
    /// Pod selector
    pub selector: BTreeMap<String, String>,
    /// Deployment labels
    pub labels: BTreeMap<String, String>,
    /// Pod template
    pub pod_template: PodTemplateSpec,
    /// Desired replicas
    pub replicas: i32,
    /// Rollout strategy
    pub strategy: DeploymentStrategy,
}

impl DeploymentParams {
    /// Parameters for the Deployment serving `store`
    pub fn for_store(store: &SecretStore, default_image: &str) -> Result<Self, Error> {
        let namespace = store.namespace().ok_or_else(|| {
            Error::validation_for_field(
                store.name_any(),
                "metadata.namespace",
                "store has no namespace",
            )
        })?;
        let selector = selector_labels(store);
        Ok(Self {
            name: store.deployment_name(),
            namespace,
            labels: selector.clone(),
            selector,
            pod_template: PodTemplateParams::for_store(store, default_image)?.build(),
            replicas: store.spec.replicas,
            // old and new store pods never overlap
            strategy: DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            },
        })
    }
}

/// Build a Deployment from its parameters
pub fn new_deployment(params: DeploymentParams) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(params.name),
            namespace: Some(params.namespace),
            labels: Some(params.labels),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            revision_history_limit: Some(REVISION_HISTORY_LIMIT),
            selector: LabelSelector {
                match_labels: Some(params.selector),
                ..Default::default()
            },
            template: params.pod_template,
            replicas: Some(params.replicas),
            strategy: Some(params.strategy),
            ..Default::default()
        }),
        ..Default::default()
    }
}
