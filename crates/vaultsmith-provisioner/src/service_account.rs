//! GKE workload identity ServiceAccount

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use vaultsmith_common::crd::SecretStore;
use vaultsmith_common::kube_utils::managed_labels;
use vaultsmith_common::Error;

/// Annotation binding a Kubernetes ServiceAccount to a GCP service account
pub const GKE_SERVICE_ACCOUNT_ANNOTATION: &str = "iam.gke.io/gcp-service-account";

/// ServiceAccount the store runs as, for GCP stores using workload identity.
///
/// `Ok(None)` for every other store.
pub fn gcp_service_account(store: &SecretStore) -> Result<Option<ServiceAccount>, Error> {
    let Some(gcp) = &store.spec.provider.gcp_secrets_manager else {
        return Ok(None);
    };
    let Some(identity) = &gcp.auth.workload_identity else {
        return Ok(None);
    };
    let namespace = store.namespace().ok_or_else(|| {
        Error::validation_for_field(
            store.name_any(),
            "metadata.namespace",
            "store has no namespace",
        )
    })?;

    let member = format!(
        "{}@{}.iam.gserviceaccount.com",
        identity.gcp_service_account, gcp.project_id
    );
    Ok(Some(ServiceAccount {
        metadata: ObjectMeta {
            name: Some(identity.service_account.clone()),
            namespace: Some(namespace),
            labels: Some(managed_labels(&store.deployment_name())),
            annotations: Some(BTreeMap::from([(
                GKE_SERVICE_ACCOUNT_ANNOTATION.to_string(),
                member,
            )])),
            ..Default::default()
        },
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{azure_store, gcp_store};

    #[test]
    fn workload_identity_annotation_names_the_gcp_account() {
        let account = gcp_service_account(&gcp_store("gcp-prod", true))
            .unwrap()
            .expect("service account");
        assert_eq!(account.name_any(), "store-sa");
        assert_eq!(account.namespace().as_deref(), Some("vaultsmith-system"));
        assert_eq!(
            account.annotations()[GKE_SERVICE_ACCOUNT_ANNOTATION],
            "secret-reader@my-project.iam.gserviceaccount.com"
        );
    }

    #[test]
    fn other_stores_need_no_service_account() {
        assert!(gcp_service_account(&gcp_store("gcp-prod", false)).unwrap().is_none());
        assert!(gcp_service_account(&azure_store("kv")).unwrap().is_none());
    }
}
