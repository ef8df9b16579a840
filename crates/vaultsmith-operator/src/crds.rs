//! CRD generation and installation
//!
//! The operator installs its own CRDs on startup with server-side apply, so
//! the installed schema always matches the running binary.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};
use vaultsmith_common::crd::{SecretClaim, SecretStore};
use vaultsmith_common::kube_utils::FIELD_MANAGER;

/// CRD definition with name and resource
struct CrdDef {
    name: &'static str,
    crd: CustomResourceDefinition,
}

fn vaultsmith_crds() -> Vec<CrdDef> {
    vec![
        CrdDef {
            name: "secretclaims.vaultsmith.dev",
            crd: SecretClaim::crd(),
        },
        CrdDef {
            name: "secretstores.vaultsmith.dev",
            crd: SecretStore::crd(),
        },
    ]
}

/// All CRDs as a multi-document YAML stream
pub fn crd_manifests() -> anyhow::Result<String> {
    let docs = vaultsmith_crds()
        .iter()
        .map(|def| {
            serde_yaml::to_string(&def.crd)
                .map_err(|e| anyhow::anyhow!("failed to serialize {} CRD: {}", def.name, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(docs.join("---\n"))
}

/// Install or update every CRD using server-side apply
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for def in vaultsmith_crds() {
        tracing::info!("Installing {} CRD...", def.name);
        crds.patch(def.name, &params, &Patch::Apply(&def.crd))
            .await
            .map_err(|e| anyhow::anyhow!("failed to install {} CRD: {}", def.name, e))?;
    }
    tracing::info!("All Vaultsmith CRDs installed/updated");
    Ok(())
}
