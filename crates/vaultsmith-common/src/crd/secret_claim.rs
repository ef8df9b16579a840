//! SecretClaim CRD
//!
//! A SecretClaim asks Vaultsmith to materialize a set of properties into a
//! Kubernetes Secret. Each property names where its value comes from; today
//! the only source is a generator (random password or keyed hash).

use std::collections::{BTreeMap, HashSet};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{is_valid_data_key, is_valid_object_name};
use crate::Error;

/// SecretClaim declares a secret to be provisioned from generated values.
///
/// Example:
/// ```yaml
/// apiVersion: vaultsmith.dev/v1alpha1
/// kind: SecretClaim
/// metadata:
///   name: orders-db
///   namespace: orders
/// spec:
///   kubernetes:
///     name: orders-db-credentials
///     type: Opaque
///     labels:
///       app: orders
///     properties:
///       - name: password
///         source:
///           generator:
///             password:
///               length: 24
///               numDigits: 4
///               numSymbols: 2
///       - name: signing-key
///         source:
///           generator:
///             hmac: true
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "vaultsmith.dev",
    version = "v1alpha1",
    kind = "SecretClaim",
    namespaced,
    status = "SecretClaimStatus",
    printcolumn = r#"{"name":"Secret","type":"string","jsonPath":".spec.kubernetes.name"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretClaimSpec {
    /// Materialize the claim as a Kubernetes Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesClaim>,
}

/// Target Secret and the properties it holds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesClaim {
    /// Name of the Secret to create
    pub name: String,

    /// Namespace of the Secret; must be the claim's namespace when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Labels copied onto the Secret
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations copied onto the Secret
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Secret type (e.g. "Opaque")
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,

    /// Properties to source; each becomes one key of the Secret
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// A named property and the source of its value
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Key in the target Secret
    pub name: String,

    /// Where the value comes from
    #[serde(default)]
    pub source: PropertySource,
}

/// Value source for a property. At most one source kind may be set.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertySource {
    /// Generate the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<PropertyGenerator>,
}

/// Generator selection. Exactly one of `hmac` / `password` must be set.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyGenerator {
    /// Generate a keyed-hash token
    #[serde(default)]
    pub hmac: bool,

    /// Generate a password with the given policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordGenerator>,
}

/// Password policy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordGenerator {
    /// Total number of characters
    pub length: u32,

    /// Symbol alphabet to draw from instead of the default set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_symbols: Option<String>,

    /// Number of digits in the password
    #[serde(default)]
    pub num_digits: u32,

    /// Number of symbols in the password
    #[serde(default)]
    pub num_symbols: u32,

    /// Allow a character to appear more than once
    #[serde(default)]
    pub allow_repeat: bool,

    /// Only use lowercase letters
    #[serde(default)]
    pub no_upper: bool,
}

/// SecretClaim status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretClaimStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ClaimPhase,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// namespace/name of the provisioned Secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Generation of the spec last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last time the status changed (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// SecretClaim phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ClaimPhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Secret provisioned and converged
    Ready,
    /// Last reconcile failed
    Failed,
}

impl std::fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl SecretClaimSpec {
    /// Validate the claim declaration.
    ///
    /// Checks the target Secret name and property keys. Whether each
    /// property's source is resolvable is decided at sourcing time.
    pub fn validate(&self, claim: &str) -> Result<(), Error> {
        let Some(kubernetes) = &self.kubernetes else {
            return Ok(());
        };

        if !is_valid_object_name(&kubernetes.name) {
            return Err(Error::validation_for_field(
                claim,
                "spec.kubernetes.name",
                format!("'{}' is not a valid secret name", kubernetes.name),
            ));
        }
        if let Some(ns) = &kubernetes.namespace {
            if !is_valid_object_name(ns) {
                return Err(Error::validation_for_field(
                    claim,
                    "spec.kubernetes.namespace",
                    format!("'{ns}' is not a valid namespace"),
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, property) in kubernetes.properties.iter().enumerate() {
            let field = format!("spec.kubernetes.properties[{i}].name");
            if !is_valid_data_key(&property.name) {
                return Err(Error::validation_for_field(
                    claim,
                    field,
                    format!("'{}' is not a valid secret key", property.name),
                ));
            }
            if !seen.insert(property.name.as_str()) {
                return Err(Error::validation_for_field(
                    claim,
                    field,
                    format!("duplicate property '{}'", property.name),
                ));
            }
        }
        Ok(())
    }
}

impl SecretClaim {
    /// Validate the claim, including where its Secret may live.
    ///
    /// The Secret is owned by the claim and owner references only resolve
    /// within one namespace, so the Secret must live next to the claim.
    pub fn validate(&self) -> Result<(), Error> {
        let name = self.metadata.name.as_deref().unwrap_or_default();
        self.spec.validate(name)?;

        let requested = self
            .spec
            .kubernetes
            .as_ref()
            .and_then(|k| k.namespace.as_deref());
        if let Some(requested) = requested {
            if Some(requested) != self.metadata.namespace.as_deref() {
                return Err(Error::validation_for_field(
                    name,
                    "spec.kubernetes.namespace",
                    format!(
                        "secret namespace '{requested}' must match the claim namespace '{}'",
                        self.metadata.namespace.as_deref().unwrap_or_default()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Namespace the target Secret lives in
    pub fn target_namespace(&self) -> Option<&str> {
        self.spec
            .kubernetes
            .as_ref()
            .and_then(|k| k.namespace.as_deref())
            .or(self.metadata.namespace.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> SecretClaim {
        serde_yaml::from_str(yaml).expect("parse")
    }

    #[test]
    fn password_claim_yaml() {
        let claim = parse(
            r#"
apiVersion: vaultsmith.dev/v1alpha1
kind: SecretClaim
metadata:
  name: orders-db
  namespace: orders
spec:
  kubernetes:
    name: orders-db-credentials
    type: Opaque
    labels:
      app: orders
    properties:
      - name: password
        source:
          generator:
            password:
              length: 24
              numDigits: 4
              numSymbols: 2
              allowedSymbols: "!@#"
"#,
        );
        let kubernetes = claim.spec.kubernetes.as_ref().expect("kubernetes claim");
        assert_eq!(kubernetes.name, "orders-db-credentials");
        assert_eq!(kubernetes.secret_type.as_deref(), Some("Opaque"));
        assert_eq!(kubernetes.labels.get("app").map(String::as_str), Some("orders"));

        let generator = kubernetes.properties[0]
            .source
            .generator
            .as_ref()
            .expect("generator");
        assert!(!generator.hmac);
        let password = generator.password.as_ref().expect("password");
        assert_eq!(password.length, 24);
        assert_eq!(password.num_digits, 4);
        assert_eq!(password.num_symbols, 2);
        assert_eq!(password.allowed_symbols.as_deref(), Some("!@#"));
        assert!(!password.allow_repeat);
        assert!(!password.no_upper);
    }

    #[test]
    fn hmac_claim_yaml() {
        let claim = parse(
            r#"
apiVersion: vaultsmith.dev/v1alpha1
kind: SecretClaim
metadata:
  name: webhook
  namespace: hooks
spec:
  kubernetes:
    name: webhook-signing
    properties:
      - name: key
        source:
          generator:
            hmac: true
"#,
        );
        let kubernetes = claim.spec.kubernetes.as_ref().expect("kubernetes claim");
        let generator = kubernetes.properties[0]
            .source
            .generator
            .as_ref()
            .expect("generator");
        assert!(generator.hmac);
        assert!(generator.password.is_none());
    }

    #[test]
    fn target_namespace_defaults_to_claim_namespace() {
        let mut claim = parse(
            r#"
apiVersion: vaultsmith.dev/v1alpha1
kind: SecretClaim
metadata:
  name: c
  namespace: team-a
spec:
  kubernetes:
    name: s
"#,
        );
        assert_eq!(claim.target_namespace(), Some("team-a"));

        assert!(claim.validate().is_ok());

        if let Some(k) = claim.spec.kubernetes.as_mut() {
            k.namespace = Some("team-a".to_string());
        }
        assert_eq!(claim.target_namespace(), Some("team-a"));
        assert!(claim.validate().is_ok());
    }

    // Story: a claim in team-a asks for its Secret in team-b. The Secret
    // would carry an owner the garbage collector cannot see from team-b
    // and be deleted and regenerated on every pass, so it is refused.
    #[test]
    fn secret_outside_the_claim_namespace_is_rejected() {
        let mut claim = parse(
            r#"
apiVersion: vaultsmith.dev/v1alpha1
kind: SecretClaim
metadata:
  name: c
  namespace: team-a
spec:
  kubernetes:
    name: s
    namespace: team-b
"#,
        );
        let err = claim.validate().unwrap_err();
        match &err {
            Error::Validation { field, message, .. } => {
                assert_eq!(field.as_deref(), Some("spec.kubernetes.namespace"));
                assert!(message.contains("team-b"));
                assert!(message.contains("team-a"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(!err.is_retryable());

        claim.metadata.namespace = None;
        assert!(claim.validate().is_err());
    }

    #[test]
    fn claim_without_target_has_no_kubernetes_section() {
        let claim = parse(
            r#"
apiVersion: vaultsmith.dev/v1alpha1
kind: SecretClaim
metadata:
  name: empty
  namespace: default
spec: {}
"#,
        );
        assert!(claim.spec.kubernetes.is_none());
        assert!(claim.spec.validate("empty").is_ok());
    }

    fn spec_with(name: &str, keys: &[&str]) -> SecretClaimSpec {
        SecretClaimSpec {
            kubernetes: Some(KubernetesClaim {
                name: name.to_string(),
                properties: keys
                    .iter()
                    .map(|k| Property {
                        name: k.to_string(),
                        source: PropertySource::default(),
                    })
                    .collect(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn validate_rejects_bad_secret_name() {
        let err = spec_with("Bad_Name", &["a"]).validate("c").unwrap_err();
        assert!(err.to_string().contains("Bad_Name"));
    }

    #[test]
    fn validate_rejects_duplicate_and_invalid_keys() {
        let err = spec_with("s", &["a", "a"]).validate("c").unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let err = spec_with("s", &["a b"]).validate("c").unwrap_err();
        assert!(err.to_string().contains("not a valid secret key"));

        assert!(spec_with("s", &["a", "b.c", "d_e"]).validate("c").is_ok());
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = SecretClaimStatus {
            phase: ClaimPhase::Ready,
            observed_generation: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["phase"], "Ready");
        assert_eq!(json["observedGeneration"], 3);
        assert!(json.get("message").is_none());
    }
}
