//! Common types for Vaultsmith: CRDs, errors, and the convergence core
//!
//! Everything a controller needs to push a derived object towards its
//! desired state lives here: the structural content hash, the
//! create-or-update engine, and the ownership check guarding shared objects.

#![deny(missing_docs)]

pub mod converge;
pub mod crd;
pub mod error;
pub mod hash;
pub mod kube_utils;
pub mod ownership;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the operator and its store deployments run in by default
pub const VAULTSMITH_SYSTEM_NAMESPACE: &str = "vaultsmith-system";

/// Label carrying the hash of a derived object's desired content
pub const TEMPLATE_HASH_LABEL: &str = "vaultsmith.dev/template-hash";

/// Annotation carrying the hash of the declaration a secret payload was generated from
pub const SOURCE_HASH_ANNOTATION: &str = "vaultsmith.dev/source-hash";

/// Standard Kubernetes name label
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Standard Kubernetes managed-by label
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value for the managed-by label on everything Vaultsmith creates
pub const LABEL_MANAGED_BY_VAULTSMITH: &str = "vaultsmith";

/// Requeue interval after a successful reconcile (drift detection)
pub const REQUEUE_SUCCESS_SECS: u64 = 300;

/// Requeue interval after a transient failure
pub const REQUEUE_ERROR_SECS: u64 = 30;

/// Requeue interval after a failure that needs a spec change to fix
pub const REQUEUE_INVALID_SECS: u64 = 300;
