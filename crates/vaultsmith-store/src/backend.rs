//! Backend capability

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Errors reported by a secret backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No value under the key (or version)
    #[error("secret {key} not found at {location}")]
    NotFound {
        /// Where the lookup happened
        location: String,
        /// Key that was looked up
        key: String,
    },

    /// The backend could not be reached or failed internally
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the request
    #[error("backend rejected request: {0}")]
    Rejected(String),
}

/// Read/write access to a secret manager.
///
/// `location` is the backend-specific container (GCP project, Key Vault
/// name, namespace) as resolved by [`crate::SecretLocation`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Store `value` under `key`, creating a new version if the key exists
    async fn set_value(&self, location: &str, key: &str, value: &str) -> Result<(), BackendError>;

    /// Read the value under `key`; `version` of `None` means the latest
    async fn get_value(
        &self,
        location: &str,
        key: &str,
        version: Option<String>,
    ) -> Result<String, BackendError>;
}
