//! In-memory secret backend
//!
//! Keeps every version of every value. Versions are numbered from 1 in
//! write order, mirroring how cloud secret managers address versions.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{BackendError, SecretBackend};

/// Thread-safe in-memory [`SecretBackend`]
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    values: DashMap<(String, String), Vec<String>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value under `key`, if any
    pub fn get(&self, location: &str, key: &str) -> Option<String> {
        self.values
            .get(&(location.to_string(), key.to_string()))
            .and_then(|versions| versions.last().cloned())
    }

    /// Number of versions stored under `key`
    pub fn version_count(&self, location: &str, key: &str) -> usize {
        self.values
            .get(&(location.to_string(), key.to_string()))
            .map(|versions| versions.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SecretBackend for InMemoryBackend {
    async fn set_value(&self, location: &str, key: &str, value: &str) -> Result<(), BackendError> {
        self.values
            .entry((location.to_string(), key.to_string()))
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn get_value(
        &self,
        location: &str,
        key: &str,
        version: Option<String>,
    ) -> Result<String, BackendError> {
        let not_found = || BackendError::NotFound {
            location: location.to_string(),
            key: key.to_string(),
        };
        let versions = self
            .values
            .get(&(location.to_string(), key.to_string()))
            .ok_or_else(not_found)?;

        let value = match version.as_deref() {
            None | Some("latest") => versions.last(),
            Some(v) => {
                let index: usize = v
                    .parse()
                    .map_err(|_| BackendError::Rejected(format!("invalid version '{v}'")))?;
                index.checked_sub(1).and_then(|i| versions.get(i))
            }
        };
        value.cloned().ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_value_wins() {
        let backend = InMemoryBackend::new();
        backend.set_value("proj", "k", "one").await.unwrap();
        backend.set_value("proj", "k", "two").await.unwrap();

        assert_eq!(backend.get_value("proj", "k", None).await.unwrap(), "two");
        assert_eq!(backend.version_count("proj", "k"), 2);
    }

    #[tokio::test]
    async fn versions_are_addressable() {
        let backend = InMemoryBackend::new();
        backend.set_value("proj", "k", "one").await.unwrap();
        backend.set_value("proj", "k", "two").await.unwrap();

        let first = backend.get_value("proj", "k", Some("1".into())).await.unwrap();
        assert_eq!(first, "one");
        let latest = backend
            .get_value("proj", "k", Some("latest".into()))
            .await
            .unwrap();
        assert_eq!(latest, "two");

        assert!(matches!(
            backend.get_value("proj", "k", Some("3".into())).await,
            Err(BackendError::NotFound { .. })
        ));
        assert!(matches!(
            backend.get_value("proj", "k", Some("0".into())).await,
            Err(BackendError::NotFound { .. })
        ));
        assert!(matches!(
            backend.get_value("proj", "k", Some("v1".into())).await,
            Err(BackendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn locations_are_isolated() {
        let backend = InMemoryBackend::new();
        backend.set_value("a", "k", "in-a").await.unwrap();

        assert!(matches!(
            backend.get_value("b", "k", None).await,
            Err(BackendError::NotFound { .. })
        ));
        assert_eq!(backend.get("a", "k").as_deref(), Some("in-a"));
    }
}
