//! Secret backends for Vaultsmith
//!
//! The [`SecretBackend`] trait is the only thing the rest of the operator
//! knows about a secret manager. This crate provides the trait, resolution
//! of where a store keeps its secrets, a round-trip health probe, and two
//! implementations: in-memory (tests, local runs) and Kubernetes Secrets.

#![deny(missing_docs)]

pub mod backend;
pub mod health;
pub mod kube_backend;
pub mod location;
pub mod memory;

pub use backend::{BackendError, SecretBackend};
pub use health::{check_store_health, HealthError, HEALTH_KEY};
pub use kube_backend::KubeSecretBackend;
pub use location::{location_of, SecretLocation, StaticLocation};
pub use memory::InMemoryBackend;
