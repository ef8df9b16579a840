//! SecretClaim reconciliation
//!
//! A claim is turned into a handler for its target kind (today only
//! Kubernetes Secrets), the handler sources every property and converges
//! the resulting object, and the controller records the outcome on the
//! claim's status.

#![deny(missing_docs)]

pub mod controller;
pub mod handler;
pub mod kubernetes;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::{
    error_policy, reconcile, ClaimContext, ClaimStatusClient, KubeClaimStatusClient,
};
pub use handler::{create_claim_handler, ClaimHandler};
pub use kubernetes::KubernetesClaimHandler;
