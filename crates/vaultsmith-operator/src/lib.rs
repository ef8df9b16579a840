//! Vaultsmith operator
//!
//! Wiring for the `vaultsmith` binary: environment configuration, CRD
//! installation, controller construction and the out-of-band store health
//! check.

#![deny(missing_docs)]

/// Environment configuration
pub mod config;
/// Controller construction and run loop helpers
pub mod controller_runner;
/// CRD generation and installation
pub mod crds;
/// `vaultsmith health` subcommand
pub mod health;
