//! Property sourcing
//!
//! Resolves a declared property source to the bytes stored in the target
//! secret. Values are base64 encoded (standard alphabet, padded) before
//! they leave this module; the encoding is for transport, not protection.

use base64::{engine::general_purpose::STANDARD, Engine};
use vaultsmith_common::crd::PropertySource;

use crate::{GenerateError, GeneratorRegistry};

/// Resolves property sources through a [`GeneratorRegistry`]
#[derive(Debug, Clone, Default)]
pub struct PropertySourcer {
    registry: GeneratorRegistry,
}

impl PropertySourcer {
    /// Sourcer using the given registry
    pub fn new(registry: GeneratorRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a source to base64-encoded bytes
    pub fn resolve(&self, source: &PropertySource) -> Result<Vec<u8>, GenerateError> {
        let Some(generator) = &source.generator else {
            return Err(GenerateError::UnresolvableSource);
        };
        let value = self.registry.generate(generator)?;
        Ok(STANDARD.encode(value.expose()).into_bytes())
    }
}
