//! Generation errors

use thiserror::Error;

/// Errors raised while synthesizing a property value
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The generator declaration selects no generator, or more than one
    #[error("unable to determine property generator: {0}")]
    UnresolvableGenerator(String),

    /// The property declares no source we know how to resolve
    #[error("unable to determine how to source property")]
    UnresolvableSource,

    /// The password policy admits no valid password
    #[error("invalid password policy: {0}")]
    InvalidPolicy(String),

    /// The system random number generator failed
    #[error("random number generator unavailable")]
    RngUnavailable,
}

impl GenerateError {
    /// Attach the property name and convert into the operator error type
    pub fn for_property(self, property: &str) -> vaultsmith_common::Error {
        match self {
            GenerateError::UnresolvableSource => {
                vaultsmith_common::Error::unresolvable_source(property)
            }
            GenerateError::UnresolvableGenerator(msg) => {
                vaultsmith_common::Error::unresolvable_generator(format!("{property}: {msg}"))
            }
            GenerateError::InvalidPolicy(msg) => vaultsmith_common::Error::validation_for_field(
                property,
                "source.generator.password",
                msg,
            ),
            GenerateError::RngUnavailable => {
                vaultsmith_common::Error::internal_with_context("generate", self.to_string())
            }
        }
    }
}

impl From<GenerateError> for vaultsmith_common::Error {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::UnresolvableSource => {
                vaultsmith_common::Error::unresolvable_source("unknown")
            }
            other => other.for_property("unknown"),
        }
    }
}
