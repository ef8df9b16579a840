//! Generator dispatch
//!
//! A declared [`PropertyGenerator`] is a pair of optional fields. It is
//! converted into the tagged [`GeneratorSpec`] first, which is where "none
//! set" and "both set" are rejected, then dispatched.

use vaultsmith_common::crd::PropertyGenerator;
use zeroize::Zeroizing;

use crate::hmac::HmacGenerator;
use crate::password::PasswordPolicy;
use crate::GenerateError;

/// Exactly one generator with its validated parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorSpec {
    /// Keyed-hash token
    Hmac,
    /// Random password
    Password(PasswordPolicy),
}

impl TryFrom<&PropertyGenerator> for GeneratorSpec {
    type Error = GenerateError;

    fn try_from(declared: &PropertyGenerator) -> Result<Self, Self::Error> {
        match (declared.hmac, &declared.password) {
            (true, None) => Ok(GeneratorSpec::Hmac),
            (false, Some(password)) => Ok(GeneratorSpec::Password(PasswordPolicy::new(password)?)),
            (false, None) => Err(GenerateError::UnresolvableGenerator(
                "no generator selected".to_string(),
            )),
            (true, Some(_)) => Err(GenerateError::UnresolvableGenerator(
                "hmac and password are mutually exclusive".to_string(),
            )),
        }
    }
}

impl GeneratorSpec {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorSpec::Hmac => "hmac",
            GeneratorSpec::Password(_) => "password",
        }
    }
}

/// A generated plaintext value.
///
/// Zeroized on drop; `Debug` never shows the value.
pub struct SynthesizedValue(Zeroizing<String>);

impl SynthesizedValue {
    /// The plaintext
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SynthesizedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SynthesizedValue([REDACTED; {} bytes])", self.0.len())
    }
}

/// Dispatches generator declarations to their implementation
#[derive(Debug, Clone, Default)]
pub struct GeneratorRegistry {
    hmac: HmacGenerator,
}

impl GeneratorRegistry {
    /// Registry with an unseeded hmac generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose hmac generator is keyed by a fixed seed
    pub fn with_hmac_seed(seed: impl Into<Vec<u8>>) -> Self {
        Self {
            hmac: HmacGenerator::with_seed(seed),
        }
    }

    /// Generate a value for a declared generator
    pub fn generate(&self, declared: &PropertyGenerator) -> Result<SynthesizedValue, GenerateError> {
        let spec = GeneratorSpec::try_from(declared)?;
        self.generate_spec(&spec)
    }

    /// Generate a value for an already resolved generator
    pub fn generate_spec(&self, spec: &GeneratorSpec) -> Result<SynthesizedValue, GenerateError> {
        tracing::trace!(generator = spec.name(), "generating value");
        let value = match spec {
            GeneratorSpec::Hmac => self.hmac.generate()?,
            GeneratorSpec::Password(policy) => policy.generate(),
        };
        Ok(SynthesizedValue(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultsmith_common::crd::PasswordGenerator;

    fn password(length: u32) -> PasswordGenerator {
        PasswordGenerator {
            length,
            num_digits: 2,
            num_symbols: 2,
            allow_repeat: true,
            ..Default::default()
        }
    }

    #[test]
    fn hmac_flag_selects_hmac() {
        let value = GeneratorRegistry::new()
            .generate(&PropertyGenerator {
                hmac: true,
                password: None,
            })
            .unwrap();
        assert_eq!(value.expose().len(), 64);
    }

    #[test]
    fn password_policy_selects_password() {
        let value = GeneratorRegistry::new()
            .generate(&PropertyGenerator {
                hmac: false,
                password: Some(password(12)),
            })
            .unwrap();
        assert_eq!(value.expose().chars().count(), 12);
    }

    #[test]
    fn empty_declaration_is_unresolvable() {
        let err = GeneratorRegistry::new()
            .generate(&PropertyGenerator::default())
            .unwrap_err();
        assert!(matches!(err, GenerateError::UnresolvableGenerator(_)));
    }

    #[test]
    fn both_generators_are_unresolvable() {
        let err = GeneratorSpec::try_from(&PropertyGenerator {
            hmac: true,
            password: Some(password(12)),
        })
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn invalid_policy_surfaces_as_validation() {
        let err = GeneratorSpec::try_from(&PropertyGenerator {
            hmac: false,
            password: Some(password(0)),
        })
        .unwrap_err();
        assert!(matches!(err, GenerateError::InvalidPolicy(_)));
    }

    #[test]
    fn seeded_registry_is_deterministic_for_hmac() {
        let declared = PropertyGenerator {
            hmac: true,
            password: None,
        };
        let a = GeneratorRegistry::with_hmac_seed("seed").generate(&declared).unwrap();
        let b = GeneratorRegistry::with_hmac_seed("seed").generate(&declared).unwrap();
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn debug_redacts_the_value() {
        let value = GeneratorRegistry::with_hmac_seed("seed")
            .generate(&PropertyGenerator {
                hmac: true,
                password: None,
            })
            .unwrap();
        let debug = format!("{value:?}");
        assert!(!debug.contains(value.expose()));
        assert!(debug.contains("REDACTED"));
    }
}
