//! Environment configuration for the operator
//!
//! Environment access goes through [`EnvConfig`] so tests never touch
//! process-global state.

use vaultsmith_common::telemetry::LogFormat;
use vaultsmith_provisioner::DEFAULT_STORE_IMAGE;

/// Image for store deployments that do not name one
pub const ENV_STORE_IMAGE: &str = "VAULTSMITH_STORE_IMAGE";

/// Seed keying hmac generation; unset means a fresh random key per value
pub const ENV_HMAC_SEED: &str = "VAULTSMITH_HMAC_SEED";

/// `json` (default) or `plain`
pub const ENV_LOG_FORMAT: &str = "VAULTSMITH_LOG_FORMAT";

/// Reads operator settings from the environment
#[cfg_attr(test, mockall::automock)]
pub trait EnvConfig: Send + Sync {
    /// Value of an environment variable, if set
    fn var(&self, name: &str) -> Option<String>;
}

/// [`EnvConfig`] reading the process environment
#[derive(Clone, Default)]
pub struct OsEnvConfig;

impl EnvConfig for OsEnvConfig {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Resolved operator settings
#[derive(Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Default store image
    pub store_image: String,
    /// hmac seed, if configured
    pub hmac_seed: Option<String>,
    /// Log line format
    pub log_format: LogFormat,
}

impl std::fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("store_image", &self.store_image)
            .field("hmac_seed", &self.hmac_seed.as_ref().map(|_| "[REDACTED]"))
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl OperatorConfig {
    /// Read settings; empty values count as unset
    pub fn from_env(env: &dyn EnvConfig) -> anyhow::Result<Self> {
        let read = |name: &str| env.var(name).filter(|v| !v.trim().is_empty());

        let log_format = match read(ENV_LOG_FORMAT) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {ENV_LOG_FORMAT}: {e}"))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            store_image: read(ENV_STORE_IMAGE).unwrap_or_else(|| DEFAULT_STORE_IMAGE.to_string()),
            hmac_seed: read(ENV_HMAC_SEED),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_with(vars: &[(&str, &str)]) -> MockEnvConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut mock = MockEnvConfig::new();
        mock.expect_var().returning(move |name| vars.get(name).cloned());
        mock
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = OperatorConfig::from_env(&env_with(&[])).unwrap();
        assert_eq!(config.store_image, DEFAULT_STORE_IMAGE);
        assert!(config.hmac_seed.is_none());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_every_variable() {
        let config = OperatorConfig::from_env(&env_with(&[
            (ENV_STORE_IMAGE, "registry.local/store:2"),
            (ENV_HMAC_SEED, "cluster-seed"),
            (ENV_LOG_FORMAT, "plain"),
        ]))
        .unwrap();
        assert_eq!(config.store_image, "registry.local/store:2");
        assert_eq!(config.hmac_seed.as_deref(), Some("cluster-seed"));
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config =
            OperatorConfig::from_env(&env_with(&[(ENV_STORE_IMAGE, ""), (ENV_HMAC_SEED, "  ")]))
                .unwrap();
        assert_eq!(config.store_image, DEFAULT_STORE_IMAGE);
        assert!(config.hmac_seed.is_none());
    }

    #[test]
    fn unknown_log_format_is_an_error() {
        let err = OperatorConfig::from_env(&env_with(&[(ENV_LOG_FORMAT, "xml")])).unwrap_err();
        assert!(err.to_string().contains(ENV_LOG_FORMAT));
    }

    #[test]
    fn debug_hides_the_seed() {
        let config =
            OperatorConfig::from_env(&env_with(&[(ENV_HMAC_SEED, "cluster-seed")])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("cluster-seed"));
    }
}
