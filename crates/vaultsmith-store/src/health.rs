//! Store health probe
//!
//! One write, one read, one verdict. The probe writes the current time
//! under [`HEALTH_KEY`] and reads the latest version straight back. A
//! failed write or read points at connectivity or permissions; a read that
//! returns a different value points at the backend itself being
//! inconsistent.

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{BackendError, SecretBackend, SecretLocation};

/// Key the canary value is written under
pub const HEALTH_KEY: &str = "lastUpdated";

/// Why a health probe failed
#[derive(Debug, Error)]
pub enum HealthError {
    /// The canary could not be written
    #[error("unable to set health secret: {0}")]
    WriteFailed(#[source] BackendError),

    /// The canary could not be read back
    #[error("unable to get health secret: {0}")]
    ReadFailed(#[source] BackendError),

    /// The canary read back differs from what was written
    #[error("retrieved secret differs from expected value, received {received} but expected {expected}")]
    Mismatch {
        /// Value that was written
        expected: String,
        /// Value that was read
        received: String,
    },
}

impl HealthError {
    /// True when the backend answered but returned the wrong value
    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, HealthError::Mismatch { .. })
    }
}

/// Probe a store by round-tripping a timestamp.
///
/// Returns `Ok(true)` only when the value read back is byte-identical to
/// the value written.
pub async fn check_store_health(
    backend: &dyn SecretBackend,
    location: &dyn SecretLocation,
) -> Result<bool, HealthError> {
    let location = location.location();
    let canary = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);

    backend
        .set_value(location, HEALTH_KEY, &canary)
        .await
        .map_err(HealthError::WriteFailed)?;

    let received = backend
        .get_value(location, HEALTH_KEY, None)
        .await
        .map_err(HealthError::ReadFailed)?;

    if received != canary {
        warn!(location, "store returned a different health value than written");
        return Err(HealthError::Mismatch {
            expected: canary,
            received,
        });
    }

    debug!(location, "store health round trip succeeded");
    Ok(true)
}
