//! Keyed-hash token generation
//!
//! Tokens are HMAC-SHA256 tags over a fixed context label, hex encoded.
//! Without a configured seed each call keys the HMAC with fresh random
//! bytes, so successive tokens are independent. With a seed the token is a
//! stable function of the seed.

use aws_lc_rs::hmac;
use vaultsmith_common::hash::hex_encode;
use zeroize::Zeroizing;

use crate::GenerateError;

/// Message authenticated by every token
const CONTEXT: &[u8] = b"vaultsmith.dev/hmac-token/v1";

/// Size of a freshly generated key
const KEY_BYTES: usize = 32;

/// HMAC token generator
#[derive(Clone, Default)]
pub struct HmacGenerator {
    seed: Option<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for HmacGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacGenerator")
            .field("seeded", &self.seed.is_some())
            .finish()
    }
}

impl HmacGenerator {
    /// Generator keyed by fresh random bytes on every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator keyed by a fixed seed
    pub fn with_seed(seed: impl Into<Vec<u8>>) -> Self {
        Self {
            seed: Some(Zeroizing::new(seed.into())),
        }
    }

    /// Produce a token: 64 lowercase hex characters
    pub fn generate(&self) -> Result<Zeroizing<String>, GenerateError> {
        let key = match &self.seed {
            Some(seed) => hmac::Key::new(hmac::HMAC_SHA256, seed),
            None => {
                let mut raw = Zeroizing::new([0u8; KEY_BYTES]);
                aws_lc_rs::rand::fill(&mut raw[..])
                    .map_err(|_| GenerateError::RngUnavailable)?;
                hmac::Key::new(hmac::HMAC_SHA256, &raw[..])
            }
        };
        let tag = hmac::sign(&key, CONTEXT);
        Ok(Zeroizing::new(hex_encode(tag.as_ref())))
    }
}
