//! Secret value synthesis for Vaultsmith
//!
//! Turns a declared property source into transport-ready bytes:
//!
//! ```text
//! PropertySource -> PropertySourcer -> GeneratorRegistry -> {password, hmac}
//!                                   <- base64 bytes
//! ```
//!
//! Plaintext values only live inside [`SynthesizedValue`], which zeroizes on
//! drop and never prints its contents.

#![deny(missing_docs)]

pub mod error;
pub mod hmac;
pub mod password;
pub mod registry;
pub mod source;

pub use error::GenerateError;
pub use registry::{GeneratorRegistry, GeneratorSpec, SynthesizedValue};
pub use source::PropertySourcer;
