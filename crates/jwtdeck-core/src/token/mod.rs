//! Compact JWT handling: codec, algorithms, signing and verification.

pub mod algorithm;
pub mod codec;
pub mod signer;

pub use algorithm::{Algorithm, AlgorithmFamily};
pub use codec::{DecodedToken, RawSegments, decode, encode, strip_bearer};
pub use signer::{VerificationResult, sign, verify, verify_at};

/// A JSON object as it appears in a header or payload, in insertion order.
pub type Claims = serde_json::Map<String, serde_json::Value>;
