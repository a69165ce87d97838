//! JWT signing and signature verification.
//!
//! Signing is limited to the HMAC family: the tool re-signs edited tokens
//! with a shared secret. Verification covers every algorithm except `none`,
//! taking a UTF-8 secret for `HS*` and a PEM public key for `RS*`/`ES*`.
//! The cryptography itself is delegated to `jsonwebtoken`, and to `p521`
//! for ES512 which `jsonwebtoken` does not implement.

use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde_json::Value;

use super::algorithm::{Algorithm, AlgorithmFamily};
use super::codec::{self, BASE64_URL};
use super::Claims;
use crate::error::{SignError, VerifyFailure};
use crate::timing;

const PEM_LINE_WIDTH: usize = 64;

/// Outcome of [`verify`]. Never carries key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub error: Option<VerifyFailure>,
}

impl VerificationResult {
    const fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    const fn invalid(reason: VerifyFailure) -> Self {
        Self {
            valid: false,
            error: Some(reason),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Sign `header` and `payload` with an HMAC secret, returning a compact token.
///
/// The algorithm comes from the header's `alg`. A missing `typ` is appended as
/// `"JWT"`; every other header field is kept in its original order.
pub fn sign(header: &Claims, payload: &Claims, secret: &[u8]) -> Result<String, SignError> {
    let alg: Algorithm = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or(SignError::MissingAlgorithm)?
        .parse()?;

    let jwt_alg = match (alg.family(), alg.to_jsonwebtoken()) {
        (AlgorithmFamily::Hmac, Some(jwt_alg)) => jwt_alg,
        _ => return Err(SignError::UnsupportedAlgorithm(alg.to_string())),
    };
    if secret.is_empty() {
        return Err(SignError::MissingSecret);
    }

    let mut header = header.clone();
    if !header.contains_key("typ") {
        header.insert("typ".to_string(), Value::String("JWT".to_string()));
    }

    let signing_input = codec::signing_input(&header, payload)?;
    let signature = jsonwebtoken::crypto::sign(
        signing_input.as_bytes(),
        &EncodingKey::from_secret(secret),
        jwt_alg,
    )?;

    tracing::debug!(%alg, claims = payload.len(), "signed token");
    Ok(format!("{signing_input}.{signature}"))
}

/// Verify `token` against `key` using `algorithm`, at the current time.
pub fn verify(token: &str, key: &str, algorithm: Algorithm) -> VerificationResult {
    verify_at(token, key, algorithm, timing::now_secs())
}

/// Verify `token` as of `now` (Unix seconds).
///
/// For `HS*` the key is the raw secret; for `RS*`/`ES*` it is a PEM public
/// key, armored first if it has no `BEGIN`/`END` lines. After a good
/// signature, `exp` and `nbf` are checked without leeway.
pub fn verify_at(token: &str, key: &str, algorithm: Algorithm, now: i64) -> VerificationResult {
    match check(token, key, algorithm, now) {
        Ok(()) => VerificationResult::valid(),
        Err(reason) => {
            tracing::debug!(%algorithm, %reason, "verification failed");
            VerificationResult::invalid(reason)
        }
    }
}

fn check(token: &str, key: &str, algorithm: Algorithm, now: i64) -> Result<(), VerifyFailure> {
    if algorithm == Algorithm::None {
        return Err(VerifyFailure::UnsupportedAlgorithm);
    }

    let decoded = codec::decode(token)?;
    if decoded.alg() != algorithm.as_str() {
        return Err(VerifyFailure::AlgorithmMismatch {
            expected: algorithm.to_string(),
            actual: decoded.alg().to_string(),
        });
    }

    let message = decoded.signing_input();
    let signature = decoded.signature.trim_end_matches('=');

    match algorithm.family() {
        AlgorithmFamily::Hmac => {
            verify_with(&DecodingKey::from_secret(key.as_bytes()), algorithm, &message, signature)?;
        }
        AlgorithmFamily::Rsa | AlgorithmFamily::Ecdsa => {
            if key.trim().is_empty() {
                return Err(VerifyFailure::MissingPublicKey {
                    algorithm: algorithm.to_string(),
                });
            }
            let pem = armor_public_key(key);
            if algorithm == Algorithm::ES512 {
                verify_p521(&pem, &message, signature)?;
            } else {
                let decoding_key = if algorithm.family() == AlgorithmFamily::Rsa {
                    DecodingKey::from_rsa_pem(pem.as_bytes())
                } else {
                    DecodingKey::from_ec_pem(pem.as_bytes())
                }
                .map_err(library)?;
                verify_with(&decoding_key, algorithm, &message, signature)?;
            }
        }
        AlgorithmFamily::None => return Err(VerifyFailure::UnsupportedAlgorithm),
    }

    check_time_claims(&decoded.payload, now)
}

fn verify_with(
    key: &DecodingKey,
    algorithm: Algorithm,
    message: &str,
    signature: &str,
) -> Result<(), VerifyFailure> {
    let jwt_alg = algorithm
        .to_jsonwebtoken()
        .ok_or(VerifyFailure::UnsupportedAlgorithm)?;
    match jsonwebtoken::crypto::verify(signature, message.as_bytes(), key, jwt_alg) {
        Ok(true) => Ok(()),
        Ok(false) => Err(VerifyFailure::SignatureMismatch),
        Err(e) => Err(library(e)),
    }
}

fn verify_p521(pem: &str, message: &str, signature: &str) -> Result<(), VerifyFailure> {
    use p521::ecdsa::signature::Verifier;
    use p521::ecdsa::{Signature, VerifyingKey};
    use p521::pkcs8::DecodePublicKey;

    let public_key = p521::PublicKey::from_public_key_pem(pem).map_err(library)?;
    let verifying_key = VerifyingKey::from_affine(*public_key.as_affine()).map_err(library)?;
    let bytes = BASE64_URL.decode(signature).map_err(library)?;
    let signature = Signature::from_slice(&bytes).map_err(library)?;
    verifying_key
        .verify(message.as_bytes(), &signature)
        .map_err(|_| VerifyFailure::SignatureMismatch)
}

fn check_time_claims(payload: &Claims, now: i64) -> Result<(), VerifyFailure> {
    if let Some(exp) = numeric_claim(payload, "exp")? {
        if exp <= now {
            return Err(VerifyFailure::Expired { exp });
        }
    }
    if let Some(nbf) = numeric_claim(payload, "nbf")? {
        if nbf > now {
            return Err(VerifyFailure::NotYetValid { nbf });
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn numeric_claim(payload: &Claims, name: &str) -> Result<Option<i64>, VerifyFailure> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64))),
        Some(_) => Err(VerifyFailure::VerificationFailed(format!(
            "\"{name}\" claim must be a number"
        ))),
    }
}

/// Wrap a bare base64 key body in `PUBLIC KEY` armor.
///
/// Input that already has a `-----BEGIN` line is returned trimmed.
pub fn armor_public_key(key: &str) -> String {
    let key = key.trim();
    if key.contains("-----BEGIN") {
        return key.to_string();
    }
    let body: Vec<char> = key.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in body.chunks(PEM_LINE_WIDTH) {
        pem.extend(line);
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}

fn library(e: impl std::fmt::Display) -> VerifyFailure {
    VerifyFailure::VerificationFailed(e.to_string())
}
