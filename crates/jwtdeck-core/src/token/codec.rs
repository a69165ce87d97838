//! Compact JWT serialization.
//!
//! Splits a token into its three segments, base64url-decodes the header and
//! payload as JSON objects, and re-joins segments when encoding. JSON is
//! serialized in the insertion order of the maps, so a re-encoded segment is
//! byte-stable for the same input object.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Claims;
use crate::error::DecodeError;

/// Base64url engine: never pads on encode, accepts padded or bare input.
pub(crate) const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const BEARER_PREFIX: &str = "bearer ";

/// The three segments exactly as they appeared in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSegments {
    pub header: String,
    pub payload: String,
    pub signature: String,
}

/// Structured, read-only view of a compact token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedToken {
    pub header: Claims,
    pub payload: Claims,
    /// Third segment, base64url text.
    pub signature: String,
    pub raw: RawSegments,
}

impl DecodedToken {
    /// The header's `alg` value.
    pub fn alg(&self) -> &str {
        self.header
            .get("alg")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn typ(&self) -> Option<&str> {
        self.header.get("typ").and_then(Value::as_str)
    }

    /// `header.payload`, the bytes the signature covers.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.raw.header, self.raw.payload)
    }
}

/// Remove a leading, case-insensitive `Bearer ` and surrounding whitespace.
pub fn strip_bearer(input: &str) -> &str {
    let trimmed = input.trim();
    match trimmed.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => {
            trimmed[BEARER_PREFIX.len()..].trim_start()
        }
        _ => trimmed,
    }
}

/// Split a compact token into exactly three non-empty segments.
pub fn split(token: &str) -> Result<(&str, &str, &str), DecodeError> {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        [header, payload, signature]
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok((header, payload, signature))
        }
        _ => Err(DecodeError::MalformedStructure {
            segments: parts.len(),
        }),
    }
}

/// Decode a compact token, tolerating a `Bearer ` prefix.
pub fn decode(token: &str) -> Result<DecodedToken, DecodeError> {
    let (header_b64, payload_b64, signature) = split(strip_bearer(token))?;

    let header = decode_object(header_b64).map_err(DecodeError::InvalidEncoding)?;
    match header.get("alg") {
        Some(Value::String(_)) => {}
        _ => {
            return Err(DecodeError::InvalidEncoding(
                "header has no string 'alg' parameter".to_string(),
            ));
        }
    }
    let payload = decode_object(payload_b64).map_err(DecodeError::InvalidPayload)?;

    tracing::debug!(
        alg = header.get("alg").and_then(serde_json::Value::as_str),
        claims = payload.len(),
        "decoded token"
    );

    Ok(DecodedToken {
        header,
        payload,
        signature: signature.to_string(),
        raw: RawSegments {
            header: header_b64.to_string(),
            payload: payload_b64.to_string(),
            signature: signature.to_string(),
        },
    })
}

/// Join an already-encoded header and payload with a signature.
pub fn encode(header: &Claims, payload: &Claims, signature: &str) -> Result<String, serde_json::Error> {
    Ok(format!("{}.{signature}", signing_input(header, payload)?))
}

/// `base64url(JSON(header)) + "." + base64url(JSON(payload))`.
pub fn signing_input(header: &Claims, payload: &Claims) -> Result<String, serde_json::Error> {
    Ok(format!(
        "{}.{}",
        encode_segment(header)?,
        encode_segment(payload)?
    ))
}

pub fn encode_segment(object: &Claims) -> Result<String, serde_json::Error> {
    Ok(BASE64_URL.encode(serde_json::to_vec(object)?))
}

/// Base64url-decode a segment and parse it as a JSON object.
fn decode_object(segment: &str) -> Result<Claims, String> {
    let bytes = BASE64_URL
        .decode(segment)
        .map_err(|e| format!("invalid base64url: {e}"))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, found {}", json_kind(&other))),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    // Header: {"alg":"HS256","typ":"JWT"}
    // Payload: {"sub":"1234567890","name":"John Doe","iat":1516239022}
    const SAMPLE: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                          eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ.\
                          ypNASjsXTW6nmFdRxHAw-7s7tLMLj_jKknIXprDZkSs";

    fn object(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn decode_sample_token() {
        let decoded = decode(SAMPLE).unwrap();
        assert_eq!(decoded.alg(), "HS256");
        assert_eq!(decoded.typ(), Some("JWT"));
        assert_eq!(decoded.payload["sub"], "1234567890");
        assert_eq!(decoded.payload["iat"], 1_516_239_022);
        assert_eq!(decoded.signature, "ypNASjsXTW6nmFdRxHAw-7s7tLMLj_jKknIXprDZkSs");
        assert_eq!(decoded.raw.header, "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
    }

    #[test]
    fn wrong_segment_counts_are_malformed() {
        for input in ["abc", "a.b", "a.b.c.d", "", "..", "a..c"] {
            assert!(
                matches!(decode(input), Err(DecodeError::MalformedStructure { .. })),
                "{input:?} should be malformed"
            );
        }
    }

    #[test]
    fn bad_header_is_invalid_encoding() {
        let err = decode("!!!.eyJzdWIiOiJ4In0.sig").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding(_)));

        // {"typ":"JWT"} has no alg
        let err = decode("eyJ0eXAiOiJKV1QifQ.eyJzdWIiOiJ4In0.sig").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding(_)));
    }

    #[test]
    fn bad_payload_is_invalid_payload() {
        // payload "bm90IGpzb24" = "not json"
        let err = decode("eyJhbGciOiJIUzI1NiJ9.bm90IGpzb24.sig").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload(_)));

        // payload "WzFd" = [1]
        let err = decode("eyJhbGciOiJIUzI1NiJ9.WzFd.sig").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPayload(ref m) if m.contains("array")));
    }

    #[test]
    fn bearer_prefix_is_stripped_case_insensitively() {
        let plain = decode(SAMPLE).unwrap();
        for prefix in ["Bearer ", "bearer ", "BEARER  ", "  Bearer "] {
            assert_eq!(decode(&format!("{prefix}{SAMPLE}")).unwrap(), plain);
        }
    }

    #[test]
    fn strip_bearer_leaves_other_text_alone() {
        assert_eq!(strip_bearer("Bearerx.y.z"), "Bearerx.y.z");
        assert_eq!(strip_bearer(" a.b.c\n"), "a.b.c");
    }

    #[test]
    fn padded_segments_decode() {
        // {"alg":"HS256"} padded to a multiple of four
        let padded = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ4In0=.sig";
        let decoded = decode(padded).unwrap();
        assert_eq!(decoded.payload["sub"], "x");
    }

    #[test]
    fn encode_preserves_insertion_order() {
        let header = object(json!({"typ": "JWT", "alg": "HS256"}));
        let payload = object(json!({"z": 1, "a": 2}));
        let token = encode(&header, &payload, "sig").unwrap();
        let decoded = decode(&token).unwrap();
        let keys: Vec<&String> = decoded.header.keys().collect();
        assert_eq!(keys, ["typ", "alg"]);
        let keys: Vec<&String> = decoded.payload.keys().collect();
        assert_eq!(keys, ["z", "a"]);
        assert!(token.ends_with(".sig"));
        assert!(!token.contains('='));
    }

    #[test]
    fn signing_input_matches_raw_segments() {
        let decoded = decode(SAMPLE).unwrap();
        assert_eq!(
            signing_input(&decoded.header, &decoded.payload).unwrap(),
            decoded.signing_input()
        );
    }
}
