//! Error types for the jwtdeck core library.

use thiserror::Error;

/// Result type alias using the jwtdeck [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Umbrella error for jwtdeck operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Share(#[from] ShareError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a compact token could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Wrong number of segments, or an empty segment.
    #[error("Invalid JWT format: expected 'header.payload.signature', got {segments} segment(s)")]
    MalformedStructure { segments: usize },

    /// Header segment is not base64url-encoded JSON with an `alg`.
    #[error("Invalid header encoding: {0}")]
    InvalidEncoding(String),

    /// Payload segment is not base64url-encoded JSON object.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Errors produced while signing a token.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Header has no 'alg' parameter")]
    MissingAlgorithm,

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Only symmetric algorithms are signed by this tool.
    #[error("Signing with {0} is not supported")]
    UnsupportedAlgorithm(String),

    #[error("A secret is required to sign the token")]
    MissingSecret,

    #[error("Signing failed: {0}")]
    Crypto(#[from] jsonwebtoken::errors::Error),

    #[error("Failed to serialize token segment: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a token failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    /// `none` is never accepted, whatever the key.
    #[error("Algorithm 'none' is not secure")]
    UnsupportedAlgorithm,

    #[error("{algorithm} requires a public key")]
    MissingPublicKey { algorithm: String },

    #[error(transparent)]
    Malformed(#[from] DecodeError),

    #[error("Token is signed with {actual}, expected {expected}")]
    AlgorithmMismatch { expected: String, actual: String },

    #[error("Signature verification failed")]
    SignatureMismatch,

    #[error("\"exp\" claim timestamp check failed: token expired at {exp}")]
    Expired { exp: i64 },

    #[error("\"nbf\" claim timestamp check failed: token not valid before {nbf}")]
    NotYetValid { nbf: i64 },

    /// Message passed through from the crypto library.
    #[error("{0}")]
    VerificationFailed(String),
}

/// Errors from claim editing and the token session.
#[derive(Debug, Error)]
pub enum EditError {
    /// There is no decoded token to edit.
    #[error("No token loaded")]
    NoToken,

    #[error("Claim name must not be empty")]
    EmptyKey,

    /// The edit was applied to the view but the token could not be re-signed.
    #[error("Could not generate new token: {0}")]
    Resign(#[from] SignError),

    #[error("Re-signed token could not be decoded: {0}")]
    Redecode(#[from] DecodeError),

    /// A newer edit was issued before this result arrived.
    #[error("Edit #{ticket} superseded by edit #{latest}")]
    Superseded { ticket: u64, latest: u64 },

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),
}

/// Errors from the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History entry name must not be empty")]
    EmptyName,

    #[error("History entry not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from persistent settings storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be read or written.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to serialize value for '{key}': {source}")]
    Serialization {
        key: String,
        source: serde_json::Error,
    },
}

/// Errors building or reading a share link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Link has no 'token' parameter")]
    MissingToken,

    #[error("Nothing to share: token is empty")]
    EmptyToken,
}
