//! `jwtdeck` Core Library
//!
//! Token state engine behind the jwtdeck tools:
//! - Compact JWT decoding and encoding
//! - HMAC signing and HMAC/RSA/ECDSA verification
//! - Claim editing with re-sign and re-decode
//! - Bounded token history and persisted settings
//! - Configuration resolution and common error types

pub mod claims;
pub mod config;
pub mod error;
pub mod history;
pub mod session;
pub mod settings;
pub mod share;
pub mod timing;
pub mod token;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use history::{HistoryEntry, HistoryStore};
pub use session::{EditIntent, SecretInput, TokenSession};
pub use settings::{PersistentSettings, Theme};
pub use token::{Algorithm, Claims, DecodedToken, VerificationResult};
