//! Editing session: the current token, its decoded view, and the edit loop.
//!
//! Every edit runs edit → re-sign → re-decode. The decoded view is never
//! written in place; a successful edit replaces the token and decodes it
//! again. When re-signing fails the intended header/payload is kept as a
//! [`Draft`] so the view still shows the edit, and the token is left as it
//! was.
//!
//! Re-signing may be driven off-thread with [`TokenSession::begin_resign`]
//! and [`TokenSession::complete_resign`]. Each ticket carries a sequence
//! number and only the most recently issued ticket may complete.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::claims::{self, DEFAULT_LIFETIME_SECS, StandardClaim};
use crate::error::{DecodeError, EditError, Error, SignError};
use crate::history::{HistoryEntry, HistoryStore};
use crate::timing;
use crate::token::{self, Algorithm, Claims, DecodedToken, VerificationResult};

/// A single user edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditIntent {
    SetClaim { claim: StandardClaim, value: i64 },
    ApplySuggestions,
    SetField { key: String, raw: String },
    AddField { key: String, raw: String },
    DeleteField { key: String },
    SetAlgorithm(Algorithm),
}

/// Header and payload the user asked for but that could not be signed.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub header: Claims,
    pub payload: Claims,
}

/// A pending re-sign, issued by [`TokenSession::begin_resign`].
#[derive(Debug, Clone)]
pub struct ResignTicket {
    sequence: u64,
    header: Claims,
    payload: Claims,
}

impl ResignTicket {
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    pub const fn header(&self) -> &Claims {
        &self.header
    }

    pub const fn payload(&self) -> &Claims {
        &self.payload
    }

    /// Sign the ticket's header and payload.
    pub fn sign(&self, secret: &[u8]) -> Result<String, SignError> {
        token::sign(&self.header, &self.payload, secret)
    }
}

/// HMAC secret as typed by the user.
///
/// The secret is always UTF-8 text. The base64 toggle only changes how it is
/// shown and entered.
#[derive(Clone, Default)]
pub struct SecretInput {
    secret: Zeroizing<String>,
}

impl SecretInput {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    pub fn display(&self, as_base64: bool) -> String {
        if as_base64 {
            STANDARD.encode(self.secret.as_bytes())
        } else {
            self.secret.to_string()
        }
    }

    /// Replace the secret from displayed text, decoding it first in base64 mode.
    pub fn set_from_display(&mut self, text: &str, as_base64: bool) -> Result<(), EditError> {
        let secret = if as_base64 {
            let bytes = STANDARD
                .decode(text.trim())
                .map_err(|e| EditError::InvalidSecret(format!("invalid base64: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|_| EditError::InvalidSecret("decoded secret is not UTF-8".to_string()))?
        } else {
            text.to_string()
        };
        self.secret = Zeroizing::new(secret);
        Ok(())
    }
}

impl fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretInput")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// The token being inspected plus everything derived from it.
#[derive(Debug)]
pub struct TokenSession {
    token: String,
    decoded: Option<DecodedToken>,
    draft: Option<Draft>,
    decode_error: Option<DecodeError>,
    secret: SecretInput,
    algorithm: Algorithm,
    verification: Option<VerificationResult>,
    issued: u64,
    suggested_lifetime: i64,
}

impl Default for TokenSession {
    fn default() -> Self {
        Self::new(SecretInput::default())
    }
}

impl TokenSession {
    pub fn new(secret: SecretInput) -> Self {
        Self {
            token: String::new(),
            decoded: None,
            draft: None,
            decode_error: None,
            secret,
            algorithm: Algorithm::HS256,
            verification: None,
            issued: 0,
            suggested_lifetime: DEFAULT_LIFETIME_SECS,
        }
    }

    /// Lifetime used for a suggested `exp`.
    #[must_use]
    pub fn with_suggested_lifetime(mut self, secs: i64) -> Self {
        self.suggested_lifetime = secs;
        self
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Last successfully decoded token. Kept when a later decode fails.
    pub const fn decoded(&self) -> Option<&DecodedToken> {
        self.decoded.as_ref()
    }

    pub const fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Error from the most recent [`set_token`](Self::set_token), if it failed.
    pub const fn decode_error(&self) -> Option<&DecodeError> {
        self.decode_error.as_ref()
    }

    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Select the algorithm used by [`verify`](Self::verify) without re-signing.
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
        self.verification = None;
    }

    pub const fn verification(&self) -> Option<&VerificationResult> {
        self.verification.as_ref()
    }

    pub const fn secret(&self) -> &SecretInput {
        &self.secret
    }

    pub fn secret_mut(&mut self) -> &mut SecretInput {
        &mut self.secret
    }

    /// Header to display: the draft's if an edit is pending, else the token's.
    pub fn header(&self) -> Option<&Claims> {
        self.draft
            .as_ref()
            .map(|d| &d.header)
            .or_else(|| self.decoded.as_ref().map(|d| &d.header))
    }

    /// Payload to display: the draft's if an edit is pending, else the token's.
    pub fn payload(&self) -> Option<&Claims> {
        self.draft
            .as_ref()
            .map(|d| &d.payload)
            .or_else(|| self.decoded.as_ref().map(|d| &d.payload))
    }

    /// Replace the token text and decode it.
    ///
    /// Blank input clears the view. A failed decode records the error, drops
    /// any pending draft and keeps the last decoded view; later edits start
    /// from that view.
    pub fn set_token(&mut self, input: &str) -> Result<(), DecodeError> {
        self.token = input.to_string();
        self.verification = None;

        if input.trim().is_empty() {
            self.decoded = None;
            self.draft = None;
            self.decode_error = None;
            return Ok(());
        }

        match token::decode(input) {
            Ok(decoded) => {
                if let Ok(alg) = decoded.alg().parse() {
                    self.algorithm = alg;
                }
                self.decoded = Some(decoded);
                self.draft = None;
                self.decode_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "keeping previous view after failed decode");
                self.draft = None;
                self.decode_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Apply an edit and re-sign with the session secret.
    pub fn apply_edit(&mut self, intent: EditIntent) -> Result<String, EditError> {
        let ticket = self.begin_resign(intent)?;
        let result = ticket.sign(self.secret.as_bytes());
        self.complete_resign(ticket, result)
    }

    /// Merge `intent` into the current view and issue a re-sign ticket.
    pub fn begin_resign(&mut self, intent: EditIntent) -> Result<ResignTicket, EditError> {
        let (header, payload) = match (self.header(), self.payload()) {
            (Some(h), Some(p)) => (h.clone(), p.clone()),
            _ => return Err(EditError::NoToken),
        };

        let (header, payload) = match intent {
            EditIntent::SetClaim { claim, value } => {
                (header, claims::set_claim(&payload, claim, value))
            }
            EditIntent::ApplySuggestions => (
                header,
                claims::apply_standard_suggestions(
                    &payload,
                    timing::now_secs(),
                    self.suggested_lifetime,
                ),
            ),
            EditIntent::SetField { key, raw } => (header, claims::set_field(&payload, &key, &raw)),
            EditIntent::AddField { key, raw } => (header, claims::add_field(&payload, &key, &raw)?),
            EditIntent::DeleteField { key } => (header, claims::delete_field(&payload, &key)),
            EditIntent::SetAlgorithm(alg) => {
                self.algorithm = alg;
                let mut header = header;
                header.insert("alg".to_string(), Value::String(alg.to_string()));
                (header, payload)
            }
        };

        self.issued += 1;
        Ok(ResignTicket {
            sequence: self.issued,
            header,
            payload,
        })
    }

    /// Finish a re-sign. Results for anything but the latest ticket are dropped.
    pub fn complete_resign(
        &mut self,
        ticket: ResignTicket,
        result: Result<String, SignError>,
    ) -> Result<String, EditError> {
        if ticket.sequence != self.issued {
            tracing::debug!(
                ticket = ticket.sequence,
                latest = self.issued,
                "dropping stale re-sign result"
            );
            return Err(EditError::Superseded {
                ticket: ticket.sequence,
                latest: self.issued,
            });
        }

        match result {
            Ok(token) => {
                self.set_token(&token)?;
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "re-sign failed, keeping edit as draft");
                self.draft = Some(Draft {
                    header: ticket.header,
                    payload: ticket.payload,
                });
                Err(EditError::Resign(e))
            }
        }
    }

    /// Verify the current token with the session algorithm.
    ///
    /// HMAC algorithms use the session secret; RSA/ECDSA use `public_key`.
    pub fn verify(&mut self, public_key: Option<&str>) -> &VerificationResult {
        let key = if self.algorithm.uses_public_key() {
            public_key.unwrap_or_default()
        } else {
            self.secret.expose()
        };
        let result = token::verify(&self.token, key, self.algorithm);
        self.verification.insert(result)
    }

    /// Save the current token under `name`, with the last verification outcome.
    pub fn save_to(&self, history: &mut HistoryStore, name: &str) -> Result<HistoryEntry, Error> {
        let decoded = self.decoded.as_ref().ok_or(EditError::NoToken)?;
        let verified = self.verification.as_ref().map(|v| v.valid);
        Ok(history.save(name, &self.token, decoded, verified)?)
    }

    /// Load a history entry's token into the session.
    pub fn load(&mut self, entry: &HistoryEntry) -> Result<(), DecodeError> {
        self.set_token(&entry.token)
    }

    /// Reset token, view, draft and verification. The secret is kept.
    pub fn clear(&mut self) {
        self.token.clear();
        self.decoded = None;
        self.draft = None;
        self.decode_error = None;
        self.verification = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::settings::PersistentSettings;

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                         eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IkpvaG4gRG9lIiwiaWF0IjoxNTE2MjM5MDIyfQ.\
                         ypNASjsXTW6nmFdRxHAw-7s7tLMLj_jKknIXprDZkSs";

    fn session() -> TokenSession {
        let mut session = TokenSession::new(SecretInput::new("your-secret-key"));
        session.set_token(TOKEN).unwrap();
        session
    }

    #[test]
    fn set_token_decodes_and_adopts_algorithm() {
        let mut session = TokenSession::default();
        let hs512 = {
            let mut s = session_with_secret("k");
            s.apply_edit(EditIntent::SetAlgorithm(Algorithm::HS512)).unwrap()
        };
        session.set_token(&hs512).unwrap();
        assert_eq!(session.algorithm(), Algorithm::HS512);
        assert_eq!(session.decoded().unwrap().alg(), "HS512");
    }

    fn session_with_secret(secret: &str) -> TokenSession {
        let mut session = TokenSession::new(SecretInput::new(secret));
        session.set_token(TOKEN).unwrap();
        session
    }

    #[test]
    fn failed_decode_keeps_previous_view() {
        let mut session = session();
        let before = session.decoded().cloned();
        assert!(session.set_token("not-a-token").is_err());
        assert_eq!(session.token(), "not-a-token");
        assert_eq!(session.decoded().cloned(), before);
        assert!(matches!(
            session.decode_error(),
            Some(DecodeError::MalformedStructure { .. })
        ));
    }

    #[test]
    fn failed_decode_drops_pending_draft() {
        let mut session = TokenSession::new(SecretInput::default());
        session.set_token(TOKEN).unwrap();
        assert!(session
            .apply_edit(EditIntent::SetField {
                key: "role".into(),
                raw: "admin".into(),
            })
            .is_err());
        assert!(session.draft().is_some());

        assert!(session.set_token("garbage").is_err());
        assert!(session.draft().is_none());
        assert!(session.payload().unwrap().get("role").is_none());

        session.secret_mut().set_from_display("k", false).unwrap();
        let token = session
            .apply_edit(EditIntent::SetField {
                key: "team".into(),
                raw: "core".into(),
            })
            .unwrap();
        let payload = &token::decode(&token).unwrap().payload;
        assert_eq!(payload["team"], "core");
        assert_eq!(payload["name"], "John Doe");
        assert!(payload.get("role").is_none());
    }

    #[test]
    fn blank_token_clears_view() {
        let mut session = session();
        session.set_token("   ").unwrap();
        assert!(session.decoded().is_none());
        assert!(session.payload().is_none());
    }

    #[test]
    fn claim_edit_resigns_and_redecodes() {
        let mut session = session();
        let token = session
            .apply_edit(EditIntent::SetClaim {
                claim: StandardClaim::Exp,
                value: 2_000_000_000,
            })
            .unwrap();
        assert_eq!(session.token(), token);
        let decoded = session.decoded().unwrap();
        assert_eq!(decoded.payload["exp"], 2_000_000_000_i64);
        assert_eq!(decoded.payload["name"], "John Doe");
        assert!(token::verify(&token, "your-secret-key", Algorithm::HS256).valid);
    }

    #[test]
    fn failed_resign_keeps_draft_and_token() {
        let mut session = TokenSession::new(SecretInput::default());
        session.set_token(TOKEN).unwrap();

        let err = session
            .apply_edit(EditIntent::SetField {
                key: "role".into(),
                raw: "admin".into(),
            })
            .unwrap_err();
        assert!(matches!(err, EditError::Resign(SignError::MissingSecret)));
        assert_eq!(session.token(), TOKEN);
        assert_eq!(session.payload().unwrap()["role"], "admin");
        assert!(session.decoded().unwrap().payload.get("role").is_none());

        // a later edit builds on the draft, and succeeds once a secret is set
        session.secret_mut().set_from_display("k", false).unwrap();
        session
            .apply_edit(EditIntent::SetField {
                key: "team".into(),
                raw: "core".into(),
            })
            .unwrap();
        assert!(session.draft().is_none());
        let payload = &session.decoded().unwrap().payload;
        assert_eq!(payload["role"], "admin");
        assert_eq!(payload["team"], "core");
    }

    #[test]
    fn switching_to_asymmetric_algorithm_is_kept_as_draft() {
        let mut session = session();
        let err = session
            .apply_edit(EditIntent::SetAlgorithm(Algorithm::RS256))
            .unwrap_err();
        assert!(matches!(err, EditError::Resign(SignError::UnsupportedAlgorithm(_))));
        assert_eq!(session.algorithm(), Algorithm::RS256);
        assert_eq!(session.header().unwrap()["alg"], "RS256");
        assert_eq!(session.decoded().unwrap().alg(), "HS256");
    }

    #[test]
    fn stale_resign_is_discarded() {
        let mut session = session();
        let first = session
            .begin_resign(EditIntent::SetField {
                key: "n".into(),
                raw: "1".into(),
            })
            .unwrap();
        let second = session
            .begin_resign(EditIntent::SetField {
                key: "n".into(),
                raw: "2".into(),
            })
            .unwrap();
        assert!(second.sequence() > first.sequence());

        let second_result = second.sign(b"your-secret-key");
        let first_result = first.sign(b"your-secret-key");
        let token = session.complete_resign(second, second_result).unwrap();
        let stale = session.complete_resign(first, first_result);

        assert!(matches!(stale, Err(EditError::Superseded { ticket: 1, latest: 2 })));
        assert_eq!(session.token(), token);
        assert_eq!(session.decoded().unwrap().payload["n"], 2);
    }

    #[test]
    fn edits_without_token_fail() {
        let mut session = TokenSession::default();
        assert!(matches!(
            session.apply_edit(EditIntent::ApplySuggestions),
            Err(EditError::NoToken)
        ));
    }

    #[test]
    fn suggestions_use_configured_lifetime() {
        let mut session = session_with_secret("k").with_suggested_lifetime(60);
        session.apply_edit(EditIntent::ApplySuggestions).unwrap();
        let payload = &session.decoded().unwrap().payload;
        let iat = payload["iat"].as_i64().unwrap();
        let nbf = payload["nbf"].as_i64().unwrap();
        let exp = payload["exp"].as_i64().unwrap();
        assert_eq!(iat, 1_516_239_022);
        assert_eq!(exp, nbf + 60);
    }

    #[test]
    fn verify_records_result_and_history_keeps_it() {
        let mut session = session();
        assert!(session.verify(None).valid);

        let mut history = HistoryStore::hydrate(PersistentSettings::in_memory());
        let entry = session.save_to(&mut history, "sample").unwrap();
        assert_eq!(entry.verified, Some(true));

        session.set_token(TOKEN).unwrap();
        assert!(session.verification().is_none());
    }

    #[test]
    fn verify_with_wrong_secret_fails() {
        let mut session = session_with_secret("wrong-secret");
        let result = session.verify(None);
        assert!(!result.valid);
        assert!(result.error_message().is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn load_restores_history_token() {
        let mut history = HistoryStore::hydrate(PersistentSettings::in_memory());
        let entry = session().save_to(&mut history, "saved").unwrap();

        let mut other = TokenSession::default();
        other.load(&entry).unwrap();
        assert_eq!(other.token(), TOKEN);
        assert_eq!(other.decoded(), Some(&entry.decoded));
    }

    #[test]
    fn secret_base64_display_roundtrip() {
        let mut secret = SecretInput::new("your-secret-key");
        assert_eq!(secret.display(true), "eW91ci1zZWNyZXQta2V5");
        secret.set_from_display("c2VjcmV0", true).unwrap();
        assert_eq!(secret.expose(), "secret");
        assert!(secret.set_from_display("***", true).is_err());
        assert!(secret.set_from_display("/w==", true).is_err());
        assert_eq!(secret.expose(), "secret");
        assert!(format!("{secret:?}").contains("REDACTED"));
    }

    #[test]
    fn clear_resets_everything_but_secret() {
        let mut session = session();
        session.verify(None);
        session.clear();
        assert!(session.token().is_empty());
        assert!(session.decoded().is_none());
        assert!(session.verification().is_none());
        assert_eq!(session.secret().expose(), "your-secret-key");
    }
}
