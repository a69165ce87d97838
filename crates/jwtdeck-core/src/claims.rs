//! Pure claim edits over a decoded payload.
//!
//! Every function takes the current payload by reference and returns a new
//! one; the caller re-signs the result. Unrecognized claims pass through
//! untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::EditError;
use crate::token::Claims;

/// Default lifetime for a suggested `exp`, in seconds.
pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Timing claims the editor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardClaim {
    Iat,
    Nbf,
    Exp,
}

impl StandardClaim {
    pub const ALL: [Self; 3] = [Self::Iat, Self::Nbf, Self::Exp];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iat => "iat",
            Self::Nbf => "nbf",
            Self::Exp => "exp",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Iat => "Issued At",
            Self::Nbf => "Not Before",
            Self::Exp => "Expiration",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == key)
    }
}

impl fmt::Display for StandardClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardClaim {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| format!("'{s}' is not one of iat, nbf, exp"))
    }
}

/// Overwrite one timing claim.
pub fn set_claim(payload: &Claims, claim: StandardClaim, value: i64) -> Claims {
    let mut next = payload.clone();
    next.insert(claim.as_str().to_string(), Value::from(value));
    next
}

/// Fill absent timing claims: `iat` and `nbf` with `now`, `exp` with
/// `now + lifetime`. Present values are never overwritten.
pub fn apply_standard_suggestions(payload: &Claims, now: i64, lifetime: i64) -> Claims {
    let mut next = payload.clone();
    for claim in StandardClaim::ALL {
        if is_present(&next, claim) {
            continue;
        }
        let value = match claim {
            StandardClaim::Iat | StandardClaim::Nbf => now,
            StandardClaim::Exp => now.saturating_add(lifetime),
        };
        next.insert(claim.as_str().to_string(), Value::from(value));
    }
    next
}

/// Set `key` from text typed into the editor.
///
/// Timing claims are parsed as numbers first. Anything else is tried as JSON
/// (objects, arrays, booleans, numbers, quoted strings) and falls back to the
/// raw text.
pub fn set_field(payload: &Claims, key: &str, raw: &str) -> Claims {
    let value = StandardClaim::from_key(key)
        .and_then(|_| parse_number(raw))
        .unwrap_or_else(|| parse_json_or_text(raw));
    let mut next = payload.clone();
    next.insert(key.to_string(), value);
    next
}

/// Add a new claim from the "add field" form. Blank keys are refused.
pub fn add_field(payload: &Claims, key: &str, raw: &str) -> Result<Claims, EditError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EditError::EmptyKey);
    }
    let mut next = payload.clone();
    next.insert(key.to_string(), parse_json_or_text(raw));
    Ok(next)
}

/// Remove `key` if present.
pub fn delete_field(payload: &Claims, key: &str) -> Claims {
    let mut next = payload.clone();
    next.shift_remove(key);
    next
}

/// Whether any of `iat`, `nbf`, `exp` is set.
pub fn has_standard_claims(payload: &Claims) -> bool {
    StandardClaim::ALL.into_iter().any(|c| is_present(payload, c))
}

pub fn present_standard_claims(payload: &Claims) -> Vec<StandardClaim> {
    StandardClaim::ALL
        .into_iter()
        .filter(|c| is_present(payload, *c))
        .collect()
}

fn is_present(payload: &Claims, claim: StandardClaim) -> bool {
    !matches!(payload.get(claim.as_str()), None | Some(Value::Null))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}

fn parse_json_or_text(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
