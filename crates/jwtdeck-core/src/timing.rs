//! Clock access and human-readable rendering of timing claims.

use std::fmt;

use chrono::DateTime;
use serde_json::Value;

use crate::token::Claims;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    secs
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    millis
}

/// Render Unix seconds as e.g. `Jan 18, 2018, 01:30:22 AM UTC`.
pub fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(
        || secs.to_string(),
        |dt| dt.format("%b %d, %Y, %I:%M:%S %p UTC").to_string(),
    )
}

/// Countdown text for an `exp` claim.
///
/// Future: `2d 3h 4m`, `3h 4m 5s`, `4m 5s` or `5s`.
/// Past: `Expired 2d ago`, `Expired 3h ago` or `Expired 4m ago`.
pub fn time_remaining(exp: i64, now: i64) -> String {
    let diff = exp.saturating_sub(now);
    let span = diff.unsigned_abs();
    let (days, hours, minutes, seconds) =
        (span / DAY, span % DAY / HOUR, span % HOUR / MINUTE, span % MINUTE);

    if diff <= 0 {
        return if days > 0 {
            format!("Expired {days}d ago")
        } else if hours > 0 {
            format!("Expired {hours}h ago")
        } else {
            format!("Expired {minutes}m ago")
        };
    }

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Temporal state of a payload's `nbf`/`exp` claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    NotYetValid { nbf: i64, now: i64 },
    Expired { exp: i64, now: i64 },
    Valid { exp: i64, now: i64 },
    NoExpiry,
}

impl TokenStatus {
    pub fn evaluate(payload: &Claims, now: i64) -> Self {
        if let Some(nbf) = seconds(payload, "nbf") {
            if nbf > now {
                return Self::NotYetValid { nbf, now };
            }
        }
        match seconds(payload, "exp") {
            Some(exp) if exp <= now => Self::Expired { exp, now },
            Some(exp) => Self::Valid { exp, now },
            None => Self::NoExpiry,
        }
    }

    pub const fn is_expired(self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NotYetValid { nbf, now } => {
                write!(f, "NOT YET VALID (valid in {})", time_remaining(nbf, now))
            }
            Self::Expired { exp, now } => {
                write!(f, "EXPIRED ({})", time_remaining(exp, now).trim_start_matches("Expired "))
            }
            Self::Valid { exp, now } => write!(f, "VALID (expires in {})", time_remaining(exp, now)),
            Self::NoExpiry => f.write_str("NO EXPIRY"),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn seconds(payload: &Claims, name: &str) -> Option<i64> {
    match payload.get(name)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    }
}
