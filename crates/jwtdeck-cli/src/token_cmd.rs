//! Token subcommands: decode, verify, sign, edit, share.
//!
//! User-facing output uses writeln! to the given writer (stdout in the binary).

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use serde_json::Value;

use jwtdeck_core::claims::{self, StandardClaim};
use jwtdeck_core::share::{self, DEFAULT_BASE_URL};
use jwtdeck_core::timing::{self, TokenStatus};
use jwtdeck_core::token::{self, Algorithm, Claims, DecodedToken};
use jwtdeck_core::{EditIntent, SecretInput, TokenSession};

use crate::context::CliContext;

/// Key material for signing and verification.
#[derive(clap::Args, Debug, Default)]
pub struct KeyArgs {
    /// HMAC secret as text.
    #[arg(long, conflicts_with = "secret_base64")]
    pub secret: Option<String>,
    /// HMAC secret given as standard base64 of its text.
    #[arg(long)]
    pub secret_base64: Option<String>,
    /// PEM file (or bare base64 body) with an RSA or EC public key.
    #[arg(long)]
    pub public_key: Option<PathBuf>,
}

impl KeyArgs {
    pub fn secret_input(&self) -> anyhow::Result<SecretInput> {
        let mut secret = SecretInput::default();
        if let Some(text) = &self.secret {
            secret.set_from_display(text, false)?;
        } else if let Some(encoded) = &self.secret_base64 {
            secret.set_from_display(encoded, true)?;
        }
        Ok(secret)
    }

    pub fn public_key(&self) -> anyhow::Result<Option<String>> {
        self.public_key
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read public key {}", path.display()))
            })
            .transpose()
    }
}

/// Token subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum TokenAction {
    /// Decode a token and show its header, payload and timing claims.
    Decode {
        /// Token to decode ("-" or omitted reads stdin).
        token: Option<String>,
        /// Read the token from a share link instead.
        #[arg(long, conflicts_with = "token")]
        link: Option<String>,
        /// Print the decoded token as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Verify a token's signature and timing claims.
    Verify {
        token: Option<String>,
        /// Algorithm to verify with. Defaults to the token's header.
        #[arg(long)]
        alg: Option<Algorithm>,
        #[command(flatten)]
        keys: KeyArgs,
    },
    /// Sign a header and payload with an HMAC secret.
    Sign {
        /// Header JSON object.
        #[arg(long, default_value = r#"{"alg":"HS256","typ":"JWT"}"#)]
        header: String,
        /// Payload JSON object.
        #[arg(long)]
        payload: String,
        #[command(flatten)]
        keys: KeyArgs,
    },
    /// Edit a token's claims and re-sign it.
    Edit {
        token: Option<String>,
        #[command(flatten)]
        keys: KeyArgs,
        /// Switch the signing algorithm.
        #[arg(long)]
        alg: Option<Algorithm>,
        /// Remove a claim.
        #[arg(long = "delete", value_name = "KEY")]
        delete: Vec<String>,
        /// Set a claim from text (JSON values are parsed).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Add a new claim.
        #[arg(long = "add", value_name = "KEY=VALUE")]
        add: Vec<String>,
        /// Set a timing claim to Unix seconds.
        #[arg(long = "claim", value_name = "iat|nbf|exp=SECS")]
        claim: Vec<String>,
        /// Fill missing iat, nbf and exp.
        #[arg(long)]
        suggest: bool,
    },
    /// Build a share link for a token.
    Share {
        token: Option<String>,
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },
}

/// Execute a token subcommand.
pub fn run(
    action: TokenAction,
    ctx: &CliContext,
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match action {
        TokenAction::Decode { token, link, json } => {
            let token = match link {
                Some(link) => share::token_from_link(&link)?,
                None => read_token(token, input)?,
            };
            decode(&token, json, out)
        }
        TokenAction::Verify { token, alg, keys } => {
            let token = read_token(token, input)?;
            verify(ctx, &token, alg, &keys, out)
        }
        TokenAction::Sign {
            header,
            payload,
            keys,
        } => sign(&header, &payload, &keys, out),
        TokenAction::Edit {
            token,
            keys,
            alg,
            delete,
            set,
            add,
            claim,
            suggest,
        } => {
            let token = read_token(token, input)?;
            let mut intents = Vec::new();
            intents.extend(alg.map(EditIntent::SetAlgorithm));
            intents.extend(delete.into_iter().map(|key| EditIntent::DeleteField { key }));
            for pair in set {
                let (key, raw) = split_pair(&pair)?;
                intents.push(EditIntent::SetField { key, raw });
            }
            for pair in add {
                let (key, raw) = split_pair(&pair)?;
                intents.push(EditIntent::AddField { key, raw });
            }
            for pair in claim {
                let (key, raw) = split_pair(&pair)?;
                let claim: StandardClaim = key.parse().map_err(anyhow::Error::msg)?;
                let value = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("'{raw}' is not a Unix timestamp"))?;
                intents.push(EditIntent::SetClaim { claim, value });
            }
            if suggest {
                intents.push(EditIntent::ApplySuggestions);
            }
            edit(ctx, &token, &keys, intents, out)
        }
        TokenAction::Share { token, base_url } => {
            let token = read_token(token, input)?;
            writeln!(out, "{}", share::share_link(&base_url, &token)?)?;
            Ok(())
        }
    }
}

/// Token from the argument, or from `input` when absent or `-`.
pub fn read_token(arg: Option<String>, input: &mut dyn Read) -> anyhow::Result<String> {
    if let Some(token) = arg.filter(|t| t != "-") {
        return Ok(token);
    }
    let mut buf = String::new();
    input.read_to_string(&mut buf)?;
    let token = buf.trim();
    if token.is_empty() {
        bail!("No token given. Pass it as an argument or on stdin");
    }
    Ok(token.to_string())
}

fn split_pair(pair: &str) -> anyhow::Result<(String, String)> {
    pair.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .with_context(|| format!("Expected KEY=VALUE, got '{pair}'"))
}

fn decode(token: &str, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let decoded = token::decode(token)?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&decoded)?)?;
        return Ok(());
    }
    print_decoded(&decoded, timing::now_secs(), out)
}

/// Human-readable rendering of a decoded token.
pub fn print_decoded(decoded: &DecodedToken, now: i64, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "Header:")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&decoded.header)?)?;
    writeln!(out)?;
    writeln!(out, "Payload:")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&decoded.payload)?)?;
    writeln!(out)?;
    writeln!(out, "Signature: {}", decoded.signature)?;

    let present = claims::present_standard_claims(&decoded.payload);
    if present.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    for claim in present {
        if let Some(secs) = decoded.payload.get(claim.as_str()).and_then(Value::as_i64) {
            let label = format!("{}:", claim.label());
            writeln!(out, "{label:<12} {}", timing::format_timestamp(secs))?;
        }
    }
    if let Some(exp) = decoded.payload.get("exp").and_then(Value::as_i64) {
        writeln!(out, "Remaining:   {}", timing::time_remaining(exp, now))?;
    }
    writeln!(out, "Status:      {}", TokenStatus::evaluate(&decoded.payload, now))?;
    Ok(())
}

fn verify(
    ctx: &CliContext,
    token: &str,
    alg: Option<Algorithm>,
    keys: &KeyArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut session = TokenSession::new(keys.secret_input()?)
        .with_algorithm(ctx.config.signing.default_algorithm);
    if let Err(e) = session.set_token(token) {
        tracing::debug!(error = %e, "token did not decode, verifying anyway");
    }
    if let Some(alg) = alg {
        session.set_algorithm(alg);
    }
    let algorithm = session.algorithm();
    let public_key = keys.public_key()?;
    let result = session.verify(public_key.as_deref());
    match result.error_message() {
        None => {
            writeln!(out, "Signature verified ({algorithm})")?;
            Ok(())
        }
        Some(message) => bail!("Invalid signature: {message}"),
    }
}

fn sign(header: &str, payload: &str, keys: &KeyArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let header: Claims =
        serde_json::from_str(header).context("Header must be a JSON object")?;
    let payload: Claims =
        serde_json::from_str(payload).context("Payload must be a JSON object")?;
    let secret = keys.secret_input()?;
    writeln!(out, "{}", token::sign(&header, &payload, secret.as_bytes())?)?;
    Ok(())
}

fn edit(
    ctx: &CliContext,
    token: &str,
    keys: &KeyArgs,
    intents: Vec<EditIntent>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if intents.is_empty() {
        bail!("Nothing to edit. Use --set, --add, --delete, --claim, --suggest or --alg");
    }
    let mut session = TokenSession::new(keys.secret_input()?)
        .with_suggested_lifetime(ctx.config.signing.suggested_lifetime_secs);
    session.set_token(token)?;
    for intent in intents {
        tracing::debug!(?intent, "applying edit");
        session.apply_edit(intent)?;
    }
    writeln!(out, "{}", session.token())?;
    Ok(())
}
