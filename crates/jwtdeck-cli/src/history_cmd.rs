//! History subcommands: save, list, show, remove, clear.
//!
//! User-facing output uses writeln! to the given writer (stdout in the binary).

use std::io::{Read, Write};

use jwtdeck_core::{TokenSession, timing};

use crate::context::CliContext;
use crate::token_cmd::{self, KeyArgs};

/// History subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum HistoryAction {
    /// Save a token under a name.
    Save {
        name: String,
        /// Token to save ("-" or omitted reads stdin).
        token: Option<String>,
        /// Verify before saving and record the outcome.
        #[command(flatten)]
        keys: KeyArgs,
    },
    /// List saved tokens, most recent first.
    List,
    /// Show one saved token.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove a saved token.
    Remove { id: String },
    /// Remove every saved token.
    Clear,
}

/// Execute a history subcommand.
pub fn run(
    action: HistoryAction,
    ctx: &CliContext,
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match action {
        HistoryAction::Save { name, token, keys } => {
            let token = token_cmd::read_token(token, input)?;
            save(ctx, &name, &token, &keys, out)
        }
        HistoryAction::List => list(ctx, out),
        HistoryAction::Show { id, json } => show(ctx, &id, json, out),
        HistoryAction::Remove { id } => {
            if ctx.history().remove(&id)? {
                writeln!(out, "Removed {id}")?;
            } else {
                writeln!(out, "No history entry {id}")?;
            }
            Ok(())
        }
        HistoryAction::Clear => {
            ctx.history().clear()?;
            writeln!(out, "History cleared")?;
            Ok(())
        }
    }
}

fn save(
    ctx: &CliContext,
    name: &str,
    token: &str,
    keys: &KeyArgs,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut session = TokenSession::new(keys.secret_input()?);
    session.set_token(token)?;

    let public_key = keys.public_key()?;
    if !session.secret().is_empty() || public_key.is_some() {
        let valid = session.verify(public_key.as_deref()).valid;
        tracing::debug!(valid, "verified before saving");
    }

    let mut history = ctx.history();
    let entry = session.save_to(&mut history, name)?;
    writeln!(out, "Saved {} ({})", entry.name, entry.id)?;
    Ok(())
}

fn list(ctx: &CliContext, out: &mut dyn Write) -> anyhow::Result<()> {
    let history = ctx.history();
    if history.is_empty() {
        writeln!(out, "No saved tokens")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<36} {:<20} {:<30} {:<8}",
        "ID", "NAME", "SAVED", "VERIFIED"
    )?;
    for entry in history.entries() {
        let verified = match entry.verified {
            Some(true) => "yes",
            Some(false) => "no",
            None => "-",
        };
        writeln!(
            out,
            "{:<36} {:<20} {:<30} {:<8}",
            entry.id,
            entry.name,
            timing::format_timestamp(entry.saved_at / 1000),
            verified
        )?;
    }
    Ok(())
}

fn show(ctx: &CliContext, id: &str, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let history = ctx.history();
    let entry = history.load(id)?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(entry)?)?;
        return Ok(());
    }
    writeln!(out, "Name:  {}", entry.name)?;
    writeln!(out, "Saved: {}", timing::format_timestamp(entry.saved_at / 1000))?;
    writeln!(out, "Token: {}", entry.token)?;
    writeln!(out)?;
    token_cmd::print_decoded(&entry.decoded, timing::now_secs(), out)
}
