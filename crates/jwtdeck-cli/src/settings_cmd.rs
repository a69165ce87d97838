//! Settings subcommands: show, theme, help-seen.
//!
//! User-facing output uses writeln! to the given writer (stdout in the binary).

use std::io::Write;

use jwtdeck_core::Theme;

use crate::context::CliContext;

/// Settings subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum SettingsAction {
    /// Show persisted settings and resolved configuration.
    Show,
    /// Store the colour theme (light, dark, dark-grey).
    Theme { theme: Theme },
    /// Mark the first-run help as seen or unseen.
    HelpSeen {
        #[arg(action = clap::ArgAction::Set)]
        seen: bool,
    },
}

/// Execute a settings subcommand.
pub fn run(action: SettingsAction, ctx: &CliContext, out: &mut dyn Write) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => show(ctx, out),
        SettingsAction::Theme { theme } => {
            ctx.settings.set_theme(theme)?;
            writeln!(out, "Theme: {theme}")?;
            Ok(())
        }
        SettingsAction::HelpSeen { seen } => {
            ctx.settings.set_help_seen(seen)?;
            writeln!(out, "Help seen: {seen}")?;
            Ok(())
        }
    }
}

fn show(ctx: &CliContext, out: &mut dyn Write) -> anyhow::Result<()> {
    let config = &ctx.config;
    writeln!(out, "Theme:             {}", ctx.settings.theme())?;
    writeln!(out, "Help seen:         {}", ctx.settings.help_seen())?;
    match config.data_dir() {
        Ok(dir) => writeln!(out, "Data directory:    {}", dir.display())?,
        Err(_) => writeln!(out, "Data directory:    (unavailable)")?,
    }
    writeln!(out, "History limit:     {}", config.history.max_entries)?;
    writeln!(out, "Default algorithm: {}", config.signing.default_algorithm)?;
    writeln!(
        out,
        "Suggested expiry:  {}s",
        config.signing.suggested_lifetime_secs
    )?;
    writeln!(out, "Log level:         {}", config.log_level)?;
    Ok(())
}
