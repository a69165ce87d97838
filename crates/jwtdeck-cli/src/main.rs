//! jwtdeck CLI
//!
//! Decode, edit, re-sign and verify JSON Web Tokens from the terminal.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use jwtdeck_cli::context::CliContext;
use jwtdeck_cli::history_cmd::{self, HistoryAction};
use jwtdeck_cli::settings_cmd::{self, SettingsAction};
use jwtdeck_cli::token_cmd::{self, TokenAction};
use jwtdeck_core::config::load_config;
use jwtdeck_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "jwtdeck")]
#[command(version, about = "Decode, edit, re-sign and verify JSON Web Tokens", long_about = None)]
struct Cli {
    /// Directory for history and settings (default: ~/.jwtdeck).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Token(TokenAction),
    /// Manage saved tokens.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Manage persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config()?;
    CliContext::override_data_dir(&mut config, cli.data_dir);
    init_tracing(&config.log_level, cli.log_json);
    debug!(version = env!("CARGO_PKG_VERSION"), "starting jwtdeck");

    let ctx = CliContext::open(config)?;
    let mut input = io::stdin().lock();
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Token(action) => token_cmd::run(action, &ctx, &mut input, &mut out),
        Commands::History { action } => history_cmd::run(action, &ctx, &mut input, &mut out),
        Commands::Settings { action } => settings_cmd::run(action, &ctx, &mut out),
    }
}
