//! jwtdeck CLI Library
//!
//! Command handlers for the `jwtdeck` binary. Each `*_cmd` module owns one
//! clap subcommand group and writes user-facing output to the given writer.

pub mod context;
pub mod history_cmd;
pub mod settings_cmd;
pub mod token_cmd;
