//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputMode;

/// calgo - Create Google Calendar events from the terminal
#[derive(Debug, Parser)]
#[command(name = "calgo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "CALGO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the OAuth client credentials JSON file
    #[arg(long, global = true, env = "GOOGLE_CALENDAR_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Path to the stored OAuth token
    #[arg(long, global = true, env = "GOOGLE_CALENDAR_TOKEN")]
    pub token: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true, group = "output_format")]
    pub json: bool,

    /// Print only identifiers, no decoration
    #[arg(long, short, global = true, group = "output_format")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Returns the output mode based on CLI flags.
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Plain
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a calendar event
    Create(CreateArgs),

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `calgo create`.
#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Event title
    #[arg(long, short)]
    pub title: String,

    /// Start time: "2024-01-15 14:00", "tomorrow 14:00", "14:00", "in 2 hours"
    #[arg(long, short)]
    pub start: String,

    /// Duration: "30m", "1h30m", or plain minutes
    #[arg(long, short)]
    pub duration: Option<String>,

    /// Event description
    #[arg(long)]
    pub description: Option<String>,

    /// Event location
    #[arg(long, short)]
    pub location: Option<String>,

    /// IANA timezone for the start time, e.g. "Europe/Paris"
    #[arg(long, visible_alias = "tz")]
    pub timezone: Option<String>,

    /// Target calendar ID
    #[arg(long, env = "GOOGLE_CALENDAR_ID")]
    pub calendar: Option<String>,
}

/// Authentication actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Authorize calgo with Google Calendar
    Login {
        /// Force re-authentication even if already authenticated
        #[arg(long, short)]
        force: bool,
    },

    /// Remove the stored token
    Logout,

    /// Show the stored token state
    Status,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
