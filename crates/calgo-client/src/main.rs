//! calgo CLI entry point.

use std::process::ExitCode;

use calgo_core::resolver::TZ_ENV;
use calgo_core::{TracingConfig, init_tracing};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use calgo_client::cli::{AuthAction, Cli, Command, ConfigAction};
use calgo_client::commands;
use calgo_client::config::{ClientConfig, Overrides};
use calgo_client::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = ClientConfig::load_optional(cli.config.as_deref())?;

    let (calendar_id, timezone) = match &cli.command {
        Command::Create(args) => (args.calendar.clone(), args.timezone.clone()),
        _ => (None, None),
    };
    let settings = config.resolve(&Overrides {
        credentials: cli.credentials.clone(),
        token: cli.token.clone(),
        calendar_id,
        timezone,
        ambient_tz: std::env::var(TZ_ENV).ok().filter(|tz| !tz.trim().is_empty()),
        debug: cli.debug,
    });

    let tracing_config = if settings.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(settings.log_format()?)) {
        eprintln!("warning: failed to initialize logging: {}", e);
    }
    debug!(?settings, "effective settings");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mode = cli.output_mode();
    match &cli.command {
        Command::Create(args) => commands::create::run(args, &settings, mode, &cancel).await,
        Command::Auth { action } => match action {
            AuthAction::Login { force } => {
                commands::auth::login(&settings, *force, mode, &cancel).await
            }
            AuthAction::Logout => commands::auth::logout(&settings, mode),
            AuthAction::Status => commands::auth::status(&settings, mode),
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&settings, cli.config.as_deref(), mode),
            ConfigAction::Validate => commands::config::validate(&settings, mode),
            ConfigAction::Path => commands::config::path(cli.config.as_deref()),
        },
    }
}
