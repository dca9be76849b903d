//! Authentication commands.

use calgo_providers::google::{Authenticator, TokenState};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::error::ClientResult;
use crate::output::{OutputMode, render_status};

/// Runs the authorization flow unless a usable token is already stored.
pub async fn login(
    settings: &Settings,
    force: bool,
    mode: OutputMode,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let authenticator = Authenticator::new(settings.google_config());
    login_with(&authenticator, force, mode, cancel).await
}

async fn login_with(
    authenticator: &Authenticator,
    force: bool,
    mode: OutputMode,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    if !force && authenticator.status().state == TokenState::Valid {
        if mode == OutputMode::Plain {
            println!("Already authenticated with Google Calendar.");
            println!("Use --force to re-authenticate.");
        } else {
            println!("{}", render_status(&authenticator.status(), mode)?);
        }
        return Ok(());
    }

    if mode == OutputMode::Plain {
        println!("Starting Google Calendar authentication...");
        println!("A browser window will open for you to authorize access.");
    }

    if force {
        authenticator.reauthorize(cancel).await?;
    } else {
        authenticator.get_token(cancel).await?;
    }
    info!("Google authentication successful");

    if mode == OutputMode::Plain {
        println!("Authentication successful!");
        println!("Token saved to {}", authenticator.token_path().display());
    } else {
        println!("{}", render_status(&authenticator.status(), mode)?);
    }
    Ok(())
}

/// Removes the stored token.
pub fn logout(settings: &Settings, mode: OutputMode) -> ClientResult<()> {
    let authenticator = Authenticator::new(settings.google_config());
    let had_token = authenticator.has_saved_token();
    authenticator.clear_token()?;

    match mode {
        OutputMode::Plain if had_token => println!(
            "Removed token {}",
            authenticator.token_path().display()
        ),
        OutputMode::Plain => println!("No stored token."),
        _ => println!("{}", render_status(&authenticator.status(), mode)?),
    }
    Ok(())
}

/// Prints the stored token state.
pub fn status(settings: &Settings, mode: OutputMode) -> ClientResult<()> {
    let authenticator = Authenticator::new(settings.google_config());
    println!("{}", render_status(&authenticator.status(), mode)?);
    Ok(())
}
