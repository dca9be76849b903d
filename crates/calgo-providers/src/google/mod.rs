//! Google Calendar backend.
//!
//! # Authentication Flow
//!
//! 1. The user provides their own OAuth client descriptor (required by Google)
//! 2. A loopback listener starts on an OS-assigned port
//! 3. The browser opens Google's consent page with a PKCE challenge
//! 4. Google redirects to the listener with the authorization code
//! 5. The code is exchanged for access and refresh tokens
//! 6. Tokens are persisted and refreshed on later runs
//!
//! # Example
//!
//! ```ignore
//! use calgo_providers::google::{Authenticator, GoogleConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = GoogleConfig::new("credentials.json", "token.json");
//! let client = Authenticator::new(config)
//!     .get_client(&CancellationToken::new())
//!     .await?;
//! let created = client.create_event(&request).await?;
//! ```

mod authenticator;
mod callback;
mod client;
mod config;
mod oauth;
mod tokens;

pub use authenticator::{Authenticator, BrowserLauncher, SystemBrowser, TokenState, TokenStatus};
pub use callback::{CallbackListener, CallbackOutcome, NO_CODE_ERROR};
pub use client::CalendarClient;
pub use config::{
    AppCredentials, CALENDAR_API_BASE, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, GoogleConfig,
};
pub use oauth::{OAuthClient, PkceFlow};
pub use tokens::{AuthorizationToken, TokenStore};
