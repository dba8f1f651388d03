// Error taxonomy for the login handshake. Every fatal variant carries one
// actionable hint (see `LoginError::remediation`) that the CLI prints before
// exiting with a non-zero status.

use thiserror::Error;

use crate::store::StoreError;

/// Failure talking to the provider's token endpoint.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint response could not be decoded: {0}")]
    Decode(String),
    #[error("token endpoint response has no access token")]
    MissingAccessToken,
    #[error("no refresh token is stored")]
    MissingRefreshToken,
}

/// Terminal failure of a login attempt (or of the auth commands around it).
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("port {port} is already in use on 127.0.0.1")]
    PortUnavailable { port: u16 },
    #[error("failed to bind 127.0.0.1:{port}: {reason}")]
    BindFailed { port: u16, reason: String },
    #[error("failed while waiting for the authorization callback: {0}")]
    AcceptFailed(String),
    #[error("authorization code is empty")]
    NoCodeInCallback,
    #[error("timed out waiting for the authorization callback")]
    Timeout,
    /// Never fatal; the orchestrator downgrades it to a warning.
    #[error("could not open a browser: {0}")]
    BrowserLaunchFailed(String),
    #[error("failed to exchange authorization code for tokens: {0}")]
    TokenExchange(#[from] ExchangeError),
    #[error("authentication cancelled")]
    Cancelled,
    #[error("invalid client credentials: {0}")]
    InvalidCredentials(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to read terminal input: {0}")]
    Input(String),
    #[error("login state machine cannot move from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}

impl LoginError {
    /// The one thing the user should do next, if there is anything.
    pub fn remediation(&self) -> Option<String> {
        let hint = match self {
            LoginError::PortUnavailable { port } => format!(
                "Another process is holding port {port}. Stop it (or a previous login still \
                 waiting) and run 'cloudrive auth login' again. Over SSH, check the port \
                 forwarding: ssh -L {port}:localhost:{port} user@host"
            ),
            LoginError::BindFailed { port, .. } => format!(
                "The callback server could not listen on port {port}. Retry, or use \
                 'cloudrive auth login --no-browser'."
            ),
            LoginError::AcceptFailed(_) => {
                "Run 'cloudrive auth login' again, or use '--no-browser' to paste the redirected URL."
                    .to_string()
            }
            LoginError::NoCodeInCallback => {
                "Paste the full redirected URL (it contains '?code=...'), or run 'cloudrive auth login' again."
                    .to_string()
            }
            LoginError::Timeout => {
                "Finish the consent screen before the timeout, or run without '--timeout'."
                    .to_string()
            }
            LoginError::BrowserLaunchFailed(_) => {
                "Copy the URL above into your browser manually.".to_string()
            }
            LoginError::TokenExchange(ExchangeError::MissingRefreshToken) => {
                "Run 'cloudrive auth login' to obtain a new token set.".to_string()
            }
            LoginError::TokenExchange(_) => {
                "Authorization codes are single-use. Check client_id.json in the config \
                 directory and run 'cloudrive auth login' again."
                    .to_string()
            }
            LoginError::InvalidCredentials(_) => {
                "Copy client_id and client_secret from the OAuth client JSON you downloaded."
                    .to_string()
            }
            LoginError::Store(_) => {
                "Check that the config directory is writable by your user.".to_string()
            }
            LoginError::Cancelled | LoginError::Input(_) | LoginError::IllegalTransition { .. } => {
                return None
            }
        };
        Some(hint)
    }
}
