// Provider endpoints and login constants. Values come from the environment
// with Google defaults, the same way the API client used to pick its base
// URL. The redirect port is registered with the provider, so it is a
// constant and is never read from the environment.

use anyhow::Result;
use std::time::Duration;

/// Loopback port the redirect listener binds. Must match the redirect URI
/// registered for the OAuth client.
pub const REDIRECT_PORT: u16 = 8080;
pub const REDIRECT_PATH: &str = "/callback";

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/drive/v3/about?fields=user";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Everything a login attempt needs to know about the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scope: String,
    pub redirect_port: u16,
    /// Optional upper bound on the wait for the browser callback.
    pub max_wait: Option<Duration>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            scope: DRIVE_SCOPE.to_string(),
            redirect_port: REDIRECT_PORT,
            max_wait: None,
        }
    }
}

impl AuthConfig {
    /// Build a config from `CLOUDRIVE_AUTH_URL`, `CLOUDRIVE_TOKEN_URL` and
    /// `CLOUDRIVE_USERINFO_URL`, falling back to the Google endpoints.
    pub fn from_env() -> Result<Self> {
        let defaults = AuthConfig::default();
        let config = AuthConfig {
            auth_url: env_or("CLOUDRIVE_AUTH_URL", defaults.auth_url),
            token_url: env_or("CLOUDRIVE_TOKEN_URL", defaults.token_url),
            userinfo_url: env_or("CLOUDRIVE_USERINFO_URL", defaults.userinfo_url),
            ..defaults
        };
        for (name, value) in [
            ("CLOUDRIVE_AUTH_URL", &config.auth_url),
            ("CLOUDRIVE_TOKEN_URL", &config.token_url),
            ("CLOUDRIVE_USERINFO_URL", &config.userinfo_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                anyhow::bail!("{name} must be an http(s) URL, got '{value}'");
            }
        }
        Ok(config)
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Redirect URI as registered with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.redirect_port, REDIRECT_PATH)
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}
