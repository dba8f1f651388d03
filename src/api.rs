// API client module: a small blocking HTTP client for the storage API.
// Only the identity lookup used after login lives here; the token endpoint
// is handled by `oauth::exchange`.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;

/// Blocking client holding an optional bearer token for authenticated calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    token: Option<String>,
}

/// Subset of the `about?fields=user` response we care about.
#[derive(Deserialize, Debug)]
struct AboutResponse {
    user: AboutUser,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    display_name: String,
}

impl ApiClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            token: None,
        })
    }

    /// Store an access token for subsequent authenticated requests.
    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(t) = &self.token {
            let val = HeaderValue::from_str(&format!("Bearer {}", t))
                .context("Access token is not a valid header value")?;
            headers.insert(AUTHORIZATION, val);
        }
        Ok(headers)
    }

    /// Display name of the signed-in account.
    pub fn account_name(&self, userinfo_url: &str) -> Result<String> {
        if !self.has_token() {
            anyhow::bail!("No access token set");
        }
        let res = self
            .client
            .get(userinfo_url)
            .headers(self.auth_headers()?)
            .send()
            .context("Failed to send account request")?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            anyhow::bail!("Account lookup failed: {} - {}", status, txt);
        }
        let about: AboutResponse = res.json().context("Parsing account response json")?;
        Ok(about.user.display_name)
    }
}
