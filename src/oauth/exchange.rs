// Code-for-token exchange and token refresh against the provider's token
// endpoint. Both are single form-encoded POSTs; neither is retried here.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ExchangeError;
use crate::store::{ClientCredentials, TokenSet};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token endpoint response. Everything but the access token is optional on
/// the wire; refresh responses usually omit `refresh_token`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
}

pub struct TokenExchanger {
    client: Client,
    token_url: String,
}

impl TokenExchanger {
    pub fn new(token_url: impl Into<String>) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(TokenExchanger {
            client,
            token_url: token_url.into(),
        })
    }

    /// Trade a freshly captured authorization code for a token set.
    pub fn exchange(
        &self,
        code: &str,
        redirect_uri: &str,
        creds: &ClientCredentials,
    ) -> Result<TokenSet, ExchangeError> {
        info!("exchanging authorization code for tokens");
        let response = self.post_form(&[
            ("code", code),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])?;
        Ok(TokenSet {
            access_token: response.access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            token_type: response.token_type.unwrap_or_default(),
            expires_in: response.expires_in.unwrap_or_default(),
        })
    }

    /// Obtain a replacement token set. A refresh token omitted by the
    /// provider is carried over from `current`.
    pub fn refresh(
        &self,
        current: &TokenSet,
        creds: &ClientCredentials,
    ) -> Result<TokenSet, ExchangeError> {
        if current.refresh_token.is_empty() {
            return Err(ExchangeError::MissingRefreshToken);
        }
        info!("refreshing access token");
        let response = self.post_form(&[
            ("refresh_token", current.refresh_token.as_str()),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ])?;
        Ok(TokenSet {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .filter(|token| !token.is_empty())
                .unwrap_or_else(|| current.refresh_token.clone()),
            token_type: response
                .token_type
                .unwrap_or_else(|| current.token_type.clone()),
            expires_in: response.expires_in.unwrap_or_default(),
        })
    }

    fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ExchangeError> {
        let res = self.client.post(&self.token_url).form(form).send()?;
        let status = res.status();
        debug!(%status, "token endpoint responded");
        if status != StatusCode::OK {
            let body = res.text().unwrap_or_default();
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body = res.text()?;
        let response: TokenResponse =
            serde_json::from_str(&body).map_err(|err| ExchangeError::Decode(err.to_string()))?;
        if response.access_token.trim().is_empty() {
            return Err(ExchangeError::MissingAccessToken);
        }
        Ok(response)
    }
}
