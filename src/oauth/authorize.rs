// Authorization URL construction and the permissive `code=` extraction
// shared by the loopback listener and the paste-the-URL path.

use chrono::{DateTime, Utc};
use std::borrow::Cow;

use crate::config::AuthConfig;

const CODE_MARKER: &str = "code=";

/// One login attempt's view of the consent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub redirect_port: u16,
    pub scope: String,
    pub client_id: String,
}

impl AuthorizationRequest {
    pub fn new(config: &AuthConfig, client_id: &str) -> Self {
        let authorization_url = format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code&access_type=offline&prompt=consent",
            config.auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(&config.redirect_uri()),
            urlencoding::encode(&config.scope),
        );
        AuthorizationRequest {
            authorization_url,
            redirect_port: config.redirect_port,
            scope: config.scope.clone(),
            client_id: client_id.to_string(),
        }
    }
}

/// The authorization code delivered by the provider redirect. Produced once
/// per attempt and consumed once by the token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedCode {
    pub value: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedCode {
    /// Capture the code from a raw request or a pasted URL.
    pub fn capture(input: &str) -> Option<Self> {
        extract_code(input).map(|value| CapturedCode {
            value,
            captured_at: Utc::now(),
        })
    }
}

/// Find `code=` anywhere in `input` and take everything up to the next `&`,
/// whitespace or end of input. The value is percent-decoded once; a value
/// that does not decode to UTF-8 is returned as found.
///
/// The match is deliberately loose: the same rule has to work on an HTTP
/// request line, a full request dump and a URL copied out of the address bar.
pub fn extract_code(input: &str) -> Option<String> {
    let start = input.find(CODE_MARKER)? + CODE_MARKER.len();
    let rest = &input[start..];
    let end = rest
        .find(|c: char| c == '&' || c.is_whitespace())
        .unwrap_or(rest.len());
    let raw = &rest[..end];
    if raw.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
    Some(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, key: &str) -> &'a str {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{key}=")))
            .unwrap_or_default()
    }

    #[test]
    fn extracts_code_terminated_by_ampersand() {
        assert_eq!(
            extract_code("GET /?code=ABC123&state=xyz HTTP/1.1").as_deref(),
            Some("ABC123")
        );
    }

    #[test]
    fn extracts_code_terminated_by_space() {
        assert_eq!(
            extract_code("GET /callback?code=ABC123 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .as_deref(),
            Some("ABC123")
        );
    }

    #[test]
    fn extracts_code_running_to_end_of_input() {
        assert_eq!(
            extract_code("http://localhost:8080/callback?state=1&code=XYZ").as_deref(),
            Some("XYZ")
        );
    }

    #[test]
    fn missing_or_empty_code_yields_nothing() {
        assert_eq!(extract_code("GET /favicon.ico HTTP/1.1"), None);
        assert_eq!(extract_code("GET /callback?code=&state=1 HTTP/1.1"), None);
        assert_eq!(extract_code(""), None);
    }

    #[test]
    fn percent_encoded_code_is_decoded_once() {
        assert_eq!(
            extract_code("/callback?code=4%2F0AbC%252F&scope=x").as_deref(),
            Some("4/0AbC%2F")
        );
    }

    #[test]
    fn captured_code_records_value() {
        let before = Utc::now();
        let captured = CapturedCode::capture("/?code=XYZ&state=1").expect("code");
        assert_eq!(captured.value, "XYZ");
        assert!(captured.captured_at >= before);
    }

    #[test]
    fn authorization_url_is_stable_and_encoded_once() {
        let config = AuthConfig {
            scope: "https://www.googleapis.com/auth/drive.file openid".to_string(),
            ..AuthConfig::default()
        };
        let first = AuthorizationRequest::new(&config, "client-123.apps.example");
        let second = AuthorizationRequest::new(&config, "client-123.apps.example");
        assert_eq!(first.authorization_url, second.authorization_url);

        let url = &first.authorization_url;
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?client_id="));
        assert!(url.ends_with("&response_type=code&access_type=offline&prompt=consent"));

        let redirect = query_param(url, "redirect_uri");
        let scope = query_param(url, "scope");
        assert_eq!(redirect, "http%3A%2F%2Flocalhost%3A8080%2Fcallback");
        assert!(!scope.contains(['/', ':', ' ']));
        assert_eq!(
            urlencoding::decode(redirect).expect("decode"),
            config.redirect_uri()
        );
        assert_eq!(urlencoding::decode(scope).expect("decode"), config.scope);
    }

    #[test]
    fn request_carries_port_scope_and_client() {
        let config = AuthConfig::default();
        let request = AuthorizationRequest::new(&config, "client-123");
        assert_eq!(request.redirect_port, 8080);
        assert_eq!(request.scope, config.scope);
        assert_eq!(request.client_id, "client-123");
    }
}
