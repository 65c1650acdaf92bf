//! Client-credential token exchange for the SendPulse API.
//!
//! The token endpoint normally takes a form-encoded grant, but some accounts
//! only accept the same fields as a JSON body. [`AuthBridge`] tries the form
//! first and falls back to JSON exactly once.

use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Client identifier and secret issued by the platform.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token held in memory for the duration of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} chars>)", self.0.len())
    }
}

/// Both token request encodings were rejected.
#[derive(Debug, thiserror::Error)]
#[error("token request rejected ({}): {body}", describe_status(.status))]
pub struct AuthError {
    /// Status of the last attempt, `None` if it never got a response.
    pub status: Option<u16>,
    /// Response body, parsed as JSON when possible.
    pub body: Value,
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Form,
    Json,
}

impl Encoding {
    fn as_str(&self) -> &'static str {
        match self {
            Encoding::Form => "form",
            Encoding::Json => "json",
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthBridge {
    http_client: Client,
    token_url: String,
}

impl AuthBridge {
    pub fn new(http_client: Client, token_url: impl Into<String>) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Exchange client credentials for a bearer token.
    ///
    /// Sends the grant form-encoded, then once more as JSON if the first
    /// attempt is rejected. No further retries.
    pub async fn acquire_credential(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<Credential, AuthError> {
        match self.request_token(credentials, Encoding::Form).await {
            Ok(token) => Ok(token),
            Err(err) => {
                warn!(
                    "form-encoded token request rejected ({}), retrying with JSON body",
                    describe_status(&err.status)
                );
                self.request_token(credentials, Encoding::Json).await
            }
        }
    }

    async fn request_token(
        &self,
        credentials: &ClientCredentials,
        encoding: Encoding,
    ) -> Result<Credential, AuthError> {
        let payload = TokenRequest {
            grant_type: "client_credentials",
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
        };

        let request = self.http_client.post(&self.token_url);
        let request = match encoding {
            Encoding::Form => request.form(&payload),
            Encoding::Json => request.json(&payload),
        };

        let response = request.send().await.map_err(|e| AuthError {
            status: None,
            body: Value::String(describe_error(&e)),
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!("token endpoint answered {} to {} request", status, encoding.as_str());

        if status.is_success() {
            let token = serde_json::from_str::<TokenResponse>(&text)
                .ok()
                .and_then(|r| r.access_token)
                .filter(|t| !t.is_empty());
            if let Some(token) = token {
                info!("obtained access token ({} encoding)", encoding.as_str());
                return Ok(Credential::new(token));
            }
        }

        Err(AuthError {
            status: Some(status.as_u16()),
            body: parse_body(text),
        })
    }
}

/// Render a transport error with its whole source chain.
///
/// `reqwest::Error`'s own message stops at "error sending request", which
/// hides timeouts and refused connections.
pub fn describe_error(err: &reqwest::Error) -> String {
    let mut message = if err.is_timeout() {
        format!("timed out: {}", err)
    } else {
        err.to_string()
    };
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Parse a response body as JSON, keeping the raw text when that fails.
pub fn parse_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
