//! Authenticated HTTP access to the SendPulse REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::endpoints::RenderedRequest;
use crate::envelope::decode_envelope;
use crate::error::FetchError;
use wapull_auth_bridge::{describe_error, parse_body, Credential};

/// Anything that can execute a rendered GET request and return its JSON body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fully qualified target of a request, for diagnostics.
    fn target(&self, request: &RenderedRequest) -> String;

    /// Execute the request. Non-2xx statuses are errors.
    async fn fetch(&self, request: &RenderedRequest) -> Result<Value, FetchError>;

    /// Execute the request and unwrap the item list from its envelope.
    async fn fetch_items(&self, request: &RenderedRequest) -> Result<Vec<Value>, FetchError> {
        let body = self.fetch(request).await?;
        decode_envelope(body).map_err(|body| FetchError::Envelope {
            target: self.target(request),
            params: request.query.clone(),
            body,
        })
    }
}

/// Build the shared HTTP client with a fixed per-request timeout.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(5))
        .build()
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    api_base: Url,
    credential: Option<Credential>,
}

impl ApiClient {
    pub fn new(http_client: Client, api_base: Url) -> Self {
        Self {
            http_client,
            api_base,
            credential: None,
        }
    }

    /// Attach the bearer credential sent with every subsequent request.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn url_for(&self, request: &RenderedRequest) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&request.segments);
        }
        url
    }
}

#[async_trait]
impl PageFetcher for ApiClient {
    fn target(&self, request: &RenderedRequest) -> String {
        self.url_for(request).to_string()
    }

    async fn fetch(&self, request: &RenderedRequest) -> Result<Value, FetchError> {
        let url = self.url_for(request);
        let target = url.to_string();

        let mut builder = self.http_client.get(url).query(&request.query);
        if let Some(credential) = &self.credential {
            builder = builder.header("Authorization", credential.bearer());
        }

        let response = builder.send().await.map_err(|e| FetchError::Transport {
            target: target.clone(),
            params: request.query.clone(),
            message: describe_error(&e),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| FetchError::Transport {
            target: target.clone(),
            params: request.query.clone(),
            message: describe_error(&e),
        })?;
        debug!("GET {} -> {} ({} bytes)", target, status, text.len());

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                target,
                params: request.query.clone(),
                body: parse_body(text),
            });
        }

        // A 2xx body that is not JSON cannot carry an envelope.
        serde_json::from_str(&text).map_err(|_| FetchError::Envelope {
            target,
            params: request.query.clone(),
            body: Value::String(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(Client::new(), Url::parse(&server.uri()).unwrap())
    }

    #[test]
    fn test_url_for_escapes_segments() {
        let api = ApiClient::new(
            Client::new(),
            Url::parse("https://api.sendpulse.com").unwrap(),
        );
        let request = RenderedRequest::new(&["whatsapp", "chats", "a/b c", "messages"]);
        assert_eq!(
            api.url_for(&request).as_str(),
            "https://api.sendpulse.com/whatsapp/chats/a%2Fb%20c/messages"
        );
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let api = ApiClient::new(Client::new(), Url::parse("https://proxy.test/sp/").unwrap());
        let request = RenderedRequest::new(&["whatsapp", "bots"]);
        assert_eq!(api.url_for(&request).as_str(), "https://proxy.test/sp/whatsapp/bots");
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/whatsapp/chats"))
            .and(header("Authorization", "Bearer tok"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).with_credential(Credential::new("tok"));
        let request = RenderedRequest::new(&["whatsapp", "chats"])
            .with_query([("limit".to_string(), "1".to_string())]);
        let items = api.fetch_items(&request).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such route"))
            .mount(&server)
            .await;

        let request = RenderedRequest::new(&["livechat", "chats"])
            .with_query([("offset".to_string(), "0".to_string())]);
        let err = client(&server).fetch(&request).await.unwrap_err();
        match err {
            FetchError::Status {
                status,
                target,
                params,
                body,
            } => {
                assert_eq!(status, 404);
                assert!(target.ends_with("/livechat/chats"));
                assert_eq!(params, vec![("offset".to_string(), "0".to_string())]);
                assert_eq!(body, Value::String("no such route".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .mount(&server)
            .await;

        let request = RenderedRequest::new(&["conversations"]);
        let err = client(&server).fetch_items(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::Envelope { .. }));
    }
}
