//! Offset pagination over a resolved endpoint.

use serde_json::Value;
use tracing::debug;

use crate::client::PageFetcher;
use crate::discovery::page_params;
use crate::endpoints::{ContextIds, ResolvedEndpoint};
use crate::error::FetchError;

/// Page size and total item cap for one paginated drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: usize,
    pub max_items: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_items: 2000,
        }
    }
}

/// Fetch pages until an empty page or until `max_items` items were collected.
///
/// The API exposes no reliable "has more" flag, so an empty page is the only
/// exhaustion signal. Items are kept in response order without deduplication.
/// A page larger than the requested limit is truncated so the total never
/// exceeds `max_items`.
pub async fn paginate(
    fetcher: &dyn PageFetcher,
    endpoint: &ResolvedEndpoint,
    ids: &ContextIds,
    base_params: &[(String, String)],
    limits: PageLimits,
) -> Result<Vec<Value>, FetchError> {
    let request = endpoint.candidate.render(ids)?;
    let page_size = limits.page_size.max(1);

    let mut items = Vec::new();
    let mut offset = 0usize;

    while offset < limits.max_items {
        let limit = page_size.min(limits.max_items - offset);
        let page_request = request
            .clone()
            .with_query(base_params.iter().cloned())
            .with_query(page_params(limit, offset));

        let mut page = fetcher.fetch_items(&page_request).await?;
        debug!(
            "{} page at offset {}: {} items",
            endpoint.capability,
            offset,
            page.len()
        );
        if page.is_empty() {
            break;
        }

        page.truncate(limit);
        offset += page.len();
        items.append(&mut page);
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::endpoints::{Capability, CHAT_CANDIDATES};
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(reqwest::Client::new(), Url::parse(&server.uri()).unwrap())
    }

    fn global_chats() -> ResolvedEndpoint {
        ResolvedEndpoint {
            capability: Capability::Chats,
            candidate: CHAT_CANDIDATES[1],
            rank: 1,
            probe_url: String::new(),
        }
    }

    fn chats(range: std::ops::Range<usize>) -> Vec<Value> {
        range.map(|i| json!({"id": format!("c{}", i)})).collect()
    }

    async fn mount_page(server: &MockServer, offset: usize, body: Value) {
        Mock::given(method("GET"))
            .and(path("/whatsapp/chats"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_drains_decreasing_pages_until_empty() {
        let server = MockServer::start().await;
        mount_page(&server, 0, json!(chats(0..3))).await;
        mount_page(&server, 3, json!(chats(3..5))).await;
        mount_page(&server, 5, json!(chats(5..6))).await;
        mount_page(&server, 6, json!([])).await;

        let limits = PageLimits {
            page_size: 3,
            max_items: 100,
        };
        let items = paginate(
            &client(&server),
            &global_chats(),
            &ContextIds::default(),
            &[],
            limits,
        )
        .await
        .unwrap();

        assert_eq!(items, chats(0..6));
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_never_requests_more_than_max_items() {
        let server = MockServer::start().await;
        // The server ignores `limit` and always returns three items.
        mount_page(&server, 0, json!(chats(0..3))).await;
        mount_page(&server, 3, json!(chats(3..6))).await;

        let limits = PageLimits {
            page_size: 3,
            max_items: 4,
        };
        let items = paginate(
            &client(&server),
            &global_chats(),
            &ContextIds::default(),
            &[],
            limits,
        )
        .await
        .unwrap();

        assert_eq!(items, chats(0..4));

        let requested: usize = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|req| {
                req.url
                    .query_pairs()
                    .find(|(k, _)| k == "limit")
                    .and_then(|(_, v)| v.parse::<usize>().ok())
                    .unwrap()
            })
            .sum();
        assert_eq!(requested, 4);
    }

    #[tokio::test]
    async fn test_envelope_shapes_flatten_identically() {
        let shapes = [
            json!([{"id": "a"}, {"id": "b"}]),
            json!({"data": [{"id": "a"}, {"id": "b"}]}),
            json!({"data": {"items": [{"id": "a"}, {"id": "b"}]}}),
        ];

        let mut outputs = Vec::new();
        for shape in shapes {
            let server = MockServer::start().await;
            mount_page(&server, 0, shape).await;
            mount_page(&server, 2, json!({"data": []})).await;
            let items = paginate(
                &client(&server),
                &global_chats(),
                &ContextIds::default(),
                &[],
                PageLimits::default(),
            )
            .await
            .unwrap();
            outputs.push(items);
        }

        assert_eq!(outputs[0], vec![json!({"id": "a"}), json!({"id": "b"})]);
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[1], outputs[2]);
    }

    #[tokio::test]
    async fn test_base_params_are_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/whatsapp/chats"))
            .and(query_param("date_from", "2024-05-01"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let params = vec![("date_from".to_string(), "2024-05-01".to_string())];
        let items = paginate(
            &client(&server),
            &global_chats(),
            &ContextIds::default(),
            &params,
            PageLimits::default(),
        )
        .await
        .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_is_returned() {
        let server = MockServer::start().await;
        mount_page(&server, 0, json!(chats(0..2))).await;
        Mock::given(method("GET"))
            .and(path("/whatsapp/chats"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = paginate(
            &client(&server),
            &global_chats(),
            &ContextIds::default(),
            &[],
            PageLimits {
                page_size: 2,
                max_items: 10,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(502));
    }
}
