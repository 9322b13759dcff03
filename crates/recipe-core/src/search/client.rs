//! HTTP search backend.

use super::state::SearchFilters;
use super::url::{QueryScope, to_query_string};
use crate::cancellation::CancellationSignal;
use crate::config::AppConfig;
use crate::error::SearchError;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// One page of recipe results. Recipes stay opaque JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub recipes: Vec<serde_json::Value>,
    pub total: u64,
    pub has_next_page: bool,
}

/// Executes one search. Implementations must honour `signal` and resolve to
/// `Aborted` promptly once it fires.
pub trait SearchBackend: Send + Sync {
    fn search(
        &self,
        filters: SearchFilters,
        signal: CancellationSignal,
    ) -> BoxFuture<'static, Result<SearchResults, SearchError>>;
}

#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpSearchClient {
    pub fn new(endpoint: &str) -> Result<Self, SearchError> {
        let endpoint = url::Url::parse(endpoint).map_err(|err| SearchError::Config {
            message: format!("invalid search endpoint `{endpoint}`: {err}"),
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| SearchError::Config {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SearchError> {
        Self::new(&config.search_endpoint())
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    pub fn request_url(&self, filters: &SearchFilters) -> url::Url {
        let mut url = self.endpoint.clone();
        let query = to_query_string(filters, QueryScope::Request);
        url.set_query(Some(&query));
        url
    }
}

impl SearchBackend for HttpSearchClient {
    fn search(
        &self,
        filters: SearchFilters,
        signal: CancellationSignal,
    ) -> BoxFuture<'static, Result<SearchResults, SearchError>> {
        let client = self.client.clone();
        let url = self.request_url(&filters);
        async move {
            signal.check_cancelled("before_send")?;
            debug!(url = %url, "Sending recipe search request");

            let response = tokio::select! {
                biased;
                reason = signal.cancelled() => return Err(SearchError::aborted(reason)),
                response = client
                    .get(url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send() => response.map_err(|err| SearchError::transport(err.to_string()))?,
            };

            let status = response.status();
            let body = tokio::select! {
                biased;
                reason = signal.cancelled() => return Err(SearchError::aborted(reason)),
                body = response.text() => body.map_err(|err| SearchError::transport(err.to_string()))?,
            };

            if !status.is_success() {
                warn!(status = status.as_u16(), "Recipe search rejected by server");
                return Err(SearchError::Server {
                    status: status.as_u16(),
                    message: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
                });
            }

            parse_search_response(&body, filters.page, filters.limit)
        }
        .boxed()
    }
}

/// Accepts `{recipes, pagination: {total, hasNextPage}}`, `{recipes, total}`,
/// `{data, total}`, or a bare array of recipes.
pub fn parse_search_response(
    body: &str,
    page: u32,
    limit: u32,
) -> Result<SearchResults, SearchError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|err| SearchError::malformed(err.to_string()))?;

    let (recipes, total, has_next_page) = match value {
        serde_json::Value::Array(recipes) => (recipes, None, None),
        serde_json::Value::Object(ref map) => {
            let recipes = ["recipes", "data", "results"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_array()))
                .cloned()
                .ok_or_else(|| SearchError::malformed("response has no recipe array"))?;
            let pagination = value.get("pagination");
            let total = pagination
                .and_then(|p| parse_u64_field(p, "total"))
                .or_else(|| parse_u64_field(&value, "total"));
            let has_next_page = pagination
                .and_then(|p| p.get("hasNextPage"))
                .or_else(|| value.get("hasNextPage"))
                .and_then(|v| v.as_bool());
            (recipes, total, has_next_page)
        }
        _ => {
            return Err(SearchError::malformed(
                "expected a JSON object or array of recipes",
            ));
        }
    };

    let total = total.unwrap_or(recipes.len() as u64);
    let has_next_page =
        has_next_page.unwrap_or_else(|| u64::from(page.max(1)) * u64::from(limit) < total);
    Ok(SearchResults {
        recipes,
        total,
        has_next_page,
    })
}

fn parse_u64_field(row: &serde_json::Value, key: &str) -> Option<u64> {
    row.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_i64().map(|n| n.max(0) as u64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancelReason;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn parses_paginated_envelope() {
        let parsed = parse_search_response(
            r#"{"recipes":[{"id":1},{"id":2}],"pagination":{"total":"40","hasNextPage":true}}"#,
            1,
            2,
        )
        .expect("envelope should parse");
        assert_eq!(parsed.recipes.len(), 2);
        assert_eq!(parsed.total, 40);
        assert!(parsed.has_next_page);
    }

    #[test]
    fn derives_next_page_from_total_when_absent() {
        let parsed = parse_search_response(r#"{"data":[{"id":1}],"total":13}"#, 2, 6)
            .expect("legacy shape should parse");
        assert_eq!(parsed.total, 13);
        assert!(parsed.has_next_page);

        let last = parse_search_response(r#"{"recipes":[],"total":12}"#, 2, 6)
            .expect("empty page should parse");
        assert!(!last.has_next_page);
    }

    #[test]
    fn bare_array_counts_itself() {
        let parsed = parse_search_response(r#"[{"id":"a"},{"id":"b"}]"#, 1, 12)
            .expect("bare array should parse");
        assert_eq!(parsed.total, 2);
        assert!(!parsed.has_next_page);
    }

    #[test]
    fn rejects_unusable_bodies() {
        assert_eq!(
            parse_search_response("<html>", 1, 12).map_err(|err| err.code()),
            Err("parse_failed")
        );
        assert_eq!(
            parse_search_response(r#"{"items":[]}"#, 1, 12).map_err(|err| err.code()),
            Err("parse_failed")
        );
        assert_eq!(
            parse_search_response("42", 1, 12).map_err(|err| err.code()),
            Err("parse_failed")
        );
    }

    #[test]
    fn request_url_carries_the_full_query() {
        let client =
            HttpSearchClient::new("http://127.0.0.1:9/api/search").expect("endpoint should parse");
        let filters = SearchFilters {
            query: "dumplings".to_string(),
            cuisines: vec!["cantonese".to_string()],
            ..SearchFilters::default()
        };
        assert_eq!(
            client.request_url(&filters).as_str(),
            "http://127.0.0.1:9/api/search?q=dumplings&cuisine=cantonese&tagLogic=AND&page=1&limit=12&sortField=relevance&sortDirection=desc"
        );
    }

    #[test]
    fn invalid_endpoint_is_a_config_error() {
        let err = HttpSearchClient::new("not a url").expect_err("endpoint must be rejected");
        assert_eq!(err.code(), "invalid_config");
    }

    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener has an address");
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("client should connect");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.expect("request should be readable");
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("response should be writable");
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/search"), server)
    }

    #[tokio::test]
    async fn fetches_and_parses_a_live_response() {
        let (endpoint, server) =
            serve_once("200 OK", r#"{"recipes":[{"title":"Congee"}],"total":1}"#).await;
        let client = HttpSearchClient::new(&endpoint).expect("endpoint should parse");
        let filters = SearchFilters {
            query: "congee".to_string(),
            ..SearchFilters::default()
        };

        let results = client
            .search(filters, CancellationSignal::new())
            .await
            .expect("search should succeed");
        let request = server.await.expect("server task should finish");

        assert!(request.starts_with("GET /search?q=congee&"));
        assert_eq!(results.total, 1);
        assert_eq!(results.recipes[0]["title"], "Congee");
    }

    #[tokio::test]
    async fn non_success_status_is_a_server_error() {
        let (endpoint, server) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let client = HttpSearchClient::new(&endpoint).expect("endpoint should parse");

        let err = client
            .search(SearchFilters::default(), CancellationSignal::new())
            .await
            .expect_err("503 must fail");
        let _ = server.await;

        assert_eq!(
            err,
            SearchError::Server {
                status: 503,
                message: r#"{"error":"busy"}"#.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_hung_request() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener has an address");
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.expect("client should connect");
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let client =
            HttpSearchClient::new(&format!("http://{addr}/search")).expect("endpoint should parse");
        let signal = CancellationSignal::new();

        let search = client.search(SearchFilters::default(), signal.clone());
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signal.cancel_with(CancelReason::Superseded);
        };
        let (outcome, ()) = tokio::join!(search, canceller);

        assert_eq!(outcome, Err(SearchError::aborted(CancelReason::Superseded)));
    }
}
