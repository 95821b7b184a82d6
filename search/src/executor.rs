use async_trait::async_trait;
use facet_common::{ConnectionConfig, Filter, SearchConfig};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::adapter::{adapt_with_config, SearchResponse};
use crate::error::{SearchError, SearchResult};
use crate::query::{build_query, QueryParams};

/// Runs one search for the given state. Implemented over HTTP by
/// [`SearchExecutor`]; the controller only depends on this trait.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn execute(
        &self,
        filters: &[Filter],
        config: &SearchConfig,
        params: &QueryParams,
    ) -> SearchResult<SearchResponse>;
}

/// Posts built queries to the configured endpoint. One request per call,
/// no retries.
#[derive(Debug, Clone, Default)]
pub struct SearchExecutor {
    client: Client,
}

impl SearchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the HTTP client, bounded by the connection's timeout if set.
    pub fn from_connection(connection: &ConnectionConfig) -> SearchResult<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = connection.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn execute(
        &self,
        filters: &[Filter],
        config: &SearchConfig,
        params: &QueryParams,
    ) -> SearchResult<SearchResponse> {
        let body = build_query(filters, config, params)?;

        let mut request = self.client.post(&config.connection.url).json(&body);
        if let Some(token) = config.connection.token.as_ref().and_then(|t| t.resolve()) {
            request = request.bearer_auth(token);
        }

        tracing::debug!(
            "POST {} with {} filters (from={}, size={})",
            config.connection.url,
            filters.len(),
            params.from,
            params.size
        );
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = engine_error(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());
            tracing::warn!("Search engine returned {}: {}", status, body);
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let raw: Value = serde_json::from_str(&text)
            .map_err(|e| SearchError::MalformedResponse(format!("invalid JSON: {}", e)))?;
        adapt_with_config(&raw, config)
    }
}

#[async_trait]
impl SearchBackend for SearchExecutor {
    async fn execute(
        &self,
        filters: &[Filter],
        config: &SearchConfig,
        params: &QueryParams,
    ) -> SearchResult<SearchResponse> {
        SearchExecutor::execute(self, filters, config, params).await
    }
}

/// Extracts the engine's error payload: `error.reason` when present, the
/// `error` object otherwise, else the raw text. `None` for an empty body.
fn engine_error(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let parsed: Option<Value> = serde_json::from_str(text).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    Some(match error {
        Some(error) => match error.get("reason").and_then(Value::as_str) {
            Some(reason) => reason.to_string(),
            None => match error.as_str() {
                Some(message) => message.to_string(),
                None => error.to_string(),
            },
        },
        None => text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_common::{AggregationConfig, Bound, FacetConfig, TokenSource};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(url: String) -> SearchConfig {
        SearchConfig::new(&url).with_facet(
            FacetConfig::term("status", "status.keyword")
                .with_aggregation(AggregationConfig::terms(None)),
        )
    }

    const OK_BODY: &str = r#"{
        "hits": {
            "total": { "value": 2, "relation": "eq" },
            "hits": [
                { "_id": "1", "_source": { "title": "Dune", "status": "A" } },
                { "_id": "2", "_source": { "title": "Emma", "status": "B" } }
            ]
        },
        "aggregations": {
            "status": { "buckets": [
                { "key": "A", "doc_count": 1 },
                { "key": "B", "doc_count": 1 }
            ] }
        }
    }"#;

    #[tokio::test]
    async fn test_execute_success() {
        let mut server = Server::new_async().await;
        let filters = vec![Filter::term("status", "status.keyword", ["A", "B"])];
        let params = QueryParams::page(0, 10);
        let config = config(format!("{}/books/_search", server.url()))
            .with_token(TokenSource::Static("secret".to_string()));
        let expected_body = build_query(&filters, &config, &params).unwrap();

        let mock = server
            .mock("POST", "/books/_search")
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(expected_body))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .expect(1)
            .create_async()
            .await;

        let response = SearchExecutor::new()
            .execute(&filters, &config, &params)
            .await
            .unwrap();

        assert_eq!(response.total_hits, 2);
        assert_eq!(response.hits[0], json!({ "title": "Dune", "status": "A" }));
        assert_eq!(response.aggregations["status"].len(), 2);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_provider_is_invoked_per_request() {
        let mut server = Server::new_async().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let config = config(format!("{}/_search", server.url())).with_token(
            TokenSource::provider(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some("rotating".to_string())
            }),
        );

        let mock = server
            .mock("POST", "/_search")
            .match_header("authorization", "Bearer rotating")
            .with_status(200)
            .with_body(OK_BODY)
            .expect(2)
            .create_async()
            .await;

        let executor = SearchExecutor::new();
        let params = QueryParams::page(0, 10);
        executor.execute(&[], &config, &params).await.unwrap();
        executor.execute(&[], &config, &params).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let mut server = Server::new_async().await;
        let config = config(format!("{}/_search", server.url()))
            .with_token(TokenSource::provider(|| None));

        let mock = server
            .mock("POST", "/_search")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        SearchExecutor::new()
            .execute(&[], &config, &QueryParams::page(0, 10))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_engine_error_payload() {
        let mut server = Server::new_async().await;
        let config = config(format!("{}/_search", server.url()));

        let mock = server
            .mock("POST", "/_search")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"error":{"type":"parsing_exception","reason":"unknown query [terms]"},"status":400}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let err = SearchExecutor::new()
            .execute(&[], &config, &QueryParams::page(0, 10))
            .await
            .unwrap_err();

        match err {
            SearchError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "unknown query [terms]");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_error_body_reports_status() {
        let mut server = Server::new_async().await;
        let config = config(format!("{}/_search", server.url()));

        let _mock = server
            .mock("POST", "/_search")
            .with_status(503)
            .create_async()
            .await;

        let err = SearchExecutor::new()
            .execute(&[], &config, &QueryParams::page(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Status { status: 503, .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = Server::new_async().await;
        let config = config(format!("{}/_search", server.url()));

        let _mock = server
            .mock("POST", "/_search")
            .with_status(200)
            .with_body(r#"{"took": 3}"#)
            .create_async()
            .await;

        let err = SearchExecutor::new()
            .execute(&[], &config, &QueryParams::page(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_invalid_filter_fails_before_request() {
        let mut server = Server::new_async().await;
        let config = config(format!("{}/_search", server.url()));

        let mock = server
            .mock("POST", "/_search")
            .expect(0)
            .create_async()
            .await;

        let filters = vec![Filter::histogram(
            "price",
            "price",
            Some(Bound::Integer(9)),
            Some(Bound::Integer(1)),
        )];
        let err = SearchExecutor::new()
            .execute(&filters, &config, &QueryParams::page(0, 10))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        mock.assert_async().await;
    }

    #[test]
    fn test_engine_error_extraction() {
        assert_eq!(engine_error(""), None);
        assert_eq!(engine_error("plain failure").as_deref(), Some("plain failure"));
        assert_eq!(
            engine_error(r#"{"error":"index missing"}"#).as_deref(),
            Some("index missing")
        );
        assert_eq!(
            engine_error(r#"{"error":{"type":"x"}}"#).as_deref(),
            Some(r#"{"type":"x"}"#)
        );
    }
}
