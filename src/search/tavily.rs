use async_trait::async_trait;
use log::{ debug, error, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::Serialize;
use std::time::Duration;

use super::SearchClient;
use crate::config::SearchSettings;
use crate::error::{ summarize, upstream_message, ChatError, ChatResult };
use crate::models::search::SearchResponse;

const FALLBACK_ERROR: &str = "Failed to get response from Tavily";

pub struct TavilySearchClient {
    http: HttpClient,
    base_url: String,
    search_depth: String,
    max_results: usize,
}

#[derive(Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    include_images: bool,
    max_results: usize,
}

impl TavilySearchClient {
    pub fn new(
        api_key: &str,
        base_url: String,
        search_depth: String,
        max_results: usize,
        timeout: Duration,
        connect_timeout: Duration
    ) -> ChatResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                ChatError::Configuration(format!("Invalid Tavily API key format: {}", e))
            )?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            search_depth,
            max_results,
        })
    }

    pub fn from_settings(settings: &SearchSettings) -> ChatResult<Self> {
        Self::new(
            &settings.api_key,
            settings.api_url.clone(),
            settings.search_depth.clone(),
            settings.max_results,
            settings.timeout,
            settings.connect_timeout
        )
    }
}

#[async_trait]
impl SearchClient for TavilySearchClient {
    async fn search(&self, query: &str) -> ChatResult<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::MalformedRequest("search query must not be empty".to_string()));
        }

        let req = TavilySearchRequest {
            query,
            search_depth: &self.search_depth,
            include_answer: true,
            include_images: false,
            max_results: self.max_results,
        };

        debug!("Tavily search request to {}: {:?}", self.base_url, summarize(query));
        let resp = self.http.post(&self.base_url).json(&req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Tavily API error from {} ({}): {}", self.base_url, status, summarize(&body));
            return Err(ChatError::UpstreamSearch {
                status: status.as_u16(),
                message: upstream_message(&body, FALLBACK_ERROR),
            });
        }

        let parsed = resp.json::<SearchResponse>().await?;
        info!("Tavily returned {} result(s) for query {:?}", parsed.results.len(), summarize(query));
        Ok(parsed)
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{ body_json, header, method };
    use wiremock::{ Mock, MockServer, ResponseTemplate };

    fn client(url: String) -> TavilySearchClient {
        TavilySearchClient::new(
            "tvly-test",
            url,
            "advanced".into(),
            5,
            Duration::from_secs(5),
            Duration::from_secs(5)
        ).unwrap()
    }

    #[tokio::test]
    async fn sends_fixed_search_options_and_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(
                body_json(
                    serde_json::json!({
                    "query": "capital of France",
                    "search_depth": "advanced",
                    "include_answer": true,
                    "include_images": false,
                    "max_results": 5
                })
                )
            )
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    serde_json::json!({
                    "query": "capital of France",
                    "answer": "Paris.",
                    "images": [],
                    "results": [
                        {"title": "A", "url": "https://a.com", "content": "Paris is the capital.", "score": 0.9, "published_date": "2024-01-01"},
                        {"title": "B", "url": "https://b.com", "content": "France facts.", "score": 0.5}
                    ],
                    "response_time": 1.2
                })
                )
            )
            .expect(1)
            .mount(&server).await;

        let resp = client(server.uri()).search("  capital of France ").await.unwrap();
        assert_eq!(resp.answer.as_deref(), Some("Paris."));
        assert_eq!(resp.results.len(), 2);
        let first = &resp.results.results()[0];
        assert_eq!(first.url, "https://a.com");
        assert_eq!(first.published_date.as_deref(), Some("2024-01-01"));
        assert!(resp.results.results()[1].published_date.is_none());
    }

    #[tokio::test]
    async fn non_success_carries_provider_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(
                    serde_json::json!({"detail": {"error": "Unauthorized: missing or invalid API key."}})
                )
            )
            .mount(&server).await;

        let err = client(server.uri()).search("anything").await.unwrap_err();
        match err {
            ChatError::UpstreamSearch { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized: missing or invalid API key.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_query_never_reaches_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let err = client(server.uri()).search("   ").await.unwrap_err();
        assert!(matches!(err, ChatError::MalformedRequest(_)));
    }
}
