use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, AUTHORIZATION } };
use serde::Deserialize;
use std::time::Duration;

use super::{ http_stream_generate, ChatClient, StreamLine, TokenStream };
use crate::config::ChatSettings;
use crate::error::{ ChatError, ChatResult };
use crate::models::chat::{ ChatMessage, CompletionRequest };

const FALLBACK_ERROR: &str = "Failed to get response from DeepSeek";

pub struct DeepSeekChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct DeepSeekStreamResponse {
    #[serde(default)]
    choices: Vec<DeepSeekStreamChoice>,
}

#[derive(Deserialize)]
struct DeepSeekStreamChoice {
    delta: DeepSeekDelta,
}

#[derive(Deserialize)]
struct DeepSeekDelta {
    content: Option<String>,
}

/// Pulls answer text out of one server-sent event line.
///
/// Only `delta.content` is relayed; `reasoning_content` from reasoner models
/// and keep-alive comments are skipped.
pub fn parse_sse_line(line: &str) -> Option<StreamLine> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(StreamLine::Done);
    }

    match serde_json::from_str::<DeepSeekStreamResponse>(data) {
        Ok(resp) => {
            let text: String = resp.choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if text.is_empty() {
                None
            } else {
                Some(StreamLine::Token(text))
            }
        }
        Err(e) => {
            debug!("JSON parse error: {} for data: {}", e, data);
            None
        }
    }
}

impl DeepSeekChatClient {
    pub fn new(
        api_key: &str,
        model: String,
        base_url: String,
        max_tokens: u32,
        connect_timeout: Duration
    ) -> ChatResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                ChatError::Configuration(format!("Invalid DeepSeek API key format: {}", e))
            )?
        );

        // No overall timeout: answers from reasoner models can stream for minutes.
        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http,
            model,
            base_url,
            max_tokens,
        })
    }

    pub fn from_settings(settings: &ChatSettings) -> ChatResult<Self> {
        Self::new(
            &settings.api_key,
            settings.model.clone(),
            settings.api_url.clone(),
            settings.max_tokens,
            settings.connect_timeout
        )
    }
}

#[async_trait]
impl ChatClient for DeepSeekChatClient {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> ChatResult<TokenStream> {
        let req = CompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            stream: true,
            max_tokens: self.max_tokens,
        };

        info!(
            "DeepSeek request: model={}, messages={}, max_tokens={}",
            req.model,
            req.messages.len(),
            req.max_tokens
        );
        let request = self.http.post(&self.base_url).json(&req);
        http_stream_generate(request, parse_sse_line, FALLBACK_ERROR).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{ body_json, header, method };
    use wiremock::{ Mock, MockServer, ResponseTemplate };

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"id":"1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line), Some(StreamLine::Token("Hel".into())));
    }

    #[test]
    fn skips_reasoning_and_role_only_deltas() {
        let reasoning = r#"data: {"choices":[{"delta":{"reasoning_content":"thinking...","content":null}}]}"#;
        let role = r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#;
        assert_eq!(parse_sse_line(reasoning), None);
        assert_eq!(parse_sse_line(role), None);
    }

    #[test]
    fn recognizes_done_and_ignores_noise() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(StreamLine::Done));
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
    }

    #[test]
    fn content_is_passed_through_untouched() {
        let line = r#"data: {"choices":[{"delta":{"content":"  **bold**\n- item"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(StreamLine::Token("  **bold**\n- item".into())));
    }

    #[tokio::test]
    async fn streams_tokens_and_sends_expected_body() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Paris\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" it is.\"}}]}\n\n",
            "data: [DONE]\n\n"
        );
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .and(
                body_json(
                    serde_json::json!({
                    "model": "deepseek-reasoner",
                    "messages": [{"role": "user", "content": "Capital of France?"}],
                    "stream": true,
                    "max_tokens": 4000
                })
                )
            )
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .expect(1)
            .mount(&server).await;

        let client = DeepSeekChatClient::new(
            "sk-test",
            "deepseek-reasoner".into(),
            server.uri(),
            4000,
            Duration::from_secs(5)
        ).unwrap();

        let stream = client.stream_chat(&[ChatMessage::user("Capital of France?")]).await.unwrap();
        let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
        assert_eq!(tokens, vec!["Paris".to_string(), " it is.".to_string()]);
    }

    #[tokio::test]
    async fn rejected_request_reports_provider_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(402).set_body_json(
                    serde_json::json!({"error": {"message": "Insufficient Balance", "type": "unknown_error"}})
                )
            )
            .mount(&server).await;

        let client = DeepSeekChatClient::new(
            "sk-test",
            "deepseek-chat".into(),
            server.uri(),
            4000,
            Duration::from_secs(5)
        ).unwrap();

        match client.stream_chat(&[ChatMessage::user("hi")]).await {
            Err(ChatError::UpstreamCompletion { status, message }) => {
                assert_eq!(status, 402);
                assert_eq!(message, "Insufficient Balance");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
