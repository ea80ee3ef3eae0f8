use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use serde_json::Value;
use thiserror::Error;

use crate::models::api::ErrorBody;

/// Errors raised while proxying a chat turn.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Search provider returned {status}: {message}")]
    UpstreamSearch { status: u16, message: String },

    #[error("Completion provider returned {status}: {message}")]
    UpstreamCompletion { status: u16, message: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl ChatError {
    /// HTTP status reported to the browser for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::UpstreamSearch { status, .. } | ChatError::UpstreamCompletion { status, .. } =>
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ChatError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `{ error }` body. Upstream errors expose the
    /// provider's own message rather than the wrapped display string.
    pub fn client_message(&self) -> String {
        match self {
            ChatError::UpstreamSearch { message, .. } => message.clone(),
            ChatError::UpstreamCompletion { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody { error: self.client_message() })).into_response()
    }
}

/// Pulls a human readable message out of a provider error payload.
///
/// Providers disagree on the shape: DeepSeek nests it under `error.message`,
/// Tavily uses `detail.error`, and some proxies answer with a bare `message`
/// or `error` string. Falls back to `fallback` when nothing matches.
pub fn upstream_message(body: &str, fallback: &str) -> String {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return fallback.to_string();
        }
    };

    let candidates = [
        parsed.get("message"),
        parsed.get("error").and_then(|e| e.get("message")),
        parsed.get("error"),
        parsed.get("detail").and_then(|d| d.get("error")),
        parsed.get("detail"),
    ];

    let found = candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| fallback.to_string());
    found
}

/// Short, single line summary of a payload for log lines.
pub fn summarize(body: &str) -> String {
    const LIMIT: usize = 200;
    let flat = body.replace(['\n', '\r'], " ");
    if flat.chars().count() <= LIMIT {
        flat
    } else {
        let cut: String = flat.chars().take(LIMIT).collect();
        format!("{}...", cut)
    }
}
