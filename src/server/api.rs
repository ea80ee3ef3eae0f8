use crate::error::{ ChatError, ChatResult };
use crate::models::api::{ ChatRequest, HealthReply, SearchReply, SearchRequest };
use crate::models::search::SourceSet;
use crate::relay::CompletionRelay;

use std::fmt::Write as _;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    body::Body,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::{ header::{ CACHE_CONTROL, CONTENT_TYPE }, HeaderName, HeaderValue, StatusCode },
    Json,
};
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;
use log::{ info, warn };

pub const SOURCES_HEADER: HeaderName = HeaderName::from_static("x-sources");
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<CompletionRelay>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([SOURCES_HEADER, REQUEST_ID_HEADER]);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/search", post(search_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Serializes `value` as JSON using only visible ASCII, so it can travel in
/// an HTTP header. Non-ASCII characters become `\uXXXX` escapes, which keeps
/// the text valid JSON with the same meaning.
pub fn ascii_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    Ok(out)
}

pub fn sources_header_value(sources: &SourceSet) -> Option<HeaderValue> {
    let encoded = match ascii_json(sources) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to serialize sources: {}", e);
            return None;
        }
    };
    match HeaderValue::from_str(&encoded) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Sources are not a valid header value: {}", e);
            None
        }
    }
}

fn reject(rejection: JsonRejection) -> ChatError {
    ChatError::MalformedRequest(rejection.body_text())
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let mut resp = match relay_chat(&state, &request_id, payload).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("[{}] Chat request failed with {}: {}", request_id, e.status_code(), e);
            e.into_response()
        }
    };
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    resp
}

async fn relay_chat(
    state: &AppState,
    request_id: &str,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> ChatResult<Response> {
    let Json(req) = payload.map_err(reject)?;
    info!("[{}] Chat request with {} message(s)", request_id, req.messages.len());

    let relayed = state.relay.relay(request_id, &req.messages).await?;

    let mut response = Response::new(Body::from_stream(relayed.stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(value) = relayed.sources.as_ref().and_then(sources_header_value) {
        headers.insert(SOURCES_HEADER, value);
    }
    Ok(response)
}

async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>
) -> Response {
    let result = async {
        let Json(req) = payload.map_err(reject)?;
        let found = state.relay.search(&req.query).await?;
        Ok::<_, ChatError>(SearchReply {
            query: req.query,
            answer: found.answer,
            results: found.results,
        })
    }.await;

    match result {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            warn!("Search request failed with {}: {}", e.status_code(), e);
            e.into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthReply { status: "ok" })
}
