use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;
use super::search::SourceSet;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchReply {
    pub query: String,
    pub answer: Option<String>,
    pub results: SourceSet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReply {
    pub status: &'static str,
}
