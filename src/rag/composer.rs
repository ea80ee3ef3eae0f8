use std::sync::Arc;

use crate::config::prompt::PromptConfig;
use crate::models::chat::{ ChatMessage, Role };
use crate::models::search::SourceSet;

/// Builds the exact message list submitted to the model.
#[derive(Clone, Debug)]
pub struct PromptComposer {
    prompt_config: Arc<PromptConfig>,
}

/// Renders every result as `[Source: <url>]` followed by its snippet,
/// separated by blank lines, in provider order.
pub fn format_sources(sources: &SourceSet) -> String {
    sources
        .iter()
        .map(|r| format!("[Source: {}]\n{}", r.url, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl PromptComposer {
    pub fn new(prompt_config: Arc<PromptConfig>) -> Self {
        Self { prompt_config }
    }

    /// Composes the model input for `conversation`.
    ///
    /// Caller supplied system turns are dropped and replaced by one canonical
    /// instruction at the head. When `sources` is given and the newest turn of
    /// `conversation` is from the user, the retrieval message sits directly
    /// ahead of that turn. Otherwise (a trailing system ping included) the
    /// sources are ignored and the result is unaugmented.
    pub fn compose(&self, conversation: &[ChatMessage], sources: Option<&SourceSet>) -> Vec<ChatMessage> {
        let sources = sources.filter(|_| conversation.last().is_some_and(ChatMessage::is_user));
        let turns: Vec<&ChatMessage> = conversation
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();

        let mut composed = Vec::with_capacity(turns.len() + 2);
        match (sources, turns.split_last()) {
            (Some(set), Some((question, earlier))) => {
                composed.push(ChatMessage::system(self.prompt_config.with_sources.clone()));
                composed.extend(earlier.iter().map(|m| (*m).clone()));
                composed.push(ChatMessage::system(format_sources(set)));
                composed.push((*question).clone());
            }
            _ => {
                composed.push(ChatMessage::system(self.prompt_config.direct.clone()));
                composed.extend(turns.iter().map(|m| (*m).clone()));
            }
        }
        composed
    }
}
