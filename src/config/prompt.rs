use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use log::info;

use crate::error::{ ChatError, ChatResult };

pub const DEFAULT_DIRECT_PROMPT: &str =
    "You are a helpful assistant. Respond directly without explaining your reasoning.";

pub const DEFAULT_SOURCES_PROMPT: &str =
    "You are a helpful assistant with access to current web search results. \
Answer the user's question using the search results provided in the next system message. \
Cite the sources you rely on by their URL, and say so plainly when the results do not \
cover the question. Respond directly without explaining your reasoning.";

/// System instructions prepended to every composed prompt.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Used when the answer is not backed by search results.
    #[serde(default = "default_direct")]
    pub direct: String,
    /// Used when a retrieval message follows.
    #[serde(default = "default_with_sources")]
    pub with_sources: String,
}

fn default_direct() -> String {
    DEFAULT_DIRECT_PROMPT.to_string()
}

fn default_with_sources() -> String {
    DEFAULT_SOURCES_PROMPT.to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            direct: default_direct(),
            with_sources: default_with_sources(),
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> ChatResult<()> {
        if self.direct.trim().is_empty() {
            return Err(ChatError::Configuration("prompt 'direct' must not be empty".to_string()));
        }
        if self.with_sources.trim().is_empty() {
            return Err(
                ChatError::Configuration("prompt 'with_sources' must not be empty".to_string())
            );
        }
        Ok(())
    }
}

pub fn load_prompts(path: &str) -> ChatResult<Arc<PromptConfig>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e|
            ChatError::Configuration(format!("Failed to read prompts file '{}': {}", path, e))
        )?;
    let config: PromptConfig = serde_json
        ::from_str(&file_content)
        .map_err(|e|
            ChatError::Configuration(format!("Failed to parse prompts file '{}': {}", path, e))
        )?;
    config.validate()?;
    info!("Loaded system prompts from '{}'", path);
    Ok(Arc::new(config))
}

/// Prompts from `path` when given, built-in defaults otherwise.
pub fn resolve_prompts(path: Option<&str>) -> ChatResult<Arc<PromptConfig>> {
    match path {
        Some(p) => load_prompts(p),
        None => Ok(Arc::new(PromptConfig::default())),
    }
}
