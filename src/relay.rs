use futures::stream::{ self, StreamExt };
use log::{ debug, error, info, warn };
use std::fmt;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{ ChatError, ChatResult };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient, TokenStream };
use crate::models::chat::{ latest_user_turn, ChatMessage };
use crate::models::search::{ SearchResponse, SourceSet };
use crate::rag::PromptComposer;
use crate::search::{ new_client as new_search_client, SearchClient };

/// Lifecycle of a single chat turn. Nothing carries over between turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Received,
    Searching,
    Composing,
    Streaming,
    Completed,
    Failed,
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayStage::Received => "received",
            RelayStage::Searching => "searching",
            RelayStage::Composing => "composing",
            RelayStage::Streaming => "streaming",
            RelayStage::Completed => "completed",
            RelayStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

fn enter(request_id: &str, stage: RelayStage) {
    debug!("[{}] stage -> {}", request_id, stage);
}

pub struct RelayResponse {
    /// Present only when the answer was generated with search results.
    pub sources: Option<SourceSet>,
    pub stream: TokenStream,
}

#[derive(Clone)]
pub struct CompletionRelay {
    chat_client: Arc<dyn ChatClient>,
    search_client: Option<Arc<dyn SearchClient>>,
    composer: PromptComposer,
}

impl CompletionRelay {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        search_client: Option<Arc<dyn SearchClient>>,
        composer: PromptComposer
    ) -> Self {
        Self {
            chat_client,
            search_client,
            composer,
        }
    }

    pub fn from_config(config: &AppConfig) -> ChatResult<Self> {
        let chat_client = new_chat_client(&config.chat)?;
        info!(
            "Chat client configured: Model={}, BaseURL={}",
            chat_client.get_model(),
            chat_client.get_base_url()
        );

        let search_client = match &config.search {
            Some(settings) => {
                let client = new_search_client(settings)?;
                info!("Search client configured: BaseURL={}", client.get_base_url());
                Some(client)
            }
            None => {
                info!("Web search disabled; answers are never augmented.");
                None
            }
        };

        Ok(Self::new(chat_client, search_client, PromptComposer::new(config.prompts.clone())))
    }

    pub fn search_enabled(&self) -> bool {
        self.search_client.is_some()
    }

    /// Search-only passthrough used by the `/api/search` endpoint.
    pub async fn search(&self, query: &str) -> ChatResult<SearchResponse> {
        match &self.search_client {
            Some(client) => client.search(query).await,
            None => Err(ChatError::Configuration("Web search is disabled".to_string())),
        }
    }

    /// Answers the newest turn of `conversation`.
    ///
    /// Search failures never reach the caller: the turn is answered without
    /// sources instead. If the model rejects the augmented prompt, the turn is
    /// retried once without sources; only that failure is returned.
    pub async fn relay(&self, request_id: &str, conversation: &[ChatMessage]) -> ChatResult<RelayResponse> {
        enter(request_id, RelayStage::Received);
        if conversation.is_empty() {
            enter(request_id, RelayStage::Failed);
            return Err(ChatError::MalformedRequest("messages must not be empty".to_string()));
        }

        let sources = self.retrieve(request_id, conversation).await;

        enter(request_id, RelayStage::Composing);
        if let Some(set) = &sources {
            let messages = self.composer.compose(conversation, Some(set));
            enter(request_id, RelayStage::Streaming);
            match self.chat_client.stream_chat(&messages).await {
                Ok(stream) => {
                    info!("[{}] Streaming answer backed by {} source(s)", request_id, set.len());
                    return Ok(RelayResponse {
                        sources,
                        stream: track_completion(request_id.to_string(), stream),
                    });
                }
                Err(e) => {
                    warn!("[{}] Augmented completion failed, retrying without sources: {}", request_id, e);
                    enter(request_id, RelayStage::Composing);
                }
            }
        }

        let messages = self.composer.compose(conversation, None);
        enter(request_id, RelayStage::Streaming);
        match self.chat_client.stream_chat(&messages).await {
            Ok(stream) => {
                info!("[{}] Streaming answer without sources", request_id);
                Ok(RelayResponse {
                    sources: None,
                    stream: track_completion(request_id.to_string(), stream),
                })
            }
            Err(e) => {
                error!("[{}] Completion failed: {}", request_id, e);
                enter(request_id, RelayStage::Failed);
                Err(e)
            }
        }
    }

    async fn retrieve(&self, request_id: &str, conversation: &[ChatMessage]) -> Option<SourceSet> {
        let client = self.search_client.as_ref()?;
        let question = match latest_user_turn(conversation) {
            Some(turn) if !turn.content.trim().is_empty() => turn.content.as_str(),
            _ => {
                debug!("[{}] Newest turn is not a user question; skipping search", request_id);
                return None;
            }
        };

        enter(request_id, RelayStage::Searching);
        match client.search(question).await {
            Ok(resp) if resp.results.is_empty() => {
                info!("[{}] Search returned no results", request_id);
                None
            }
            Ok(resp) => Some(resp.results),
            Err(e) => {
                warn!("[{}] Web search failed, answering without sources: {}", request_id, e);
                None
            }
        }
    }
}

/// Logs the end of a relayed stream. Stops after the first error.
fn track_completion(request_id: String, inner: TokenStream) -> TokenStream {
    Box::pin(
        stream::unfold(Some((inner, request_id)), |state| async move {
            let (mut inner, request_id) = state?;
            match inner.next().await {
                Some(Ok(tok)) => Some((Ok(tok), Some((inner, request_id)))),
                Some(Err(e)) => {
                    error!("[{}] Stream aborted: {}", request_id, e);
                    enter(&request_id, RelayStage::Failed);
                    Some((Err(e), None))
                }
                None => {
                    enter(&request_id, RelayStage::Completed);
                    None
                }
            }
        })
    )
}
