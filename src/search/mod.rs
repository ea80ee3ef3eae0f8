pub mod tavily;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::SearchSettings;
use crate::error::ChatResult;
use crate::models::search::SearchResponse;
use self::tavily::TavilySearchClient;

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs one web search. A single attempt; callers decide how to recover.
    async fn search(&self, query: &str) -> ChatResult<SearchResponse>;

    fn get_base_url(&self) -> String;
}

pub fn new_client(settings: &SearchSettings) -> ChatResult<Arc<dyn SearchClient>> {
    let client = TavilySearchClient::from_settings(settings)?;
    Ok(Arc::new(client))
}
