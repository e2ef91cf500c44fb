// src/ingest/types.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Search vertical requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTopic {
    News,
    General,
}

impl SearchTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchTopic::News => "news",
            SearchTopic::General => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub topic: SearchTopic,
    pub max_results: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub include_raw_content: bool,
}

/// One ranked candidate returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Provider snippet; may be short or empty.
    pub content: String,
    pub published_date: String,
    pub score: f64,
}

/// Search capability (Tavily, SearXNG, test doubles).
#[async_trait::async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>>;
    fn name(&self) -> &'static str;
}

/// Retrieves a page and extracts its readable main text.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
