// tests/common/mod.rs
// Shared doubles for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use domain_radar::analyze::{ModelGateway, RateLimiter, Summarizer};
use domain_radar::ingest::types::{ContentFetcher, SearchRequest, SearchResult, Searcher};
use domain_radar::SummarizerError;

pub fn body(words: &str) -> String {
    // Comfortably above the 100-char floor, below the 500-char fetch threshold.
    format!("{words}. ").repeat(8)
}

pub fn result(title: &str, content: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: format!("https://news.test/{}", title.replace(' ', "-")),
        content: content.to_string(),
        published_date: "2026-05-03".to_string(),
        score: 0.9,
    }
}

/// Canned results per query; unknown queries return nothing.
#[derive(Default)]
pub struct MockSearcher {
    results: HashMap<String, Result<Vec<SearchResult>, String>>,
    panics_on: Option<String>,
    pub queries: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, topic: &str, results: Vec<SearchResult>) -> Self {
        self.results.insert(topic.to_string(), Ok(results));
        self
    }

    pub fn failing(mut self, topic: &str, msg: &str) -> Self {
        self.results.insert(topic.to_string(), Err(msg.to_string()));
        self
    }

    pub fn panicking(mut self, topic: &str) -> Self {
        self.panics_on = Some(topic.to_string());
        self
    }
}

#[async_trait]
impl Searcher for MockSearcher {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(req.query.clone());
        if self.panics_on.as_deref() == Some(req.query.as_str()) {
            panic!("searcher blew up on {}", req.query);
        }
        match self.results.get(&req.query) {
            Some(Ok(r)) => Ok(r.clone()),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Serves pages from a map; everything else is a fetch error.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    pub fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 for {url}"))
    }
}

/// Answers by the first needle found in the user prompt. Order-independent,
/// so concurrent topic workers get deterministic replies.
#[derive(Default)]
pub struct RoutingSummarizer {
    routes: Vec<(String, Result<String, SummarizerError>)>,
    pub prompts: Mutex<Vec<String>>,
}

impl RoutingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, needle: &str, reply: impl Into<String>) -> Self {
        self.routes.push((needle.to_string(), Ok(reply.into())));
        self
    }

    pub fn route_err(mut self, needle: &str, err: SummarizerError) -> Self {
        self.routes.push((needle.to_string(), Err(err)));
        self
    }

    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl Summarizer for RoutingSummarizer {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, SummarizerError> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.routes
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Err(SummarizerError::Other("no route".to_string())))
    }

    fn name(&self) -> &'static str {
        "routing"
    }
}

pub fn domain_json(score: i32) -> String {
    format!(
        r#"{{"overview":"Overview text","key_events":["Event A","Event B"],"trends":"Trend text","score":{score}}}"#
    )
}

pub fn deep_json(title: &str) -> String {
    format!(
        r#"```json
{{"title":"{title}","macro_trends":"Macro","opportunities":"Opps","risks":"Risks","action_guides":["Do one","Do two"]}}
```"#
    )
}

/// Gateway with a limiter loose enough to never wait in tests.
pub fn gateway(summarizer: Arc<dyn Summarizer>) -> ModelGateway {
    ModelGateway::new(summarizer, Arc::new(RateLimiter::per_minute(60_000, 1_000)))
}
