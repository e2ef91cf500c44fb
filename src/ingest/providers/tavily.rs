// src/ingest/providers/tavily.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ingest::types::{SearchRequest, SearchResult, Searcher};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    topic: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    include_raw_content: bool,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    published_date: Option<String>,
}

/// Tavily search API (POST JSON, bearer key).
pub struct TavilySearcher {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearcher {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(api_key, TAVILY_SEARCH_URL)
    }

    /// Same client against another endpoint (self-hosted proxy, tests).
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("domain-radar/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building tavily http client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }
}

fn parse_results(body: &str) -> Result<Vec<SearchResult>> {
    let resp: TavilyResponse = serde_json::from_str(body).context("parsing tavily response")?;
    Ok(resp
        .results
        .into_iter()
        .map(|r| SearchResult {
            title: r.title,
            url: r.url,
            content: r.content,
            published_date: r.published_date.unwrap_or_default(),
            score: r.score,
        })
        .collect())
}

#[async_trait]
impl Searcher for TavilySearcher {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>> {
        let payload = TavilyRequest {
            query: &req.query,
            search_depth: "basic",
            topic: req.topic.as_str(),
            max_results: req.max_results,
            include_raw_content: req.include_raw_content,
            start_date: req.start_date.format("%Y-%m-%d").to_string(),
            end_date: req.end_date.format("%Y-%m-%d").to_string(),
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("tavily http post()")?;

        let status = resp.status();
        let body = resp.text().await.context("tavily http .text()")?;
        if !status.is_success() {
            return Err(anyhow!(
                "tavily api error (status {}): {}",
                status.as_u16(),
                body
            ));
        }
        parse_results(&body)
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_and_tolerates_missing_fields() {
        let body = r#"{
            "query": "ai",
            "answer": null,
            "results": [
                {"title": "A", "url": "https://a.test", "content": "snippet", "score": 0.9,
                 "published_date": "Mon, 02 Mar 2026 08:00:00 GMT"},
                {"title": "B", "url": "https://b.test"}
            ]
        }"#;
        let out = parse_results(body).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].published_date, "Mon, 02 Mar 2026 08:00:00 GMT");
        assert_eq!(out[1].content, "");
        assert_eq!(out[1].score, 0.0);
    }

    #[test]
    fn request_serializes_dates_and_skips_false_raw() {
        let req = TavilyRequest {
            query: "ai",
            search_depth: "basic",
            topic: "news",
            max_results: 20,
            include_raw_content: false,
            start_date: "2026-02-27".into(),
            end_date: "2026-03-02".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["start_date"], "2026-02-27");
        assert_eq!(v["topic"], "news");
        assert!(v.get("include_raw_content").is_none());
    }
}
