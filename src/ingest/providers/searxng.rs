// src/ingest/providers/searxng.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{SearchRequest, SearchResult, SearchTopic, Searcher};

// Plain clients get blocked by some SearXNG instances' bot filter.
const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(default)]
    score: f64,
}

/// Self-hosted SearXNG metasearch (`/search?format=json`).
pub struct SearxngSearcher {
    http: reqwest::Client,
    base_url: String,
}

impl SearxngSearcher {
    /// `timeout_secs == 0` means the 30s default.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let timeout = if timeout_secs == 0 { 30 } else { timeout_secs };
        let http = reqwest::Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("building searxng http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn category(topic: SearchTopic) -> &'static str {
        match topic {
            SearchTopic::News => "news",
            SearchTopic::General => "general",
        }
    }
}

fn parse_results(body: &str, max: usize) -> Result<Vec<SearchResult>> {
    let resp: SearxResponse = serde_json::from_str(body).context("decoding searxng response")?;
    Ok(resp
        .results
        .into_iter()
        .take(max)
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
impl Searcher for SearxngSearcher {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>> {
        // SearXNG has no absolute date filter; the result count cap still applies.
        let url = format!("{}/search", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("q", req.query.as_str()),
                ("format", "json"),
                ("categories", Self::category(req.topic)),
            ])
            .send()
            .await
            .context("searxng http get()")?;

        let status = resp.status();
        let body = resp.text().await.context("searxng http .text()")?;
        if !status.is_success() {
            return Err(anyhow!(
                "searxng api error (status {}): {}",
                status.as_u16(),
                body
            ));
        }
        parse_results(&body, req.max_results)
    }

    fn name(&self) -> &'static str {
        "searxng"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_published_date_and_caps_count() {
        let body = r#"{"query":"ai","results":[
            {"title":"A","url":"https://a.test","content":"x","publishedDate":"2026-03-01T10:00:00","score":1.5},
            {"title":"B","url":"https://b.test","content":"y"},
            {"title":"C","url":"https://c.test","content":"z"}
        ]}"#;
        let out = parse_results(body, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].published_date, "2026-03-01T10:00:00");
        assert_eq!(out[1].published_date, "");
    }

    #[test]
    fn base_url_is_normalized() {
        let s = SearxngSearcher::new("http://127.0.0.1:8888/", 0).unwrap();
        assert_eq!(s.base_url, "http://127.0.0.1:8888");
    }
}
