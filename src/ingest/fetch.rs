// src/ingest/fetch.rs
//! Full-page fetch + readable-text extraction for candidates whose search
//! snippet is too short to summarize.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use llm_readability::extractor;
use reqwest::Url;
use std::time::Duration;

use crate::ingest::normalize_text;
use crate::ingest::types::ContentFetcher;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// Wide enough that html2text never hard-wraps a paragraph.
const TEXT_WIDTH: usize = 10_000;

/// Extract the readable main text of an HTML page.
///
/// Readability scoring picks the main content node; when it finds nothing the
/// whole page is rendered as text instead. Output is one block per line.
pub fn extract_readable_text(html: &str, url: &Url) -> String {
    let main = match extractor::extract(&mut html.as_bytes(), url) {
        Ok(product) => render_text(&product.content),
        Err(e) => {
            tracing::debug!(target: "ingest", %url, error = %e, "readability extraction failed");
            String::new()
        }
    };
    if !main.is_empty() {
        return main;
    }
    render_text(html)
}

fn render_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(text) => normalize_text(&text),
        Err(e) => {
            tracing::debug!(target: "ingest", error = %e, "html2text failed");
            String::new()
        }
    }
}

/// reqwest-backed fetcher with a hard 30s bound per page.
pub struct HttpContentFetcher {
    http: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; domain-radar/0.1)")
            .connect_timeout(Duration::from_secs(10))
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building fetch http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("fetch {url}: http status {}", status.as_u16()));
        }
        // Final URL after redirects resolves relative links.
        let page_url = resp.url().clone();
        let html = resp.text().await.context("fetch .text()")?;
        // DOM parsing of large pages is CPU-bound.
        let text = tokio::task::spawn_blocking(move || extract_readable_text(&html, &page_url))
            .await
            .context("extraction task")?;
        Ok(text)
    }
}
