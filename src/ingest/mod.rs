// src/ingest/mod.rs
//! Search a topic, then turn ranked candidates into validated articles.
//!
//! Validity floor: an article's content is trimmed to at most
//! `MAX_CONTENT_CHARS` and must keep at least `MIN_CONTENT_CHARS` to be used as
//! model input. Short provider snippets trigger a full-page fetch first.

pub mod fetch;
pub mod providers;
pub mod types;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use metrics::counter;
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::ingest::types::{ContentFetcher, SearchRequest, SearchResult, SearchTopic};
use crate::metrics::{ensure_metrics_described, ARTICLES_FETCHED_TOTAL, FETCH_ERRORS_TOTAL};
use crate::model::Article;

/// Candidates requested per topic.
pub const MAX_CANDIDATES: usize = 20;
/// Snippets shorter than this trigger a full-page fetch.
pub const FETCH_BELOW_CHARS: usize = 500;
pub const MAX_CONTENT_CHARS: usize = 5000;
pub const MIN_CONTENT_CHARS: usize = 100;
/// Collection stops once this many valid articles exist for a topic.
pub const MAX_ARTICLES_PER_TOPIC: usize = 6;
/// Trailing search window, in days.
pub const SEARCH_WINDOW_DAYS: i64 = 3;

/// Normalize text: decode entities, strip tags, collapse whitespace.
/// Line structure survives as single `\n` separators.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes; drop NULs (not storable as text)
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\0', "");

    // 4) Collapse horizontal whitespace, then blank-line runs
    static RE_HWS: OnceCell<regex::Regex> = OnceCell::new();
    let re_hws = RE_HWS.get_or_init(|| regex::Regex::new(r"[^\S\n]+").unwrap());
    out = re_hws.replace_all(&out, " ").to_string();

    static RE_NL: OnceCell<regex::Regex> = OnceCell::new();
    let re_nl = RE_NL.get_or_init(|| regex::Regex::new(r" ?\n[\s]*").unwrap());
    out = re_nl.replace_all(&out, "\n").to_string();

    out.trim().to_string()
}

/// Cut `s` to at most `max` characters (never splits a char).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// `[now - SEARCH_WINDOW_DAYS, now]` as calendar dates.
pub fn search_window(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let end = now.date_naive();
    let start = (now - ChronoDuration::days(SEARCH_WINDOW_DAYS)).date_naive();
    (start, end)
}

/// The request issued for every topic of a run.
pub fn topic_request(topic: &str, now: DateTime<Utc>) -> SearchRequest {
    let (start_date, end_date) = search_window(now);
    SearchRequest {
        query: topic.to_string(),
        topic: SearchTopic::News,
        max_results: MAX_CANDIDATES,
        start_date,
        end_date,
        include_raw_content: false,
    }
}

/// Walk candidates in rank order and keep those passing the validity floor.
///
/// A snippet under `FETCH_BELOW_CHARS` is replaced by the fetched page text when
/// that is longer; fetch errors are logged and the snippet is kept. Stops early
/// at `MAX_ARTICLES_PER_TOPIC` or when `cancel` fires.
pub async fn collect_articles(
    topic: &str,
    candidates: Vec<SearchResult>,
    fetcher: &dyn ContentFetcher,
    cancel: &CancellationToken,
) -> Vec<Article> {
    ensure_metrics_described();

    let mut valid = Vec::with_capacity(MAX_ARTICLES_PER_TOPIC);
    for item in candidates {
        if cancel.is_cancelled() {
            break;
        }

        let mut content = normalize_text(&item.content);
        if content.chars().count() < FETCH_BELOW_CHARS && !item.url.is_empty() {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                res = fetcher.fetch(&item.url) => res,
            };
            match fetched {
                Ok(text) => {
                    if text.chars().count() > content.chars().count() {
                        content = text;
                    }
                }
                Err(e) => {
                    tracing::debug!(target: "ingest", topic, url = %item.url, error = ?e, "page fetch failed");
                    counter!(FETCH_ERRORS_TOTAL).increment(1);
                }
            }
        }

        let content = truncate_chars(&content, MAX_CONTENT_CHARS);
        if content.chars().count() < MIN_CONTENT_CHARS {
            continue;
        }

        valid.push(Article {
            title: item.title,
            link: item.url,
            source: topic.to_string(),
            published_date: item.published_date,
            content,
        });
        if valid.len() >= MAX_ARTICLES_PER_TOPIC {
            break;
        }
    }

    counter!(ARTICLES_FETCHED_TOTAL).increment(valid.len() as u64);
    valid
}
