//! Parsing of the semi-structured JSON the model returns.

use serde::Deserialize;

use crate::error::GenerationError;
use crate::model::{DeepAnalysis, DomainReport};

/// Drop surrounding whitespace and an optional ```/```json fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```JSON"))
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

#[derive(Debug, Deserialize)]
struct DomainReportPayload {
    overview: String,
    #[serde(default)]
    key_events: Vec<String>,
    trends: String,
    score: i32,
}

#[derive(Debug, Deserialize)]
struct DeepAnalysisPayload {
    #[serde(default)]
    title: Option<String>,
    macro_trends: String,
    opportunities: String,
    risks: String,
    #[serde(default)]
    action_guides: Vec<String>,
}

/// Parse `{overview, key_events[], trends, score}` and tag it with `domain`.
/// Articles are attached by the caller.
pub fn parse_domain_report(domain: &str, raw: &str) -> Result<DomainReport, GenerationError> {
    let p: DomainReportPayload = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| GenerationError::Parse(e.to_string()))?;
    Ok(DomainReport {
        domain: domain.to_string(),
        overview: p.overview,
        key_events: p.key_events,
        trends: p.trends,
        score: p.score,
        articles: Vec::new(),
    })
}

/// Parse `{title?, macro_trends, opportunities, risks, action_guides[]}`.
/// A blank title counts as absent.
pub fn parse_deep_analysis(raw: &str) -> Result<DeepAnalysis, GenerationError> {
    let p: DeepAnalysisPayload = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| GenerationError::Parse(e.to_string()))?;
    Ok(DeepAnalysis {
        title: p
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        macro_trends: p.macro_trends,
        opportunities: p.opportunities,
        risks: p.risks,
        action_guides: p.action_guides,
    })
}
