//! Persona-aware cross-domain brief built from all domain reports of a run.

use std::fmt::Write as _;

use metrics::histogram;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analyze::gateway::ModelGateway;
use crate::analyze::parse::parse_deep_analysis;
use crate::analyze::retry::RetryPolicy;
use crate::error::GenerationError;
use crate::metrics::GENERATION_MS;
use crate::model::{DeepAnalysis, DomainReport};

const SYSTEM_PROMPT: &str = "You are a JSON generator.";

/// Aggregated summary text, built once per run and shared by every persona.
pub fn build_aggregated_summary(reports: &[DomainReport]) -> String {
    let mut sb = String::new();
    for r in reports {
        let _ = writeln!(sb, "## Domain: {} (score: {})", r.domain, r.score);
        let _ = writeln!(sb, "### Overview\n{}", r.overview);
        let _ = writeln!(sb, "### Trends\n{}", r.trends);
        let _ = write!(sb, "### Key events\n- {}\n\n", r.key_events.join("\n- "));
    }
    sb
}

pub fn build_deep_prompt(persona: &str, aggregated: &str) -> String {
    format!(
        r#"Role: senior technology consultant and personal development strategist
Context
User persona: {persona}
Input data: a multi-domain daily news summary report.
Core request: analyze across domains, identify macro trends, and give the user strategic advice.

Instructions
Output strictly in JSON format:
{{
    "title": "A catchy short title for today's content across all domains (at most 20 words)",
    "macro_trends": "Core trend insights in Markdown...",
    "opportunities": "Opportunities in Markdown...",
    "risks": "Risk warnings in Markdown...",
    "action_guides": ["Action 1", "Action 2", "Action 3"]
}}

News summary input:
{aggregated}"#
    )
}

pub struct DeepAnalysisGenerator {
    gateway: ModelGateway,
    retry: RetryPolicy,
}

impl DeepAnalysisGenerator {
    pub fn new(gateway: ModelGateway) -> Self {
        Self {
            gateway,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn generate(
        &self,
        aggregated: &str,
        persona: &str,
        cancel: &CancellationToken,
    ) -> Result<DeepAnalysis, GenerationError> {
        let prompt = build_deep_prompt(persona, aggregated);
        let (gateway, prompt) = (&self.gateway, prompt.as_str());
        let t0 = Instant::now();
        let res = self
            .retry
            .run("deep-analysis", cancel, move |_attempt| async move {
                let raw = gateway.complete(SYSTEM_PROMPT, prompt, cancel).await?;
                parse_deep_analysis(&raw)
            })
            .await;
        histogram!(GENERATION_MS, "kind" => "deep").record(t0.elapsed().as_secs_f64() * 1_000.0);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(domain: &str, score: i32, events: &[&str]) -> DomainReport {
        DomainReport {
            domain: domain.to_string(),
            overview: format!("{domain} overview"),
            key_events: events.iter().map(|s| s.to_string()).collect(),
            trends: format!("{domain} trends"),
            score,
            articles: Vec::new(),
        }
    }

    #[test]
    fn aggregated_summary_lists_every_domain() {
        let s = build_aggregated_summary(&[
            report("ai", 9, &["GPU launch", "Model release"]),
            report("finance", 4, &[]),
        ]);
        assert!(s.starts_with("## Domain: ai (score: 9)\n### Overview\nai overview\n"));
        assert!(s.contains("### Key events\n- GPU launch\n- Model release\n\n"));
        assert!(s.contains("## Domain: finance (score: 4)"));
    }

    #[test]
    fn prompt_embeds_persona_and_summary() {
        let p = build_deep_prompt("Rust developer", "## Domain: ai");
        assert!(p.contains("User persona: Rust developer"));
        assert!(p.ends_with("News summary input:\n## Domain: ai"));
        assert!(p.contains("\"action_guides\""));
    }
}
