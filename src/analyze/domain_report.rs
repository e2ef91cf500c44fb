//! Domain report generation: one topic's articles in, one structured report out.

use std::fmt::Write as _;

use metrics::histogram;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analyze::gateway::ModelGateway;
use crate::analyze::parse::parse_domain_report;
use crate::analyze::retry::RetryPolicy;
use crate::error::GenerationError;
use crate::metrics::GENERATION_MS;
use crate::model::{Article, DomainReport};

const SYSTEM_PROMPT: &str = "You are a JSON generator. Output only the JSON string.";

const INSTRUCTIONS: &str = r#"You are a senior industry analyst. Based on the articles above, write an in-depth summary report for this domain.
Return strictly the following JSON format, without any markdown markup:
{
	"overview": "Domain overview (Markdown, about 200 words) summarizing the core developments and hot topics.",
	"key_events": ["Key event 1", "Key event 2", "Key event 3"],
	"trends": "Trend analysis (Markdown, 100-200 words) on where the technology or market is heading.",
	"score": 8
}
Scoring: score is an integer from 1 to 10 expressing how important and worth following this domain is today."#;

/// User prompt embedding every article's title and content.
pub fn build_domain_prompt(topic: &str, articles: &[Article]) -> String {
    let mut sb = String::with_capacity(articles.iter().map(|a| a.content.len() + 64).sum::<usize>() + 1024);
    let _ = write!(
        sb,
        "The following is a set of news articles about the domain [{topic}]. Read and summarize them:\n\n"
    );
    for (i, art) in articles.iter().enumerate() {
        let _ = write!(
            sb,
            "Article {}:\nTitle: {}\nContent: {}\n\n",
            i + 1,
            art.title,
            art.content
        );
    }
    sb.push('\n');
    sb.push_str(INSTRUCTIONS);
    sb
}

pub struct DomainReportGenerator {
    gateway: ModelGateway,
    retry: RetryPolicy,
}

impl DomainReportGenerator {
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

    /// Summarize `articles` for `topic`. The returned report carries no
    /// articles; the caller attaches them.
    pub async fn generate(
        &self,
        topic: &str,
        articles: &[Article],
        cancel: &CancellationToken,
    ) -> Result<DomainReport, GenerationError> {
        if articles.is_empty() {
            return Err(GenerationError::NoArticles);
        }

        let prompt = build_domain_prompt(topic, articles);
        let (gateway, prompt) = (&self.gateway, prompt.as_str());
        let t0 = Instant::now();
        let res = self
            .retry
            .run(topic, cancel, move |_attempt| async move {
                let raw = gateway.complete(SYSTEM_PROMPT, prompt, cancel).await?;
                parse_domain_report(topic, &raw)
            })
            .await;
        histogram!(GENERATION_MS, "kind" => "domain").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let report = res?;
        if !(1..=10).contains(&report.score) {
            tracing::warn!(target: "analyze", topic, score = report.score, "model score outside 1..=10; kept as is");
        }
        Ok(report)
    }
}
