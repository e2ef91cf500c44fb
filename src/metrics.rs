use anyhow::Context;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

pub const RUNS_TOTAL: &str = "radar_runs_total";
pub const DOMAIN_REPORTS_TOTAL: &str = "radar_domain_reports_total";
pub const TOPICS_ABANDONED_TOTAL: &str = "radar_topics_abandoned_total";
pub const DEEP_ANALYSES_TOTAL: &str = "radar_deep_analyses_total";
pub const LLM_CALLS_TOTAL: &str = "radar_llm_calls_total";
pub const LLM_RETRIES_TOTAL: &str = "radar_llm_retries_total";
pub const STORE_ERRORS_TOTAL: &str = "radar_store_errors_total";
pub const ARTICLES_FETCHED_TOTAL: &str = "radar_articles_valid_total";
pub const FETCH_ERRORS_TOTAL: &str = "radar_fetch_errors_total";
pub const GENERATION_MS: &str = "radar_generation_ms";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(RUNS_TOTAL, "Pipeline runs by outcome.");
        describe_counter!(DOMAIN_REPORTS_TOTAL, "Domain reports generated.");
        describe_counter!(
            TOPICS_ABANDONED_TOTAL,
            "Topics dropped from a run (search, article or generation failure)."
        );
        describe_counter!(DEEP_ANALYSES_TOTAL, "Persona deep analyses generated.");
        describe_counter!(LLM_CALLS_TOTAL, "Chat-completion calls issued.");
        describe_counter!(
            LLM_RETRIES_TOTAL,
            "Generation attempts retried after rate limits or malformed output."
        );
        describe_counter!(STORE_ERRORS_TOTAL, "Result store writes that failed.");
        describe_counter!(ARTICLES_FETCHED_TOTAL, "Articles passing the validity floor.");
        describe_counter!(FETCH_ERRORS_TOTAL, "Full-page fetches that failed.");
        describe_histogram!(GENERATION_MS, "Generation latency incl. retries, in milliseconds.");
    });
}

/// Install the Prometheus recorder with its own scrape listener.
/// Must run inside a Tokio runtime.
pub fn install_prometheus(listen: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    tracing::info!(target: "metrics", %listen, "prometheus exporter listening");
    Ok(())
}
