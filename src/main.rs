//! Domain Radar: binary entrypoint.
//! Loads config, wires search, fetch, model and store, runs one report for the
//! configured domains and persona users, and writes the rendered report.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use domain_radar::analyze::{build_summarizer, ModelGateway, RateLimiter};
use domain_radar::config::{LogConfig, LogFormat, RadarConfig};
use domain_radar::ingest::fetch::HttpContentFetcher;
use domain_radar::ingest::providers::build_searcher;
use domain_radar::metrics::install_prometheus;
use domain_radar::render::render_markdown;
use domain_radar::store::{JsonFileStore, ResultStore};
use domain_radar::{Engine, RunOutcome};

/// `RUST_LOG` wins over the configured level.
fn init_tracing(cfg: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    match cfg.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

async fn build_engine(cfg: &RadarConfig) -> anyhow::Result<Engine> {
    let searcher = build_searcher(&cfg.search).context("search provider")?;
    let fetcher = Arc::new(HttpContentFetcher::new()?);
    let summarizer = build_summarizer(&cfg.llm).context("llm provider")?;
    let limiter = Arc::new(RateLimiter::per_minute(
        cfg.concurrency.rpm,
        cfg.concurrency.burst,
    ));
    let gateway = ModelGateway::new(summarizer, limiter);

    let store: Option<Arc<dyn ResultStore>> = match &cfg.storage.dir {
        Some(dir) => Some(Arc::new(JsonFileStore::open(dir, cfg.users.clone()).await?)),
        None => {
            tracing::warn!(target: "store", "storage.dir not set; results will not be persisted");
            None
        }
    };

    Ok(Engine::new(searcher, fetcher, gateway, store)
        .with_span(tracing::info_span!("radar", model = %cfg.llm.model)))
}

async fn write_report(dir: &Path, outcome: &RunOutcome) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating output dir {}", dir.display()))?;
    let path = dir.join(format!(
        "report-{}.md",
        outcome.started_at.format("%Y-%m-%d")
    ));
    tokio::fs::write(&path, render_markdown(outcome))
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

async fn run() -> anyhow::Result<bool> {
    let cfg = RadarConfig::load_default()?;
    init_tracing(&cfg.log);

    if let Some(listen) = cfg.metrics.listen {
        install_prometheus(listen)?;
    }

    let engine = build_engine(&cfg).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let timeout = Duration::from_secs(cfg.run.timeout_secs.max(1));
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::warn!("interrupted; cancelling run"),
                _ = tokio::time::sleep(timeout) => tracing::warn!(?timeout, "run timeout reached; cancelling"),
                _ = cancel.cancelled() => return,
            }
            cancel.cancel();
        });
    }

    let progress = |msg: &str, pct: u8| tracing::info!(target: "progress", percent = pct, "{msg}");

    // Personas come from the store when there is one, else straight from config.
    let res = if cfg.storage.dir.is_some() {
        engine
            .run_for_persona_users(&cfg.domains, &cancel, &progress)
            .await
    } else {
        engine.run(&cfg.domains, &cfg.users, &cancel, &progress).await
    };
    cancel.cancel();

    match res {
        Ok(outcome) => {
            let path = write_report(&cfg.output.dir, &outcome).await?;
            tracing::info!(
                report = %path.display(),
                domains = outcome.reports.len(),
                articles = outcome.total_articles(),
                title = outcome.title.as_deref().unwrap_or(""),
                "report written"
            );
            Ok(true)
        }
        Err(e) => {
            tracing::error!(error = %e, "report run failed");
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            // Tracing may not be initialized yet (config errors).
            eprintln!("domain-radar: {e:#}");
            ExitCode::FAILURE
        }
    }
}
