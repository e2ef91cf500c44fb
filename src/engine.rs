//! # Report Engine
//! Orchestrates one report run: fan out one worker per topic (search, collect,
//! summarize, persist), aggregate and rank what succeeded, then fan out one
//! deep analysis per persona.
//!
//! A topic that fails for any reason (search error, no usable articles,
//! generation error, cancellation, panic) is dropped from the run; the run
//! itself fails only when no topic produced a report.
//!
//! Progress milestones:
//! `starting` 0, `searching domains` 10, one `processed domain: <name>` per
//! successful topic at `10 + 70 * completed / total`, `generating deep
//! analysis` 85, then `completed` or `failed: <error>` at 100.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument, Span};

use crate::analyze::{
    build_aggregated_summary, DeepAnalysisGenerator, DomainReportGenerator, ModelGateway,
    RetryPolicy,
};
use crate::error::{GenerationError, PipelineError};
use crate::ingest::types::{ContentFetcher, Searcher};
use crate::ingest::{collect_articles, topic_request};
use crate::metrics::{
    ensure_metrics_described, DEEP_ANALYSES_TOTAL, DOMAIN_REPORTS_TOTAL, RUNS_TOTAL,
    STORE_ERRORS_TOTAL, TOPICS_ABANDONED_TOTAL,
};
use crate::model::{
    DeepAnalysis, DomainReport, PersonaUser, RunId, RunOutcome, UserAnalysis, UserId,
};
use crate::progress::ProgressSink;
use crate::store::ResultStore;

pub const PROGRESS_SEARCH_START: u8 = 10;
pub const PROGRESS_SEARCH_SPAN: usize = 70;
pub const PROGRESS_DEEP_ANALYSIS: u8 = 85;

/// `10 + floor(70 * completed / total)`, capped at 80.
pub fn domain_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_SEARCH_START;
    }
    let step = PROGRESS_SEARCH_SPAN * completed.min(total) / total;
    PROGRESS_SEARCH_START + step as u8
}

/// Highest score first; equal scores by domain name.
pub fn rank_reports(reports: &mut [DomainReport]) {
    reports.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.domain.cmp(&b.domain)));
}

pub struct Engine {
    searcher: Arc<dyn Searcher>,
    fetcher: Arc<dyn ContentFetcher>,
    gateway: ModelGateway,
    domain_gen: Arc<DomainReportGenerator>,
    deep_gen: Arc<DeepAnalysisGenerator>,
    store: Option<Arc<dyn ResultStore>>,
    span: Span,
}

impl Engine {
    pub fn new(
        searcher: Arc<dyn Searcher>,
        fetcher: Arc<dyn ContentFetcher>,
        gateway: ModelGateway,
        store: Option<Arc<dyn ResultStore>>,
    ) -> Self {
        Self {
            searcher,
            fetcher,
            domain_gen: Arc::new(DomainReportGenerator::new(gateway.clone())),
            deep_gen: Arc::new(DeepAnalysisGenerator::new(gateway.clone())),
            gateway,
            store,
            span: Span::none(),
        }
    }

    /// Parent span for everything this engine logs.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Retry policy used by both generators.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.domain_gen =
            Arc::new(DomainReportGenerator::new(self.gateway.clone()).with_retry(retry));
        self.deep_gen = Arc::new(DeepAnalysisGenerator::new(self.gateway.clone()).with_retry(retry));
        self
    }

    /// Run the pipeline for the persona users the store knows about.
    pub async fn run_for_persona_users(
        &self,
        topics: &[String],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome, PipelineError> {
        let personas = match &self.store {
            Some(store) => match store.list_persona_users().await {
                Ok(users) => users,
                Err(e) => {
                    tracing::warn!(target: "engine", parent: &self.span, error = ?e, "listing persona users failed; running without deep analysis");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.run(topics, &personas, cancel, progress).await
    }

    /// One full run. Always ends with a terminal progress milestone.
    pub async fn run(
        &self,
        topics: &[String],
        personas: &[PersonaUser],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome, PipelineError> {
        ensure_metrics_described();
        let span = info_span!(parent: &self.span, "run", topics = topics.len(), personas = personas.len());
        let t0 = Instant::now();

        let res = self
            .run_inner(topics, personas, cancel, progress)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &res {
            Ok(outcome) => {
                counter!(RUNS_TOTAL, "outcome" => "completed").increment(1);
                tracing::info!(
                    target: "engine",
                    run_id = ?outcome.run_id,
                    reports = outcome.reports.len(),
                    analyses = outcome.analyses.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "run completed"
                );
                progress.report("completed", 100);
            }
            Err(e) => {
                counter!(RUNS_TOTAL, "outcome" => "failed").increment(1);
                tracing::error!(target: "engine", error = %e, elapsed_ms = t0.elapsed().as_millis() as u64, "run failed");
                progress.report(&format!("failed: {e}"), 100);
            }
        });
        res
    }

    async fn run_inner(
        &self,
        topics: &[String],
        personas: &[PersonaUser],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome, PipelineError> {
        progress.report("starting", 0);
        if topics.is_empty() {
            return Err(PipelineError::NoDomains);
        }
        let started_at = Utc::now();
        let run_id = self.create_run().await;

        progress.report("searching domains", PROGRESS_SEARCH_START);
        let mut reports = self.collect_domain_reports(topics, run_id, started_at, cancel, progress).await;

        if reports.is_empty() {
            return Err(if cancel.is_cancelled() {
                PipelineError::Cancelled
            } else {
                PipelineError::NoDomainReports
            });
        }
        rank_reports(&mut reports);

        progress.report("generating deep analysis", PROGRESS_DEEP_ANALYSIS);
        let (title, analyses) = self.deep_analyses(&reports, personas, run_id, cancel).await;

        Ok(RunOutcome {
            run_id,
            started_at,
            title,
            reports,
            analyses,
        })
    }

    async fn create_run(&self) -> Option<RunId> {
        let store = self.store.as_ref()?;
        match store.create_run().await {
            Ok(id) => {
                tracing::info!(target: "engine", run_id = id, "run record created");
                Some(id)
            }
            Err(e) => {
                counter!(STORE_ERRORS_TOTAL, "op" => "create_run").increment(1);
                tracing::warn!(target: "engine", error = ?e, "creating run record failed; continuing without persistence");
                None
            }
        }
    }

    async fn collect_domain_reports(
        &self,
        topics: &[String],
        run_id: Option<RunId>,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Vec<DomainReport> {
        let mut set = JoinSet::new();
        for topic in topics {
            let worker = TopicWorker {
                searcher: Arc::clone(&self.searcher),
                fetcher: Arc::clone(&self.fetcher),
                generator: Arc::clone(&self.domain_gen),
                store: self.store.clone(),
                run_id,
            };
            let span = info_span!(target: "engine", "topic", topic = %topic);
            set.spawn(worker.run(topic.clone(), now, cancel.clone()).instrument(span));
        }

        // Single consumer: appending, counting and publishing happen together here.
        let total = topics.len();
        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Some(report)) => {
                    let msg = format!("processed domain: {}", report.domain);
                    reports.push(report);
                    progress.report(&msg, domain_progress(reports.len(), total));
                }
                Ok(None) => {}
                Err(e) => {
                    counter!(TOPICS_ABANDONED_TOTAL, "reason" => "panic").increment(1);
                    tracing::error!(target: "engine", error = %e, "topic worker aborted; topic dropped");
                }
            }
        }
        reports
    }

    async fn deep_analyses(
        &self,
        reports: &[DomainReport],
        personas: &[PersonaUser],
        run_id: Option<RunId>,
        cancel: &CancellationToken,
    ) -> (Option<String>, Vec<UserAnalysis>) {
        let eligible: Vec<&PersonaUser> = personas.iter().filter(|p| p.has_persona()).collect();
        if eligible.is_empty() {
            tracing::info!(target: "engine", "no persona users; skipping deep analysis");
            return (None, Vec::new());
        }

        let aggregated: Arc<str> = Arc::from(build_aggregated_summary(reports));
        let mut set: JoinSet<(UserId, Result<DeepAnalysis, GenerationError>)> = JoinSet::new();
        for user in eligible {
            let generator = Arc::clone(&self.deep_gen);
            let store = self.store.clone();
            let aggregated = Arc::clone(&aggregated);
            let cancel = cancel.clone();
            let user = user.clone();
            let span = info_span!(target: "engine", "persona", user_id = user.id);
            set.spawn(
                async move {
                    let res = generator.generate(&aggregated, &user.persona, &cancel).await;
                    if let (Ok(analysis), Some(store), Some(run_id)) = (&res, &store, run_id) {
                        if let Err(e) = store.save_deep_analysis(run_id, user.id, analysis).await {
                            counter!(STORE_ERRORS_TOTAL, "op" => "deep_analysis").increment(1);
                            tracing::warn!(target: "store", error = ?e, "saving deep analysis failed");
                        }
                    }
                    (user.id, res)
                }
                .instrument(span),
            );
        }

        let mut title: Option<String> = None;
        let mut analyses = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (user_id, res) = match joined {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!(target: "engine", error = %e, "deep analysis task aborted");
                    continue;
                }
            };
            match res {
                Ok(analysis) => {
                    counter!(DEEP_ANALYSES_TOTAL).increment(1);
                    if title.is_none() {
                        if let Some(t) = analysis.title.clone() {
                            self.store_title(run_id, &t).await;
                            title = Some(t);
                        }
                    }
                    analyses.push(UserAnalysis { user_id, analysis });
                }
                Err(e) if e.is_cancelled() => {
                    tracing::info!(target: "engine", user_id, "deep analysis cancelled");
                }
                Err(e) => {
                    tracing::warn!(target: "engine", user_id, error = %e, "deep analysis failed");
                }
            }
        }
        analyses.sort_by_key(|a| a.user_id);
        (title, analyses)
    }

    async fn store_title(&self, run_id: Option<RunId>, title: &str) {
        let (Some(store), Some(run_id)) = (&self.store, run_id) else {
            return;
        };
        if let Err(e) = store.update_run_title(run_id, title).await {
            counter!(STORE_ERRORS_TOTAL, "op" => "run_title").increment(1);
            tracing::warn!(target: "store", run_id, error = ?e, "updating run title failed");
        }
    }
}

/// Everything one topic worker needs, owned so it can run detached.
struct TopicWorker {
    searcher: Arc<dyn Searcher>,
    fetcher: Arc<dyn ContentFetcher>,
    generator: Arc<DomainReportGenerator>,
    store: Option<Arc<dyn ResultStore>>,
    run_id: Option<RunId>,
}

impl TopicWorker {
    async fn run(
        self,
        topic: String,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Option<DomainReport> {
        let req = topic_request(&topic, now);
        let searched = tokio::select! {
            _ = cancel.cancelled() => {
                abandon("cancelled", "cancelled before search");
                return None;
            }
            res = self.searcher.search(&req) => res,
        };
        let candidates = match searched {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "engine", searcher = self.searcher.name(), error = ?e, "search failed; topic dropped");
                abandon("search", "search failed");
                return None;
            }
        };
        tracing::debug!(target: "engine", candidates = candidates.len(), "search done");

        let articles = collect_articles(&topic, candidates, self.fetcher.as_ref(), &cancel).await;
        if articles.is_empty() {
            abandon("no_articles", "no valid articles");
            return None;
        }

        let mut report = match self.generator.generate(&topic, &articles, &cancel).await {
            Ok(r) => r,
            Err(e) if e.is_cancelled() => {
                abandon("cancelled", "generation cancelled");
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "engine", error = %e, "domain report generation failed");
                abandon("generation", "generation failed");
                return None;
            }
        };
        report.articles = articles;

        if let (Some(store), Some(run_id)) = (&self.store, self.run_id) {
            if let Err(e) = store.save_domain_report(run_id, &report).await {
                counter!(STORE_ERRORS_TOTAL, "op" => "domain_report").increment(1);
                tracing::warn!(target: "store", run_id, error = ?e, "saving domain report failed");
            }
        }

        counter!(DOMAIN_REPORTS_TOTAL).increment(1);
        tracing::info!(target: "engine", score = report.score, articles = report.articles.len(), "domain report ready");
        Some(report)
    }
}

fn abandon(reason: &'static str, what: &str) {
    counter!(TOPICS_ABANDONED_TOTAL, "reason" => reason).increment(1);
    tracing::info!(target: "engine", reason, "{what}; topic dropped");
}
