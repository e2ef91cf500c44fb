// tests/engine_run.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::{body, deep_json, domain_json, gateway, result, MockFetcher, MockSearcher, RoutingSummarizer};
use domain_radar::analyze::Summarizer;
use domain_radar::progress::RecordingProgress;
use domain_radar::store::{MemoryStore, ResultStore};
use domain_radar::{Engine, PersonaUser, PipelineError, SummarizerError};

fn topics(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn engine(
    searcher: MockSearcher,
    summarizer: Arc<RoutingSummarizer>,
    store: Option<Arc<MemoryStore>>,
) -> Engine {
    Engine::new(
        Arc::new(searcher),
        Arc::new(MockFetcher::new()),
        gateway(summarizer),
        store.map(|s| s as Arc<dyn ResultStore>),
    )
}

fn assert_monotonic_ending_at_100(progress: &RecordingProgress) {
    let p = progress.percents();
    assert!(p.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {p:?}");
    assert_eq!(p.first(), Some(&0));
    assert_eq!(p.last(), Some(&100));
}

#[tokio::test]
async fn topic_without_articles_is_dropped_and_run_completes() {
    let searcher = MockSearcher::new()
        .with(
            "ai",
            vec![
                result("GPU launch", &body("A new accelerator ships to cloud providers")),
                result("Model release", &body("An open model tops the leaderboard")),
                result("Chip export", &body("Export rules tighten for advanced chips")),
            ],
        )
        .with("finance", vec![]);
    let summarizer = Arc::new(
        RoutingSummarizer::new()
            .route("[ai]", domain_json(9))
            .route("User persona:", deep_json("Compute is the new oil")),
    );
    let store = Arc::new(MemoryStore::new());
    let engine = engine(searcher, summarizer.clone(), Some(store.clone()));
    let progress = RecordingProgress::new();

    let out = engine
        .run(
            &topics(&["ai", "finance"]),
            &[PersonaUser::new(1, "Rust developer")],
            &CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(out.reports.len(), 1);
    let ai = &out.reports[0];
    assert_eq!(ai.domain, "ai");
    assert_eq!(ai.score, 9);
    assert_eq!(ai.articles.len(), 3);
    assert!(ai.articles.iter().all(|a| a.source == "ai"));
    assert_eq!(out.analyses.len(), 1);
    assert_eq!(out.analyses[0].user_id, 1);
    assert_eq!(out.title.as_deref(), Some("Compute is the new oil"));

    let events = progress.events();
    assert_eq!(
        events,
        vec![
            ("starting".to_string(), 0),
            ("searching domains".to_string(), 10),
            ("processed domain: ai".to_string(), 45),
            ("generating deep analysis".to_string(), 85),
            ("completed".to_string(), 100),
        ]
    );

    let run = store.run(out.run_id.unwrap()).unwrap();
    assert_eq!(run.reports.len(), 1);
    assert_eq!(run.reports[0].articles.len(), 3);
    assert_eq!(run.analyses.len(), 1);
    assert_eq!(run.title.as_deref(), Some("Compute is the new oil"));
}

#[tokio::test]
async fn all_topics_failing_fails_the_run_without_deep_analysis() {
    let searcher = MockSearcher::new()
        .failing("ai", "upstream 502")
        .failing("finance", "upstream 502");
    let summarizer = Arc::new(RoutingSummarizer::new().route("User persona:", deep_json("x")));
    let engine = engine(searcher, summarizer.clone(), None);
    let progress = RecordingProgress::new();

    let err = engine
        .run(
            &topics(&["ai", "finance"]),
            &[PersonaUser::new(1, "Investor")],
            &CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap_err();

    assert_eq!(err, PipelineError::NoDomainReports);
    assert!(summarizer.prompts.lock().unwrap().is_empty());
    let (msg, pct) = progress.events().last().cloned().unwrap();
    assert_eq!(pct, 100);
    assert!(msg.starts_with("failed"), "{msg}");
    assert!(msg.contains("no domain reports"), "{msg}");
}

#[tokio::test]
async fn no_personas_means_no_deep_analysis() {
    let searcher = MockSearcher::new().with("ai", vec![result("a", &body("Something happened in AI"))]);
    let summarizer = Arc::new(
        RoutingSummarizer::new()
            .route("[ai]", domain_json(6))
            .route("User persona:", deep_json("never")),
    );
    let engine = engine(searcher, summarizer.clone(), None);

    // Blank personas are not eligible either.
    let out = engine
        .run(
            &topics(&["ai"]),
            &[PersonaUser::new(4, "   ")],
            &CancellationToken::new(),
            &RecordingProgress::new(),
        )
        .await
        .unwrap();

    assert!(out.analyses.is_empty());
    assert_eq!(out.title, None);
    assert_eq!(out.run_id, None);
    assert_eq!(summarizer.prompts_containing("User persona:"), 0);
    assert_eq!(summarizer.prompts_containing("[ai]"), 1);
}

#[tokio::test]
async fn reports_are_ranked_and_progress_is_monotonic() {
    let searcher = MockSearcher::new()
        .with("ml", vec![result("m", &body("Machine learning news item"))])
        .with("ai", vec![result("a", &body("Artificial intelligence news item"))])
        .with("bio", vec![result("b", &body("Biotech news item of the day"))]);
    let summarizer = Arc::new(
        RoutingSummarizer::new()
            .route("[ml]", domain_json(9))
            .route("[ai]", domain_json(9))
            .route("[bio]", domain_json(3))
            .route("User persona:", deep_json("Ranked")),
    );
    let engine = engine(searcher, summarizer, None);
    let progress = RecordingProgress::new();

    let out = engine
        .run(
            &topics(&["bio", "ml", "ai"]),
            &[PersonaUser::new(2, "Founder"), PersonaUser::new(1, "Analyst")],
            &CancellationToken::new(),
            &progress,
        )
        .await
        .unwrap();

    let order: Vec<_> = out.reports.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(order, vec!["ai", "ml", "bio"]);
    let users: Vec<_> = out.analyses.iter().map(|a| a.user_id).collect();
    assert_eq!(users, vec![1, 2]);

    assert_monotonic_ending_at_100(&progress);
    let domain_steps: Vec<u8> = progress
        .events()
        .into_iter()
        .filter(|(m, _)| m.starts_with("processed domain"))
        .map(|(_, p)| p)
        .collect();
    assert_eq!(domain_steps, vec![33, 56, 80]);
}

#[tokio::test]
async fn failing_generation_and_panicking_worker_only_drop_their_topic() {
    let searcher = MockSearcher::new()
        .with("ai", vec![result("a", &body("AI is moving fast this week"))])
        .with("rust", vec![result("r", &body("A new Rust release landed"))])
        .panicking("crypto");
    let summarizer = Arc::new(
        RoutingSummarizer::new()
            .route("[ai]", domain_json(7))
            .route_err("[rust]", SummarizerError::Other("500 internal".into())),
    );
    let engine = engine(searcher, summarizer, None);

    let out = engine
        .run(
            &topics(&["ai", "rust", "crypto"]),
            &[],
            &CancellationToken::new(),
            &RecordingProgress::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.reports.len(), 1);
    assert_eq!(out.reports[0].domain, "ai");
}

#[tokio::test]
async fn empty_topic_list_fails_fast() {
    let engine = engine(MockSearcher::new(), Arc::new(RoutingSummarizer::new()), None);
    let progress = RecordingProgress::new();
    let err = engine
        .run(&[], &[], &CancellationToken::new(), &progress)
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::NoDomains);
    assert_monotonic_ending_at_100(&progress);
}

#[tokio::test]
async fn cancelled_run_without_reports_is_cancelled() {
    let searcher = MockSearcher::new().with("ai", vec![result("a", &body("AI"))]);
    let summarizer = Arc::new(RoutingSummarizer::new().route("[ai]", domain_json(5)));
    let engine = engine(searcher, summarizer.clone(), None);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .run(&topics(&["ai"]), &[], &cancel, &RecordingProgress::new())
        .await
        .unwrap_err();
    assert_eq!(err, PipelineError::Cancelled);
    assert!(summarizer.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_store_does_not_abort_the_run() {
    let searcher = MockSearcher::new().with("ai", vec![result("a", &body("AI headlines today"))]);
    let summarizer = Arc::new(RoutingSummarizer::new().route("[ai]", domain_json(8)));
    let store = Arc::new(MemoryStore::new());
    store.set_failing(true);
    let engine = engine(searcher, summarizer, Some(store.clone()));

    let out = engine
        .run(&topics(&["ai"]), &[], &CancellationToken::new(), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(out.run_id, None);
    assert_eq!(out.reports.len(), 1);
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn persona_users_come_from_the_store() {
    let searcher = MockSearcher::new().with("ai", vec![result("a", &body("AI headlines today"))]);
    let summarizer = Arc::new(
        RoutingSummarizer::new()
            .route("[ai]", domain_json(8))
            .route("User persona: Data engineer", deep_json("For data folks")),
    );
    let store = Arc::new(MemoryStore::with_users(vec![
        PersonaUser::new(10, "Data engineer"),
        PersonaUser::new(11, ""),
    ]));
    let engine = engine(searcher, summarizer.clone(), Some(store.clone()));

    let out = engine
        .run_for_persona_users(&topics(&["ai"]), &CancellationToken::new(), &RecordingProgress::new())
        .await
        .unwrap();

    assert_eq!(out.analyses.len(), 1);
    assert_eq!(out.analyses[0].user_id, 10);
    assert_eq!(summarizer.prompts_containing("User persona:"), 1);
    let run = store.run(out.run_id.unwrap()).unwrap();
    assert_eq!(run.title.as_deref(), Some("For data folks"));
}

/// Answers domain prompts; a persona prompt cancels the run and never returns.
struct CancelOnPersona {
    cancel: CancellationToken,
}

#[async_trait]
impl Summarizer for CancelOnPersona {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, SummarizerError> {
        if user.contains("User persona:") {
            self.cancel.cancel();
            std::future::pending::<()>().await;
        }
        Ok(domain_json(7))
    }

    fn name(&self) -> &'static str {
        "cancel-on-persona"
    }
}

#[tokio::test]
async fn cancellation_during_deep_analysis_still_completes_with_reports() {
    let cancel = CancellationToken::new();
    let searcher = MockSearcher::new().with("ai", vec![result("a", &body("AI headlines today"))]);
    let engine = Engine::new(
        Arc::new(searcher),
        Arc::new(MockFetcher::new()),
        gateway(Arc::new(CancelOnPersona { cancel: cancel.clone() })),
        None,
    );
    let progress = RecordingProgress::new();

    let out = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run(
            &topics(&["ai"]),
            &[PersonaUser::new(1, "Investor"), PersonaUser::new(2, "Founder")],
            &cancel,
            &progress,
        ),
    )
    .await
    .expect("persona tasks did not abort on cancellation")
    .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(out.reports.len(), 1);
    assert_eq!(out.reports[0].score, 7);
    assert!(out.analyses.is_empty());
    assert_eq!(out.title, None);
    assert_eq!(progress.events().last().cloned(), Some(("completed".to_string(), 100)));
    assert_monotonic_ending_at_100(&progress);
}
