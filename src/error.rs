//! Typed errors at the pipeline seams. Glue code (clients, stores, config)
//! stays on `anyhow`.

use thiserror::Error;

/// Failure of a single chat-completion call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummarizerError {
    /// Provider signalled "too many requests".
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("summarizer call cancelled")]
    Cancelled,

    #[error("summarizer error: {0}")]
    Other(String),
}

impl SummarizerError {
    /// Classify a free-text provider error. Used only where no status code is
    /// available (e.g. errors surfaced inside a 200 body).
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_ascii_lowercase();
        if lower.contains("429") || lower.contains("too many requests") {
            Self::RateLimited(msg)
        } else {
            Self::Other(msg)
        }
    }
}

/// Failure of one domain-report or deep-analysis generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error(transparent)]
    Summarizer(#[from] SummarizerError),

    /// Model output was not the expected JSON object.
    #[error("malformed model output: {0}")]
    Parse(String),

    #[error("generation cancelled")]
    Cancelled,

    #[error("no articles to summarize")]
    NoArticles,
}

impl GenerationError {
    /// Rate-limit signals and unparseable output are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Summarizer(SummarizerError::RateLimited(_)) | Self::Parse(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Summarizer(SummarizerError::Cancelled)
        )
    }
}

/// Run-fatal outcomes of `Engine::run`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no domains provided")]
    NoDomains,

    #[error("no domain reports generated")]
    NoDomainReports,

    #[error("run cancelled before any domain report was generated")]
    Cancelled,
}
