//! Records produced by one report run.
//!
//! Articles belong to exactly one domain report; domain reports and deep
//! analyses belong to exactly one run. Everything here is immutable once the
//! pipeline hands it out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier allocated by the result store for one pipeline invocation.
pub type RunId = u64;

/// Identifier of a user owning a persona (assigned by user management).
pub type UserId = i64;

/// A fetched news item that passed the validity floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Topic that produced the article.
    pub source: String,
    /// Free text, as supplied by the search provider.
    pub published_date: String,
    pub content: String,
}

/// One topic's synthesis for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: String,
    pub overview: String,
    pub key_events: Vec<String>,
    pub trends: String,
    /// Model-assigned importance, nominally 1..=10 (not range-checked).
    pub score: i32,
    #[serde(default)]
    pub articles: Vec<Article>,
}

/// One persona's cross-domain brief for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepAnalysis {
    pub title: Option<String>,
    pub macro_trends: String,
    pub opportunities: String,
    pub risks: String,
    pub action_guides: Vec<String>,
}

/// A user whose persona biases the deep analysis prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaUser {
    pub id: UserId,
    pub persona: String,
}

impl PersonaUser {
    pub fn new(id: UserId, persona: impl Into<String>) -> Self {
        Self {
            id,
            persona: persona.into(),
        }
    }

    /// Blank personas never get a deep analysis.
    pub fn has_persona(&self) -> bool {
        !self.persona.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnalysis {
    pub user_id: UserId,
    pub analysis: DeepAnalysis,
}

/// Everything a successful run produced, in presentation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// `None` when the store was unavailable at run start.
    pub run_id: Option<RunId>,
    pub started_at: DateTime<Utc>,
    pub title: Option<String>,
    /// Sorted by score descending, then domain name.
    pub reports: Vec<DomainReport>,
    pub analyses: Vec<UserAnalysis>,
}

impl RunOutcome {
    /// Number of articles read across all domain reports.
    pub fn total_articles(&self) -> usize {
        self.reports.iter().map(|r| r.articles.len()).sum()
    }
}
