// src/store/mod.rs
//! Result persistence. The pipeline only talks to `ResultStore`; what backs it
//! is decided at startup (`storage.dir` set → JSON files, otherwise none).

pub mod json_file;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DeepAnalysis, DomainReport, PersonaUser, RunId, UserAnalysis, UserId};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Allocate a new run record and return its id.
    async fn create_run(&self) -> Result<RunId>;

    /// Persist a report with its key events and articles as one unit.
    async fn save_domain_report(&self, run_id: RunId, report: &DomainReport) -> Result<()>;

    async fn save_deep_analysis(
        &self,
        run_id: RunId,
        user_id: UserId,
        analysis: &DeepAnalysis,
    ) -> Result<()>;

    async fn update_run_title(&self, run_id: RunId, title: &str) -> Result<()>;

    /// Every user with a persona configured (blank personas included; the
    /// engine filters them).
    async fn list_persona_users(&self) -> Result<Vec<PersonaUser>>;
}

/// A run as read back from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: RunId,
    pub created_at: DateTime<Utc>,
    pub title: Option<String>,
    pub reports: Vec<DomainReport>,
    pub analyses: Vec<UserAnalysis>,
}

impl StoredRun {
    fn new(id: RunId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            title: None,
            reports: Vec::new(),
            analyses: Vec::new(),
        }
    }
}

/// NULs are not storable as text; drop them from every string of a report.
pub fn strip_nul_report(report: &DomainReport) -> DomainReport {
    let mut r = report.clone();
    strip_nul(&mut r.domain);
    strip_nul(&mut r.overview);
    strip_nul(&mut r.trends);
    r.key_events.iter_mut().for_each(strip_nul);
    for a in &mut r.articles {
        strip_nul(&mut a.title);
        strip_nul(&mut a.link);
        strip_nul(&mut a.published_date);
        strip_nul(&mut a.content);
    }
    r
}

fn strip_nul(s: &mut String) {
    if s.contains('\0') {
        s.retain(|c| c != '\0');
    }
}
