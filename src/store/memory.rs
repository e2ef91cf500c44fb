// src/store/memory.rs
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::model::{DeepAnalysis, DomainReport, PersonaUser, RunId, UserAnalysis, UserId};
use crate::store::{strip_nul_report, ResultStore, StoredRun};

/// In-process store. Inspectable after a run; writes can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    users: Vec<PersonaUser>,
    runs: Mutex<BTreeMap<RunId, StoredRun>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<PersonaUser>) -> Self {
        Self {
            users,
            ..Self::default()
        }
    }

    /// Make every write after this call fail (run creation included).
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn run(&self, run_id: RunId) -> Option<StoredRun> {
        self.runs.lock().expect("poisoned memory store").get(&run_id).cloned()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().expect("poisoned memory store").len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store: writes disabled");
        }
        Ok(())
    }

    fn with_run<T>(&self, run_id: RunId, f: impl FnOnce(&mut StoredRun) -> T) -> Result<T> {
        self.check_writable()?;
        let mut runs = self.runs.lock().expect("poisoned memory store");
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| anyhow!("memory store: unknown run {run_id}"))?;
        Ok(f(run))
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn create_run(&self) -> Result<RunId> {
        self.check_writable()?;
        let mut runs = self.runs.lock().expect("poisoned memory store");
        let id = runs.keys().next_back().map_or(1, |last| last + 1);
        runs.insert(id, StoredRun::new(id));
        Ok(id)
    }

    async fn save_domain_report(&self, run_id: RunId, report: &DomainReport) -> Result<()> {
        let clean = strip_nul_report(report);
        self.with_run(run_id, |run| run.reports.push(clean))
    }

    async fn save_deep_analysis(
        &self,
        run_id: RunId,
        user_id: UserId,
        analysis: &DeepAnalysis,
    ) -> Result<()> {
        self.with_run(run_id, |run| {
            run.analyses.push(UserAnalysis {
                user_id,
                analysis: analysis.clone(),
            })
        })
    }

    async fn update_run_title(&self, run_id: RunId, title: &str) -> Result<()> {
        self.with_run(run_id, |run| run.title = Some(title.to_string()))
    }

    async fn list_persona_users(&self) -> Result<Vec<PersonaUser>> {
        Ok(self.users.clone())
    }
}
