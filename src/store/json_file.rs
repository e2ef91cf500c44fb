// src/store/json_file.rs
//! One directory per run:
//!
//! ```text
//! <root>/000042/run.json
//! <root>/000042/domains/0001-ai.json
//! <root>/000042/analyses/user-7.json
//! ```
//!
//! Each file is written to `*.json.tmp` and renamed into place, so a reader
//! never sees half a report.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::model::{DeepAnalysis, DomainReport, PersonaUser, RunId, UserAnalysis, UserId};
use crate::store::{strip_nul_report, ResultStore, StoredRun};

const RUN_FILE: &str = "run.json";
const DOMAINS_DIR: &str = "domains";
const ANALYSES_DIR: &str = "analyses";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunRecord {
    id: RunId,
    created_at: DateTime<Utc>,
    #[serde(default)]
    title: Option<String>,
}

pub struct JsonFileStore {
    root: PathBuf,
    users: Vec<PersonaUser>,
    /// Serializes run allocation and per-run sequence numbers.
    seq: Mutex<HashMap<RunId, u32>>,
}

impl JsonFileStore {
    /// Creates `root` if needed. `users` are the configured persona users.
    pub async fn open(root: impl Into<PathBuf>, users: Vec<PersonaUser>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("creating store dir {}", root.display()))?;
        Ok(Self {
            root,
            users,
            seq: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: RunId) -> PathBuf {
        self.root.join(format!("{run_id:06}"))
    }

    /// Read a whole run back (reports in save order, analyses by user id).
    pub async fn load_run(&self, run_id: RunId) -> Result<StoredRun> {
        let dir = self.run_dir(run_id);
        let rec: RunRecord = read_json(&dir.join(RUN_FILE)).await?;
        let reports = read_json_dir::<DomainReport>(&dir.join(DOMAINS_DIR)).await?;
        let mut analyses = read_json_dir::<UserAnalysis>(&dir.join(ANALYSES_DIR)).await?;
        analyses.sort_by_key(|a| a.user_id);
        Ok(StoredRun {
            id: rec.id,
            created_at: rec.created_at,
            title: rec.title,
            reports,
            analyses,
        })
    }

    async fn last_run_id(&self) -> Result<RunId> {
        let mut max = 0;
        let mut rd = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("listing {}", self.root.display()))?;
        while let Some(entry) = rd.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<RunId>().ok()) {
                max = max.max(id);
            }
        }
        Ok(max)
    }

    async fn next_domain_seq(&self, run_id: RunId) -> Result<u32> {
        let mut seq = self.seq.lock().await;
        let next = match seq.get(&run_id) {
            Some(n) => n + 1,
            None => count_entries(&self.run_dir(run_id).join(DOMAINS_DIR)).await? + 1,
        };
        seq.insert(run_id, next);
        Ok(next)
    }
}

#[async_trait]
impl ResultStore for JsonFileStore {
    async fn create_run(&self) -> Result<RunId> {
        let mut seq = self.seq.lock().await;
        let mut id = self.last_run_id().await? + 1;
        // Another process may have claimed the id between scan and create.
        let dir = loop {
            let dir = self.run_dir(id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => break dir,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => id += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("creating run dir {}", dir.display()))
                }
            }
        };
        tokio::fs::create_dir_all(dir.join(DOMAINS_DIR)).await?;
        tokio::fs::create_dir_all(dir.join(ANALYSES_DIR)).await?;

        let rec = RunRecord {
            id,
            created_at: Utc::now(),
            title: None,
        };
        write_json_atomic(&dir.join(RUN_FILE), &rec).await?;
        seq.insert(id, 0);
        Ok(id)
    }

    async fn save_domain_report(&self, run_id: RunId, report: &DomainReport) -> Result<()> {
        let n = self.next_domain_seq(run_id).await?;
        let path = self
            .run_dir(run_id)
            .join(DOMAINS_DIR)
            .join(format!("{n:04}-{}.json", slug(&report.domain)));
        write_json_atomic(&path, &strip_nul_report(report)).await
    }

    async fn save_deep_analysis(
        &self,
        run_id: RunId,
        user_id: UserId,
        analysis: &DeepAnalysis,
    ) -> Result<()> {
        let path = self
            .run_dir(run_id)
            .join(ANALYSES_DIR)
            .join(format!("user-{user_id}.json"));
        let rec = UserAnalysis {
            user_id,
            analysis: analysis.clone(),
        };
        write_json_atomic(&path, &rec).await
    }

    async fn update_run_title(&self, run_id: RunId, title: &str) -> Result<()> {
        let _guard = self.seq.lock().await;
        let path = self.run_dir(run_id).join(RUN_FILE);
        let mut rec: RunRecord = read_json(&path).await?;
        rec.title = Some(title.to_string());
        write_json_atomic(&path, &rec).await
    }

    async fn list_persona_users(&self) -> Result<Vec<PersonaUser>> {
        Ok(self.users.clone())
    }
}

/// File-name-safe form of a domain name.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out: String = out.trim_matches('-').chars().take(40).collect();
    if out.is_empty() {
        "domain".to_string()
    } else {
        out
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("serializing store record")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Every `*.json` in `dir`, in file-name order.
async fn read_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut paths = Vec::new();
    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };
    while let Some(entry) = rd.next_entry().await? {
        let p = entry.path();
        if p.extension().and_then(|s| s.to_str()) == Some("json") {
            paths.push(p);
        }
    }
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        out.push(read_json(&p).await?);
    }
    Ok(out)
}

async fn count_entries(dir: &Path) -> Result<u32> {
    let mut n = 0;
    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
            n += 1;
        }
    }
    Ok(n)
}
