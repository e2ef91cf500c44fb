// src/config/radar.rs
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::model::PersonaUser;

pub const DEFAULT_RADAR_CONFIG_PATH: &str = "config/radar.toml";
pub const ENV_RADAR_CONFIG_PATH: &str = "RADAR_CONFIG_PATH";
pub const ENV_LLM_API_KEY: &str = "LLM_API_KEY";
pub const ENV_TAVILY_API_KEY: &str = "TAVILY_API_KEY";

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_searxng_timeout_secs() -> u64 {
    30
}
fn default_rpm() -> u32 {
    60
}
fn default_burst() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_run_timeout_secs() -> u64 {
    1800
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Full process configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RadarConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    /// Legacy top-level key; prefer `search.tavily.api_key`.
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    /// Topics of interest, one search-and-summarize unit each.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Persona users served by the file store.
    #[serde(default)]
    pub users: Vec<PersonaUser>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from `LLM_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    Tavily,
    Searxng,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Falls back to Tavily when unset and a Tavily key exists.
    #[serde(default)]
    pub provider: Option<SearchProviderKind>,
    #[serde(default)]
    pub tavily: TavilyConfig,
    #[serde(default)]
    pub searxng: SearxngConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TavilyConfig {
    /// "ENV" means: read from `TAVILY_API_KEY`.
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearxngConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_searxng_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearxngConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_searxng_timeout_secs(),
        }
    }
}

/// Shared model-call budget: sustained requests per minute plus burst.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_rpm")]
    pub rpm: u32,
    #[serde(default = "default_burst", alias = "qps")]
    pub burst: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            rpm: default_rpm(),
            burst: default_burst(),
        }
    }
}

/// Without `dir` the pipeline runs without persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// EnvFilter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunConfig {
    /// Whole-run deadline; the run's cancellation token fires when it passes.
    #[serde(default = "default_run_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_run_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus scrape address; exporter is not installed when absent.
    #[serde(default)]
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl RadarConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading radar config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Load using env var + fallback:
    /// 1) $RADAR_CONFIG_PATH
    /// 2) config/radar.toml
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_RADAR_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_RADAR_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(&pb);
        }
        Self::load_from_file(DEFAULT_RADAR_CONFIG_PATH)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: RadarConfig = toml::from_str(s).context("parsing radar config")?;
        cfg.resolve_env_keys()?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn resolve_env_keys(&mut self) -> anyhow::Result<()> {
        if is_env_marker(&self.llm.api_key) {
            self.llm.api_key = env::var(ENV_LLM_API_KEY)
                .map_err(|_| anyhow!("Missing {ENV_LLM_API_KEY} env var"))?;
        }

        // Legacy key only fills a blank nested one.
        if self.search.tavily.api_key.trim().is_empty() {
            if let Some(legacy) = self.tavily_api_key.take() {
                self.search.tavily.api_key = legacy;
            }
        }
        if is_env_marker(&self.search.tavily.api_key) {
            self.search.tavily.api_key = env::var(ENV_TAVILY_API_KEY)
                .map_err(|_| anyhow!("Missing {ENV_TAVILY_API_KEY} env var"))?;
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        if self.concurrency.rpm == 0 {
            self.concurrency.rpm = default_rpm();
        }
        if self.concurrency.burst == 0 {
            self.concurrency.burst = default_burst();
        }

        self.domains = clean_domains(std::mem::take(&mut self.domains));

        if self.search.provider.is_none() && !self.search.tavily.api_key.trim().is_empty() {
            self.search.provider = Some(SearchProviderKind::Tavily);
        }

        if self.llm.base_url.ends_with('/') {
            let trimmed = self.llm.base_url.trim_end_matches('/').to_string();
            self.llm.base_url = trimmed;
        }
    }
}

fn is_env_marker(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("env")
}

/// Trim, drop blanks, drop duplicates (first occurrence wins).
pub fn clean_domains(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}
