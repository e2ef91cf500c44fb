//! Summarizer capability over a chat-completion model, plus the
//! OpenAI-compatible provider and the factory that builds it from config.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::SummarizerError;

/// Chat-completion capability: system + user prompt in, raw text out.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, SummarizerError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynSummarizer = Arc<dyn Summarizer>;

/// Factory: the one active model provider, from config.
pub fn build_summarizer(cfg: &LlmConfig) -> anyhow::Result<DynSummarizer> {
    if cfg.api_key.trim().is_empty() {
        anyhow::bail!("llm api key is missing");
    }
    Ok(Arc::new(OpenAiSummarizer::new(cfg)?))
}

/// OpenAI-compatible Chat Completions provider (`{base_url}/chat/completions`).
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiSummarizer {
    pub fn new(cfg: &LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("domain-radar/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("building llm http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Map a non-success HTTP status to the typed error.
fn classify_status(status: StatusCode, body: &str) -> SummarizerError {
    let msg = format!("llm http status {}: {}", status.as_u16(), body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        SummarizerError::RateLimited(msg)
    } else {
        SummarizerError::Other(msg)
    }
}

fn extract_content(body: &str) -> Result<String, SummarizerError> {
    let parsed: Resp = serde_json::from_str(body)
        .map_err(|e| SummarizerError::Other(format!("decoding llm response: {e}")))?;
    if let Some(err) = parsed.error {
        // Some gateways report throttling inside a 200 body.
        return Err(SummarizerError::from_message(err.message));
    }
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| SummarizerError::Other("llm response has no choices".to_string()))
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, SummarizerError> {
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system_prompt,
                },
                Msg {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| SummarizerError::Other(format!("llm request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SummarizerError::Other(format!("llm response body: {e}")))?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        extract_content(&body)
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

// --- Test helper ---

/// Replays queued replies in order, then repeats `fallback` (if any).
/// Records every (system, user) prompt pair it receives.
pub struct ScriptedSummarizer {
    replies: Mutex<VecDeque<Result<String, SummarizerError>>>,
    fallback: Option<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSummarizer {
    pub fn new(replies: Vec<Result<String, SummarizerError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(reply.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("poisoned calls").len()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, SummarizerError> {
        self.calls
            .lock()
            .expect("poisoned calls")
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let next = self.replies.lock().expect("poisoned replies").pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(SummarizerError::Other("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
