//! Live progress side channel and the in-memory task registry.
//!
//! A run reports `(message, percent)` milestones through a `ProgressSink`.
//! `TaskRegistry` turns those into a `ProgressState` per submitted task; the
//! registry lives only in memory and is lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::Engine;
use crate::model::PersonaUser;

/// Observer of run milestones. Implementations must be cheap: they are
/// called inline by the orchestrator.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, u8) + Send + Sync,
{
    fn report(&self, message: &str, percent: u8) {
        self(message, percent)
    }
}

/// Discards everything.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _message: &str, _percent: u8) {}
}

/// Keeps every milestone in order (tests, diagnostics).
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, u8)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, u8)> {
        self.events.lock().expect("progress mutex poisoned").clone()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().into_iter().map(|(_, p)| p).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, message: &str, percent: u8) {
        self.events
            .lock()
            .expect("progress mutex poisoned")
            .push((message.to_string(), percent));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub phase: Phase,
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

impl ProgressState {
    fn pending() -> Self {
        Self {
            phase: Phase::Pending,
            percent: 0,
            message: "Initializing...".to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Completed | Phase::Failed)
    }
}

/// What a submitted task runs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub topics: Vec<String>,
    pub personas: Vec<PersonaUser>,
    pub cancel: CancellationToken,
}

/// Progress state per task id; tasks run detached on tokio.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<String, ProgressState>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, task_id: &str, state: ProgressState) {
        self.tasks
            .lock()
            .expect("task registry poisoned")
            .insert(task_id.to_string(), state);
    }

    pub fn status(&self, task_id: &str) -> Option<ProgressState> {
        self.tasks
            .lock()
            .expect("task registry poisoned")
            .get(task_id)
            .cloned()
    }

    /// Forget a task (e.g. after its terminal state was read).
    pub fn remove(&self, task_id: &str) -> Option<ProgressState> {
        self.tasks
            .lock()
            .expect("task registry poisoned")
            .remove(task_id)
    }

    /// Start a run in the background and return its task id right away.
    /// A panic inside the run is observed as `failed`.
    pub fn submit(&self, engine: Arc<Engine>, request: RunRequest) -> String {
        let task_id = Uuid::new_v4().to_string();
        self.set(&task_id, ProgressState::pending());

        let sink = RegistrySink {
            registry: self.clone(),
            task_id: task_id.clone(),
        };
        let inner = tokio::spawn(async move {
            engine
                .run(&request.topics, &request.personas, &request.cancel, &sink)
                .await
        });

        let registry = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            let terminal = match inner.await {
                Ok(Ok(_)) => ProgressState {
                    phase: Phase::Completed,
                    percent: 100,
                    message: "Completed".to_string(),
                },
                Ok(Err(e)) => ProgressState {
                    phase: Phase::Failed,
                    percent: 100,
                    message: e.to_string(),
                },
                Err(join_err) => {
                    tracing::error!(target: "engine", task_id = %id, error = %join_err, "report task aborted");
                    ProgressState {
                        phase: Phase::Failed,
                        percent: 100,
                        message: "internal panic".to_string(),
                    }
                }
            };
            registry.set(&id, terminal);
        });

        task_id
    }
}

struct RegistrySink {
    registry: TaskRegistry,
    task_id: String,
}

impl ProgressSink for RegistrySink {
    fn report(&self, message: &str, percent: u8) {
        self.registry.set(
            &self.task_id,
            ProgressState {
                phase: Phase::Running,
                percent: percent.min(100),
                message: message.to_string(),
            },
        );
    }
}
