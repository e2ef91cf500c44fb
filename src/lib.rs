// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod progress;
pub mod render;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::engine::Engine;
pub use crate::error::{GenerationError, PipelineError, SummarizerError};
pub use crate::model::{Article, DeepAnalysis, DomainReport, PersonaUser, RunOutcome};
pub use crate::progress::{ProgressSink, ProgressState, TaskRegistry};
pub use crate::store::ResultStore;
