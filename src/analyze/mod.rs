// src/analyze/mod.rs
//! Model-facing half of the pipeline: summarizer capability, shared rate
//! limiter, retry policy and the two generators built on them.

pub mod deep_analysis;
pub mod domain_report;
pub mod gateway;
pub mod llm;
pub mod parse;
pub mod rate_limit;
pub mod retry;

// Re-export convenient types.
pub use crate::analyze::deep_analysis::{build_aggregated_summary, DeepAnalysisGenerator};
pub use crate::analyze::domain_report::DomainReportGenerator;
pub use crate::analyze::gateway::ModelGateway;
pub use crate::analyze::llm::{build_summarizer, DynSummarizer, OpenAiSummarizer, Summarizer};
pub use crate::analyze::rate_limit::RateLimiter;
pub use crate::analyze::retry::RetryPolicy;
