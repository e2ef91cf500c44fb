//! Every model call of a run goes through here: rate-limiter token first,
//! then the summarizer, both abandoned as soon as the run is cancelled.

use std::sync::Arc;

use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::analyze::llm::DynSummarizer;
use crate::analyze::rate_limit::RateLimiter;
use crate::error::{GenerationError, SummarizerError};
use crate::metrics::LLM_CALLS_TOTAL;

#[derive(Clone)]
pub struct ModelGateway {
    summarizer: DynSummarizer,
    limiter: Arc<RateLimiter>,
}

impl ModelGateway {
    pub fn new(summarizer: DynSummarizer, limiter: Arc<RateLimiter>) -> Self {
        Self {
            summarizer,
            limiter,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        self.limiter
            .acquire(cancel)
            .await
            .map_err(|_| GenerationError::Cancelled)?;

        counter!(LLM_CALLS_TOTAL).increment(1);
        tokio::select! {
            _ = cancel.cancelled() => Err(SummarizerError::Cancelled.into()),
            res = self.summarizer.generate(system_prompt, user_prompt) => res.map_err(Into::into),
        }
    }
}
