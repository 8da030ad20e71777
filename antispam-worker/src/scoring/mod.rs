//! Scoring capability.
//!
//! A scorer turns a [`ClassificationTask`] into a numeric spam likelihood
//! and a short rationale. It is shared read-only by every in-flight task.

pub mod llm;

use async_trait::async_trait;

use crate::classifier::ClassificationTask;
use crate::error::Result;

pub use llm::{LlmConfig, LlmScorer, Provider};

/// A scorer's verdict for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub score: f64,
    pub reason: String,
}

#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score one message. Malformed or empty model output is an
    /// [`Error::Classification`](crate::error::Error::Classification).
    async fn score(&self, task: &ClassificationTask) -> Result<Score>;
}
