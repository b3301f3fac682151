//! Script generation stage.
//!
//! A prompt is assembled from the job's brief and settings, sent to an
//! external completion service behind the `CompletionClient` trait, and the
//! response is parsed leniently into the structured content schema. Retries
//! and parse-repair live in the worker; the client only classifies errors.

pub mod client;
pub mod prompt;
pub mod worker;

pub use client::HttpCompletionClient;
pub use prompt::PromptBuilder;
pub use worker::{GenerateRetry, GenerationWorker};

use async_trait::async_trait;

use crate::error::CompletionError;

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: u64,
}

/// External completion service seam. Implementations decide the typed
/// error category at the call site.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, CompletionError>;
}
