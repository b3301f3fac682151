use std::time::Duration;

use crate::generate::GenerateRetry;
use crate::transcribe::TranscribeRetry;

/// Tunables for the pipeline and its background sweeper.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub transcribe_retry: TranscribeRetry,
    pub generate_retry: GenerateRetry,
    /// A job sitting in `processing` longer than this is presumed
    /// orphaned and swept to `failed`.
    pub stuck_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transcribe_retry: TranscribeRetry::default(),
            generate_retry: GenerateRetry::default(),
            stuck_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}
