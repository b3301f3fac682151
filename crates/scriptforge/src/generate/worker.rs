//! Generation worker: prompt, completion call, lenient parse, repair.
//!
//! A malformed completion counts against the retry budget the same way a
//! failed call does. If the budget runs out while responses keep arriving
//! malformed, the job still completes: the post-processor fills the schema
//! with marked placeholders and the quality score reflects it. Only when
//! the service itself stays unreachable does the stage fail.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::generate::{CompletionClient, PromptBuilder};
use crate::model::{GeneratedContent, Job, ProcessingMeta};
use crate::validate;

/// Retry policy for the completion service.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRetry {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for GenerateRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl GenerateRetry {
    /// Delay before the attempt after `attempt` (1-based): base, base*2,
    /// base*4, ...
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Pulls the JSON object out of a completion, tolerating code fences and
/// surrounding prose.
fn parse_content(raw: &str) -> Result<GeneratedContent, String> {
    let start = raw.find('{').ok_or("no JSON object in response")?;
    let end = raw.rfind('}').ok_or("no closing brace in response")?;
    if end < start {
        return Err("braces out of order in response".to_string());
    }
    serde_json::from_str(&raw[start..=end]).map_err(|e| e.to_string())
}

pub struct GenerationWorker {
    completion: Arc<dyn CompletionClient>,
    retry: GenerateRetry,
}

impl GenerationWorker {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self {
            completion,
            retry: GenerateRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: GenerateRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Generates structured content for the job and attaches it together
    /// with processing metadata. Status transitions are the pipeline's job.
    pub async fn run(&self, job: &mut Job) -> Result<(), GenerationError> {
        let brief = effective_brief(job).ok_or(GenerationError::MissingBrief)?;
        let prompt = PromptBuilder::new(
            &brief,
            job.platform,
            job.duration,
            job.granularity,
            &job.style_notes,
        )
        .build();

        let started = Instant::now();
        let mut attempt = 1u32;
        let mut tokens_used = 0u64;
        let mut model = String::new();
        let mut last_parse_error: Option<String> = None;

        let content = loop {
            match self.completion.complete(&prompt).await {
                Ok(response) => {
                    tokens_used += response.tokens_used;
                    model = response.model;

                    match parse_content(&response.text) {
                        Ok(parsed) => {
                            last_parse_error = None;
                            break parsed;
                        }
                        Err(reason) if attempt < self.retry.max_attempts => {
                            warn!(attempt, %reason, "Completion unparseable, retrying");
                            last_parse_error = Some(reason);
                            tokio::time::sleep(self.retry.delay_after(attempt)).await;
                            attempt += 1;
                        }
                        Err(reason) => {
                            // Budget exhausted on parse failures; complete
                            // with a repaired placeholder structure.
                            warn!(attempt, %reason, "Completion stayed unparseable, repairing");
                            last_parse_error = Some(reason);
                            break GeneratedContent::default();
                        }
                    }
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(attempt, max = self.retry.max_attempts, error = %e, "Completion call failed, retrying");
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempts = attempt, error = %e, "Completion gave up");
                    // The failed row still reports how many attempts the
                    // budget bought.
                    job.meta.retry_count = attempt - 1;
                    job.meta.tokens_used = tokens_used;
                    return Err(GenerationError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        };

        let content = validate::normalize(content, job.platform, job.duration);
        let quality_score = validate::quality_score(&content);
        debug!(job_id = %job.id, quality_score, "Content normalized");

        job.meta = ProcessingMeta {
            model,
            tokens_used,
            processing_ms: started.elapsed().as_millis() as u64,
            retry_count: attempt - 1,
            quality_score,
            last_error: last_parse_error,
        };
        job.content = Some(content);
        job.touch();

        info!(job_id = %job.id, attempts = attempt, "Generation complete");
        Ok(())
    }
}

/// The generation brief: the validated text brief for text and document
/// jobs, the cleaned transcript for video jobs.
fn effective_brief(job: &Job) -> Option<String> {
    if let Some(ref brief) = job.brief_text {
        return Some(brief.clone());
    }
    job.transcription
        .as_ref()
        .map(|t| t.cleaned_text.clone())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::generate::CompletionResponse;
    use crate::model::{Granularity, JobStatus, Platform, TargetDuration, TranscriptionRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const VALID_COMPLETION: &str = r##"{
        "hook": "Your pour-over is ruined by one habit nobody talks about",
        "scenes": [
            {"number": 1, "visual": "Kettle close-up", "narration": "Stop pouring straight from the boil", "duration_seconds": 10},
            {"number": 2, "visual": "Thermometer shot", "narration": "Let it rest thirty seconds first", "duration_seconds": 10},
            {"number": 3, "visual": "Side-by-side taste test", "narration": "Here is the difference it makes", "duration_seconds": 10}
        ],
        "brand_mentions": ["AeroBrew"],
        "call_to_action": "Try it tomorrow morning and tell me what changed",
        "hashtags": {"primary": ["#coffee", "#pourover", "#morningroutine"], "trending": []}
    }"##;

    /// Plays back a fixed script of responses, then repeats the last one.
    struct ScriptedCompletion {
        script: Vec<Result<String, CompletionError>>,
        calls: AtomicU32,
    }

    impl ScriptedCompletion {
        fn new(script: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                script,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, _prompt: &str) -> Result<CompletionResponse, CompletionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let idx = call.min(self.script.len() - 1);
            match &self.script[idx] {
                Ok(text) => Ok(CompletionResponse {
                    text: text.clone(),
                    model: "writer-large".to_string(),
                    tokens_used: 100,
                }),
                Err(CompletionError::Timeout(m)) => Err(CompletionError::Timeout(m.clone())),
                Err(CompletionError::RateLimited(m)) => Err(CompletionError::RateLimited(m.clone())),
                Err(CompletionError::Service(m)) => Err(CompletionError::Service(m.clone())),
            }
        }
    }

    fn text_job() -> Job {
        Job::from_text(
            "owner-1",
            "Make a sixty second explainer about why pour-over coffee tastes better \
             when the water rests off the boil before brewing."
                .to_string(),
            Platform::Tiktok,
            TargetDuration::S30,
            Granularity::Basic,
            String::new(),
        )
    }

    #[tokio::test]
    async fn test_valid_completion_first_try() {
        let client = Arc::new(ScriptedCompletion::new(vec![Ok(VALID_COMPLETION.to_string())]));
        let worker = GenerationWorker::new(client.clone());
        let mut job = text_job();

        worker.run(&mut job).await.unwrap();

        let content = job.content.as_ref().unwrap();
        assert!(content.hook.contains("pour-over"));
        assert_eq!(content.scenes.len(), 3);
        assert_eq!(job.meta.retry_count, 0);
        assert_eq!(job.meta.tokens_used, 100);
        assert_eq!(job.meta.model, "writer-large");
        assert!(job.meta.quality_score >= 90.0);
        assert!(job.meta.last_error.is_none());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_malformed_then_valid() {
        let client = Arc::new(ScriptedCompletion::new(vec![
            Ok("I'd be happy to help! Here is an outline instead.".to_string()),
            Ok("{\"hook\": \"broken".to_string()),
            Ok(VALID_COMPLETION.to_string()),
        ]));
        let worker = GenerationWorker::new(client.clone());
        let mut job = text_job();

        worker.run(&mut job).await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(job.meta.retry_count, 2);
        assert!(job.content.as_ref().unwrap().hook.contains("pour-over"));
        assert!(job.meta.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_malformed_completes_with_placeholders() {
        let client = Arc::new(ScriptedCompletion::new(vec![Ok("not json at all".to_string())]));
        let worker = GenerationWorker::new(client.clone());
        let mut job = text_job();

        worker.run(&mut job).await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        let content = job.content.as_ref().unwrap();
        assert!(content.hook.starts_with("[placeholder]"));
        assert_eq!(content.scenes.len(), 3);
        assert!(job.meta.quality_score < 30.0);
        assert!(job.meta.last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_failures_exhaust_budget() {
        let client = Arc::new(ScriptedCompletion::new(vec![Err(CompletionError::Service(
            "upstream down".to_string(),
        ))]));
        let worker = GenerationWorker::new(client.clone());
        let mut job = text_job();

        let err = worker.run(&mut job).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Exhausted { attempts: 3, .. }
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert!(job.content.is_none());
        assert_eq!(job.status, JobStatus::Pending);
        // The spent attempts survive on the metadata even though the run
        // failed.
        assert_eq!(job.meta.retry_count, 2);
    }

    #[tokio::test]
    async fn test_video_job_uses_transcript() {
        let client = Arc::new(ScriptedCompletion::new(vec![Ok(VALID_COMPLETION.to_string())]));
        let worker = GenerationWorker::new(client);
        let mut job = text_job();
        job.brief_text = None;
        job.transcription = Some(TranscriptionRecord {
            raw_text: "raw".to_string(),
            cleaned_text: "A cleaned transcript about coffee brewing".to_string(),
            speaker_count: 1,
            language: "en".to_string(),
            confidence: 0.9,
            processing_ms: 10,
        });

        worker.run(&mut job).await.unwrap();
        assert!(job.content.is_some());
    }

    #[tokio::test]
    async fn test_missing_brief_fails_fast() {
        let client = Arc::new(ScriptedCompletion::new(vec![Ok(VALID_COMPLETION.to_string())]));
        let worker = GenerationWorker::new(client.clone());
        let mut job = text_job();
        job.brief_text = None;

        let err = worker.run(&mut job).await.unwrap_err();
        assert!(matches!(err, GenerationError::MissingBrief));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_content_strips_fences_and_prose() {
        let wrapped = format!("Sure! Here you go:\n```json\n{}\n```\nHope this helps.", VALID_COMPLETION);
        let content = parse_content(&wrapped).unwrap();
        assert_eq!(content.scenes.len(), 3);

        assert!(parse_content("no braces here").is_err());
    }
}
