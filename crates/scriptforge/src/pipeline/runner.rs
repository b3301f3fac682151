//! The pipeline runner: one job from fetched row to terminal state.
//!
//! Every run ends with the row in `completed` or `failed`; the only
//! channel for progress and failure detail is the job record itself.
//! Variations and trends are best-effort enrichment after a successful
//! generation and can never fail the job.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::admission::AdmissionController;
use crate::db::job_repo::JobRepository;
use crate::error::{Result, ValidationError};
use crate::generate::{CompletionClient, GenerationWorker};
use crate::ingest::ExtractorRegistry;
use crate::model::{validate_brief, InputKind, Job, JobStatus, BRIEF_MAX_CHARS};
use crate::pipeline::config::PipelineConfig;
use crate::subscription::TierLimits;
use crate::transcribe::{SpeechToText, TranscriptionWorker};
use crate::trend::{self, TrendSource};
use crate::variation::generate_variations;

pub struct Pipeline {
    repo: JobRepository,
    admission: Arc<AdmissionController>,
    registry: ExtractorRegistry,
    transcriber: TranscriptionWorker,
    generator: GenerationWorker,
    trends: Arc<dyn TrendSource>,
}

impl Pipeline {
    pub fn new(
        repo: JobRepository,
        admission: Arc<AdmissionController>,
        speech: Arc<dyn SpeechToText>,
        completion: Arc<dyn CompletionClient>,
        trends: Arc<dyn TrendSource>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            repo,
            admission: admission.clone(),
            registry: ExtractorRegistry::new(),
            transcriber: TranscriptionWorker::new(speech, admission)
                .with_retry(config.transcribe_retry),
            generator: GenerationWorker::new(completion).with_retry(config.generate_retry),
            trends,
        }
    }

    /// Runs the job to a terminal state. The outcome is recorded on the
    /// row before this returns; the returned error mirrors what was
    /// recorded so spawners can log it.
    pub async fn run(&self, job_id: &str, limits: &TierLimits) -> Result<()> {
        let mut job = self.repo.find_by_id(job_id)?;

        match self.execute(&mut job, limits).await {
            Ok(()) => {
                job.status = JobStatus::Completed;
                job.counters.succeeded += 1;
                job.touch();
                self.repo.update(&job)?;
                info!(job_id = %job.id, quality = job.meta.quality_score, "Job completed");
                Ok(())
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.meta.last_error = Some(e.to_string());
                job.counters.failed += 1;
                job.touch();
                self.repo.update(&job)?;
                warn!(job_id = %job.id, error = %e, "Job failed");
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &mut Job, limits: &TierLimits) -> Result<()> {
        {
            let _span = info_span!("admission", job_id = %job.id).entered();
            self.admission.require_admission()?;
        }

        job.status = JobStatus::Processing;
        job.touch();
        self.repo.update(job)?;

        match job.input_kind {
            InputKind::Text => {
                // Validated at submission; nothing to resolve.
            }
            InputKind::Document => {
                let _span = info_span!("ingest", job_id = %job.id).entered();
                self.resolve_document_brief(job)?;
                self.repo.update(job)?;
            }
            InputKind::Video => {
                // Regeneration reuses the stored transcript; the media was
                // deleted after the first pass.
                if job.transcription.is_none() {
                    limits.require_transcription()?;
                    let span = info_span!("transcribe", job_id = %job.id);
                    self.transcriber.run(job).instrument(span).await?;
                    // Persist the transcript before the (slow) generation
                    // step so a crash does not lose it.
                    self.repo.update(job)?;
                }
            }
        }

        // Transcription or document parsing may have taken long enough
        // that the entry sample is stale; generation buffers the prompt
        // and response, so it gets its own gate.
        {
            let _span = info_span!("admission", job_id = %job.id, stage = "generate").entered();
            self.admission.require_admission()?;
        }

        let span = info_span!("generate", job_id = %job.id);
        self.generator.run(job).instrument(span).await?;

        self.enrich(job, limits).await;
        Ok(())
    }

    fn resolve_document_brief(&self, job: &mut Job) -> Result<()> {
        let document = match job.document {
            Some(ref doc) => doc.clone(),
            None => {
                return Err(ValidationError::MissingSource {
                    kind: "document",
                    expected: "document",
                }
                .into())
            }
        };

        // Parsing buffers the document; same headroom rule as media.
        self.admission.require_size(document.size_bytes)?;

        let extracted = self.registry.extract(&document)?;

        // Long documents are clipped rather than rejected; the creator
        // already paid for the upload.
        let mut text = extracted.text;
        if text.chars().count() > BRIEF_MAX_CHARS {
            text = text.chars().take(BRIEF_MAX_CHARS).collect();
        }
        job.brief_text = Some(validate_brief(&text)?);
        job.touch();
        Ok(())
    }

    /// Best-effort enrichment. Failures degrade to empty results.
    async fn enrich(&self, job: &mut Job, limits: &TierLimits) {
        if limits.variations {
            let _span = info_span!("variations", job_id = %job.id).entered();
            if let Some(ref content) = job.content {
                job.variations = generate_variations(content, job.platform);
                job.counters.variations_created += job.variations.len() as u32;
            }
        }

        if limits.trends {
            job.trends = trend::augment(self.trends.as_ref(), job.platform)
                .instrument(info_span!("trends", job_id = %job.id))
                .await;
        }
    }
}
