//! The service facade: synchronous validation, asynchronous processing.
//!
//! `submit_*` validates the request shape, checks tier limits and quota,
//! persists a pending row and detaches a pipeline run; callers poll the
//! row (or list their jobs) for progress. Everything observable flows
//! through the job record.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::admission::AdmissionController;
use crate::db::job_repo::JobRepository;
use crate::db::Database;
use crate::error::{Result, ValidationError};
use crate::export::{self, ExportFormat};
use crate::generate::CompletionClient;
use crate::model::{
    validate_brief, DealLink, DocumentRef, Granularity, Job, JobStatus, Platform, TargetDuration,
    VideoRef,
};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::runner::Pipeline;
use crate::subscription::{TierLimits, TierLookup};
use crate::transcribe::SpeechToText;
use crate::trend::TrendSource;

/// Common per-job settings supplied at submission.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub platform: Platform,
    pub duration: TargetDuration,
    pub granularity: Granularity,
    pub style_notes: String,
}

pub struct StudioService {
    repo: JobRepository,
    pipeline: Arc<Pipeline>,
    tiers: Arc<dyn TierLookup>,
    config: PipelineConfig,
}

impl StudioService {
    pub fn new(
        db: Database,
        admission: Arc<AdmissionController>,
        speech: Arc<dyn SpeechToText>,
        completion: Arc<dyn CompletionClient>,
        trends: Arc<dyn TrendSource>,
        tiers: Arc<dyn TierLookup>,
        config: PipelineConfig,
    ) -> Self {
        let repo = JobRepository::new(db);
        let pipeline = Arc::new(Pipeline::new(
            repo.clone(),
            admission,
            speech,
            completion,
            trends,
            &config,
        ));
        Self {
            repo,
            pipeline,
            tiers,
            config,
        }
    }

    /// Submits a text brief. Returns the pending job immediately;
    /// processing continues in a detached task.
    pub fn submit_text(&self, owner_id: &str, brief: &str, settings: JobSettings) -> Result<Job> {
        let limits = self.tiers.limits_for(owner_id);
        settings.duration.validate()?;
        let brief = validate_brief(brief)?;
        self.check_quota(owner_id, &limits)?;

        let job = Job::from_text(
            owner_id,
            brief,
            settings.platform,
            settings.duration,
            settings.granularity,
            settings.style_notes,
        );
        self.accept(job, limits)
    }

    /// Submits an uploaded document to be extracted into a brief.
    pub fn submit_document(
        &self,
        owner_id: &str,
        document: DocumentRef,
        settings: JobSettings,
    ) -> Result<Job> {
        let limits = self.tiers.limits_for(owner_id);
        settings.duration.validate()?;
        limits.check_document_size(document.size_bytes)?;
        self.check_quota(owner_id, &limits)?;

        let job = Job::from_document(
            owner_id,
            document,
            settings.platform,
            settings.duration,
            settings.granularity,
            settings.style_notes,
        );
        self.accept(job, limits)
    }

    /// Submits an uploaded video for transcription and generation.
    pub fn submit_video(
        &self,
        owner_id: &str,
        video: VideoRef,
        settings: JobSettings,
    ) -> Result<Job> {
        let limits = self.tiers.limits_for(owner_id);
        settings.duration.validate()?;
        limits.require_transcription()?;
        limits.check_video_size(video.size_bytes)?;
        self.check_quota(owner_id, &limits)?;

        let job = Job::from_video(
            owner_id,
            video,
            settings.platform,
            settings.duration,
            settings.granularity,
            settings.style_notes,
        );
        self.accept(job, limits)
    }

    fn accept(&self, job: Job, limits: TierLimits) -> Result<Job> {
        self.repo.insert(&job)?;
        info!(job_id = %job.id, kind = job.input_kind.as_str(), "Job accepted");
        self.spawn_run(job.id.clone(), limits);
        Ok(job)
    }

    fn check_quota(&self, owner_id: &str, limits: &TierLimits) -> Result<()> {
        let since = Utc::now() - chrono::Duration::days(30);
        let used = self.repo.count_created_since(owner_id, since)?;
        limits.check_quota(used)?;
        Ok(())
    }

    fn spawn_run(&self, job_id: String, limits: TierLimits) {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(&job_id, &limits).await {
                error!(job_id = %job_id, error = %e, "Pipeline run ended in failure");
            }
        });
    }

    pub fn get(&self, job_id: &str) -> Result<Job> {
        Ok(self.repo.find_by_id(job_id)?)
    }

    pub fn list(
        &self,
        owner_id: &str,
        status: Option<JobStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Job>> {
        Ok(self.repo.list_by_owner(owner_id, status, limit, offset)?)
    }

    /// Queues a fresh generation pass for a terminal job. History counters
    /// survive; content, variations and trends are rebuilt.
    pub fn regenerate(&self, job_id: &str) -> Result<Job> {
        let mut job = self.repo.find_by_id(job_id)?;
        if !job.status.is_terminal() {
            return Err(ValidationError::NotRegenerable(format!(
                "job {} is {}",
                job.id,
                job.status.as_str()
            ))
            .into());
        }

        job.reset_for_regeneration();
        self.repo.update(&job)?;

        let limits = self.tiers.limits_for(&job.owner_id);
        self.spawn_run(job.id.clone(), limits);
        Ok(job)
    }

    pub fn export(&self, job_id: &str, format: ExportFormat) -> Result<String> {
        let job = self.repo.find_by_id(job_id)?;
        export::export(&job, format)
    }

    pub fn delete(&self, job_id: &str) -> Result<()> {
        self.repo.soft_delete(job_id)?;
        Ok(())
    }

    pub fn link_deal(&self, job_id: &str, deal: DealLink) -> Result<Job> {
        let mut job = self.repo.find_by_id(job_id)?;
        job.deal = Some(deal);
        job.touch();
        self.repo.update(&job)?;
        Ok(job)
    }

    /// Starts the background sweeper that fails orphaned `processing`
    /// rows. The task runs until the returned handle is aborted.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let repo = self.repo.clone();
        let interval = self.config.sweep_interval;
        let timeout = chrono::Duration::from_std(self.config.stuck_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match repo.sweep_stuck(Utc::now() - timeout) {
                    Ok(swept) if !swept.is_empty() => {
                        info!(count = swept.len(), "Swept stuck jobs");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Sweep pass failed"),
                }
            }
        })
    }
}
