//! Transcription worker: bounded retries around the speech-to-text seam,
//! with unconditional media cleanup.
//!
//! The worker mutates the in-memory job (attaching the transcription
//! record); persistence is the pipeline's responsibility. Whatever the
//! outcome, the uploaded media file is deleted before the worker returns,
//! so storage never accumulates processed uploads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::admission::AdmissionController;
use crate::error::{IngestError, SpeechError, TranscriptionError};
use crate::model::{Job, TranscriptionRecord};
use crate::transcribe::{
    clean_transcript, estimate_confidence, estimate_speaker_count, SpeechToText, TranscriptHints,
    TranscriptResponse,
};

/// Retry policy for the speech service. Only transient failures
/// (timeouts, service errors) are retried; size and format rejections
/// fail immediately.
#[derive(Debug, Clone, Copy)]
pub struct TranscribeRetry {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for TranscribeRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl TranscribeRetry {
    /// Delay before the attempt after `attempt` (1-based): base, base*2,
    /// base*4, ...
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

pub struct TranscriptionWorker {
    speech: Arc<dyn SpeechToText>,
    admission: Arc<AdmissionController>,
    retry: TranscribeRetry,
}

impl TranscriptionWorker {
    pub fn new(speech: Arc<dyn SpeechToText>, admission: Arc<AdmissionController>) -> Self {
        Self {
            speech,
            admission,
            retry: TranscribeRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: TranscribeRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Transcribes the job's video source and attaches the resulting record.
    /// The media file is removed whether transcription succeeds or fails.
    pub async fn run(&self, job: &mut Job) -> Result<(), TranscriptionError> {
        let video = job
            .video
            .clone()
            .ok_or_else(|| IngestError::MissingMedia(PathBuf::new()))?;
        let path = PathBuf::from(&video.path);

        if tokio::fs::metadata(&path).await.is_err() {
            return Err(IngestError::MissingMedia(path).into());
        }

        let started = Instant::now();
        let outcome = self.transcribe_with_retry(&path, video.size_bytes).await;

        // Cleanup is unconditional; a stale upload is never retried from disk.
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete processed media");
        }

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                // The failed row still reports how many attempts were spent.
                if let TranscriptionError::Exhausted { attempts, .. } = &e {
                    job.meta.retry_count = attempts.saturating_sub(1);
                }
                return Err(e);
            }
        };
        let raw_text = response.full_text();
        let cleaned_text = clean_transcript(&raw_text);

        job.transcription = Some(TranscriptionRecord {
            speaker_count: estimate_speaker_count(&cleaned_text),
            confidence: estimate_confidence(&response.segments),
            language: response.language,
            processing_ms: started.elapsed().as_millis() as u64,
            raw_text,
            cleaned_text,
        });
        job.touch();

        info!(job_id = %job.id, "Transcription complete");
        Ok(())
    }

    async fn transcribe_with_retry(
        &self,
        path: &Path,
        size_bytes: u64,
    ) -> Result<TranscriptResponse, TranscriptionError> {
        // Size gate runs before the first attempt: a payload the process
        // cannot buffer alongside its working set is denied outright.
        self.admission.require_size(size_bytes)?;

        let hints = TranscriptHints::default();
        let mut attempt = 1u32;
        loop {
            match self.speech.transcribe(path, &hints).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        attempt,
                        max = self.retry.max_attempts,
                        error = %e,
                        "Transcription attempt failed, retrying"
                    );
                    self.admission.request_reclaim();
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(self.exhausted(attempt, e));
                }
            }
        }
    }

    fn exhausted(&self, attempts: u32, source: SpeechError) -> TranscriptionError {
        warn!(attempts, error = %source, "Transcription gave up");
        TranscriptionError::Exhausted { attempts, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::StaticMemoryProbe;
    use crate::model::{Granularity, Platform, TargetDuration, VideoRef};
    use crate::transcribe::TranscriptSegment;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    const GIB: u64 = 1024 * 1024 * 1024;

    /// Fails the first `failures` calls with the given error kind, then
    /// succeeds.
    struct ScriptedSpeech {
        failures: u32,
        transient: bool,
        calls: AtomicU32,
    }

    impl ScriptedSpeech {
        fn new(failures: u32, transient: bool) -> Self {
            Self {
                failures,
                transient,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechToText for ScriptedSpeech {
        async fn transcribe(
            &self,
            _media_path: &Path,
            _hints: &TranscriptHints,
        ) -> Result<TranscriptResponse, SpeechError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(if self.transient {
                    SpeechError::Service("upstream hiccup".to_string())
                } else {
                    SpeechError::InvalidFormat("bad codec".to_string())
                });
            }
            Ok(TranscriptResponse {
                segments: vec![
                    TranscriptSegment {
                        text: "Today we walk through the whole launch plan".to_string(),
                        start_ms: 0,
                        end_ms: 4_000,
                    },
                    TranscriptSegment {
                        text: "starting with the part everyone gets wrong".to_string(),
                        start_ms: 4_100,
                        end_ms: 8_000,
                    },
                    TranscriptSegment {
                        text: "and finishing with the numbers that matter".to_string(),
                        start_ms: 8_100,
                        end_ms: 12_000,
                    },
                ],
                language: "en".to_string(),
            })
        }
    }

    fn admission() -> Arc<AdmissionController> {
        Arc::new(AdmissionController::new(Box::new(StaticMemoryProbe::new(
            GIB,
            8 * GIB,
            6 * GIB,
        ))))
    }

    fn video_job(dir: &TempDir, size_bytes: u64) -> (Job, PathBuf) {
        let path = dir.path().join("upload.mp4");
        std::fs::write(&path, vec![0u8; 16]).unwrap();
        let job = Job::from_video(
            "owner-1",
            VideoRef {
                path: path.to_string_lossy().into_owned(),
                size_bytes,
                mime: "video/mp4".to_string(),
                duration_seconds: Some(42),
            },
            Platform::Tiktok,
            TargetDuration::S60,
            Granularity::Detailed,
            String::new(),
        );
        (job, path)
    }

    #[tokio::test]
    async fn test_success_attaches_record_and_deletes_media() {
        let dir = TempDir::new().unwrap();
        let (mut job, path) = video_job(&dir, 1024);
        let speech = Arc::new(ScriptedSpeech::new(0, true));
        let worker = TranscriptionWorker::new(speech.clone(), admission());

        worker.run(&mut job).await.unwrap();

        let record = job.transcription.as_ref().unwrap();
        assert!(record.cleaned_text.contains("launch plan"));
        assert_eq!(record.language, "en");
        assert!((0.60..=0.95).contains(&record.confidence));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_up_to_limit() {
        let dir = TempDir::new().unwrap();
        let (mut job, path) = video_job(&dir, 1024);
        let speech = Arc::new(ScriptedSpeech::new(2, true));
        let worker = TranscriptionWorker::new(speech.clone(), admission());

        worker.run(&mut job).await.unwrap();

        assert_eq!(speech.calls.load(Ordering::SeqCst), 3);
        assert!(job.transcription.is_some());
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_three_transient_failures() {
        let dir = TempDir::new().unwrap();
        let (mut job, path) = video_job(&dir, 1024);
        let speech = Arc::new(ScriptedSpeech::new(5, true));
        let worker = TranscriptionWorker::new(speech.clone(), admission());

        let err = worker.run(&mut job).await.unwrap_err();
        assert!(matches!(
            err,
            TranscriptionError::Exhausted { attempts: 3, .. }
        ));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 3);
        assert!(job.transcription.is_none());
        assert_eq!(job.meta.retry_count, 2);
        // Media still cleaned up on failure.
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_permanent_error_fails_without_retry() {
        let dir = TempDir::new().unwrap();
        let (mut job, _path) = video_job(&dir, 1024);
        let speech = Arc::new(ScriptedSpeech::new(5, false));
        let worker = TranscriptionWorker::new(speech.clone(), admission());

        let err = worker.run(&mut job).await.unwrap_err();
        assert!(matches!(
            err,
            TranscriptionError::Exhausted {
                attempts: 1,
                source: SpeechError::InvalidFormat(_),
            }
        ));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_payload_denied_before_any_attempt() {
        let dir = TempDir::new().unwrap();
        // 3x headroom over 6 GiB available: anything above 2 GiB is denied.
        let (mut job, path) = video_job(&dir, 3 * GIB);
        let speech = Arc::new(ScriptedSpeech::new(0, true));
        let worker = TranscriptionWorker::new(speech.clone(), admission());

        let err = worker.run(&mut job).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Admission(_)));
        assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_media_file() {
        let dir = TempDir::new().unwrap();
        let (mut job, path) = video_job(&dir, 1024);
        std::fs::remove_file(&path).unwrap();

        let worker = TranscriptionWorker::new(Arc::new(ScriptedSpeech::new(0, true)), admission());
        let err = worker.run(&mut job).await.unwrap_err();
        assert!(matches!(
            err,
            TranscriptionError::Ingest(IngestError::MissingMedia(_))
        ));
    }
}
