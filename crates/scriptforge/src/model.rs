//! Domain model: the persisted Job record and everything hanging off it.
//!
//! Every structure here is serde-serializable; the structured sub-objects
//! (content, variations, trend snapshot, transcription, processing metadata)
//! are stored as JSON columns on the job row. `ProcessingMeta` and
//! `TrendSnapshot` are always structurally present, even when empty, so the
//! serialized record never grows or loses fields between states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minimum accepted brief length after trimming.
pub const BRIEF_MIN_CHARS: usize = 50;
/// Maximum accepted brief length.
pub const BRIEF_MAX_CHARS: usize = 50_000;
/// Hard cap on stored variations per job.
pub const MAX_VARIATIONS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Tiktok,
    InstagramReels,
    YoutubeShorts,
    Youtube,
    Linkedin,
}

impl Platform {
    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            Platform::Tiktok | Platform::InstagramReels | Platform::YoutubeShorts => "9:16",
            Platform::Youtube => "16:9",
            Platform::Linkedin => "1:1",
        }
    }

    /// Short vertical formats get punchier openings and tighter pacing.
    pub fn is_short_vertical(&self) -> bool {
        matches!(
            self,
            Platform::Tiktok | Platform::InstagramReels | Platform::YoutubeShorts
        )
    }

    pub fn is_long_form(&self) -> bool {
        matches!(self, Platform::Youtube)
    }

    pub fn is_professional(&self) -> bool {
        matches!(self, Platform::Linkedin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::InstagramReels => "instagram_reels",
            Platform::YoutubeShorts => "youtube_shorts",
            Platform::Youtube => "youtube",
            Platform::Linkedin => "linkedin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDuration {
    S15,
    S30,
    S60,
    M3,
    Custom(u32),
}

impl TargetDuration {
    pub fn seconds(&self) -> u32 {
        match self {
            TargetDuration::S15 => 15,
            TargetDuration::S30 => 30,
            TargetDuration::S60 => 60,
            TargetDuration::M3 => 180,
            TargetDuration::Custom(secs) => *secs,
        }
    }

    /// Custom durations must stay within sane bounds; presets always do.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            TargetDuration::Custom(secs) if !(5..=3600).contains(secs) => {
                Err(ValidationError::InvalidDuration(*secs))
            }
            _ => Ok(()),
        }
    }

    pub fn from_seconds(secs: u32) -> Self {
        match secs {
            15 => TargetDuration::S15,
            30 => TargetDuration::S30,
            60 => TargetDuration::S60,
            180 => TargetDuration::M3,
            other => TargetDuration::Custom(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Basic,
    Detailed,
    Comprehensive,
}

impl Granularity {
    /// Scene count bounds implied by the granularity, before duration sizing.
    pub fn scene_range(&self) -> (usize, usize) {
        match self {
            Granularity::Basic => (3, 4),
            Granularity::Detailed => (4, 6),
            Granularity::Comprehensive => (6, 8),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Basic => "basic",
            Granularity::Detailed => "detailed",
            Granularity::Comprehensive => "comprehensive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Document,
    Video,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Document => "document",
            InputKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Within one attempt the status only moves forward:
    /// pending -> processing -> completed|failed.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Reference to an uploaded document kept in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub path: String,
    pub size_bytes: u64,
    pub mime: String,
}

/// Reference to an uploaded video, deleted by the transcription worker
/// once the pipeline has consumed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRef {
    pub path: String,
    pub size_bytes: u64,
    pub mime: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

/// Result of a successful transcription run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionRecord {
    pub raw_text: String,
    pub cleaned_text: String,
    pub speaker_count: u32,
    pub language: String,
    /// Clamped to [0.60, 0.95].
    pub confidence: f32,
    pub processing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub number: u32,
    pub visual: String,
    pub narration: String,
    pub duration_seconds: u32,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub text_overlay: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashtagSet {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub trending: Vec<String>,
}

/// The structured generated script. Every array field defaults to empty so
/// downstream consumers never observe nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedContent {
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub brand_mentions: Vec<String>,
    #[serde(default)]
    pub call_to_action: String,
    #[serde(default)]
    pub hashtags: HashtagSet,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub audio_suggestions: Vec<String>,
    #[serde(default)]
    pub text_overlays: Vec<String>,
    #[serde(default)]
    pub alternative_endings: Vec<String>,
}

/// Metadata about the most recent generation attempt. Structurally present
/// from job creation onward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMeta {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub processing_ms: u64,
    #[serde(default)]
    pub retry_count: u32,
    /// 0-100 structural quality score for the generated content.
    #[serde(default)]
    pub quality_score: f32,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationKind {
    Hook,
    CallToAction,
    BrandMention,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    pub kind: VariationKind,
    pub label: String,
    pub content: String,
}

/// Trend data attached after generation. Always present once a job
/// completes, possibly with empty lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSnapshot {
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub viral_elements: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for TrendSnapshot {
    fn default() -> Self {
        Self {
            hashtags: Vec::new(),
            audio: Vec::new(),
            viral_elements: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Lifecycle counters that survive regeneration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCounters {
    pub times_generated: u32,
    pub variations_created: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// Optional association with a brand deal, recorded by the CRUD side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealLink {
    pub deal_id: String,
    pub title: String,
    pub brand_name: String,
}

/// The persisted unit of work, and the sole channel through which the
/// asynchronous pipeline reports progress and failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub input_kind: InputKind,
    pub platform: Platform,
    pub duration: TargetDuration,
    pub granularity: Granularity,
    #[serde(default)]
    pub style_notes: String,

    // Exactly one of the three below is Some, matching input_kind.
    #[serde(default)]
    pub brief_text: Option<String>,
    #[serde(default)]
    pub document: Option<DocumentRef>,
    #[serde(default)]
    pub video: Option<VideoRef>,

    #[serde(default)]
    pub transcription: Option<TranscriptionRecord>,

    pub status: JobStatus,
    #[serde(default)]
    pub content: Option<GeneratedContent>,
    #[serde(default)]
    pub meta: ProcessingMeta,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub trends: TrendSnapshot,
    #[serde(default)]
    pub counters: JobCounters,

    #[serde(default)]
    pub deal: Option<DealLink>,
    #[serde(default)]
    pub deleted: bool,
}

impl Job {
    fn new_internal(
        owner_id: &str,
        input_kind: InputKind,
        platform: Platform,
        duration: TargetDuration,
        granularity: Granularity,
        style_notes: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            created_at: now,
            updated_at: now,
            input_kind,
            platform,
            duration,
            granularity,
            style_notes,
            brief_text: None,
            document: None,
            video: None,
            transcription: None,
            status: JobStatus::Pending,
            content: None,
            meta: ProcessingMeta::default(),
            variations: Vec::new(),
            trends: TrendSnapshot::default(),
            counters: JobCounters::default(),
            deal: None,
            deleted: false,
        }
    }

    pub fn from_text(
        owner_id: &str,
        brief: String,
        platform: Platform,
        duration: TargetDuration,
        granularity: Granularity,
        style_notes: String,
    ) -> Self {
        let mut job = Self::new_internal(
            owner_id,
            InputKind::Text,
            platform,
            duration,
            granularity,
            style_notes,
        );
        job.brief_text = Some(brief);
        job
    }

    pub fn from_document(
        owner_id: &str,
        document: DocumentRef,
        platform: Platform,
        duration: TargetDuration,
        granularity: Granularity,
        style_notes: String,
    ) -> Self {
        let mut job = Self::new_internal(
            owner_id,
            InputKind::Document,
            platform,
            duration,
            granularity,
            style_notes,
        );
        job.document = Some(document);
        job
    }

    pub fn from_video(
        owner_id: &str,
        video: VideoRef,
        platform: Platform,
        duration: TargetDuration,
        granularity: Granularity,
        style_notes: String,
    ) -> Self {
        let mut job = Self::new_internal(
            owner_id,
            InputKind::Video,
            platform,
            duration,
            granularity,
            style_notes,
        );
        job.video = Some(video);
        job
    }

    /// Checks the exactly-one-source invariant against the input kind.
    pub fn source_is_consistent(&self) -> bool {
        let populated =
            self.brief_text.is_some() as u8 + self.document.is_some() as u8 + self.video.is_some() as u8;
        if populated != 1 {
            return false;
        }
        match self.input_kind {
            InputKind::Text => self.brief_text.is_some(),
            InputKind::Document => self.document.is_some(),
            InputKind::Video => self.video.is_some(),
        }
    }

    /// Resets the job for a fresh generation attempt. History counters are
    /// preserved; times_generated is bumped by the caller-visible contract.
    pub fn reset_for_regeneration(&mut self) {
        self.status = JobStatus::Pending;
        self.counters.times_generated += 1;
        self.meta = ProcessingMeta::default();
        self.content = None;
        self.variations = Vec::new();
        self.trends = TrendSnapshot::default();
        self.updated_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Validates a raw text brief: trims, then enforces length bounds.
/// Returns the trimmed brief on success.
pub fn validate_brief(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyBrief);
    }
    let len = trimmed.chars().count();
    if len < BRIEF_MIN_CHARS {
        return Err(ValidationError::BriefTooShort {
            len,
            min: BRIEF_MIN_CHARS,
        });
    }
    if len > BRIEF_MAX_CHARS {
        return Err(ValidationError::BriefTooLong {
            len,
            max: BRIEF_MAX_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_job() -> Job {
        Job::from_text(
            "owner-1",
            "a".repeat(100),
            Platform::Tiktok,
            TargetDuration::S30,
            Granularity::Basic,
            String::new(),
        )
    }

    #[test]
    fn test_status_codec_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
    }

    #[test]
    fn test_status_moves_forward_only() {
        assert!(JobStatus::Pending.can_advance_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_advance_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_advance_to(JobStatus::Failed));

        assert!(!JobStatus::Completed.can_advance_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_advance_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_advance_to(JobStatus::Completed));
    }

    #[test]
    fn test_exactly_one_source() {
        let job = text_job();
        assert!(job.source_is_consistent());

        let mut bad = text_job();
        bad.video = Some(VideoRef {
            path: "/tmp/v.mp4".to_string(),
            size_bytes: 10,
            mime: "video/mp4".to_string(),
            duration_seconds: None,
        });
        assert!(!bad.source_is_consistent());

        let mut none = text_job();
        none.brief_text = None;
        assert!(!none.source_is_consistent());
    }

    #[test]
    fn test_source_must_match_kind() {
        let mut job = text_job();
        job.input_kind = InputKind::Video;
        assert!(!job.source_is_consistent());
    }

    #[test]
    fn test_regeneration_preserves_history_counters() {
        let mut job = text_job();
        job.status = JobStatus::Completed;
        job.counters.succeeded = 2;
        job.counters.failed = 1;
        job.content = Some(GeneratedContent::default());
        job.variations.push(Variation {
            kind: VariationKind::Hook,
            label: "question".to_string(),
            content: "why?".to_string(),
        });

        job.reset_for_regeneration();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.counters.times_generated, 1);
        assert_eq!(job.counters.succeeded, 2);
        assert_eq!(job.counters.failed, 1);
        assert!(job.content.is_none());
        assert!(job.variations.is_empty());
        assert_eq!(job.meta.retry_count, 0);
    }

    #[test]
    fn test_validate_brief_bounds() {
        assert!(matches!(
            validate_brief("   "),
            Err(ValidationError::EmptyBrief)
        ));
        assert!(matches!(
            validate_brief("too short"),
            Err(ValidationError::BriefTooShort { .. })
        ));
        assert!(matches!(
            validate_brief(&"x".repeat(50_001)),
            Err(ValidationError::BriefTooLong { .. })
        ));

        let ok = validate_brief(&format!("  {}  ", "y".repeat(60))).unwrap();
        assert_eq!(ok.len(), 60);
    }

    #[test]
    fn test_duration_presets_and_custom() {
        assert_eq!(TargetDuration::S15.seconds(), 15);
        assert_eq!(TargetDuration::M3.seconds(), 180);
        assert_eq!(TargetDuration::from_seconds(60), TargetDuration::S60);
        assert_eq!(
            TargetDuration::from_seconds(45),
            TargetDuration::Custom(45)
        );

        assert!(TargetDuration::Custom(45).validate().is_ok());
        assert!(TargetDuration::Custom(2).validate().is_err());
        assert!(TargetDuration::Custom(4000).validate().is_err());
    }

    #[test]
    fn test_platform_traits() {
        assert!(Platform::Tiktok.is_short_vertical());
        assert!(Platform::YoutubeShorts.is_short_vertical());
        assert!(!Platform::Youtube.is_short_vertical());
        assert!(Platform::Youtube.is_long_form());
        assert!(Platform::Linkedin.is_professional());
        assert_eq!(Platform::Tiktok.aspect_ratio(), "9:16");
        assert_eq!(Platform::Youtube.aspect_ratio(), "16:9");
    }

    #[test]
    fn test_generated_content_deserializes_with_missing_fields() {
        // Model output frequently omits fields; every one must default.
        let content: GeneratedContent = serde_json::from_str("{}").unwrap();
        assert!(content.hook.is_empty());
        assert!(content.scenes.is_empty());
        assert!(content.hashtags.primary.is_empty());
        assert!(content.alternative_endings.is_empty());
    }

    #[test]
    fn test_job_serialization_keeps_meta_and_trends() {
        let job = text_job();
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.meta.retry_count, 0);
        assert!(back.trends.hashtags.is_empty());
        assert_eq!(back.status, JobStatus::Pending);
    }
}
