//! Repository for job rows.
//!
//! Structured sub-objects (content, meta, variations, trends, sources) are
//! stored as JSON text columns; scalar fields get real columns so they can
//! be filtered and indexed. Timestamps are RFC 3339 strings.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::error::DatabaseError;
use super::Database;
use crate::model::{
    DealLink, DocumentRef, GeneratedContent, Granularity, InputKind, Job, JobCounters, JobStatus,
    Platform, ProcessingMeta, TargetDuration, TranscriptionRecord, TrendSnapshot, Variation,
    VideoRef,
};

const JOB_COLUMNS: &str = "id, owner_id, status, input_kind, platform, duration_seconds, \
     granularity, style_notes, brief_text, document_json, video_json, transcription_json, \
     content_json, meta_json, variations_json, trends_json, times_generated, \
     variations_created, succeeded, failed, deal_json, deleted, created_at, updated_at";

fn parse_timestamp(column: &'static str, raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt {
            column,
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}

fn opt_json<T: serde::de::DeserializeOwned>(
    raw: Option<String>,
) -> Result<Option<T>, DatabaseError> {
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

fn enum_column<T>(
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    column: &'static str,
) -> Result<T, DatabaseError> {
    parse(raw).ok_or_else(|| DatabaseError::Corrupt {
        column,
        reason: format!("unknown value '{}'", raw),
    })
}

fn parse_platform(s: &str) -> Option<Platform> {
    match s {
        "tiktok" => Some(Platform::Tiktok),
        "instagram_reels" => Some(Platform::InstagramReels),
        "youtube_shorts" => Some(Platform::YoutubeShorts),
        "youtube" => Some(Platform::Youtube),
        "linkedin" => Some(Platform::Linkedin),
        _ => None,
    }
}

fn parse_input_kind(s: &str) -> Option<InputKind> {
    match s {
        "text" => Some(InputKind::Text),
        "document" => Some(InputKind::Document),
        "video" => Some(InputKind::Video),
        _ => None,
    }
}

fn parse_granularity(s: &str) -> Option<Granularity> {
    match s {
        "basic" => Some(Granularity::Basic),
        "detailed" => Some(Granularity::Detailed),
        "comprehensive" => Some(Granularity::Comprehensive),
        _ => None,
    }
}

fn row_to_job(row: &Row<'_>) -> Result<Job, DatabaseError> {
    let status_raw: String = row.get(2)?;
    let kind_raw: String = row.get(3)?;
    let platform_raw: String = row.get(4)?;
    let duration_seconds: u32 = row.get(5)?;
    let granularity_raw: String = row.get(6)?;
    let created_raw: String = row.get(22)?;
    let updated_raw: String = row.get(23)?;

    let meta_json: String = row.get(13)?;
    let variations_json: String = row.get(14)?;
    let trends_json: String = row.get(15)?;

    Ok(Job {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        status: enum_column(&status_raw, JobStatus::parse, "status")?,
        input_kind: enum_column(&kind_raw, parse_input_kind, "input_kind")?,
        platform: enum_column(&platform_raw, parse_platform, "platform")?,
        duration: TargetDuration::from_seconds(duration_seconds),
        granularity: enum_column(&granularity_raw, parse_granularity, "granularity")?,
        style_notes: row.get(7)?,
        brief_text: row.get(8)?,
        document: opt_json::<DocumentRef>(row.get(9)?)?,
        video: opt_json::<VideoRef>(row.get(10)?)?,
        transcription: opt_json::<TranscriptionRecord>(row.get(11)?)?,
        content: opt_json::<GeneratedContent>(row.get(12)?)?,
        meta: serde_json::from_str::<ProcessingMeta>(&meta_json)?,
        variations: serde_json::from_str::<Vec<Variation>>(&variations_json)?,
        trends: serde_json::from_str::<TrendSnapshot>(&trends_json)?,
        counters: JobCounters {
            times_generated: row.get(16)?,
            variations_created: row.get(17)?,
            succeeded: row.get(18)?,
            failed: row.get(19)?,
        },
        deal: opt_json::<DealLink>(row.get(20)?)?,
        deleted: row.get::<_, i64>(21)? != 0,
        created_at: parse_timestamp("created_at", &created_raw)?,
        updated_at: parse_timestamp("updated_at", &updated_raw)?,
    })
}

fn opt_to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>, DatabaseError> {
    match value {
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
        None => Ok(None),
    }
}

/// Repository over job rows. Cheap to clone.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, job: &Job) -> Result<(), DatabaseError> {
        self.db
            .with_conn(|conn| Self::write_row(conn, job, true).map(|_| ()))
    }

    /// Persists the full current state of the job, overwriting the stored
    /// row. The job must already exist.
    pub fn update(&self, job: &Job) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            let changed = Self::write_row(conn, job, false)?;
            if changed == 0 {
                return Err(DatabaseError::JobNotFound(job.id.clone()));
            }
            Ok(())
        })
    }

    fn write_row(conn: &Connection, job: &Job, insert: bool) -> Result<usize, DatabaseError> {
        let sql = if insert {
            format!(
                "INSERT INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, \
                 ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                JOB_COLUMNS
            )
        } else {
            "UPDATE jobs SET owner_id = ?2, status = ?3, input_kind = ?4, platform = ?5, \
             duration_seconds = ?6, granularity = ?7, style_notes = ?8, brief_text = ?9, \
             document_json = ?10, video_json = ?11, transcription_json = ?12, \
             content_json = ?13, meta_json = ?14, variations_json = ?15, trends_json = ?16, \
             times_generated = ?17, variations_created = ?18, succeeded = ?19, failed = ?20, \
             deal_json = ?21, deleted = ?22, created_at = ?23, updated_at = ?24 \
             WHERE id = ?1"
                .to_string()
        };

        let changed = conn.execute(
            &sql,
            params![
                job.id,
                job.owner_id,
                job.status.as_str(),
                job.input_kind.as_str(),
                job.platform.as_str(),
                job.duration.seconds(),
                job.granularity.as_str(),
                job.style_notes,
                job.brief_text,
                opt_to_json(&job.document)?,
                opt_to_json(&job.video)?,
                opt_to_json(&job.transcription)?,
                opt_to_json(&job.content)?,
                serde_json::to_string(&job.meta)?,
                serde_json::to_string(&job.variations)?,
                serde_json::to_string(&job.trends)?,
                job.counters.times_generated,
                job.counters.variations_created,
                job.counters.succeeded,
                job.counters.failed,
                opt_to_json(&job.deal)?,
                job.deleted as i64,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(changed)
    }

    /// Fetches a job by id. Soft-deleted rows are treated as absent.
    pub fn find_by_id(&self, id: &str) -> Result<Job, DatabaseError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM jobs WHERE id = ?1 AND deleted = 0", JOB_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => row_to_job(row),
                None => Err(DatabaseError::JobNotFound(id.to_string())),
            }
        })
    }

    /// Updates only the status column. The full-row `update` is preferred
    /// inside the pipeline; this exists for the sweeper and quick flips.
    pub fn update_status(&self, id: &str, status: JobStatus) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = ?2, updated_at = ?3 WHERE id = ?1 AND deleted = 0",
                params![id, status.as_str(), Utc::now().to_rfc3339()],
            )?;
            if changed == 0 {
                return Err(DatabaseError::JobNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Lists an owner's jobs, newest first, optionally filtered by status.
    pub fn list_by_owner(
        &self,
        owner_id: &str,
        status: Option<JobStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Job>, DatabaseError> {
        self.db.with_conn(|conn| {
            let mut jobs = Vec::new();
            match status {
                Some(status) => {
                    let sql = format!(
                        "SELECT {} FROM jobs WHERE owner_id = ?1 AND status = ?2 AND deleted = 0 \
                         ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
                        JOB_COLUMNS
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let mut rows = stmt.query(params![owner_id, status.as_str(), limit, offset])?;
                    while let Some(row) = rows.next()? {
                        jobs.push(row_to_job(row)?);
                    }
                }
                None => {
                    let sql = format!(
                        "SELECT {} FROM jobs WHERE owner_id = ?1 AND deleted = 0 \
                         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
                        JOB_COLUMNS
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let mut rows = stmt.query(params![owner_id, limit, offset])?;
                    while let Some(row) = rows.next()? {
                        jobs.push(row_to_job(row)?);
                    }
                }
            }
            Ok(jobs)
        })
    }

    /// Counts an owner's jobs created at or after the given instant,
    /// including soft-deleted ones. Used for monthly quota accounting.
    pub fn count_created_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        self.db.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE owner_id = ?1 AND created_at >= ?2",
                params![owner_id, since.to_rfc3339()],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    /// Marks a job deleted without removing the row. History counters and
    /// quota accounting keep working.
    pub fn soft_delete(&self, id: &str) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET deleted = 1, updated_at = ?2 WHERE id = ?1 AND deleted = 0",
                params![id, Utc::now().to_rfc3339()],
            )?;
            if changed == 0 {
                return Err(DatabaseError::JobNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    /// Fails every job stuck in `processing` since before the cutoff.
    /// Returns the ids that were swept. A swept job records the timeout in
    /// its metadata and counts as a failure.
    pub fn sweep_stuck(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, DatabaseError> {
        let stuck: Vec<Job> = self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM jobs WHERE status = 'processing' AND deleted = 0 \
                 AND updated_at < ?1",
                JOB_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![cutoff.to_rfc3339()])?;
            let mut jobs = Vec::new();
            while let Some(row) = rows.next()? {
                jobs.push(row_to_job(row)?);
            }
            Ok(jobs)
        })?;

        let mut swept = Vec::with_capacity(stuck.len());
        for mut job in stuck {
            job.status = JobStatus::Failed;
            job.meta.last_error = Some("Processing timed out".to_string());
            job.counters.failed += 1;
            job.touch();
            self.update(&job)?;

            log::warn!("Swept stuck job {} to failed", job.id);
            swept.push(job.id);
        }
        Ok(swept)
    }
}
