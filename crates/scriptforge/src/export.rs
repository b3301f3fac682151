//! Export of completed jobs.
//!
//! Two renderings: the structured JSON document (content, variations and
//! trend snapshot together) and a flat plain-text script for pasting into
//! a teleprompter or notes app.

use serde::Serialize;

use crate::error::{Result, ValidationError};
use crate::model::{GeneratedContent, Job, JobStatus, TrendSnapshot, Variation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    PlainText,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    job_id: &'a str,
    platform: &'a str,
    duration_seconds: u32,
    content: &'a GeneratedContent,
    variations: &'a [Variation],
    trends: &'a TrendSnapshot,
}

/// Renders a completed job in the requested format. Jobs in any other
/// state have nothing stable to export.
pub fn export(job: &Job, format: ExportFormat) -> Result<String> {
    if job.status != JobStatus::Completed {
        return Err(ValidationError::NotRegenerable(format!(
            "job {} is {}, only completed jobs export",
            job.id,
            job.status.as_str()
        ))
        .into());
    }
    let content = match job.content {
        Some(ref content) => content,
        // Completed implies content; guard anyway for hand-edited rows.
        None => {
            return Err(ValidationError::NotRegenerable(format!(
                "job {} is completed but has no content",
                job.id
            ))
            .into())
        }
    };

    match format {
        ExportFormat::Json => {
            let doc = ExportDocument {
                job_id: &job.id,
                platform: job.platform.as_str(),
                duration_seconds: job.duration.seconds(),
                content,
                variations: &job.variations,
                trends: &job.trends,
            };
            Ok(serde_json::to_string_pretty(&doc)?)
        }
        ExportFormat::PlainText => Ok(render_plain_text(content)),
    }
}

fn render_plain_text(content: &GeneratedContent) -> String {
    let mut out = String::new();

    out.push_str("HOOK\n");
    out.push_str(&content.hook);
    out.push_str("\n\n");

    for scene in &content.scenes {
        out.push_str(&format!(
            "SCENE {} ({}s)\n{}\nVisual: {}\n",
            scene.number, scene.duration_seconds, scene.narration, scene.visual
        ));
        if let Some(ref overlay) = scene.text_overlay {
            out.push_str(&format!("Overlay: {}\n", overlay));
        }
        out.push('\n');
    }

    out.push_str("CALL TO ACTION\n");
    out.push_str(&content.call_to_action);
    out.push('\n');

    let hashtags: Vec<&str> = content
        .hashtags
        .primary
        .iter()
        .chain(content.hashtags.trending.iter())
        .map(|s| s.as_str())
        .collect();
    if !hashtags.is_empty() {
        out.push_str(&format!("\nHASHTAGS\n{}\n", hashtags.join(" ")));
    }

    out
}
