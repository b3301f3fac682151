//! Transcription stage: streaming speech-to-text with bounded retries.
//!
//! The external service is reached through the `SpeechToText` trait so the
//! worker can be exercised against scripted fixtures. Responses carry
//! segment-level timing (word-level is never requested, to bound response
//! size); the raw text is cleaned, speaker count and confidence are
//! estimated heuristically, and the source media is deleted as soon as the
//! pipeline is done with it.

pub mod client;
pub mod worker;

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;

pub use client::HttpSpeechClient;
pub use worker::{TranscribeRetry, TranscriptionWorker};

/// Confidence floor and ceiling for the heuristic estimate.
const CONFIDENCE_MIN: f32 = 0.60;
const CONFIDENCE_MAX: f32 = 0.95;
/// A silent gap this long between segments suggests recording problems.
const SILENT_GAP_MS: u64 = 2_000;

#[derive(Debug, Clone, Default)]
pub struct TranscriptHints {
    /// BCP-47 language tag when the caller knows it, e.g. "en".
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
}

impl TranscriptResponse {
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// External speech-to-text service seam. Implementations stream the media
/// rather than buffering it, and decide the typed error category at the
/// call site.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        media_path: &Path,
        hints: &TranscriptHints,
    ) -> Result<TranscriptResponse, SpeechError>;
}

fn control_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x08\x0B-\x1F\x7F]").expect("static pattern"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

/// Collapses whitespace runs and strips ornamental control characters.
pub fn clean_transcript(raw: &str) -> String {
    let stripped = control_chars().replace_all(raw, "");
    whitespace_runs().replace_all(&stripped, " ").trim().to_string()
}

/// Estimates how many distinct speakers the transcript suggests, from
/// pronoun density and question-mark frequency. Monologues sit at 1; heavy
/// second-person address and frequent questions push the estimate up.
pub fn estimate_speaker_count(text: &str) -> u32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 1;
    }
    let word_count = words.len() as f64;

    let second_person = words
        .iter()
        .filter(|w| {
            let lower = w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            matches!(lower.as_str(), "you" | "your" | "yours" | "yourself")
        })
        .count() as f64;

    let questions = text.matches('?').count() as f64;

    let mut speakers = 1u32;
    if second_person / word_count > 0.03 {
        speakers += 1;
    }
    if questions / word_count > 0.02 {
        speakers += 1;
    }
    speakers.min(4)
}

/// Heuristic confidence from segment statistics: fewer/shorter segments and
/// long silent gaps lower the score. Clamped to [0.60, 0.95].
pub fn estimate_confidence(segments: &[TranscriptSegment]) -> f32 {
    if segments.is_empty() {
        return CONFIDENCE_MIN;
    }

    let mut score = 0.95f32;

    if segments.len() < 3 {
        score -= 0.10;
    }

    let avg_len = segments
        .iter()
        .map(|s| s.text.chars().count())
        .sum::<usize>() as f32
        / segments.len() as f32;
    if avg_len < 20.0 {
        score -= 0.10;
    }

    let gaps = segments
        .windows(2)
        .filter(|pair| pair[1].start_ms.saturating_sub(pair[0].end_ms) > SILENT_GAP_MS)
        .count();
    score -= 0.05 * gaps.min(3) as f32;

    score.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str, start_ms: u64, end_ms: u64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn test_clean_collapses_whitespace() {
        let cleaned = clean_transcript("  hello \t world \n\n again  ");
        assert_eq!(cleaned, "hello world again");
    }

    #[test]
    fn test_clean_strips_control_characters() {
        let cleaned = clean_transcript("hel\x07lo\x00 world\x1b");
        assert_eq!(cleaned, "hello world");
    }

    #[test]
    fn test_speaker_estimate_monologue() {
        let text = "Today I want to walk through my entire morning routine step by step \
                    because so many people asked about the details last week.";
        assert_eq!(estimate_speaker_count(text), 1);
    }

    #[test]
    fn test_speaker_estimate_interview() {
        let text = "So tell me, what do you think about this? And how did you get started? \
                    Well, you know, your audience probably wonders about you too. \
                    What would you tell them? Did you always know? Why did you wait?";
        assert!(estimate_speaker_count(text) >= 2);
    }

    #[test]
    fn test_speaker_estimate_empty() {
        assert_eq!(estimate_speaker_count(""), 1);
    }

    #[test]
    fn test_confidence_normal_segments() {
        let segments = vec![
            segment("This is a reasonably long opening segment", 0, 4000),
            segment("followed by another one with real content", 4100, 8000),
            segment("and a closing thought to wrap things up", 8100, 12000),
        ];
        let confidence = estimate_confidence(&segments);
        assert!((0.94..=0.95).contains(&confidence));
    }

    #[test]
    fn test_confidence_penalizes_short_and_sparse() {
        let segments = vec![segment("hm", 0, 500), segment("ok", 10_000, 10_400)];
        let confidence = estimate_confidence(&segments);
        // Two segments, tiny text, one long gap: 0.95 - 0.10 - 0.10 - 0.05
        assert!((confidence - 0.70).abs() < 0.001);
    }

    #[test]
    fn test_confidence_clamped_to_floor() {
        let segments: Vec<TranscriptSegment> = (0..2)
            .map(|i| segment("a", i * 50_000, i * 50_000 + 100))
            .collect();
        assert!(estimate_confidence(&segments) >= CONFIDENCE_MIN);
        assert_eq!(estimate_confidence(&[]), CONFIDENCE_MIN);
    }

    #[test]
    fn test_full_text_joins_segments() {
        let response = TranscriptResponse {
            segments: vec![segment("part one", 0, 1000), segment("part two", 1000, 2000)],
            language: "en".to_string(),
        };
        assert_eq!(response.full_text(), "part one part two");
    }
}
