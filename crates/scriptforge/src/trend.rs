//! Trend augmenter.
//!
//! Attaches platform-specific trending hashtags, audio and viral-element
//! suggestions to a completed generation. The three fetches run
//! concurrently; any individual failure degrades that field to empty
//! rather than failing the call. The snapshot always carries a
//! `last_updated` stamp.

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::model::{Platform, TrendSnapshot};

/// A source of trend data. Production deployments back this with the
/// platform APIs; the crate ships a curated offline source.
#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn trending_hashtags(&self, platform: Platform) -> Result<Vec<String>, String>;
    async fn trending_audio(&self, platform: Platform) -> Result<Vec<String>, String>;
    async fn viral_elements(&self, platform: Platform) -> Result<Vec<String>, String>;
}

/// Fetches all three trend fields concurrently and assembles a snapshot.
pub async fn augment(source: &dyn TrendSource, platform: Platform) -> TrendSnapshot {
    let (hashtags, audio, viral) = tokio::join!(
        source.trending_hashtags(platform),
        source.trending_audio(platform),
        source.viral_elements(platform),
    );

    TrendSnapshot {
        hashtags: hashtags.unwrap_or_else(|e| {
            warn!(platform = platform.as_str(), error = %e, "Trending hashtags unavailable");
            Vec::new()
        }),
        audio: audio.unwrap_or_else(|e| {
            warn!(platform = platform.as_str(), error = %e, "Trending audio unavailable");
            Vec::new()
        }),
        viral_elements: viral.unwrap_or_else(|e| {
            warn!(platform = platform.as_str(), error = %e, "Viral elements unavailable");
            Vec::new()
        }),
        last_updated: Utc::now(),
    }
}

/// Built-in per-platform trend lists, refreshed with releases rather than
/// live. Keeps the augmenter functional without external credentials.
pub struct CuratedTrendSource;

#[async_trait]
impl TrendSource for CuratedTrendSource {
    async fn trending_hashtags(&self, platform: Platform) -> Result<Vec<String>, String> {
        let tags: &[&str] = match platform {
            Platform::Tiktok => &["#fyp", "#foryou", "#viral", "#learnontiktok"],
            Platform::InstagramReels => &["#reels", "#explore", "#instadaily"],
            Platform::YoutubeShorts => &["#shorts", "#shortsfeed", "#youtubeshorts"],
            Platform::Youtube => &["#youtube", "#tutorial", "#howto"],
            Platform::Linkedin => &["#career", "#leadership", "#professionaldevelopment"],
        };
        Ok(tags.iter().map(|t| t.to_string()).collect())
    }

    async fn trending_audio(&self, platform: Platform) -> Result<Vec<String>, String> {
        let audio: &[&str] = match platform {
            Platform::Tiktok | Platform::InstagramReels | Platform::YoutubeShorts => &[
                "Upbeat lo-fi loop, 120bpm",
                "Sped-up acoustic cover, trending this week",
            ],
            Platform::Youtube => &["Cinematic ambient bed", "Light percussion groove"],
            Platform::Linkedin => &["Minimal corporate piano"],
        };
        Ok(audio.iter().map(|a| a.to_string()).collect())
    }

    async fn viral_elements(&self, platform: Platform) -> Result<Vec<String>, String> {
        let elements: &[&str] = match platform {
            Platform::Tiktok => &[
                "Green-screen reaction over source footage",
                "On-screen countdown to the reveal",
            ],
            Platform::InstagramReels => &["Before/after transition on beat drop"],
            Platform::YoutubeShorts => &["Loop the last frame into the first"],
            Platform::Youtube => &["Cold open with the end result"],
            Platform::Linkedin => &["Document-style carousel summary in comments"],
        };
        Ok(elements.iter().map(|e| e.to_string()).collect())
    }
}
