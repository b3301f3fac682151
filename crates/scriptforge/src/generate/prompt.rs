//! Prompt assembly for the completion service.
//!
//! The prompt carries the brief, platform conventions, scene-count bounds
//! and a strict-JSON instruction. The service is still not trusted to
//! comply; the post-processor repairs whatever comes back.

use crate::model::{Granularity, Platform, TargetDuration};
use crate::validate::scene_count_for;

pub struct PromptBuilder<'a> {
    brief: &'a str,
    platform: Platform,
    duration: TargetDuration,
    granularity: Granularity,
    style_notes: &'a str,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(
        brief: &'a str,
        platform: Platform,
        duration: TargetDuration,
        granularity: Granularity,
        style_notes: &'a str,
    ) -> Self {
        Self {
            brief,
            platform,
            duration,
            granularity,
            style_notes,
        }
    }

    pub fn build(&self) -> String {
        let (min_scenes, max_scenes) = self.granularity.scene_range();
        let target_scenes = scene_count_for(self.duration).clamp(min_scenes, max_scenes);

        let mut prompt = String::with_capacity(2048);

        prompt.push_str("You are a short-form video scriptwriter. Write a complete video script as JSON.\n\n");

        prompt.push_str(&format!(
            "Platform: {} (aspect ratio {}). ",
            self.platform.as_str(),
            self.platform.aspect_ratio()
        ));
        if self.platform.is_short_vertical() {
            prompt.push_str("Open with a hook in the first two seconds and keep cuts fast.\n");
        } else if self.platform.is_long_form() {
            prompt.push_str("Structure with a cold open, chaptered body and end-screen outro.\n");
        } else if self.platform.is_professional() {
            prompt.push_str("Keep the tone credible and insight-led; no clickbait phrasing.\n");
        }

        prompt.push_str(&format!(
            "Target length: {} seconds across about {} scenes ({} to {} allowed).\n",
            self.duration.seconds(),
            target_scenes,
            min_scenes,
            max_scenes
        ));

        if !self.style_notes.trim().is_empty() {
            prompt.push_str(&format!("Style notes from the creator: {}\n", self.style_notes.trim()));
        }

        prompt.push_str("\nBrief:\n");
        prompt.push_str(self.brief);

        prompt.push_str(
            "\n\nRespond with ONLY a JSON object, no prose and no code fences, with this shape:\n\
             {\n\
             \x20 \"hook\": \"opening line\",\n\
             \x20 \"scenes\": [{\"number\": 1, \"visual\": \"...\", \"narration\": \"...\", \
             \"duration_seconds\": 10, \"camera\": null, \"text_overlay\": null}],\n\
             \x20 \"brand_mentions\": [],\n\
             \x20 \"call_to_action\": \"...\",\n\
             \x20 \"hashtags\": {\"primary\": [], \"trending\": []},\n\
             \x20 \"mentions\": [],\n\
             \x20 \"audio_suggestions\": [],\n\
             \x20 \"text_overlays\": [],\n\
             \x20 \"alternative_endings\": []\n\
             }\n",
        );

        prompt
    }
}
