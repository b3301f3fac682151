//! Post-processor for model output.
//!
//! The completion service is asked for strict JSON but is not trusted to
//! return it. Whatever shape comes back, `normalize` guarantees the full
//! structural schema the job record promises: scenes are synthesized when
//! missing, hook/CTA/hashtags get clearly-marked placeholders, and light
//! platform adjustments are applied. A job that got any response at all
//! should end `completed` with a well-formed structure.

use crate::model::{GeneratedContent, Platform, Scene, TargetDuration};

/// Seconds of footage one synthesized scene covers.
const SECONDS_PER_SCENE: u32 = 15;
const MIN_SCENES: usize = 3;
const MAX_SCENES: usize = 8;

const PLACEHOLDER_HOOK: &str = "[placeholder] Open on the single most surprising claim in the brief";
const PLACEHOLDER_CTA: &str = "[placeholder] Ask viewers to follow for part two";

/// Number of scenes a target duration calls for, one per ~15s, clamped.
pub fn scene_count_for(duration: TargetDuration) -> usize {
    let raw = (duration.seconds() / SECONDS_PER_SCENE).max(1) as usize;
    raw.clamp(MIN_SCENES, MAX_SCENES)
}

/// Fills every structural field the schema requires, then applies
/// platform-specific touches. Never fails.
pub fn normalize(
    mut content: GeneratedContent,
    platform: Platform,
    duration: TargetDuration,
) -> GeneratedContent {
    if content.hook.trim().is_empty() {
        content.hook = PLACEHOLDER_HOOK.to_string();
    }

    if content.scenes.is_empty() {
        content.scenes = default_scene_ladder(duration);
    }
    renumber_scenes(&mut content.scenes);

    if content.call_to_action.trim().is_empty() {
        content.call_to_action = PLACEHOLDER_CTA.to_string();
    }

    if content.hashtags.primary.is_empty() {
        content.hashtags.primary = vec!["#content".to_string(), "#creator".to_string()];
    }

    apply_platform_adjustments(&mut content, platform);
    content
}

/// Default scene ladder sized to the target duration.
fn default_scene_ladder(duration: TargetDuration) -> Vec<Scene> {
    let count = scene_count_for(duration);
    let per_scene = (duration.seconds() / count as u32).max(1);

    (1..=count as u32)
        .map(|number| Scene {
            number,
            visual: format!("[placeholder] Visual beat {} of {}", number, count),
            narration: format!("[placeholder] Narration for beat {}", number),
            duration_seconds: per_scene,
            camera: None,
            text_overlay: None,
        })
        .collect()
}

/// Scene numbers from the model are frequently absent or duplicated;
/// ordering in the list is authoritative.
fn renumber_scenes(scenes: &mut [Scene]) {
    for (idx, scene) in scenes.iter_mut().enumerate() {
        scene.number = idx as u32 + 1;
        if scene.duration_seconds == 0 {
            scene.duration_seconds = SECONDS_PER_SCENE;
        }
    }
}

fn apply_platform_adjustments(content: &mut GeneratedContent, platform: Platform) {
    if platform.is_short_vertical() {
        if let Some(first) = content.scenes.first_mut() {
            if first.camera.is_none() {
                first.camera = Some("Tight punch-in, handheld".to_string());
            }
        }
    }

    if platform.is_long_form() {
        if let Some(first) = content.scenes.first_mut() {
            if first.text_overlay.is_none() {
                first.text_overlay = Some("Channel intro card".to_string());
            }
        }
        if let Some(last) = content.scenes.last_mut() {
            if last.text_overlay.is_none() {
                last.text_overlay = Some("End screen with subscribe prompt".to_string());
            }
        }
    }

    if platform.is_professional() && content.audio_suggestions.is_empty() {
        content
            .audio_suggestions
            .push("Understated instrumental bed, no trending audio".to_string());
    }
}

/// 0-100 structural quality score: presence and depth of hook, scenes,
/// brand mentions, CTA and hashtags. Placeholder content scores low on
/// purpose.
pub fn quality_score(content: &GeneratedContent) -> f32 {
    let mut score = 0.0f32;

    // Hook: up to 25.
    let hook = content.hook.trim();
    if !hook.is_empty() && !hook.starts_with("[placeholder]") {
        score += 15.0;
        if (20..=200).contains(&hook.chars().count()) {
            score += 10.0;
        }
    }

    // Scenes: up to 40.
    let scenes = &content.scenes;
    let real_scenes = scenes
        .iter()
        .filter(|s| !s.narration.starts_with("[placeholder]"))
        .count();
    if real_scenes >= MIN_SCENES {
        score += 20.0;
        let complete = scenes
            .iter()
            .filter(|s| !s.visual.trim().is_empty() && !s.narration.trim().is_empty())
            .count();
        score += 20.0 * complete as f32 / scenes.len().max(1) as f32;
    }

    // Brand mentions: 10.
    if !content.brand_mentions.is_empty() {
        score += 10.0;
    }

    // CTA: 15.
    let cta = content.call_to_action.trim();
    if !cta.is_empty() && !cta.starts_with("[placeholder]") {
        score += 15.0;
    }

    // Hashtags: 10.
    if content.hashtags.primary.len() >= 3 {
        score += 10.0;
    } else if !content.hashtags.primary.is_empty() {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}
