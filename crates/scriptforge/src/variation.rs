//! Deterministic A/B variation generator.
//!
//! Derives up to six alternatives from a completed generation: hook
//! rephrasings (question / statistic / anecdote framing), call-to-action
//! rephrasings (urgency / social-proof framing) and brand-mention
//! softening. Categories whose source field is empty are skipped entirely.
//! This stage never fails the job; the worst outcome is an empty list.

use crate::model::{GeneratedContent, Platform, Variation, VariationKind, MAX_VARIATIONS};

/// Produces variations for the given generation. Placeholder content is
/// treated as absent so A/B tests never run against filler.
pub fn generate_variations(content: &GeneratedContent, platform: Platform) -> Vec<Variation> {
    let mut variations = Vec::new();

    let hook = usable(&content.hook);
    if let Some(hook) = hook {
        variations.push(Variation {
            kind: VariationKind::Hook,
            label: "question".to_string(),
            content: question_hook(hook),
        });
        variations.push(Variation {
            kind: VariationKind::Hook,
            label: "statistic".to_string(),
            content: statistic_hook(hook, platform),
        });
        variations.push(Variation {
            kind: VariationKind::Hook,
            label: "anecdote".to_string(),
            content: anecdote_hook(hook),
        });
    }

    if let Some(cta) = usable(&content.call_to_action) {
        variations.push(Variation {
            kind: VariationKind::CallToAction,
            label: "urgency".to_string(),
            content: format!("Only for the next few days: {}", lowercase_first(cta)),
        });
        variations.push(Variation {
            kind: VariationKind::CallToAction,
            label: "social_proof".to_string(),
            content: format!("Thousands of viewers already did this. {}", cta),
        });
    }

    if let Some(first_brand) = content.brand_mentions.first() {
        if !first_brand.trim().is_empty() {
            variations.push(Variation {
                kind: VariationKind::BrandMention,
                label: "softened".to_string(),
                content: format!(
                    "A tool I keep coming back to is {} (they sponsor this video)",
                    first_brand.trim()
                ),
            });
        }
    }

    variations.truncate(MAX_VARIATIONS);
    variations
}

/// A field counts as present only when non-empty and not placeholder filler.
fn usable(field: &str) -> Option<&str> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed.starts_with("[placeholder]") {
        None
    } else {
        Some(trimmed)
    }
}

fn question_hook(hook: &str) -> String {
    let stripped = hook.trim_end_matches(['.', '!']);
    format!("What if {}?", lowercase_first(stripped))
}

fn statistic_hook(hook: &str, platform: Platform) -> String {
    let scope = if platform.is_short_vertical() {
        "9 out of 10 viewers scroll past this"
    } else {
        "Most creators get this wrong"
    };
    format!("{}: {}", scope, lowercase_first(hook))
}

fn anecdote_hook(hook: &str) -> String {
    format!("Last month I learned this the hard way: {}", lowercase_first(hook))
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
