//! Prompt Selector — maps a drift score to a qualitative tier and assembles
//! the instruction handed to the text model.
//!
//! Tier mapping and template assembly are deterministic; the text the model
//! returns is not, and is not this module's contract.

use serde::Serialize;

/// Qualitative consistency tier derived from the drift score.
/// Higher scores favor consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTier {
    Thriving,
    Consistent,
    Steady,
    Slipping,
    Drifting,
}

/// Maps a clamped [0, 100] score to its tier.
pub fn tier_for_score(score: i32) -> DriftTier {
    if score >= 80 {
        DriftTier::Thriving
    } else if score >= 60 {
        DriftTier::Consistent
    } else if score >= 40 {
        DriftTier::Steady
    } else if score >= 20 {
        DriftTier::Slipping
    } else {
        DriftTier::Drifting
    }
}

/// Fixed descriptive context for each tier, fed into the prompt template.
pub fn tier_context(tier: DriftTier) -> &'static str {
    match tier {
        DriftTier::Thriving => {
            "The user is highly consistent. Describe them looking extremely healthy, vibrant, \
             sharp, exuding confidence, in a professional and active setting. Focus on glowing \
             skin, perfect posture, and modern clothing."
        }
        DriftTier::Consistent => {
            "The user is consistent. Describe them looking healthy, energetic, focused, and \
             well-groomed, in a pleasant work or active setting. Focus on clear skin, good \
             posture, and smart casual attire."
        }
        DriftTier::Steady => {
            "The user is holding steady. Describe them looking rested but unremarkable, with a \
             calm neutral expression, everyday clothing, and an ordinary tidy environment."
        }
        DriftTier::Slipping => {
            "The user is slipping. Describe them looking slightly fatigued, perhaps with a \
             neutral expression, some minor dishevelment, or a slightly less vibrant look. The \
             environment is neutral."
        }
        DriftTier::Drifting => {
            "The user is significantly failing their habits. Describe them looking tired, with a \
             slightly rounded face, messy hair, slumped posture, in a cluttered, less inviting \
             environment. Focus on dull skin, dark circles under the eyes, and loose, unkempt \
             clothing."
        }
    }
}

/// System instruction for the image-prompt generation call.
pub const AVATAR_PROMPT_SYSTEM: &str = "\
You are an image generation prompt engineer. You craft highly detailed, \
photorealistic prompts for a text-to-image model. \
Output ONLY the prompt string — no preamble, no markdown, no explanations.";

const AVATAR_PROMPT_TEMPLATE: &str = r#"Based on this base user description: '{base_description}'
Their stated goal: '{goal}'
And this context about their progress: {context}

Generate a single, coherent, highly descriptive image generation prompt (max 100 words).
Focus on facial expression, skin quality, hair, body posture, clothing style, and background environment.
Maintain facial consistency with the original description as much as possible, while varying the described attributes.
Output ONLY the prompt string."#;

/// Assembles the full instruction for the text model.
pub fn build_avatar_prompt(base_description: &str, goal: &str, score: i32) -> String {
    let context = tier_context(tier_for_score(score));
    AVATAR_PROMPT_TEMPLATE
        .replace("{base_description}", base_description)
        .replace("{goal}", goal)
        .replace("{context}", context)
}
