//! Prompt templates for the vision model

use crate::types::BabyState;

/// Four-class prompt used by the classification-only fine-tune.
pub const CLASSIFICATION_PROMPT: &str =
    "Classify the baby's state in the crib: asleep, awake/peaceful, awake/crying, or not-present.";

/// Structured-output prompt. The model answers with one JSON object.
pub const STRUCTURED_PROMPT: &str = r#"You are a baby monitor safety assistant looking at a single camera frame of a crib.
Answer with ONE JSON object and nothing else, using exactly these keys:
{
  "baby_present": true or false,
  "face_down": true if the baby is lying face-down (prone), else false,
  "crying": true if the baby appears to be crying or distressed,
  "sleeping": true if the baby appears to be asleep,
  "severity": integer 0-10 (0 = nothing of concern, 10 = immediate danger),
  "hazards": list of short hazard names visible in or near the crib (e.g. "loose blanket", "cord", "pillow"), [] if none,
  "notify": true if a caregiver should be notified now,
  "description": one short sentence describing the scene
}"#;

/// Prompt for a window, optionally prefixed with the state observed last window.
pub fn build_visual_prompt(previous: Option<BabyState>) -> String {
    match previous {
        Some(state) if state != BabyState::Unknown => format!(
            "{STRUCTURED_PROMPT}\nFor context, the previous frame was classified as \"{state}\"."
        ),
        _ => STRUCTURED_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_class() {
        for state in BabyState::CLASSES {
            assert!(CLASSIFICATION_PROMPT.contains(state.label()));
        }
    }

    #[test]
    fn test_previous_state_context() {
        assert!(build_visual_prompt(Some(BabyState::Asleep)).contains("\"asleep\""));
        assert_eq!(build_visual_prompt(Some(BabyState::Unknown)), STRUCTURED_PROMPT);
        assert_eq!(build_visual_prompt(None), STRUCTURED_PROMPT);
    }
}
