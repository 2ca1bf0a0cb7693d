//! Template-based scene summaries
//!
//! Produces the natural-language `summary` of a SceneSummary from the fused
//! fields. The model's own description, when present, is appended verbatim.

use crate::types::BabyState;

/// Fused fields a summary is rendered from
pub struct SummaryInput<'a> {
    pub state: BabyState,
    pub face_down: bool,
    pub hazards: &'a [String],
    /// Crying was established from audio, not from the frame
    pub heard_crying: bool,
    pub visual_failed: bool,
    pub description: Option<&'a str>,
}

fn state_sentence(state: BabyState) -> &'static str {
    match state {
        BabyState::Asleep => "Baby is asleep.",
        BabyState::AwakePeaceful => "Baby is awake and calm.",
        BabyState::AwakeCrying => "Baby is awake and crying.",
        BabyState::NotPresent => "No baby is visible in the crib.",
        BabyState::Unknown => "Baby state could not be determined.",
    }
}

pub fn template_summary(input: &SummaryInput<'_>) -> String {
    let mut parts: Vec<String> = vec![state_sentence(input.state).to_string()];

    if input.face_down {
        parts.push("Baby appears to be lying face down.".to_string());
    }

    if input.hazards.is_empty() {
        if !input.visual_failed {
            parts.push("No hazards detected.".to_string());
        }
    } else {
        parts.push(format!("Hazards detected: {}.", input.hazards.join(", ")));
    }

    if input.heard_crying {
        parts.push("Crying was detected on audio.".to_string());
    }
    if input.visual_failed {
        parts.push("Visual analysis unavailable for this window.".to_string());
    }

    if let Some(desc) = input.description.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(desc.to_string());
    }

    parts.join(" ")
}
