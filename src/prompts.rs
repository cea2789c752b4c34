// src/prompts.rs
use crate::models::{ImprovementItem, Media};

pub const GLOBAL_ENHANCEMENT_PROMPT: &str = r#"
You are a professional photo retoucher. Apply a single holistic quality pass to
this image:

- Correct exposure and recover highlight and shadow detail
- Neutralize color casts and set a natural white balance
- Improve local contrast and clarity without halos
- Reduce noise while keeping fine texture
- Straighten horizons only if they are clearly tilted

Keep the scene, the people and the composition exactly as they are. Do not
add or remove objects. Return the edited image and a short plain-text summary
of what you changed.
"#;

pub const GLOBAL_VIDEO_ENHANCEMENT_PROMPT: &str = r#"
You are a professional colorist. Apply a single holistic grade to this video:
balanced exposure, neutral white balance, gentle contrast, stable color across
shots. Do not change timing, framing or content. Return the graded video and a
short plain-text summary of what you changed.
"#;

pub fn analysis_prompt(target_score: f64) -> String {
    format!(
        r#"
Critique this image as a professional photo editor would before publishing it.

Score it from 0 to 10 on this rubric: exposure, color accuracy, sharpness and
noise, composition, distracting elements, skin and subject rendering. A score
of {target:.1} or higher means it is ready to publish.

List every remaining localized improvement. For each one give the region it
affects in plain words (for example "top-left sky" or "subject's face"),
whether a mask-based inpainting model could fix it on its own
(imagen_suitable), and a precise edit instruction.

Return only JSON matching this structure:
{{
    "overall_assessment": "...",
    "professional_score": 0.0,
    "no_further_edits_needed": false,
    "remaining_improvements": [
        {{
            "type": "distraction | exposure | color | sharpness | composition | retouch",
            "description": "...",
            "region": "...",
            "impact": "low | medium | high",
            "imagen_suitable": true,
            "edit_instruction": "..."
        }}
    ]
}}
"#,
        target = target_score
    )
}

pub fn surgical_instruction(item: &ImprovementItem) -> String {
    let mut prompt = format!(
        "Make one targeted edit to this image. Region: {}. Problem: {}. Edit: {}.",
        empty_as(&item.region, "wherever it applies"),
        empty_as(&item.description, "not described"),
        empty_as(&item.edit_instruction, &item.description),
    );
    prompt.push_str(" Leave everything outside that region untouched.");
    prompt
}

pub fn inpainting_instruction(item: &ImprovementItem) -> String {
    if item.edit_instruction.trim().is_empty() {
        item.description.clone()
    } else {
        item.edit_instruction.clone()
    }
}

pub fn feedback_instruction(feedback: &str, media: &Media) -> String {
    let noun = if media.is_video() { "video" } else { "image" };
    format!(
        "The user reviewed the current {noun} and asked for this change: \"{}\". \
         Apply only what they asked for, keep every earlier accepted edit, and \
         reply with a one-sentence description of what you did.",
        feedback.trim()
    )
}

fn empty_as<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
