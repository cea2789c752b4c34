// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bytes plus their content type. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Media {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Media {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    Phase1,
    Phase2,
    Phase3,
    Complete,
    Feedback,
    Error,
}

impl Phase {
    /// Position along initial -> phase1 -> phase2/phase3 -> complete -> feedback.
    /// Phase2 and Phase3 share a rank because the loop alternates between them.
    pub fn rank(self) -> u8 {
        match self {
            Phase::Initial => 0,
            Phase::Phase1 => 1,
            Phase::Phase2 | Phase::Phase3 => 2,
            Phase::Complete => 3,
            Phase::Feedback => 4,
            Phase::Error => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Feedback | Phase::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initial => "initial",
            Phase::Phase1 => "phase1",
            Phase::Phase2 => "phase2",
            Phase::Phase3 => "phase3",
            Phase::Complete => "complete",
            Phase::Feedback => "feedback",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoFurtherEditsNeeded,
    TargetScoreReached,
    NoImprovementsRemaining,
    IterationLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Impact::Low,
            "high" | "major" | "critical" => Impact::High,
            _ => Impact::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub region: String,
    pub impact: Impact,
    pub imagen_suitable: bool,
    pub edit_instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub overall_assessment: String,
    pub professional_score: f64,
    pub target_score: f64,
    pub no_further_edits_needed: bool,
    pub remaining_improvements: Vec<ImprovementItem>,
}

impl AnalysisResult {
    pub fn meets_target(&self) -> bool {
        self.professional_score >= self.target_score
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMethod {
    #[serde(rename = "multimodal_edit")]
    Instruction,
    Inpainting,
}

impl fmt::Display for EditMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditMethod::Instruction => f.write_str("multimodal_edit"),
            EditMethod::Inpainting => f.write_str("inpainting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub user_feedback: String,
    pub model_response: String,
    pub method: EditMethod,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl FeedbackEntry {
    pub fn new(
        user_feedback: impl Into<String>,
        model_response: impl Into<String>,
        method: EditMethod,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_feedback: user_feedback.into(),
            model_response: model_response.into(),
            method,
            success,
            created_at: Utc::now(),
        }
    }
}

/// Working record for one media item. `current` is not serialized: callers
/// upload the bytes to their blob store and persist the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementState {
    pub phase: Phase,
    #[serde(skip)]
    pub current: Media,
    pub phase1_text: Option<String>,
    pub imagen_edits: u32,
    pub instruction_edits: u32,
    pub analysis: Option<AnalysisResult>,
    pub analysis_passes: u32,
    pub surgical_passes: u32,
    pub stop_reason: Option<StopReason>,
    pub phase_log: Vec<Phase>,
    pub feedback: Vec<FeedbackEntry>,
    pub width: u32,
    pub height: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl EnhancementState {
    pub fn new(original: Media, width: u32, height: u32) -> Self {
        Self {
            phase: Phase::Initial,
            current: original,
            phase1_text: None,
            imagen_edits: 0,
            instruction_edits: 0,
            analysis: None,
            analysis_passes: 0,
            surgical_passes: 0,
            stop_reason: None,
            phase_log: vec![Phase::Initial],
            feedback: Vec::new(),
            width,
            height,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.phase_log.push(phase);
        if phase.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn replace_current(&mut self, media: Media) {
        self.current = media;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub frame_rate: f64,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// One extracted frame with its position in the clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub index: usize,
    pub timestamp_secs: f64,
    pub media: Media,
}
