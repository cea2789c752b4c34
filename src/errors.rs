// src/errors.rs
use crate::models::{EnhancementState, Phase};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetouchError {
    #[error("Model backend error: {0}")]
    Backend(String),

    #[error("Analysis parse error: {0}")]
    AnalysisParse(#[from] AnalysisParseError),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Why the analyzer's free-form reply could not be turned into an `AnalysisResult`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisParseError {
    #[error("model returned an empty analysis")]
    Empty,

    #[error("no JSON object found in analysis text")]
    NoJsonObject,

    #[error("analysis JSON is invalid: {0}")]
    InvalidJson(String),

    #[error("analysis is missing a usable professional score")]
    MissingScore,
}

/// A run that stopped on an unrecoverable error. The partially filled state is
/// kept so the caller can persist whatever succeeded before the failure.
#[derive(Error, Debug)]
#[error("enhancement failed during {failed_phase}: {source}")]
pub struct EnhancementFailure {
    pub failed_phase: Phase,
    pub state: Box<EnhancementState>,
    #[source]
    pub source: RetouchError,
}

impl EnhancementFailure {
    pub fn new(failed_phase: Phase, state: EnhancementState, source: RetouchError) -> Self {
        Self {
            failed_phase,
            state: Box::new(state),
            source,
        }
    }
}
