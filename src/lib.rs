// src/lib.rs
pub mod config;
pub mod errors;
pub mod models;
pub mod prompts;
pub mod services;

#[cfg(test)]
mod testing;

pub use config::EnhancementConfig;
pub use errors::{AnalysisParseError, EnhancementFailure, RetouchError};
pub use models::{
    AnalysisResult, EditMethod, EnhancementState, FeedbackEntry, ImprovementItem, Media, Phase,
    StopReason,
};
pub use services::{ModelClient, Orchestrator};
