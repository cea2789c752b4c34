// src/config.rs
use crate::errors::RetouchError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Credentials and endpoints for the caller-constructed backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    pub multimodal_model: String,
    #[serde(skip_serializing)]
    pub multimodal_api_key: Option<String>,
    pub inpainting_model: Option<String>,
    pub inpainting_endpoint: Option<String>,
}

impl BackendSettings {
    pub fn inpainting_configured(&self) -> bool {
        self.inpainting_model.is_some() && self.inpainting_endpoint.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementConfig {
    /// Cosine similarity at or above which consecutive video frames share a scene.
    pub similarity_threshold: f64,
    /// Upper bound on Phase 3 passes.
    pub max_analysis_iterations: u32,
    pub target_professional_score: f64,
    pub max_video_frames: usize,
    /// Long-edge cap for the bytes sent with analysis requests. Edits and
    /// inpainting always receive the full-resolution artifact.
    pub max_model_edge: u32,
    pub backend: BackendSettings,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.92,
            max_analysis_iterations: 3,
            target_professional_score: 8.5,
            max_video_frames: 24,
            max_model_edge: 2048,
            backend: BackendSettings {
                multimodal_model: "dryrun-multimodal".to_string(),
                multimodal_api_key: None,
                inpainting_model: None,
                inpainting_endpoint: None,
            },
        }
    }
}

impl EnhancementConfig {
    pub fn from_env() -> Result<Self, RetouchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RetouchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "RETOUCH_SIMILARITY_THRESHOLD")? {
            config.similarity_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "RETOUCH_MAX_ANALYSIS_ITERATIONS")? {
            config.max_analysis_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, "RETOUCH_TARGET_SCORE")? {
            config.target_professional_score = v;
        }
        if let Some(v) = parse_var(&lookup, "RETOUCH_MAX_VIDEO_FRAMES")? {
            config.max_video_frames = v;
        }
        if let Some(v) = parse_var(&lookup, "RETOUCH_MAX_MODEL_EDGE")? {
            config.max_model_edge = v;
        }
        if let Some(model) = non_empty(&lookup, "RETOUCH_MULTIMODAL_MODEL") {
            config.backend.multimodal_model = model;
        }
        config.backend.multimodal_api_key = non_empty(&lookup, "RETOUCH_MULTIMODAL_API_KEY");
        config.backend.inpainting_model = non_empty(&lookup, "RETOUCH_INPAINTING_MODEL");
        config.backend.inpainting_endpoint = non_empty(&lookup, "RETOUCH_INPAINTING_ENDPOINT");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RetouchError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RetouchError::Config(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }
        if !self.target_professional_score.is_finite() {
            return Err(RetouchError::Config(
                "target_professional_score must be a finite number".to_string(),
            ));
        }
        if self.max_video_frames == 0 {
            return Err(RetouchError::Config(
                "max_video_frames must be at least 1".to_string(),
            ));
        }
        if self.max_model_edge < 64 {
            return Err(RetouchError::Config(format!(
                "max_model_edge must be at least 64, got {}",
                self.max_model_edge
            )));
        }
        Ok(())
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, RetouchError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| RetouchError::Config(format!("{} = {:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}
