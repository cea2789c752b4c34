// src/services/video.rs
use crate::config::EnhancementConfig;
use crate::errors::{EnhancementFailure, RetouchError};
use crate::models::{EnhancementState, VideoFrame, VideoMetadata};
use crate::services::orchestrator::Orchestrator;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Consecutive sampled frames similar enough to be enhanced as one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneGroup {
    /// Indices into the caller's frame list.
    pub frame_indices: Vec<usize>,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl SceneGroup {
    pub fn anchor(&self) -> usize {
        self.frame_indices[0]
    }
}

#[derive(Debug)]
pub struct SceneResult {
    pub group: SceneGroup,
    pub outcome: Result<EnhancementState, EnhancementFailure>,
}

#[derive(Debug)]
pub struct VideoEnhancement {
    pub metadata: VideoMetadata,
    pub sampled_frames: usize,
    pub scenes: Vec<SceneResult>,
}

impl VideoEnhancement {
    pub fn completed(&self) -> usize {
        self.scenes.iter().filter(|s| s.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.scenes.len() - self.completed()
    }
}

pub struct VideoEnhancer {
    orchestrator: Arc<Orchestrator>,
}

impl VideoEnhancer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Samples representative frames, groups them into scenes and runs each
    /// scene's anchor frame through the full pipeline. One failing scene does
    /// not stop the others; reassembly is left to the compositor.
    pub async fn run_video_enhancement(
        &self,
        frames: &[VideoFrame],
        metadata: &VideoMetadata,
        config: &EnhancementConfig,
    ) -> Result<VideoEnhancement, RetouchError> {
        config.validate()?;
        if frames.is_empty() {
            return Err(RetouchError::Validation(
                "Video enhancement needs at least one frame".to_string(),
            ));
        }

        let sampled = sample_frames(frames, config.max_video_frames);
        let media = self.orchestrator.client().media();
        let features = sampled
            .iter()
            .map(|frame| media.frame_features(&frame.media.data))
            .collect::<Result<Vec<_>, _>>()?;

        let scenes = group_scenes(&sampled, &features, config.similarity_threshold);
        info!(
            "Video {:.1}s @ {:.2} fps: {} frames sampled into {} scenes",
            metadata.duration_secs,
            metadata.frame_rate,
            sampled.len(),
            scenes.len()
        );

        let mut results = Vec::with_capacity(scenes.len());
        for group in scenes {
            let anchor = sampled
                .iter()
                .find(|frame| frame.index == group.anchor())
                .map(|frame| frame.media.clone())
                .ok_or_else(|| {
                    RetouchError::Validation(format!("Scene anchor {} missing", group.anchor()))
                })?;

            let outcome = self
                .orchestrator
                .run_full_enhancement(anchor, metadata.width, metadata.height, config)
                .await;
            if let Err(failure) = &outcome {
                warn!(
                    "Scene starting at {:.2}s failed: {}",
                    group.start_secs, failure
                );
            }
            results.push(SceneResult { group, outcome });
        }

        Ok(VideoEnhancement {
            metadata: metadata.clone(),
            sampled_frames: sampled.len(),
            scenes: results,
        })
    }
}

/// Up to `max` frames spread evenly over the clip, always including the first.
pub fn sample_frames(frames: &[VideoFrame], max: usize) -> Vec<&VideoFrame> {
    if frames.len() <= max {
        return frames.iter().collect();
    }
    (0..max).map(|i| &frames[i * frames.len() / max]).collect()
}

/// Groups consecutive frames whose similarity to the group's first frame is at
/// least `threshold`.
pub fn group_scenes(frames: &[&VideoFrame], features: &[Vec<f32>], threshold: f64) -> Vec<SceneGroup> {
    let mut groups: Vec<SceneGroup> = Vec::new();
    let mut anchor_features: Option<&Vec<f32>> = None;

    for (frame, feature) in frames.iter().zip(features) {
        let joins = anchor_features
            .map(|anchor| cosine_similarity(anchor, feature) >= threshold)
            .unwrap_or(false);

        match groups.last_mut() {
            Some(group) if joins => {
                group.frame_indices.push(frame.index);
                group.end_secs = frame.timestamp_secs;
            }
            _ => {
                groups.push(SceneGroup {
                    frame_indices: vec![frame.index],
                    start_secs: frame.timestamp_secs,
                    end_secs: frame.timestamp_secs,
                });
                anchor_features = Some(feature);
            }
        }
    }
    groups
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        // two blank summaries are the same scene
        return if norm_a == norm_b { 1.0 } else { 0.0 };
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
