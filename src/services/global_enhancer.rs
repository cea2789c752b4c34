// src/services/global_enhancer.rs
use crate::errors::RetouchError;
use crate::models::Media;
use crate::prompts::{GLOBAL_ENHANCEMENT_PROMPT, GLOBAL_VIDEO_ENHANCEMENT_PROMPT};
use crate::services::model_client::{EditRequest, ModelClient};
use log::info;

const DEFAULT_SUMMARY: &str = "Applied a holistic exposure, color and clarity pass.";

#[derive(Debug, Clone)]
pub struct GlobalEdit {
    pub media: Media,
    pub summary: String,
}

pub struct GlobalEnhancer {
    client: ModelClient,
}

impl GlobalEnhancer {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// One holistic pass over the original bytes. Any failure is returned as-is;
    /// the caller treats it as fatal for the item.
    pub async fn enhance(&self, original: &Media) -> Result<GlobalEdit, RetouchError> {
        let instruction = if original.is_video() {
            GLOBAL_VIDEO_ENHANCEMENT_PROMPT
        } else {
            GLOBAL_ENHANCEMENT_PROMPT
        };

        let response = self
            .client
            .edit(EditRequest {
                media: original.clone(),
                instruction: instruction.trim().to_string(),
                conversation: Vec::new(),
            })
            .await?;

        let summary = if response.text.is_empty() {
            DEFAULT_SUMMARY.to_string()
        } else {
            response.text
        };
        info!(
            "Global pass via {} produced {} bytes",
            self.client.multimodal_name(),
            response.media.data.len()
        );

        Ok(GlobalEdit {
            media: response.media,
            summary,
        })
    }
}
