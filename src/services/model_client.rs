// src/services/model_client.rs
use crate::errors::RetouchError;
use crate::models::{FeedbackEntry, Media};
use crate::services::media_processor::MediaProcessor;
use crate::services::region::MaskRegion;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// One earlier exchange replayed to the model as context.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub user: String,
    pub model: String,
}

impl From<&FeedbackEntry> for ConversationTurn {
    fn from(entry: &FeedbackEntry) -> Self {
        Self {
            user: entry.user_feedback.clone(),
            model: entry.model_response.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub media: Media,
    pub instruction: String,
    /// Oldest first.
    pub conversation: Vec<ConversationTurn>,
}

#[derive(Debug, Clone)]
pub struct EditResponse {
    pub media: Media,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct InpaintRequest {
    pub media: Media,
    pub region: MaskRegion,
    pub mask_png: Vec<u8>,
    pub instruction: String,
}

/// General multimodal model: edits bytes from an instruction and describes them.
#[async_trait]
pub trait MultimodalModel: Send + Sync {
    fn name(&self) -> &str;
    async fn edit(&self, request: EditRequest) -> Result<EditResponse, RetouchError>;
    async fn describe(&self, media: &Media, prompt: &str) -> Result<String, RetouchError>;
}

/// Mask-based inpainting model.
#[async_trait]
pub trait InpaintingModel: Send + Sync {
    fn name(&self) -> &str;
    async fn inpaint(&self, request: InpaintRequest) -> Result<Media, RetouchError>;
}

/// The two backends behind one handle. Inpainting is a capability to query,
/// not something every caller has to null-check.
#[derive(Clone)]
pub struct ModelClient {
    multimodal: Arc<dyn MultimodalModel>,
    inpainting: Option<Arc<dyn InpaintingModel>>,
    media: Arc<MediaProcessor>,
}

impl ModelClient {
    pub fn new(multimodal: Arc<dyn MultimodalModel>) -> Self {
        Self {
            multimodal,
            inpainting: None,
            media: Arc::new(MediaProcessor::new()),
        }
    }

    pub fn with_inpainting(mut self, inpainting: Arc<dyn InpaintingModel>) -> Self {
        self.inpainting = Some(inpainting);
        self
    }

    pub fn supports_inpainting(&self) -> bool {
        self.inpainting.is_some()
    }

    pub fn multimodal_name(&self) -> &str {
        self.multimodal.name()
    }

    pub fn media(&self) -> &MediaProcessor {
        &self.media
    }

    pub async fn edit(&self, request: EditRequest) -> Result<EditResponse, RetouchError> {
        let input_mime = request.media.mime_type.clone();
        debug!(
            "{} edit: {} bytes, {} context turns",
            self.multimodal.name(),
            request.media.data.len(),
            request.conversation.len()
        );
        let mut response = self.multimodal.edit(request).await?;
        if response.media.data.is_empty() {
            return Err(RetouchError::Backend(format!(
                "{} returned no media for an edit",
                self.multimodal.name()
            )));
        }
        if response.media.mime_type.trim().is_empty() {
            response.media.mime_type = input_mime;
        }
        response.text = response.text.trim().to_string();
        Ok(response)
    }

    pub async fn describe(&self, media: &Media, prompt: &str) -> Result<String, RetouchError> {
        debug!("{} describe: {} bytes", self.multimodal.name(), media.data.len());
        self.multimodal.describe(media, prompt).await
    }

    /// Inpaints `region` of `media`. Callers check `supports_inpainting` first;
    /// calling without the capability is reported as a backend error.
    pub async fn inpaint(
        &self,
        media: &Media,
        region: MaskRegion,
        width: u32,
        height: u32,
        instruction: &str,
    ) -> Result<Media, RetouchError> {
        let inpainting = self.inpainting.as_ref().ok_or_else(|| {
            RetouchError::Backend("No inpainting backend configured".to_string())
        })?;

        let mask_png = self.media.render_mask(&region, width, height)?;
        debug!(
            "{} inpaint: region {}x{} at ({}, {})",
            inpainting.name(),
            region.width,
            region.height,
            region.x,
            region.y
        );

        let mut edited = inpainting
            .inpaint(InpaintRequest {
                media: media.clone(),
                region,
                mask_png,
                instruction: instruction.to_string(),
            })
            .await?;

        if edited.data.is_empty() {
            return Err(RetouchError::Backend(format!(
                "{} returned no media for an inpaint",
                inpainting.name()
            )));
        }
        if edited.mime_type.trim().is_empty() {
            edited.mime_type = media.mime_type.clone();
        }
        Ok(edited)
    }
}
