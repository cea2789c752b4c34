// src/services/surgical_editor.rs
use crate::errors::RetouchError;
use crate::models::{EditMethod, EnhancementState, ImprovementItem, Media};
use crate::prompts::{inpainting_instruction, surgical_instruction};
use crate::services::model_client::{EditRequest, ModelClient};
use crate::services::region::MaskRegion;
use log::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEdit {
    pub index: usize,
    pub method: EditMethod,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEdit {
    pub index: usize,
    pub method: EditMethod,
    pub reason: String,
}

/// Outcome of one Phase 3 pass, in analyzer order.
#[derive(Debug, Clone, Default)]
pub struct SurgicalReport {
    pub applied: Vec<AppliedEdit>,
    pub skipped: Vec<SkippedEdit>,
}

impl SurgicalReport {
    pub fn applied_with(&self, method: EditMethod) -> usize {
        self.applied.iter().filter(|e| e.method == method).count()
    }
}

pub struct SurgicalEditor {
    client: ModelClient,
}

impl SurgicalEditor {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// The single routing decision: inpaint only still images, only items
    /// flagged as suitable, and only when the backend exists and a mask can be
    /// placed.
    pub fn route(&self, item: &ImprovementItem, current: &Media, width: u32, height: u32) -> EditMethod {
        if item.imagen_suitable
            && self.client.supports_inpainting()
            && !current.is_video()
            && width > 0
            && height > 0
        {
            EditMethod::Inpainting
        } else {
            EditMethod::Instruction
        }
    }

    /// Applies `items` one after another, each against the bytes the previous
    /// edit produced. A failed item is logged and skipped.
    pub async fn apply(
        &self,
        state: &mut EnhancementState,
        items: &[ImprovementItem],
    ) -> SurgicalReport {
        let mut report = SurgicalReport::default();

        for (index, item) in items.iter().enumerate() {
            let method = self.route(item, &state.current, state.width, state.height);
            let result = match method {
                EditMethod::Inpainting => self.inpaint(state, item).await,
                EditMethod::Instruction => self.instruct(&state.current, item).await,
            };

            match result {
                Ok(media) => {
                    self.accept(state, media);
                    match method {
                        EditMethod::Inpainting => state.imagen_edits += 1,
                        EditMethod::Instruction => state.instruction_edits += 1,
                    }
                    report.applied.push(AppliedEdit {
                        index,
                        method,
                        region: item.region.clone(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Skipping improvement {} ({}) via {}: {}",
                        index, item.region, method, e
                    );
                    report.skipped.push(SkippedEdit {
                        index,
                        method,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Surgical pass applied {} of {} edits ({} inpainted)",
            report.applied.len(),
            items.len(),
            report.applied_with(EditMethod::Inpainting)
        );
        report
    }

    async fn inpaint(
        &self,
        state: &EnhancementState,
        item: &ImprovementItem,
    ) -> Result<Media, RetouchError> {
        let region = MaskRegion::locate(&item.region, state.width, state.height).ok_or_else(|| {
            RetouchError::Validation("Cannot place a mask without image dimensions".to_string())
        })?;
        self.client
            .inpaint(
                &state.current,
                region,
                state.width,
                state.height,
                &inpainting_instruction(item),
            )
            .await
    }

    async fn instruct(&self, current: &Media, item: &ImprovementItem) -> Result<Media, RetouchError> {
        let response = self
            .client
            .edit(EditRequest {
                media: current.clone(),
                instruction: surgical_instruction(item),
                conversation: Vec::new(),
            })
            .await?;
        Ok(response.media)
    }

    fn accept(&self, state: &mut EnhancementState, media: Media) {
        if !media.is_video() {
            if let Ok((width, height)) = self.client.media().probe_dimensions(&media.data) {
                state.width = width;
                state.height = height;
            }
        }
        state.replace_current(media);
    }
}
