// src/services/feedback.rs
use crate::errors::RetouchError;
use crate::models::{EditMethod, FeedbackEntry, Media};
use crate::prompts::feedback_instruction;
use crate::services::model_client::{ConversationTurn, EditRequest, ModelClient};
use crate::services::region::MaskRegion;
use log::{info, warn};

const DEFAULT_RESPONSE: &str = "Applied the requested change.";

#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    /// The revised bytes, or the untouched input when the revision failed.
    pub media: Media,
    pub entry: FeedbackEntry,
}

pub struct FeedbackProcessor {
    client: ModelClient,
}

impl FeedbackProcessor {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Mask for a localized fix, when the feedback names a place in the frame
    /// and the inpainting backend is available. `None` means instruction editing.
    pub fn localized_region(
        &self,
        feedback: &str,
        media: &Media,
        width: u32,
        height: u32,
    ) -> Option<MaskRegion> {
        if !self.client.supports_inpainting() || media.is_video() {
            return None;
        }
        MaskRegion::from_feedback(feedback, width, height)
    }

    /// Applies one revision and appends exactly one entry to `history`.
    ///
    /// Only empty feedback is an error. Backend failures are reported through
    /// the entry (`success == false`) and leave `current` as it was.
    pub async fn process_feedback(
        &self,
        current: &Media,
        feedback: &str,
        history: &mut Vec<FeedbackEntry>,
        width: u32,
        height: u32,
    ) -> Result<FeedbackOutcome, RetouchError> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(RetouchError::Validation(
                "Feedback text must not be empty".to_string(),
            ));
        }

        let (method, result) = match self.localized_region(feedback, current, width, height) {
            Some(region) => (
                EditMethod::Inpainting,
                self.client
                    .inpaint(current, region, width, height, feedback)
                    .await
                    .map(|media| {
                        let response = format!(
                            "Applied a masked edit to the {}x{} region at ({}, {}).",
                            region.width, region.height, region.x, region.y
                        );
                        (media, response)
                    }),
            ),
            None => {
                let conversation = history.iter().map(ConversationTurn::from).collect();
                (
                    EditMethod::Instruction,
                    self.client
                        .edit(EditRequest {
                            media: current.clone(),
                            instruction: feedback_instruction(feedback, current),
                            conversation,
                        })
                        .await
                        .map(|response| {
                            let text = if response.text.is_empty() {
                                DEFAULT_RESPONSE.to_string()
                            } else {
                                response.text
                            };
                            (response.media, text)
                        }),
                )
            }
        };

        let outcome = match result {
            Ok((media, response)) => {
                info!("Feedback applied via {} ({} prior entries)", method, history.len());
                FeedbackOutcome {
                    media,
                    entry: FeedbackEntry::new(feedback, response, method, true),
                }
            }
            Err(e) => {
                warn!("Feedback via {} failed: {}", method, e);
                FeedbackOutcome {
                    media: current.clone(),
                    entry: FeedbackEntry::new(
                        feedback,
                        format!("Could not apply the feedback: {}", e),
                        method,
                        false,
                    ),
                }
            }
        };

        history.push(outcome.entry.clone());
        Ok(outcome)
    }
}
