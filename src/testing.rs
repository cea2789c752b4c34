// src/testing.rs
// Scripted backends shared by the unit tests.
use crate::errors::RetouchError;
use crate::models::Media;
use crate::services::model_client::{
    EditRequest, EditResponse, InpaintRequest, InpaintingModel, MultimodalModel,
};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Analyzer reply with one improvement per `(region, imagen_suitable)` pair.
pub fn analysis_json(score: f64, no_further_edits: bool, items: &[(&str, bool)]) -> String {
    let improvements: Vec<_> = items
        .iter()
        .map(|(region, suitable)| {
            json!({
                "type": "retouch",
                "description": format!("fix {}", region),
                "region": region,
                "impact": "medium",
                "imagen_suitable": suitable,
                "edit_instruction": format!("clean up the {}", region),
            })
        })
        .collect();
    json!({
        "overall_assessment": "scripted",
        "professional_score": score,
        "no_further_edits_needed": no_further_edits,
        "remaining_improvements": improvements,
    })
    .to_string()
}

/// Appends a marker byte so every successful edit yields distinct bytes.
fn mark(media: &Media, marker: u8) -> Media {
    let mut data = media.data.clone();
    data.push(marker);
    Media::new(data, media.mime_type.clone())
}

#[derive(Default)]
pub struct ScriptedModel {
    // `None` entries fall through to the default marked-bytes reply.
    edits: Mutex<VecDeque<Option<Result<EditResponse, RetouchError>>>>,
    describes: Mutex<VecDeque<Result<String, RetouchError>>>,
    fallback_describe: Mutex<Option<String>>,
    edit_calls: Mutex<Vec<EditRequest>>,
    describe_calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_edit(&self, result: Result<EditResponse, RetouchError>) {
        self.edits.lock().unwrap().push_back(Some(result));
    }

    pub fn pass_next_edit(&self) {
        self.edits.lock().unwrap().push_back(None);
    }

    pub fn fail_next_edit(&self, message: &str) {
        self.push_edit(Err(RetouchError::Backend(message.to_string())));
    }

    pub fn push_describe(&self, result: Result<String, RetouchError>) {
        self.describes.lock().unwrap().push_back(result);
    }

    pub fn push_analysis(&self, text: String) {
        self.push_describe(Ok(text));
    }

    /// Returned once the scripted describe queue is exhausted.
    pub fn always_describe(&self, text: String) {
        *self.fallback_describe.lock().unwrap() = Some(text);
    }

    pub fn edit_calls(&self) -> Vec<EditRequest> {
        self.edit_calls.lock().unwrap().clone()
    }

    pub fn describe_count(&self) -> usize {
        self.describe_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MultimodalModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn edit(&self, request: EditRequest) -> Result<EditResponse, RetouchError> {
        self.edit_calls.lock().unwrap().push(request.clone());
        let scripted = self.edits.lock().unwrap().pop_front().flatten();
        match scripted {
            Some(result) => result,
            None => Ok(EditResponse {
                media: mark(&request.media, 0xE1),
                text: format!("applied: {}", request.instruction.lines().next().unwrap_or("")),
            }),
        }
    }

    async fn describe(&self, _media: &Media, prompt: &str) -> Result<String, RetouchError> {
        self.describe_calls.lock().unwrap().push(prompt.to_string());
        let scripted = self.describes.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => self
                .fallback_describe
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| RetouchError::Backend("no scripted analysis left".to_string())),
        }
    }
}

#[derive(Default)]
pub struct ScriptedInpainter {
    failures: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<InpaintRequest>>,
}

impl ScriptedInpainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, message: &str) {
        self.failures.lock().unwrap().push_back(message.to_string());
    }

    pub fn calls(&self) -> Vec<InpaintRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InpaintingModel for ScriptedInpainter {
    fn name(&self) -> &str {
        "scripted-inpainter"
    }

    async fn inpaint(&self, request: InpaintRequest) -> Result<Media, RetouchError> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(message) = self.failures.lock().unwrap().pop_front() {
            return Err(RetouchError::Backend(message));
        }
        Ok(mark(&request.media, 0xA1))
    }
}
