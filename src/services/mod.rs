// src/services/mod.rs
pub mod dryrun;
pub mod feedback;
pub mod global_enhancer;
pub mod media_processor;
pub mod model_client;
pub mod orchestrator;
pub mod quality_analyzer;
pub mod region;
pub mod surgical_editor;
pub mod video;

pub use dryrun::{DryRunInpainter, DryRunModel};
pub use feedback::{FeedbackOutcome, FeedbackProcessor};
pub use global_enhancer::GlobalEnhancer;
pub use media_processor::MediaProcessor;
pub use model_client::{InpaintingModel, ModelClient, MultimodalModel};
pub use orchestrator::Orchestrator;
pub use quality_analyzer::QualityAnalyzer;
pub use region::MaskRegion;
pub use surgical_editor::SurgicalEditor;
pub use video::VideoEnhancer;
