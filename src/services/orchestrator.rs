// src/services/orchestrator.rs
use crate::config::EnhancementConfig;
use crate::errors::{EnhancementFailure, RetouchError};
use crate::models::{AnalysisResult, EnhancementState, Media, Phase, StopReason};
use crate::services::feedback::{FeedbackOutcome, FeedbackProcessor};
use crate::services::global_enhancer::GlobalEnhancer;
use crate::services::model_client::ModelClient;
use crate::services::quality_analyzer::QualityAnalyzer;
use crate::services::surgical_editor::SurgicalEditor;
use log::{error, info, warn};

/// Drives one media item through Phase 1, then the Phase 2 / Phase 3 loop.
///
/// Holds no per-item state; every call builds and owns its own
/// `EnhancementState`, so one orchestrator can serve many items concurrently.
pub struct Orchestrator {
    client: ModelClient,
    global: GlobalEnhancer,
    analyzer: QualityAnalyzer,
    surgical: SurgicalEditor,
    feedback: FeedbackProcessor,
}

impl Orchestrator {
    pub fn new(client: ModelClient) -> Self {
        Self {
            global: GlobalEnhancer::new(client.clone()),
            analyzer: QualityAnalyzer::new(client.clone()),
            surgical: SurgicalEditor::new(client.clone()),
            feedback: FeedbackProcessor::new(client.clone()),
            client,
        }
    }

    pub fn client(&self) -> &ModelClient {
        &self.client
    }

    pub async fn run_full_enhancement(
        &self,
        original: Media,
        width: u32,
        height: u32,
        config: &EnhancementConfig,
    ) -> Result<EnhancementState, EnhancementFailure> {
        let (width, height) = self.resolve_dimensions(&original, width, height);
        let mut state = EnhancementState::new(original, width, height);

        if let Err(e) = config.validate() {
            return Err(fail(state, e));
        }

        // Phase 1: exactly once, fatal on failure.
        state.enter(Phase::Phase1);
        let global = self.global.enhance(&state.current).await;
        match global {
            Ok(edit) => {
                state.replace_current(edit.media);
                state.phase1_text = Some(edit.summary);
                self.refresh_dimensions(&mut state);
            }
            Err(e) => return Err(fail(state, e)),
        }

        loop {
            state.enter(Phase::Phase2);
            let analyzed = self
                .analyzer
                .analyze(
                    &state.current,
                    config.target_professional_score,
                    config.max_model_edge,
                )
                .await;
            let analysis = match analyzed {
                Ok(analysis) => analysis,
                Err(e) => return Err(fail(state, e)),
            };
            state.analysis_passes += 1;

            let stop = stop_reason(&analysis, state.surgical_passes, config.max_analysis_iterations);
            let improvements = analysis.remaining_improvements.clone();
            state.analysis = Some(analysis);

            if let Some(reason) = stop {
                return Ok(complete(state, reason));
            }

            state.enter(Phase::Phase3);
            let report = self.surgical.apply(&mut state, &improvements).await;
            state.surgical_passes += 1;
            if report.applied.is_empty() {
                warn!(
                    "Surgical pass {} applied nothing; {} items skipped",
                    state.surgical_passes,
                    report.skipped.len()
                );
            }

            if state.surgical_passes >= config.max_analysis_iterations {
                return Ok(complete(state, StopReason::IterationLimit));
            }
        }
    }

    /// Applies user feedback to a finished run. Success replaces the current
    /// bytes and moves the state to `Feedback`; failure leaves both untouched.
    pub async fn revise(
        &self,
        state: &mut EnhancementState,
        feedback: &str,
    ) -> Result<FeedbackOutcome, RetouchError> {
        if !matches!(state.phase, Phase::Complete | Phase::Feedback) {
            return Err(RetouchError::Validation(format!(
                "Feedback needs a completed enhancement, item is in {}",
                state.phase
            )));
        }

        let outcome = self
            .feedback
            .process_feedback(
                &state.current,
                feedback,
                &mut state.feedback,
                state.width,
                state.height,
            )
            .await?;

        if outcome.entry.success {
            state.replace_current(outcome.media.clone());
            self.refresh_dimensions(state);
            if state.phase != Phase::Feedback {
                state.enter(Phase::Feedback);
            }
        }
        Ok(outcome)
    }

    fn resolve_dimensions(&self, media: &Media, width: u32, height: u32) -> (u32, u32) {
        if (width > 0 && height > 0) || media.is_video() {
            return (width, height);
        }
        self.client
            .media()
            .probe_dimensions(&media.data)
            .unwrap_or((width, height))
    }

    fn refresh_dimensions(&self, state: &mut EnhancementState) {
        if state.current.is_video() {
            return;
        }
        if let Ok((width, height)) = self.client.media().probe_dimensions(&state.current.data) {
            state.width = width;
            state.height = height;
        }
    }
}

/// The convergence check run after every analysis.
fn stop_reason(
    analysis: &AnalysisResult,
    surgical_passes: u32,
    max_iterations: u32,
) -> Option<StopReason> {
    if analysis.no_further_edits_needed {
        Some(StopReason::NoFurtherEditsNeeded)
    } else if analysis.meets_target() {
        Some(StopReason::TargetScoreReached)
    } else if surgical_passes >= max_iterations {
        Some(StopReason::IterationLimit)
    } else if analysis.remaining_improvements.is_empty() {
        Some(StopReason::NoImprovementsRemaining)
    } else {
        None
    }
}

fn complete(mut state: EnhancementState, reason: StopReason) -> EnhancementState {
    state.stop_reason = Some(reason);
    state.enter(Phase::Complete);
    info!(
        "Enhancement complete ({:?}) after {} analyses, {} surgical passes, {} inpainted edits",
        reason, state.analysis_passes, state.surgical_passes, state.imagen_edits
    );
    state
}

fn fail(mut state: EnhancementState, source: RetouchError) -> EnhancementFailure {
    let failed_phase = state.phase;
    error!("Enhancement failed during {}: {}", failed_phase, source);
    state.enter(Phase::Error);
    EnhancementFailure::new(failed_phase, state, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalysisParseError;
    use crate::models::EditMethod;
    use crate::testing::{ScriptedInpainter, ScriptedModel, analysis_json, solid_png};
    use std::sync::Arc;

    fn config(max_iterations: u32) -> EnhancementConfig {
        EnhancementConfig {
            max_analysis_iterations: max_iterations,
            target_professional_score: 8.5,
            ..EnhancementConfig::default()
        }
    }

    fn photo() -> Media {
        Media::new(vec![0], "image/jpeg")
    }

    fn assert_forward_only(state: &EnhancementState) {
        let ranks: Vec<u8> = state.phase_log.iter().map(|p| p.rank()).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "{:?}", state.phase_log);
    }

    #[tokio::test]
    async fn high_first_score_completes_without_surgery() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis(analysis_json(9.0, false, &[("sky", true)]));
        let orchestrator = Orchestrator::new(ModelClient::new(model.clone()));

        let state = orchestrator
            .run_full_enhancement(photo(), 100, 100, &config(3))
            .await
            .unwrap();

        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.stop_reason, Some(StopReason::TargetScoreReached));
        assert_eq!(state.surgical_passes, 0);
        assert_eq!(state.imagen_edits, 0);
        assert!(!state.phase_log.contains(&Phase::Phase3));
        assert!(state.phase1_text.is_some());
        assert_eq!(model.edit_calls().len(), 1);
        assert_forward_only(&state);
    }

    #[tokio::test]
    async fn mixed_improvements_are_split_between_backends_then_reanalyzed() {
        let model = Arc::new(ScriptedModel::new());
        let inpainter = Arc::new(ScriptedInpainter::new());
        model.push_analysis(analysis_json(6.0, false, &[("top sky", true), ("subject face", false)]));
        model.push_analysis(analysis_json(8.8, false, &[]));
        let orchestrator =
            Orchestrator::new(ModelClient::new(model.clone()).with_inpainting(inpainter.clone()));

        let state = orchestrator
            .run_full_enhancement(photo(), 400, 300, &config(3))
            .await
            .unwrap();

        assert_eq!(state.imagen_edits, 1);
        assert_eq!(state.instruction_edits, 1);
        assert_eq!(inpainter.calls().len(), 1);
        // phase 1 edit plus one instruction edit
        assert_eq!(model.edit_calls().len(), 2);
        assert_eq!(model.describe_count(), 2);
        assert_eq!(
            state.phase_log,
            vec![
                Phase::Initial,
                Phase::Phase1,
                Phase::Phase2,
                Phase::Phase3,
                Phase::Phase2,
                Phase::Complete
            ]
        );
        assert_eq!(state.analysis.unwrap().professional_score, 8.8);
    }

    #[tokio::test]
    async fn iteration_bound_forces_completion_after_one_pass() {
        let model = Arc::new(ScriptedModel::new());
        model.always_describe(analysis_json(4.0, false, &[("left", false)]));
        let orchestrator = Orchestrator::new(ModelClient::new(model.clone()));

        let state = orchestrator
            .run_full_enhancement(photo(), 100, 100, &config(1))
            .await
            .unwrap();

        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.stop_reason, Some(StopReason::IterationLimit));
        assert_eq!(state.surgical_passes, 1);
        assert_eq!(model.describe_count(), 1);
        // best artifact so far is kept: phase 1 marker then surgical marker
        assert_eq!(state.current.data, vec![0, 0xE1, 0xE1]);
    }

    #[tokio::test]
    async fn loop_never_exceeds_the_iteration_bound() {
        let model = Arc::new(ScriptedModel::new());
        model.always_describe(analysis_json(3.0, false, &[("top", false)]));
        let orchestrator = Orchestrator::new(ModelClient::new(model.clone()));

        let state = orchestrator
            .run_full_enhancement(photo(), 100, 100, &config(4))
            .await
            .unwrap();

        assert_eq!(state.surgical_passes, 4);
        assert_eq!(state.analysis_passes, 4);
        assert_eq!(state.instruction_edits, 4);
        assert_forward_only(&state);
    }

    #[tokio::test]
    async fn zero_iterations_completes_after_first_analysis() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis(analysis_json(2.0, false, &[("top", false)]));
        let state = Orchestrator::new(ModelClient::new(model))
            .run_full_enhancement(photo(), 100, 100, &config(0))
            .await
            .unwrap();
        assert_eq!(state.stop_reason, Some(StopReason::IterationLimit));
        assert_eq!(state.surgical_passes, 0);
    }

    #[tokio::test]
    async fn suitable_item_without_inpainting_uses_instruction_editor() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis(analysis_json(5.0, false, &[("top-left sky", true)]));
        model.push_analysis(analysis_json(5.0, true, &[]));
        let orchestrator = Orchestrator::new(ModelClient::new(model.clone()));

        let state = orchestrator
            .run_full_enhancement(photo(), 100, 100, &config(3))
            .await
            .unwrap();

        assert_eq!(state.imagen_edits, 0);
        assert_eq!(state.instruction_edits, 1);
        assert_eq!(state.stop_reason, Some(StopReason::NoFurtherEditsNeeded));
        assert!(model.edit_calls()[1].instruction.contains("top-left sky"));
    }

    #[tokio::test]
    async fn empty_improvement_list_stops_the_loop() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis(analysis_json(6.0, false, &[]));
        let state = Orchestrator::new(ModelClient::new(model))
            .run_full_enhancement(photo(), 100, 100, &config(3))
            .await
            .unwrap();
        assert_eq!(state.stop_reason, Some(StopReason::NoImprovementsRemaining));
    }

    #[tokio::test]
    async fn phase1_failure_returns_error_state() {
        let model = Arc::new(ScriptedModel::new());
        model.fail_next_edit("401 unauthorized");
        let failure = Orchestrator::new(ModelClient::new(model.clone()))
            .run_full_enhancement(photo(), 100, 100, &config(3))
            .await
            .unwrap_err();

        assert_eq!(failure.failed_phase, Phase::Phase1);
        assert_eq!(failure.state.phase, Phase::Error);
        assert!(failure.state.phase1_text.is_none());
        assert_eq!(failure.state.current, photo());
        assert_eq!(model.describe_count(), 0);
    }

    #[tokio::test]
    async fn analyzer_failure_keeps_phase1_context() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis("The photo is lovely.".to_string());
        let failure = Orchestrator::new(ModelClient::new(model))
            .run_full_enhancement(photo(), 100, 100, &config(3))
            .await
            .unwrap_err();

        assert_eq!(failure.failed_phase, Phase::Phase2);
        assert!(failure.state.phase1_text.is_some());
        assert_eq!(failure.state.current.data, vec![0, 0xE1]);
        assert!(matches!(
            failure.source,
            RetouchError::AnalysisParse(AnalysisParseError::NoJsonObject)
        ));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_backend_call() {
        let model = Arc::new(ScriptedModel::new());
        let mut bad = config(3);
        bad.similarity_threshold = 2.0;
        let failure = Orchestrator::new(ModelClient::new(model.clone()))
            .run_full_enhancement(photo(), 100, 100, &bad)
            .await
            .unwrap_err();
        assert_eq!(failure.failed_phase, Phase::Initial);
        assert!(matches!(failure.source, RetouchError::Config(_)));
        assert!(model.edit_calls().is_empty());
    }

    #[tokio::test]
    async fn zero_dimensions_are_probed_from_the_bytes() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis(analysis_json(9.5, false, &[]));
        let state = Orchestrator::new(ModelClient::new(model))
            .run_full_enhancement(
                Media::new(solid_png(64, 48, [90, 90, 90]), "image/png"),
                0,
                0,
                &config(3),
            )
            .await
            .unwrap();
        assert_eq!((state.width, state.height), (64, 48));
    }

    #[tokio::test]
    async fn revise_moves_a_completed_state_to_feedback() {
        let model = Arc::new(ScriptedModel::new());
        model.push_analysis(analysis_json(9.0, false, &[]));
        let orchestrator = Orchestrator::new(ModelClient::new(model.clone()));
        let mut state = orchestrator
            .run_full_enhancement(photo(), 100, 100, &config(3))
            .await
            .unwrap();

        let outcome = orchestrator.revise(&mut state, "a bit warmer").await.unwrap();
        assert!(outcome.entry.success);
        assert_eq!(outcome.entry.method, EditMethod::Instruction);
        assert_eq!(state.phase, Phase::Feedback);
        assert_eq!(state.feedback.len(), 1);
        assert_eq!(state.current, outcome.media);
        assert_forward_only(&state);

        model.fail_next_edit("overloaded");
        let before = state.current.clone();
        let outcome = orchestrator.revise(&mut state, "and crop tighter").await.unwrap();
        assert!(!outcome.entry.success);
        assert_eq!(state.current, before);
        assert_eq!(state.feedback.len(), 2);
        assert_eq!(state.phase, Phase::Feedback);
    }

    #[tokio::test]
    async fn concurrent_runs_keep_separate_counters() {
        let model = Arc::new(ScriptedModel::new());
        model.always_describe(analysis_json(5.0, false, &[("top sky", true)]));
        let orchestrator = Arc::new(Orchestrator::new(
            ModelClient::new(model).with_inpainting(Arc::new(ScriptedInpainter::new())),
        ));

        let cfg = config(2);
        let (a, b) = tokio::join!(
            orchestrator.run_full_enhancement(photo(), 100, 100, &cfg),
            orchestrator.run_full_enhancement(photo(), 100, 100, &cfg),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.imagen_edits, 2);
        assert_eq!(b.imagen_edits, 2);
    }

    #[tokio::test]
    async fn revise_rejects_unfinished_states() {
        let orchestrator = Orchestrator::new(ModelClient::new(Arc::new(ScriptedModel::new())));
        let mut state = EnhancementState::new(photo(), 10, 10);
        let err = orchestrator.revise(&mut state, "brighter").await.unwrap_err();
        assert!(matches!(err, RetouchError::Validation(_)));
    }
}
