// src/services/quality_analyzer.rs
use crate::errors::{AnalysisParseError, RetouchError};
use crate::models::{AnalysisResult, Impact, ImprovementItem, Media};
use crate::prompts::analysis_prompt;
use crate::services::model_client::ModelClient;
use log::{debug, info};
use serde_json::{Map, Value};

pub struct QualityAnalyzer {
    client: ModelClient,
}

impl QualityAnalyzer {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Scores the current artifact against the rubric. Transport failures come
    /// back as `RetouchError::Backend`, undecodable replies as
    /// `RetouchError::AnalysisParse`.
    pub async fn analyze(
        &self,
        current: &Media,
        target_score: f64,
        max_edge: u32,
    ) -> Result<AnalysisResult, RetouchError> {
        // Downscaling is only a bandwidth saving; bytes the local decoder cannot
        // read still go to the model untouched.
        let prepared = match self.client.media().prepare_for_model(current, max_edge) {
            Ok(media) => media,
            Err(e) => {
                debug!("Sending analysis bytes unscaled: {}", e);
                current.clone()
            }
        };

        let text = self
            .client
            .describe(&prepared, &analysis_prompt(target_score))
            .await?;
        let analysis = decode_analysis(&text, target_score)?;

        info!(
            "Analysis scored {:.1} (target {:.1}), {} improvements, no_further_edits={}",
            analysis.professional_score,
            analysis.target_score,
            analysis.remaining_improvements.len(),
            analysis.no_further_edits_needed
        );
        Ok(analysis)
    }
}

/// Best-effort extraction of an `AnalysisResult` from free-form model text.
///
/// Accepts prose or markdown fences around the JSON object, camelCase or
/// snake_case keys, and scores written as strings such as `"7.5/10"`. Enforces
/// that no improvements survive when the model says no further edits are needed.
pub fn decode_analysis(text: &str, target_score: f64) -> Result<AnalysisResult, AnalysisParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalysisParseError::Empty);
    }

    let value = first_json_object(trimmed)?;
    let obj = value.as_object().ok_or(AnalysisParseError::NoJsonObject)?;

    let professional_score = field(obj, &SCORE_KEYS)
        .and_then(parse_score)
        .ok_or(AnalysisParseError::MissingScore)?;

    let overall_assessment = field(obj, &["overall_assessment", "overallAssessment", "assessment"])
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    let no_further_edits_needed = field(
        obj,
        &["no_further_edits_needed", "noFurtherEditsNeeded", "no_further_edits"],
    )
    .and_then(parse_bool)
    .unwrap_or(false);

    let remaining_improvements = if no_further_edits_needed {
        Vec::new()
    } else {
        field(
            obj,
            &["remaining_improvements", "remainingImprovements", "improvements"],
        )
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_improvement).collect())
        .unwrap_or_default()
    };

    Ok(AnalysisResult {
        overall_assessment,
        professional_score,
        target_score,
        no_further_edits_needed,
        remaining_improvements,
    })
}

fn parse_improvement(value: &Value) -> Option<ImprovementItem> {
    let obj = value.as_object()?;
    let text = |keys: &[&str]| {
        field(obj, keys)
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let description = text(&["description", "issue"]);
    let edit_instruction = text(&["edit_instruction", "editInstruction", "instruction"]);
    if description.is_empty() && edit_instruction.is_empty() {
        return None;
    }

    Some(ImprovementItem {
        kind: text(&["type", "kind", "category"]),
        description,
        region: text(&["region", "location", "area"]),
        impact: Impact::from_label(&text(&["impact", "severity"])),
        imagen_suitable: field(obj, &["imagen_suitable", "imagenSuitable", "inpainting_suitable"])
            .and_then(parse_bool)
            .unwrap_or(false),
        edit_instruction,
    })
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key)).filter(|v| !v.is_null())
}

fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_score_text(s)?,
        _ => return None,
    };
    score.is_finite().then_some(score)
}

fn parse_score_text(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den > 0.0).then(|| num * 10.0 / den)
        }
        None => raw.trim().parse().ok(),
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

const SCORE_KEYS: [&str; 3] = ["professional_score", "professionalScore", "score"];

/// Picks the analysis object out of free-form text. Fenced ```json blocks are
/// tried before the surrounding prose; among the candidates that parse, one
/// carrying a score wins over one that does not.
fn first_json_object(text: &str) -> Result<Value, AnalysisParseError> {
    let mut candidates = Vec::new();
    for body in fenced_json_blocks(text) {
        candidates.extend(balanced_objects(body));
    }
    candidates.extend(balanced_objects(text));
    if candidates.is_empty() {
        return Err(AnalysisParseError::NoJsonObject);
    }

    let mut first_error = None;
    let mut fallback = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => {
                let has_score = value
                    .as_object()
                    .is_some_and(|obj| field(obj, &SCORE_KEYS).is_some());
                if has_score {
                    return Ok(value);
                }
                fallback.get_or_insert(value);
            }
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    match (fallback, first_error) {
        (Some(value), _) => Ok(value),
        (None, Some(e)) => Err(AnalysisParseError::InvalidJson(e)),
        (None, None) => Err(AnalysisParseError::NoJsonObject),
    }
}

/// Bodies of ```json fences, in order.
fn fenced_json_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        let block = &after[..close];
        let (lang, body) = block.split_once('\n').unwrap_or(("", block));
        if lang.trim().eq_ignore_ascii_case("json") {
            blocks.push(body);
        }
        rest = &after[close + 3..];
    }
    blocks
}

/// Every balanced `{...}` starting at a `{` in `text`, outermost first by
/// position. Braces inside JSON strings are ignored.
fn balanced_objects(text: &str) -> Vec<&str> {
    text.match_indices('{')
        .filter_map(|(start, _)| balanced_object_at(text, start))
        .collect()
}

fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
