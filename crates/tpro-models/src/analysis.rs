//! Structured analysis returned by the scoring service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lowest score the service may assign.
pub const MIN_SCORE: f64 = 0.0;
/// Highest score the service may assign.
pub const MAX_SCORE: f64 = 100.0;

/// Score for a single sub-skill (preparation, contact point, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreDetail {
    pub label: String,
    pub score: f64,
}

/// A concrete coaching tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionableTip {
    pub title: String,
    pub description: String,
}

/// Biomechanical assessment of one uploaded swing.
///
/// Field names follow the service's camelCase response schema so the
/// response body deserializes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Stroke the service detected, which may differ from the declared one
    pub stroke_type: String,
    /// Why the service classified the clip as `stroke_type`
    pub detected_stroke_justification: String,
    /// Overall score, 0-100
    pub overall_score: f64,
    /// Ordered per sub-skill scores
    pub breakdown: Vec<ScoreDetail>,
    pub summary: String,
    pub improvement_areas: Vec<String>,
    pub actionable_tips: Vec<ActionableTip>,
}

impl AnalysisResult {
    /// Validate scores are finite and inside the 0-100 range.
    pub fn validate(&self) -> Result<(), String> {
        check_score("overallScore", self.overall_score)?;

        for detail in &self.breakdown {
            check_score(&format!("breakdown '{}'", detail.label), detail.score)?;
        }

        Ok(())
    }

    /// Whether the detected stroke matches the declared label.
    ///
    /// The service answers in free text, so this is a loose comparison.
    pub fn matches_declared(&self, declared: &str) -> bool {
        let detected = self.stroke_type.to_lowercase();
        let declared = declared.to_lowercase();
        detected.contains(&declared) || declared.contains(&detected)
    }
}

fn check_score(field: &str, score: f64) -> Result<(), String> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(format!(
            "{} score {} is outside {}-{}",
            field, score, MIN_SCORE, MAX_SCORE
        ));
    }
    Ok(())
}
