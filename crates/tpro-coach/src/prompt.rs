//! Prompt text and response schema for swing analysis.

use serde_json::{json, Value};
use tpro_models::StrokeType;

/// Language the service is asked to answer in by default.
pub const DEFAULT_LANGUAGE: &str = "Spanish";

/// System instruction describing the analysis protocol.
pub fn system_instruction(language: &str) -> String {
    format!(
        r#"You are an elite biomechanical analysis system for professional tennis.
Your task is to analyse a chronological sequence of video frames and produce a precise technical diagnosis.

ANALYSIS PROTOCOL (follow these steps strictly):
1. LANDMARKS: In every frame, locate the racket and the ball.
2. CLASSIFICATION:
   - If the racket rises above the shoulder with the body side-on and there is a 'trophy' phase, it is a SERVE.
   - If the racket describes a lateral arc with a shoulder rotation (unit turn), it is a DRIVE or a BACKHAND.
3. INTENT CHECK: The user will say what they were trying to do. If you see something else, explain why
   (e.g. "Although you selected Serve, the motion is a Drive because contact is lateral, not overhead").
4. EVALUATION: Score based on the kinetic chain (energy transfer from the feet to the racket).

ALWAYS answer in JSON and in {language}."#
    )
}

/// Per-request prompt naming the declared stroke and the frame count.
pub fn user_prompt(stroke: StrokeType, frame_count: usize) -> String {
    let label = stroke.label();
    format!(
        r#"CONTEXT: The player was trying to perform a: "{label}".
DATA: You have {frame_count} frames in chronological order, numbered 1 to {frame_count}.

TASK:
1. Identify which stroke is actually being performed by analysing the racket path.
2. If it does not match "{label}", be very specific about why in the 'detectedStrokeJustification' field.
3. Analyse the technique (preparation, contact point, follow-through).
4. Produce the technical scoring."#
    )
}

/// Response schema in the service's OpenAPI subset.
///
/// Mirrors [`tpro_models::AnalysisResult`]; every field is required.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "strokeType": { "type": "STRING" },
            "detectedStrokeJustification": {
                "type": "STRING",
                "description": "Why this stroke was identified and not another"
            },
            "overallScore": { "type": "NUMBER" },
            "breakdown": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "score": { "type": "NUMBER" }
                    },
                    "required": ["label", "score"]
                }
            },
            "summary": { "type": "STRING" },
            "improvementAreas": {
                "type": "ARRAY",
                "items": { "type": "STRING" }
            },
            "actionableTips": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["title", "description"]
                }
            }
        },
        "required": [
            "strokeType",
            "detectedStrokeJustification",
            "overallScore",
            "breakdown",
            "summary",
            "improvementAreas",
            "actionableTips"
        ]
    })
}
