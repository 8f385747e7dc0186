//! Gemini client for swing scoring.
//!
//! Sends the sampled frames as inline JPEG parts followed by the text
//! prompt, asks for a JSON response constrained by a schema, and parses the
//! first candidate into an [`AnalysisResult`]. One request per analysis: no
//! retries and no model fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tpro_models::{AnalysisRequest, AnalysisResult, FRAME_MIME_TYPE};

use crate::error::{AnalysisError, ServiceContext};
use crate::prompt::{self, DEFAULT_LANGUAGE};
use crate::service::AnalysisService;

pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Scheme and host, without a trailing slash
    pub base_url: String,
    pub timeout: Duration,
    /// Language the feedback is written in
    pub language: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalysisError::config("GEMINI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(language) = std::env::var("ANALYSIS_LANGUAGE") {
            config.language = language;
        }

        Ok(config)
    }
}

/// Gemini API client.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::config(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    fn build_request(&self, request: &AnalysisRequest) -> GenerateContentRequest {
        let mut parts: Vec<Part> = request
            .frames()
            .iter()
            .map(|frame| Part::Inline {
                inline_data: InlineData {
                    mime_type: FRAME_MIME_TYPE,
                    data: frame.to_base64(),
                },
            })
            .collect();

        parts.push(Part::Text {
            text: prompt::user_prompt(request.stroke(), request.frame_count()),
        });

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: prompt::system_instruction(&self.config.language),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prompt::response_schema(),
            },
        }
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        info!(
            model = %self.config.model,
            frames = request.frame_count(),
            stroke = %request.stroke(),
            "Submitting frames to Gemini"
        );

        let body = self.build_request(request);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            // Drop the URL so the key never reaches logs or the user
            .map_err(|e| e.without_url())
            .service_context("Gemini API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            warn!(status = %status, "Gemini API error: {}", message);
            return Err(AnalysisError::service_failure(format!(
                "Gemini API returned {}: {}",
                status, message
            )));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| e.without_url())
            .service_context("Failed to read Gemini response")?;

        let result = parse_response(&raw)?;
        debug!(
            detected = %result.stroke_type,
            score = result.overall_score,
            "Gemini analysis parsed"
        );
        Ok(result)
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}

/// Parse a `generateContent` response body into a validated result.
fn parse_response(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let response: GenerateContentResponse =
        serde_json::from_str(raw).service_context("Failed to parse Gemini response")?;

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(AnalysisError::service_failure(format!(
            "Gemini blocked the request: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| AnalysisError::service_failure("No candidates in Gemini response"))?;

    let text = candidate
        .content
        .as_ref()
        .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
        .ok_or_else(|| {
            AnalysisError::service_failure(format!(
                "No content in Gemini response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

    let result: AnalysisResult = serde_json::from_str(strip_json_fence(text))
        .service_context("Failed to parse analysis JSON")?;

    result
        .validate()
        .map_err(|e| AnalysisError::service_failure(format!("Invalid analysis: {}", e)))?;

    Ok(result)
}

/// Strip a surrounding ```json fence, if present.
fn strip_json_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tpro_models::{SampledFrame, StrokeType};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn analysis_json() -> serde_json::Value {
        json!({
            "strokeType": "Drive (Forehand)",
            "detectedStrokeJustification": "Lateral contact with a unit turn",
            "overallScore": 68,
            "breakdown": [{ "label": "Preparation", "score": 70 }],
            "summary": "Good rotation, late contact.",
            "improvementAreas": ["Contact point"],
            "actionableTips": [{ "title": "Shadow swings", "description": "Contact in front." }]
        })
    }

    fn wrap(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" },
                "finishReason": "STOP"
            }]
        })
    }

    fn request() -> AnalysisRequest {
        let frames = (1..=3)
            .map(|i| SampledFrame::new(i, i as f64, vec![0xFF, 0xD8, i as u8]))
            .collect();
        AnalysisRequest::new(frames, StrokeType::ForehandDrive)
    }

    fn client(server: &MockServer) -> GeminiClient {
        let mut config = GeminiConfig::new("test-key");
        config.base_url = server.uri();
        GeminiClient::new(config).unwrap()
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_json_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_json_fence("  {} "), "{}");
    }

    #[test]
    fn test_request_body_shape() {
        let client = GeminiClient::new(GeminiConfig::new("k")).unwrap();
        let body = serde_json::to_value(client.build_request(&request())).unwrap();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "/9gB");
        assert!(parts[3]["text"].as_str().unwrap().contains("Drive (Forehand)"));
        assert_eq!(body["contents"][0]["role"], "user");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_parse_response_rejects_bad_payloads() {
        let missing = json!({ "strokeType": "Serve" }).to_string();
        let err = parse_response(&wrap(&missing).to_string()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse analysis JSON"));

        let mut out_of_range = analysis_json();
        out_of_range["overallScore"] = json!(140);
        let err = parse_response(&wrap(&out_of_range.to_string()).to_string()).unwrap_err();
        assert!(err.to_string().contains("Invalid analysis"));

        let err = parse_response(r#"{ "candidates": [] }"#).unwrap_err();
        assert!(err.to_string().contains("No candidates"));

        let blocked = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;
        assert!(parse_response(blocked).unwrap_err().to_string().contains("SAFETY"));

        let empty = r#"{ "candidates": [ { "finishReason": "MAX_TOKENS" } ] }"#;
        assert!(parse_response(empty)
            .unwrap_err()
            .to_string()
            .contains("MAX_TOKENS"));
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let server = MockServer::start().await;
        let fenced = format!("```json\n{}\n```", analysis_json());

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-flash-latest:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(&fenced)))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).analyze(&request()).await.unwrap();
        assert_eq!(result.stroke_type, "Drive (Forehand)");
        assert_eq!(result.overall_score, 68.0);
        assert_eq!(result.actionable_tips.len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_http_error_is_verbatim_and_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).analyze(&request()).await.unwrap_err();
        match err {
            AnalysisError::ServiceFailure(message) => {
                assert_eq!(
                    message,
                    "Gemini API returned 429 Too Many Requests: Resource has been exhausted"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_network_error() {
        let mut config = GeminiConfig::new("test-key");
        // Nothing listens on port 9 (discard) in the test environment
        config.base_url = "http://127.0.0.1:9".to_string();
        let client = GeminiClient::new(config).unwrap();

        let err = client.analyze(&request()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Gemini API request failed"), "{message}");
        assert!(!message.contains("test-key"));
    }
}
