/// Generative backend — the single point of entry for all Gemini API calls in Parley.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All generative-text interactions MUST go through this module.
///
/// Model: gemini-2.5-flash-lite (hardcoded — do not make configurable to prevent drift)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for all generative calls in Parley.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-2.5-flash-lite";
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Sampling temperature for the interviewer persona — low variance keeps the
/// persona consistent across turns.
pub const CHAT_TEMPERATURE: f32 = 0.7;
/// Sampling temperature for evaluation and extraction calls.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;
/// Sampling temperature for deterministic extraction (e.g. name scanning).
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Role of one message in the backend's two-party chat format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// The interviewer persona (the backend's own prior output).
    Model,
    /// The candidate.
    User,
}

impl ChatRole {
    fn as_str(&self) -> &'static str {
        match self {
            ChatRole::Model => "model",
            ChatRole::User => "user",
        }
    }
}

/// One translated turn handed to the backend.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Why a generation finished without usable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCondition {
    /// Normal stop but the reply text was empty.
    Stop,
    /// The content-safety filter rejected the prompt or the reply.
    Safety,
    /// The reply hit the output-length bound.
    MaxTokens,
    /// Any other abnormal interruption reported by the backend.
    Other(String),
}

/// Outcome of one generation call: either usable text or a typed stop condition.
/// Callers decide what a stop condition means — the client never substitutes text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Text(String),
    Empty(StopCondition),
}

/// The generative-text capability consumed by the orchestrator and the report
/// synthesizer. Injected as a handle so tests can substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Multi-turn generation with a system instruction and translated history.
    async fn generate_reply(
        &self,
        system: &str,
        history: &[ChatMessage],
        temperature: f32,
    ) -> Result<GenerateOutcome, LlmError>;

    /// Single-shot generation constrained to a JSON reply.
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<GenerateOutcome, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (Gemini generateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WirePart {
    text: String,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    system_instruction: WireContent,
    contents: Vec<WireContent>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireCandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WireCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct WireCandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single Gemini client used by all services in Parley.
///
/// Makes exactly one attempt per call — failed calls surface as errors and the
/// caller owns any retry decision (this is a paid capability; hidden repeated
/// side effects are not allowed).
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Borderline content is rejected outright rather than silently softened.
    fn safety_settings() -> Vec<SafetySetting> {
        const CATEGORIES: [&str; 4] = [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ];
        CATEGORIES
            .iter()
            .map(|c| SafetySetting {
                category: c,
                threshold: "BLOCK_LOW_AND_ABOVE",
            })
            .collect()
    }

    async fn call(&self, request: &WireRequest) -> Result<WireResponse, LlmError> {
        let url = format!("{GEMINI_API_BASE}/{MODEL}:generateContent");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Maps a candidate-less or text-less response onto a typed stop condition.
    fn classify(response: WireResponse) -> GenerateOutcome {
        if let Some(feedback) = &response.prompt_feedback {
            if feedback.block_reason.is_some() {
                return GenerateOutcome::Empty(StopCondition::Safety);
            }
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return GenerateOutcome::Empty(StopCondition::Stop);
        };

        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return GenerateOutcome::Text(text.trim().to_string());
        }

        match candidate.finish_reason.as_deref() {
            Some("SAFETY") => GenerateOutcome::Empty(StopCondition::Safety),
            Some("MAX_TOKENS") => GenerateOutcome::Empty(StopCondition::MaxTokens),
            Some("STOP") | None => GenerateOutcome::Empty(StopCondition::Stop),
            Some(other) => GenerateOutcome::Empty(StopCondition::Other(other.to_string())),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_reply(
        &self,
        system: &str,
        history: &[ChatMessage],
        temperature: f32,
    ) -> Result<GenerateOutcome, LlmError> {
        let request = WireRequest {
            system_instruction: WireContent {
                role: None,
                parts: vec![WirePart {
                    text: system.to_string(),
                }],
            },
            contents: history
                .iter()
                .map(|m| WireContent {
                    role: Some(m.role.as_str()),
                    parts: vec![WirePart {
                        text: m.text.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: None,
            },
            safety_settings: Self::safety_settings(),
        };

        let response = self.call(&request).await?;
        debug!(
            turns = history.len(),
            "Gemini generate_reply call succeeded"
        );
        Ok(Self::classify(response))
    }

    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<GenerateOutcome, LlmError> {
        let request = WireRequest {
            system_instruction: WireContent {
                role: None,
                parts: vec![WirePart {
                    text: system.to_string(),
                }],
            },
            contents: vec![WireContent {
                role: Some(ChatRole::User.as_str()),
                parts: vec![WirePart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: MAX_OUTPUT_TOKENS * 4,
                response_mime_type: Some("application/json"),
            },
            safety_settings: Self::safety_settings(),
        };

        let response = self.call(&request).await?;
        debug!("Gemini generate_structured call succeeded");
        Ok(Self::classify(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(json: &str) -> WireResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_classify_returns_trimmed_text() {
        let response = response_from(
            r#"{"candidates":[{"content":{"parts":[{"text":"  Hello Asha, welcome!  "}],"role":"model"},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(
            GeminiClient::classify(response),
            GenerateOutcome::Text("Hello Asha, welcome!".to_string())
        );
    }

    #[test]
    fn test_classify_joins_multiple_parts() {
        let response = response_from(
            r#"{"candidates":[{"content":{"parts":[{"text":"Tell me "},{"text":"about yourself."}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(
            GeminiClient::classify(response),
            GenerateOutcome::Text("Tell me about yourself.".to_string())
        );
    }

    #[test]
    fn test_classify_maps_prompt_block_to_safety() {
        let response = response_from(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert_eq!(
            GeminiClient::classify(response),
            GenerateOutcome::Empty(StopCondition::Safety)
        );
    }

    #[test]
    fn test_classify_maps_candidate_safety_finish() {
        let response =
            response_from(r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#);
        assert_eq!(
            GeminiClient::classify(response),
            GenerateOutcome::Empty(StopCondition::Safety)
        );
    }

    #[test]
    fn test_classify_empty_stop_and_unknown_reasons() {
        let stopped =
            response_from(r#"{"candidates":[{"content":{"parts":[{"text":"   "}]},"finishReason":"STOP"}]}"#);
        assert_eq!(
            GeminiClient::classify(stopped),
            GenerateOutcome::Empty(StopCondition::Stop)
        );

        let interrupted =
            response_from(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#);
        assert_eq!(
            GeminiClient::classify(interrupted),
            GenerateOutcome::Empty(StopCondition::Other("RECITATION".to_string()))
        );
    }

    #[test]
    fn test_classify_no_candidates_is_stop() {
        let response = response_from(r#"{}"#);
        assert_eq!(
            GeminiClient::classify(response),
            GenerateOutcome::Empty(StopCondition::Stop)
        );
    }
}
