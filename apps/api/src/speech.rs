//! Speech capabilities — thin REST wrappers around Google Cloud
//! Text-to-Speech and Speech-to-Text. No internal state, no business rules;
//! payload validation happens before any network call.

use axum::{extract::State, http::header, response::IntoResponse, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::errors::AppError;
use crate::state::AppState;

const TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const STT_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

const VOICE_LANGUAGE: &str = "en-US";
const VOICE_NAME: &str = "en-US-Wavenet-A";
const STT_SAMPLE_RATE_HZ: u32 = 16_000;

/// A transcription result: recognized text plus the recognizer's confidence.
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
}

#[derive(Clone)]
pub struct SpeechClient {
    client: Client,
    api_key: String,
}

impl SpeechClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Synthesizes one utterance as MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AppError> {
        let body = json!({
            "input": { "text": text },
            "voice": { "languageCode": VOICE_LANGUAGE, "name": VOICE_NAME },
            "audioConfig": { "audioEncoding": "MP3" }
        });

        let response = self
            .client
            .post(TTS_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::CollaboratorUnavailable(format!("TTS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CollaboratorUnavailable(format!(
                "TTS returned {status}: {body}"
            )));
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct TtsResponse {
            audio_content: String,
        }

        let parsed: TtsResponse = response
            .json()
            .await
            .map_err(|e| AppError::CollaboratorUnavailable(format!("TTS reply unreadable: {e}")))?;

        BASE64
            .decode(&parsed.audio_content)
            .map_err(|e| AppError::CollaboratorUnavailable(format!("TTS audio not base64: {e}")))
    }

    /// Transcribes an audio payload. The caller must have rejected empty audio
    /// already; this method checks again before spending a network call.
    pub async fn transcribe(&self, audio: &[u8], encoding: &str) -> Result<Transcription, AppError> {
        if audio.is_empty() {
            return Err(AppError::MalformedInput("audio payload is empty".to_string()));
        }

        let body = json!({
            "config": {
                "encoding": encoding,
                "sampleRateHertz": STT_SAMPLE_RATE_HZ,
                "languageCode": VOICE_LANGUAGE
            },
            "audio": { "content": BASE64.encode(audio) }
        });

        let response = self
            .client
            .post(STT_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::CollaboratorUnavailable(format!("STT request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::CollaboratorUnavailable(format!(
                "STT returned {status}: {body}"
            )));
        }

        #[derive(Deserialize)]
        struct SttResponse {
            #[serde(default)]
            results: Vec<SttResult>,
        }
        #[derive(Deserialize)]
        struct SttResult {
            #[serde(default)]
            alternatives: Vec<SttAlternative>,
        }
        #[derive(Deserialize)]
        struct SttAlternative {
            transcript: Option<String>,
            confidence: Option<f32>,
        }

        let parsed: SttResponse = response
            .json()
            .await
            .map_err(|e| AppError::CollaboratorUnavailable(format!("STT reply unreadable: {e}")))?;

        let best = parsed
            .results
            .into_iter()
            .next()
            .and_then(|r| r.alternatives.into_iter().next());

        let transcription = match best {
            Some(alt) => Transcription {
                text: alt.transcript.unwrap_or_default(),
                confidence: alt.confidence.unwrap_or(0.0),
            },
            // Valid but silent audio: the API returns no results.
            None => Transcription {
                text: String::new(),
                confidence: 0.0,
            },
        };

        debug!(confidence = transcription.confidence, "Transcription complete");
        Ok(transcription)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TtsRequest {
    pub text: String,
}

/// POST /api/v1/tts — returns the utterance as an MP3 byte stream.
pub async fn handle_tts(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::MalformedInput("text must not be empty".to_string()));
    }
    let audio = state.speech.synthesize(&req.text).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

#[derive(Deserialize)]
pub struct SttRequest {
    /// Base64-encoded audio payload.
    pub audio: String,
    /// Google STT encoding name; defaults to LINEAR16.
    pub encoding: Option<String>,
}

/// POST /api/v1/stt
pub async fn handle_stt(
    State(state): State<AppState>,
    Json(req): Json<SttRequest>,
) -> Result<Json<Transcription>, AppError> {
    let audio = BASE64
        .decode(req.audio.as_bytes())
        .map_err(|e| AppError::MalformedInput(format!("audio is not valid base64: {e}")))?;
    if audio.is_empty() {
        return Err(AppError::MalformedInput("audio payload is empty".to_string()));
    }

    let encoding = req.encoding.as_deref().unwrap_or("LINEAR16");
    let transcription = state.speech.transcribe(&audio, encoding).await?;
    Ok(Json(transcription))
}
