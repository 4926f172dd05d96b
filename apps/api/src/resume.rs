//! Résumé intake — PDF text extraction plus best-effort candidate-name
//! detection. Only PDF is accepted; everything else is rejected before any
//! extraction is attempted.

use axum::{extract::Multipart, extract::State, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{ChatMessage, GenerateOutcome, GenerativeBackend, EXTRACTION_TEMPERATURE};
use crate::state::AppState;

/// Only the head of the résumé is scanned for the name; it is always on the
/// first page.
const NAME_SCAN_CHARS: usize = 1500;

const NAME_EXTRACTION_SYSTEM: &str =
    "You are an expert resume parser. You will be given text and you will extract \
     the candidate's full name. Respond ONLY with the full name and nothing else.";

/// Extracts plain text from an uploaded PDF. Non-PDF payloads fail with
/// `MalformedInput` before the extractor runs.
pub fn extract_resume_text(bytes: &[u8]) -> Result<String, AppError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(AppError::MalformedInput(
            "Invalid file type, please upload a PDF".to_string(),
        ));
    }
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::MalformedInput(format!("Error parsing PDF: {e}")))
}

/// Strips decoration the model sometimes adds around the bare name.
fn clean_name(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('*').trim();
    let s = match s.get(..5) {
        Some(label) if label.eq_ignore_ascii_case("name:") => s[5..].trim(),
        _ => s,
    };
    s.to_string()
}

/// Scans the head of the résumé for the candidate's full name using the
/// generative backend at deterministic temperature. Best-effort: every failure
/// degrades to `None` so the upload itself never fails on this step.
pub async fn extract_candidate_name(
    backend: &dyn GenerativeBackend,
    resume_text: &str,
) -> Option<String> {
    let excerpt: String = resume_text.chars().take(NAME_SCAN_CHARS).collect();
    let content = format!("TEXT:\n---\n{excerpt}\n---");

    let outcome = backend
        .generate_reply(
            NAME_EXTRACTION_SYSTEM,
            &[ChatMessage::user(content)],
            EXTRACTION_TEMPERATURE,
        )
        .await;

    match outcome {
        Ok(GenerateOutcome::Text(text)) => {
            let name = clean_name(&text);
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        }
        Ok(GenerateOutcome::Empty(stop)) => {
            warn!(?stop, "Name extraction returned no text");
            None
        }
        Err(e) => {
            warn!("Name extraction failed: {e}");
            None
        }
    }
}

#[derive(Serialize)]
pub struct ResumeUploadResponse {
    pub resume_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_name: Option<String>,
}

/// POST /api/v1/resume — multipart upload, field `file`, PDF only.
pub async fn handle_resume_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ResumeUploadResponse>, AppError> {
    let mut file: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::MalformedInput(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::MalformedInput(format!("could not read file: {e}")))?;
            file = Some((filename, data));
        }
    }

    let (filename, data) = file.ok_or_else(|| {
        AppError::MalformedInput("missing 'file' field in multipart body".to_string())
    })?;

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::MalformedInput(
            "Invalid file type, please upload a PDF".to_string(),
        ));
    }

    let resume_text = extract_resume_text(&data)?;
    info!("Parsed resume '{filename}' ({} chars)", resume_text.len());

    let detected_name = extract_candidate_name(state.llm.as_ref(), &resume_text).await;

    Ok(Json(ResumeUploadResponse {
        resume_text,
        detected_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockGenerativeBackend;

    #[test]
    fn test_non_pdf_bytes_rejected_before_extraction() {
        let err = extract_resume_text(b"GIF89a not a pdf").unwrap_err();
        assert!(matches!(err, AppError::MalformedInput(_)));
    }

    #[test]
    fn test_clean_name_strips_labels() {
        assert_eq!(clean_name("Asha Rao"), "Asha Rao");
        assert_eq!(clean_name("Name: Asha Rao"), "Asha Rao");
        assert_eq!(clean_name("* name:  Asha Rao "), "Asha Rao");
        assert_eq!(clean_name("   "), "");
    }

    #[tokio::test]
    async fn test_name_extraction_scans_head_only() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_reply()
            .withf(|system, history, temp| {
                system.contains("resume parser")
                    && history.len() == 1
                    && history[0].text.chars().count() <= NAME_SCAN_CHARS + 20
                    && *temp == EXTRACTION_TEMPERATURE
            })
            .returning(|_, _, _| Ok(GenerateOutcome::Text("Name: Asha Rao".to_string())));

        let long_resume = "Asha Rao\n".to_string() + &"filler ".repeat(2000);
        let name = extract_candidate_name(&backend, &long_resume).await;
        assert_eq!(name.as_deref(), Some("Asha Rao"));
    }

    #[tokio::test]
    async fn test_name_extraction_degrades_to_none() {
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_reply().returning(|_, _, _| {
            Err(crate::llm_client::LlmError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        });
        assert!(extract_candidate_name(&backend, "Asha Rao").await.is_none());
    }
}
