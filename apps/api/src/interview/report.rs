//! Report Synthesizer — re-reads a frozen transcript and produces a scored,
//! structured critique in one backend call.

use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm_client::{
    GenerateOutcome, GenerativeBackend, StopCondition, ANALYSIS_TEMPERATURE,
};
use crate::models::report::{Report, ReportOutcome};
use crate::models::session::{Speaker, Turn};

/// Role label used when a session was never started with one.
pub const DEFAULT_ROLE_LABEL: &str = "a technical position";

/// System prompt for report synthesis — enforces JSON-only output.
const REPORT_SYSTEM: &str =
    "You are an expert interview evaluator producing a structured assessment of a \
     completed technical interview. \
     You MUST respond with valid JSON only. \
     Do NOT include any text outside the JSON object. \
     Do NOT use markdown code fences. \
     Do NOT include explanations or apologies.";

/// Report prompt template. Replace `{role}` and `{transcript}` before sending.
const REPORT_PROMPT_TEMPLATE: &str = r#"Evaluate the following interview transcript for the role of {role}.

Return a JSON object with this EXACT schema (no extra fields):
{
  "overall_score": 7,
  "summary": "One paragraph summarizing the candidate's overall performance.",
  "qa_analysis": [
    {
      "question": "Short summary of the interviewer's question",
      "user_answer": "Short summary of the candidate's answer",
      "rating": 6,
      "feedback": "What was missing or weak in the answer",
      "better_answer": "An example of a stronger answer"
    }
  ]
}

Rules for evaluation:
1. IGNORE the opening greeting and small talk; analyze only substantive question/answer pairs.
2. For EVERY substantive pair, produce one qa_analysis entry with a 1-10 rating.
3. If the transcript contains no substantive answers, return an empty qa_analysis array.
4. overall_score must be an integer from 1 to 10.
5. Be specific and constructive in feedback and better_answer.

TRANSCRIPT:
---
{transcript}
---"#;

/// Renders the transcript as a flat speaker-prefixed text block.
/// Empty-after-trim turns are dropped, matching the orchestrator's rule.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .map(|t| {
            let prefix = match t.speaker {
                Speaker::Interviewer => "Interviewer",
                Speaker::Candidate => "Candidate",
            };
            format!("{prefix}: {}", t.text.trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strips ```json ... ``` or ``` ... ``` fences from backend output. The
/// prompt forbids fences but generative backends wrap JSON in them anyway.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    for opener in ["```json", "```"] {
        if let Some(stripped) = text.strip_prefix(opener) {
            return stripped
                .trim_start()
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or_else(|| stripped.trim_start());
        }
    }
    text
}

/// Synthesizes a report from a frozen transcript.
///
/// One backend call at low temperature with a JSON response constraint. A
/// parseable reply becomes a typed [`Report`]; a malformed one degrades to
/// [`ReportOutcome::Raw`] because partial evaluative value still exists.
/// The report is recomputed on every request and never cached.
pub async fn synthesize_report(
    backend: &dyn GenerativeBackend,
    turns: &[Turn],
    role: &str,
) -> Result<ReportOutcome, AppError> {
    let transcript = render_transcript(turns);
    let prompt = REPORT_PROMPT_TEMPLATE
        .replace("{role}", role)
        .replace("{transcript}", &transcript);

    let outcome = backend
        .generate_structured(REPORT_SYSTEM, &prompt, ANALYSIS_TEMPERATURE)
        .await
        .map_err(|e| AppError::CollaboratorUnavailable(e.to_string()))?;

    let text = match outcome {
        GenerateOutcome::Text(text) => text,
        GenerateOutcome::Empty(StopCondition::Safety) => {
            return Err(AppError::CollaboratorBlocked(
                "report synthesis was safety-blocked".to_string(),
            ))
        }
        GenerateOutcome::Empty(stop) => {
            return Err(AppError::CollaboratorDegenerate(format!(
                "report synthesis returned no text ({stop:?})"
            )))
        }
    };

    match serde_json::from_str::<Report>(strip_json_fences(&text)) {
        Ok(report) => {
            debug!(
                overall_score = report.overall_score,
                qa_pairs = report.qa_analysis.len(),
                "Report synthesized"
            );
            Ok(ReportOutcome::Report(report))
        }
        Err(e) => {
            warn!("Report did not parse as structured output ({e}); returning raw text");
            Ok(ReportOutcome::Raw { raw_text: text })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockGenerativeBackend;

    fn turn(speaker: Speaker, text: &str) -> Turn {
        Turn {
            speaker,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_render_transcript_prefixes_speakers() {
        let turns = vec![
            turn(Speaker::Interviewer, "Hello Asha, welcome!"),
            turn(Speaker::Candidate, "  Thanks.  "),
            turn(Speaker::Candidate, "   "),
        ];
        let rendered = render_transcript(&turns);
        assert_eq!(
            rendered,
            "Interviewer: Hello Asha, welcome!\nCandidate: Thanks."
        );
    }

    #[test]
    fn test_strip_json_fences_variants() {
        assert_eq!(
            strip_json_fences("```json\n{\"a\": 1}\n```"),
            "{\"a\": 1}"
        );
        assert_eq!(strip_json_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_synthesize_parses_structured_reply() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_structured()
            .withf(|_, prompt, _| {
                prompt.contains("Backend Engineer")
                    && prompt.contains("Interviewer: Hello Asha, welcome!")
            })
            .returning(|_, _, _| {
                Ok(GenerateOutcome::Text(
                    r#"{"overall_score": 6, "summary": "Decent.", "qa_analysis": []}"#.to_string(),
                ))
            });

        let turns = vec![turn(Speaker::Interviewer, "Hello Asha, welcome!")];
        let outcome = synthesize_report(&backend, &turns, "Backend Engineer")
            .await
            .unwrap();

        match outcome {
            ReportOutcome::Report(report) => {
                assert_eq!(report.overall_score, 6);
                assert!(report.qa_analysis.is_empty());
            }
            ReportOutcome::Raw { .. } => panic!("expected a structured report"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_degrades_malformed_reply_to_raw() {
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_structured().returning(|_, _, _| {
            Ok(GenerateOutcome::Text(
                "The candidate did fine overall, I'd say 7/10.".to_string(),
            ))
        });

        let turns = vec![turn(Speaker::Candidate, "I like Rust.")];
        let outcome = synthesize_report(&backend, &turns, DEFAULT_ROLE_LABEL)
            .await
            .unwrap();

        match outcome {
            ReportOutcome::Raw { raw_text } => assert!(raw_text.contains("7/10")),
            ReportOutcome::Report(_) => panic!("expected a raw fallback"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_greeting_only_transcript_is_not_an_error() {
        // A one-greeting transcript still gets a report; the prompt tells the
        // backend to return an empty qa_analysis.
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_structured().returning(|_, _, _| {
            Ok(GenerateOutcome::Text(
                r#"{"overall_score": 1, "summary": "No answers given.", "qa_analysis": []}"#
                    .to_string(),
            ))
        });

        let turns = vec![turn(Speaker::Interviewer, "Hello, welcome!")];
        let outcome = synthesize_report(&backend, &turns, DEFAULT_ROLE_LABEL)
            .await
            .unwrap();
        assert!(matches!(outcome, ReportOutcome::Report(r) if r.qa_analysis.is_empty()));
    }

    #[tokio::test]
    async fn test_synthesize_safety_block_surfaces_as_blocked() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_structured()
            .returning(|_, _, _| Ok(GenerateOutcome::Empty(StopCondition::Safety)));

        let turns = vec![turn(Speaker::Candidate, "answer")];
        let err = synthesize_report(&backend, &turns, DEFAULT_ROLE_LABEL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CollaboratorBlocked(_)));
    }
}
