//! Conversation Orchestrator — turns stored dialogue plus per-call context into
//! one generation call and interprets the reply.
//!
//! Flow: translate_history → build_system_prompt → generate_reply → classify.
//!
//! Stateless: everything travels in per call, nothing is mutated here. The
//! caller owns appending the returned utterance to the transcript, so a failed
//! call leaves no partial turn behind.

use tracing::{debug, warn};

use crate::errors::AppError;
use crate::interview::prompts::{build_system_prompt, PromptContext, OPENING_PLACEHOLDER};
use crate::llm_client::{
    ChatMessage, GenerateOutcome, GenerativeBackend, StopCondition, CHAT_TEMPERATURE,
};
use crate::models::session::{Speaker, Turn};

/// Maps the stored transcript onto the backend's two-party chat format.
///
/// Interviewer turns become the model role, candidate turns the user role.
/// Turns whose trimmed text is empty are skipped entirely. An empty result is
/// replaced by a single synthetic user message so the backend always sees at
/// least one turn and produces the opening greeting without any first-call
/// special case downstream.
pub fn translate_history(turns: &[Turn]) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = turns
        .iter()
        .filter_map(|turn| {
            let text = turn.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(match turn.speaker {
                Speaker::Interviewer => ChatMessage::model(text),
                Speaker::Candidate => ChatMessage::user(text),
            })
        })
        .collect();

    if messages.is_empty() {
        messages.push(ChatMessage::user(OPENING_PLACEHOLDER));
    }

    messages
}

/// User-safe utterance substituted when the backend produced no usable text.
/// The conversation must keep flowing; a blank reply is never forwarded.
fn fallback_utterance(stop: &StopCondition) -> String {
    match stop {
        StopCondition::Safety => {
            "I'd rather not continue down that path. Let's get back to the interview: could \
             you tell me a bit more about your experience?"
                .to_string()
        }
        StopCondition::Stop => {
            "My response came back empty. Could you repeat your last answer so we can continue?"
                .to_string()
        }
        StopCondition::MaxTokens => {
            "My response was cut short (MAX_TOKENS). Could you try again?".to_string()
        }
        StopCondition::Other(reason) => {
            format!("My response generation was interrupted ({reason}). Could you try again?")
        }
    }
}

/// Produces the next interviewer utterance for the given history and context.
///
/// Backend transport failures surface as `CollaboratorUnavailable` (the caller
/// may retry the whole operation; nothing here retries). Safety blocks and
/// degenerate replies are converted to fallback utterances, not errors.
pub async fn advance_conversation(
    backend: &dyn GenerativeBackend,
    history: &[Turn],
    ctx: &PromptContext,
) -> Result<String, AppError> {
    let messages = translate_history(history);
    let system = build_system_prompt(ctx);

    debug!(
        turns_in = history.len(),
        turns_sent = messages.len(),
        time_left = ?ctx.time_left_minutes,
        "Advancing conversation"
    );

    let outcome = backend
        .generate_reply(&system, &messages, CHAT_TEMPERATURE)
        .await
        .map_err(|e| AppError::CollaboratorUnavailable(e.to_string()))?;

    Ok(match outcome {
        GenerateOutcome::Text(text) => text,
        GenerateOutcome::Empty(stop) => {
            warn!(?stop, "Backend returned no text; substituting fallback utterance");
            fallback_utterance(&stop)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::prompts::{InterviewMode, TERMINATION_PHRASE};
    use crate::llm_client::{ChatRole, LlmError, MockGenerativeBackend};

    fn turn(speaker: Speaker, text: &str) -> Turn {
        Turn {
            speaker,
            text: text.to_string(),
        }
    }

    fn ctx() -> PromptContext {
        PromptContext {
            mode: InterviewMode::RoleBased {
                role: Some("Backend Engineer".to_string()),
                skills: Some("Rust".to_string()),
            },
            user_name: Some("Asha Rao".to_string()),
            time_left_minutes: None,
        }
    }

    #[test]
    fn test_translate_history_maps_speakers_and_drops_empty_turns() {
        let history = vec![
            turn(Speaker::Interviewer, "Hello Asha, welcome!"),
            turn(Speaker::Candidate, "   "),
            turn(Speaker::Candidate, "Thanks, happy to be here."),
            turn(Speaker::Interviewer, ""),
        ];
        let messages = translate_history(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::Model);
        assert_eq!(messages[0].text, "Hello Asha, welcome!");
        assert_eq!(messages[1].role, ChatRole::User);
    }

    #[test]
    fn test_translate_history_substitutes_synthetic_opener() {
        for history in [vec![], vec![turn(Speaker::Candidate, "  \n ")]] {
            let messages = translate_history(&history);
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].role, ChatRole::User);
            assert_eq!(messages[0].text, OPENING_PLACEHOLDER);
        }
    }

    #[tokio::test]
    async fn test_advance_sends_first_name_and_termination_instruction() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_reply()
            .withf(|system, history, temp| {
                system.contains("Asha")
                    && !system.contains("Asha Rao")
                    && system.contains(TERMINATION_PHRASE)
                    && history.len() == 1
                    && history[0].text == OPENING_PLACEHOLDER
                    && (*temp - CHAT_TEMPERATURE).abs() < f32::EPSILON
            })
            .returning(|_, _, _| {
                Ok(GenerateOutcome::Text(
                    "Hello Asha, welcome! Tell me about yourself.".to_string(),
                ))
            });

        let reply = advance_conversation(&backend, &[], &ctx()).await.unwrap();
        assert!(reply.contains("Asha"));
    }

    #[tokio::test]
    async fn test_advance_substitutes_safety_fallback() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_reply()
            .returning(|_, _, _| Ok(GenerateOutcome::Empty(StopCondition::Safety)));

        let reply = advance_conversation(&backend, &[], &ctx()).await.unwrap();
        assert!(reply.contains("Let's get back to the interview"));
    }

    #[tokio::test]
    async fn test_advance_distinguishes_empty_and_interrupted_fallbacks() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_reply()
            .returning(|_, _, _| Ok(GenerateOutcome::Empty(StopCondition::Stop)));
        let empty = advance_conversation(&backend, &[], &ctx()).await.unwrap();

        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_reply().returning(|_, _, _| {
            Ok(GenerateOutcome::Empty(StopCondition::Other(
                "RECITATION".to_string(),
            )))
        });
        let interrupted = advance_conversation(&backend, &[], &ctx()).await.unwrap();

        assert!(empty.contains("came back empty"));
        assert!(interrupted.contains("RECITATION"));
        assert_ne!(empty, interrupted);
    }

    #[tokio::test]
    async fn test_advance_maps_transport_failure_to_unavailable() {
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_reply().returning(|_, _, _| {
            Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            })
        });

        let err = advance_conversation(&backend, &[], &ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::CollaboratorUnavailable(_)));
    }
}
