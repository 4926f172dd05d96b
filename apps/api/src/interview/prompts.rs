//! Prompt assembly for the interviewer persona.
//!
//! One builder per interview mode, sharing the first-name, résumé-truncation
//! and time-pressure helpers. All instruction text lives here as constants so
//! the persona stays consistent across calls.

/// The literal end-of-interview signal the persona is instructed to emit
/// verbatim. Advisory only: the service never parses it back out of a reply —
/// clients watch for it.
pub const TERMINATION_PHRASE: &str = "good bye, thank you for your time, we will get back to you";

/// Synthetic opening message sent when the translated history is empty, so the
/// backend always sees at least one user turn and produces a greeting.
pub const OPENING_PLACEHOLDER: &str = "Start the interview.";

/// Character budget for résumé text injected into the prompt. The tail is kept:
/// recent experience discriminates better than early history.
pub const RESUME_CHAR_BUDGET: usize = 3500;

const TRUNCATION_MARKER: &str = "... (resume truncated) ...";

/// Which context the interview is built from.
#[derive(Debug, Clone)]
pub enum InterviewMode {
    RoleBased {
        role: Option<String>,
        skills: Option<String>,
    },
    ResumeBased {
        resume_text: Option<String>,
    },
}

/// Ephemeral per-call context. Never persisted; never shared across sessions.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub mode: InterviewMode,
    pub user_name: Option<String>,
    pub time_left_minutes: Option<f64>,
}

/// Time-pressure tier derived from the remaining minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingTier {
    /// <= 0.5 min: close out immediately with the end phrase.
    HardStop,
    /// < 3 min: no new deep topics, begin wrapping up.
    WrapUp,
    /// Ample time: neutral pacing note.
    Neutral,
}

/// Selects the pacing tier. `None` in → `None` out: absence of a time signal
/// means no pacing instruction at all.
pub fn pacing_tier(time_left_minutes: Option<f64>) -> Option<PacingTier> {
    let t = time_left_minutes?;
    Some(if t <= 0.5 {
        PacingTier::HardStop
    } else if t < 3.0 {
        PacingTier::WrapUp
    } else {
        PacingTier::Neutral
    })
}

fn pacing_instruction(tier: PacingTier) -> &'static str {
    match tier {
        PacingTier::HardStop => {
            "Time is up. Close the interview immediately: thank the candidate and end with the \
             exact end phrase. Ask no further questions."
        }
        PacingTier::WrapUp => {
            "Fewer than three minutes remain. Do not open new deep topics; begin wrapping up \
             the interview."
        }
        PacingTier::Neutral => "There is ample time remaining. Pace yourself; no need to rush.",
    }
}

/// Only the first whitespace-delimited token of the candidate's name is ever
/// echoed in-prompt; the full name would read stiff. No name → neutral
/// placeholder.
pub fn first_name(user_name: Option<&str>) -> &str {
    user_name
        .and_then(|n| n.split_whitespace().next())
        .unwrap_or("the candidate")
}

/// Tail-truncates résumé text to [`RESUME_CHAR_BUDGET`] characters, prepending
/// a marker. Text at or under the budget passes through unmodified.
pub fn truncate_resume(text: &str) -> String {
    let total = text.chars().count();
    if total <= RESUME_CHAR_BUDGET {
        return text.to_string();
    }
    let tail: String = text.chars().skip(total - RESUME_CHAR_BUDGET).collect();
    format!("{TRUNCATION_MARKER}\n{tail}")
}

const ROLE_SYSTEM_TEMPLATE: &str = r#"**CONTEXT:**
- You are Alex, a professional technical interviewer conducting an interview for the company.
- You are about to start the interview.

**MISSION:**
- Role to interview for: {role}
- Candidate's name: {name}
- Candidate's listed skills: {skills}
- Your first task is to greet the candidate warmly by name, briefly state the role, and ask an introductory question (e.g. "Tell me about yourself" or "What interests you about this role?").

**RULES:**
1. BE PROFESSIONAL & FRIENDLY: maintain a positive and engaging tone.
2. NO META-COMMENTARY: only output what Alex would say directly to the candidate. Do not add labels like "Alex:" or "(Thinking)".
3. ASK PROBING QUESTIONS: follow up with "why" and "how" questions to understand depth of knowledge and experience. Refer back to the listed skills: {skills}.
4. ADJUST DIFFICULTY: if 'intern' or 'junior' appears in the role ({role}), focus on fundamentals, projects, and learning ability. For senior-sounding roles, ask more rigorous, experience-based questions.
5. INTERVIEW FLOW: start broad, then dive into technical and behavioral specifics related to the role and skills. Conclude after sufficient evaluation.
6. END PHRASE: when you decide the interview is complete, you MUST end the conversation using this exact phrase and nothing else: "{termination}""#;

const RESUME_SYSTEM_TEMPLATE: &str = r#"**CONTEXT:**
- You are Alex, a professional interviewer conducting an interview for the company.
- You are about to start the interview.

**MISSION:**
- Candidate's name: {name}
- {mission}
- {resume_block}

**RULES:**
1. BE PROFESSIONAL & FRIENDLY: maintain a positive and engaging tone.
2. NO META-COMMENTARY: only output what Alex would say directly to the candidate. Do not add labels like "Alex:" or "(Thinking)".
3. FOCUS ON RESUME: ground every question in the provided resume content. Ask for clarifications, details, and examples related to points on the resume.
4. ASK PROBING QUESTIONS: dig deeper into the experiences listed with "why" and "how" follow-ups.
5. INTERVIEW FLOW: structure the interview logically around the resume (chronological or by project). Conclude after sufficient evaluation.
6. END PHRASE: when you decide the interview is complete, you MUST end the conversation using this exact phrase and nothing else: "{termination}""#;

/// Builds the full instruction block for one orchestration call.
pub fn build_system_prompt(ctx: &PromptContext) -> String {
    let name = first_name(ctx.user_name.as_deref());

    let mut prompt = match &ctx.mode {
        InterviewMode::RoleBased { role, skills } => {
            let role = role.as_deref().unwrap_or("the specified technical");
            let skills = skills.as_deref().unwrap_or("general technical skills");
            ROLE_SYSTEM_TEMPLATE
                .replace("{role}", role)
                .replace("{name}", name)
                .replace("{skills}", skills)
                .replace("{termination}", TERMINATION_PHRASE)
        }
        InterviewMode::ResumeBased { resume_text } => {
            let (mission, resume_block) = match resume_text.as_deref() {
                Some(text) if !text.trim().is_empty() => (
                    format!(
                        "Your first task is to greet the candidate by name ({name}) and start \
                         the interview based entirely on their resume below. Open with a \
                         question about their most recent experience or overall profile."
                    ),
                    format!(
                        "**CANDIDATE'S RESUME (potentially truncated):**\n---\n{}\n---",
                        truncate_resume(text)
                    ),
                ),
                _ => (
                    format!(
                        "Your first task is to greet the candidate by name ({name}), \
                         acknowledge that no resume was provided, and ask them to describe \
                         their professional experience or projects."
                    ),
                    "No resume was provided for this candidate.".to_string(),
                ),
            };
            RESUME_SYSTEM_TEMPLATE
                .replace("{name}", name)
                .replace("{mission}", &mission)
                .replace("{resume_block}", &resume_block)
                .replace("{termination}", TERMINATION_PHRASE)
        }
    };

    if let Some(tier) = pacing_tier(ctx.time_left_minutes) {
        prompt.push_str("\n\n**TIME:** ");
        prompt.push_str(pacing_instruction(tier));
    }

    prompt
}
