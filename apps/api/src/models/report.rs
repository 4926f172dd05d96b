use serde::{Deserialize, Serialize};

/// Analysis of one substantive question/answer pair from the interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaItem {
    pub question: String,
    pub user_answer: String,
    /// 1–10.
    pub rating: i32,
    pub feedback: String,
    pub better_answer: String,
}

/// Structured evaluation of a completed interview, derived from the frozen
/// transcript on demand. Never persisted or cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// 1–10.
    pub overall_score: i32,
    pub summary: String,
    pub qa_analysis: Vec<QaItem>,
}

/// Result of report synthesis. Malformed structured output from the backend
/// degrades to the raw reply text instead of failing the caller — partial
/// evaluative value still exists in the prose.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReportOutcome {
    Report(Report),
    Raw { raw_text: String },
}
