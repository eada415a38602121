use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::answer::Answer;
use crate::model::ids::QuestionId;

/// How an attempt left the in-progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The learner pressed submit.
    Submitted,
    /// The countdown reached zero and the attempt was auto-submitted.
    TimeExpired,
    /// The learner walked away; no result is graded.
    Abandoned,
}

impl CompletionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionReason::Submitted => "submitted",
            CompletionReason::TimeExpired => "time_expired",
            CompletionReason::Abandoned => "abandoned",
        }
    }

    /// Whether this completion produces a graded result.
    #[must_use]
    pub fn is_graded(self) -> bool {
        !matches!(self, CompletionReason::Abandoned)
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "time_expired" => Ok(Self::TimeExpired),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown completion reason: {other}")),
        }
    }
}

/// Grading outcome for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    pub user_answer: Option<Answer>,
    pub is_correct: bool,
    pub points_earned: u32,
}

/// Graded result of a submitted attempt. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score_earned: u64,
    pub total_points: u64,
    pub score_percent: u8,
    pub correct_count: usize,
    pub total_questions: usize,
    pub time_spent_seconds: u32,
    pub passed: bool,
    pub per_question: Vec<QuestionOutcome>,
}

impl QuizResult {
    #[must_use]
    pub fn outcome(&self, id: QuestionId) -> Option<&QuestionOutcome> {
        self.per_question.iter().find(|o| o.question_id == id)
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.per_question
            .iter()
            .filter(|o| o.user_answer.is_none())
            .count()
    }
}
