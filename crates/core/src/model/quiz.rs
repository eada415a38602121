use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u8),

    #[error("max attempts must be > 0")]
    InvalidMaxAttempts,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// Unvalidated quiz as it appears in a quiz bank file.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizDraft {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub time_limit_seconds: u32,
    pub passing_score_percent: u8,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    1
}

impl TryFrom<QuizDraft> for Quiz {
    type Error = QuizError;

    fn try_from(draft: QuizDraft) -> Result<Self, Self::Error> {
        Quiz::new(
            draft.id,
            draft.title,
            draft.questions,
            draft.time_limit_seconds,
            draft.passing_score_percent,
            draft.max_attempts,
        )
    }
}

/// An ordered, immutable set of questions with its attempt rules.
///
/// An empty question list is accepted here; sessions refuse to start on it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "QuizDraft")]
pub struct Quiz {
    id: QuizId,
    title: String,
    questions: Vec<Question>,
    time_limit_seconds: u32,
    passing_score_percent: u8,
    max_attempts: u32,
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `QuizError` for a blank title, zero time limit, passing score
    /// above 100, zero attempts, or repeated question ids.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        time_limit_seconds: u32,
        passing_score_percent: u8,
        max_attempts: u32,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if time_limit_seconds == 0 {
            return Err(QuizError::InvalidTimeLimit);
        }
        if passing_score_percent > 100 {
            return Err(QuizError::InvalidPassingScore(passing_score_percent));
        }
        if max_attempts == 0 {
            return Err(QuizError::InvalidMaxAttempts);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id()));
            }
        }

        Ok(Self {
            id,
            title,
            questions,
            time_limit_seconds,
            passing_score_percent,
            max_attempts,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_seconds
    }

    #[must_use]
    pub fn passing_score_percent(&self) -> u8 {
        self.passing_score_percent
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sum of points over every question.
    #[must_use]
    pub fn total_points(&self) -> u64 {
        self.questions.iter().map(|q| u64::from(q.points())).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, QuestionDraft, QuestionKind};

    fn question(id: u64, points: u32) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            prompt: format!("Q{id}"),
            kind: QuestionKind::ShortText,
            options: Vec::new(),
            correct_answer: Answer::single("a"),
            points,
            explanation: None,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let err = Quiz::new(
            QuizId::new(1),
            "Dupes",
            vec![question(1, 1), question(1, 2)],
            60,
            50,
            1,
        )
        .unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new(1)));
    }

    #[test]
    fn rejects_bad_rules() {
        let qs = || vec![question(1, 1)];
        assert_eq!(
            Quiz::new(QuizId::new(1), "T", qs(), 0, 50, 1).unwrap_err(),
            QuizError::InvalidTimeLimit
        );
        assert_eq!(
            Quiz::new(QuizId::new(1), "T", qs(), 60, 101, 1).unwrap_err(),
            QuizError::InvalidPassingScore(101)
        );
        assert_eq!(
            Quiz::new(QuizId::new(1), "T", qs(), 60, 50, 0).unwrap_err(),
            QuizError::InvalidMaxAttempts
        );
        assert_eq!(
            Quiz::new(QuizId::new(1), "  ", qs(), 60, 50, 1).unwrap_err(),
            QuizError::EmptyTitle
        );
    }

    #[test]
    fn totals_points_and_looks_up_questions() {
        let quiz = Quiz::new(
            QuizId::new(9),
            "Sums",
            vec![question(1, 10), question(2, 20)],
            60,
            50,
            2,
        )
        .unwrap();
        assert_eq!(quiz.total_points(), 30);
        assert_eq!(quiz.question(QuestionId::new(2)).unwrap().points(), 20);
        assert!(quiz.question(QuestionId::new(3)).is_none());
    }

    #[test]
    fn deserializes_quiz_bank_entry() {
        let json = r#"{
            "id": 12,
            "title": "Fractions",
            "time_limit_seconds": 300,
            "passing_score_percent": 60,
            "questions": [
                {"id": 1, "prompt": "1/2 + 1/2?", "kind": "single_choice",
                 "options": ["1", "2"], "correct_answer": "1", "points": 2}
            ]
        }"#;
        let quiz: Quiz = serde_json::from_str(json).unwrap();
        assert_eq!(quiz.max_attempts(), 1);
        assert_eq!(quiz.len(), 1);
    }
}
