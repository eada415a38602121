use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{LearnerId, QuizId};
use crate::model::result::{CompletionReason, QuizResult};
use crate::session::QuizSession;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("session has not completed")]
    NotCompleted,

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("attempt number must be >= 1")]
    InvalidAttemptNumber,

    #[error("{0} attempt is missing its result")]
    MissingResult(CompletionReason),

    #[error("abandoned attempt cannot carry a result")]
    UnexpectedResult,
}

/// A finished attempt as it is kept in the attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    quiz_id: QuizId,
    learner_id: LearnerId,
    attempt_number: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    completion: CompletionReason,
    result: Option<QuizResult>,
}

impl Attempt {
    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if timestamps are reversed, the attempt number is
    /// zero, or the result does not match the completion reason.
    pub fn from_persisted(
        quiz_id: QuizId,
        learner_id: LearnerId,
        attempt_number: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        completion: CompletionReason,
        result: Option<QuizResult>,
    ) -> Result<Self, AttemptError> {
        if completed_at < started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        if attempt_number == 0 {
            return Err(AttemptError::InvalidAttemptNumber);
        }
        match (completion.is_graded(), result.is_some()) {
            (true, false) => return Err(AttemptError::MissingResult(completion)),
            (false, true) => return Err(AttemptError::UnexpectedResult),
            _ => {}
        }

        Ok(Self {
            quiz_id,
            learner_id,
            attempt_number,
            started_at,
            completed_at,
            completion,
            result,
        })
    }

    /// Capture a completed session for the given learner.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotCompleted` while the session is still running.
    pub fn from_session(
        session: &QuizSession,
        learner_id: LearnerId,
    ) -> Result<Self, AttemptError> {
        let (Some(started_at), Some(completed_at), Some(completion)) = (
            session.started_at(),
            session.completed_at(),
            session.completion(),
        ) else {
            return Err(AttemptError::NotCompleted);
        };

        Self::from_persisted(
            session.quiz().id(),
            learner_id,
            session.attempts_used(),
            started_at,
            completed_at,
            completion,
            session.result().cloned(),
        )
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn completion(&self) -> CompletionReason {
        self.completion
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, QuestionDraft, QuestionId, QuestionKind, Quiz};
    use crate::time::{fixed_clock, fixed_now};
    use std::sync::Arc;

    fn quiz() -> Arc<Quiz> {
        let question = QuestionDraft {
            id: QuestionId::new(1),
            prompt: "2 + 2?".into(),
            kind: QuestionKind::ShortText,
            options: Vec::new(),
            correct_answer: Answer::single("4"),
            points: 1,
            explanation: None,
        }
        .validate()
        .unwrap();
        Arc::new(Quiz::new(QuizId::new(5), "Sums", vec![question], 60, 100, 3).unwrap())
    }

    #[test]
    fn running_session_is_not_an_attempt_yet() {
        let mut session = QuizSession::new(quiz(), fixed_clock());
        session.start().unwrap();
        let err = Attempt::from_session(&session, LearnerId::new(1)).unwrap_err();
        assert_eq!(err, AttemptError::NotCompleted);
    }

    #[test]
    fn captures_submitted_session() {
        let mut session = QuizSession::new(quiz(), fixed_clock()).with_attempts_used(1);
        session.start().unwrap();
        session
            .answer(QuestionId::new(1), Answer::single("4"))
            .unwrap();
        session.submit().unwrap();

        let attempt = Attempt::from_session(&session, LearnerId::new(8)).unwrap();
        assert_eq!(attempt.quiz_id(), QuizId::new(5));
        assert_eq!(attempt.attempt_number(), 2);
        assert_eq!(attempt.completion(), CompletionReason::Submitted);
        assert!(attempt.passed());
    }

    #[test]
    fn persisted_shape_is_checked() {
        let now = fixed_now();
        let err = Attempt::from_persisted(
            QuizId::new(1),
            LearnerId::new(1),
            1,
            now,
            now,
            CompletionReason::TimeExpired,
            None,
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::MissingResult(CompletionReason::TimeExpired));

        let err = Attempt::from_persisted(
            QuizId::new(1),
            LearnerId::new(1),
            1,
            now,
            now - chrono::Duration::seconds(1),
            CompletionReason::Abandoned,
            None,
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::InvalidTimeRange);
    }
}
