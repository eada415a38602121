use std::sync::Arc;

use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{Attempt, LearnerId, Quiz, QuizError, QuizId};
use quiz_core::{QuizSession, SessionEvent, Transition};
use storage::repository::AttemptRepository;

use super::{AttemptHistory, AttemptSession};
use crate::{AttemptServiceError, Clock};

/// Result of applying one event to an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptUpdate {
    pub transition: Transition,
    pub is_complete: bool,
    pub attempt_id: Option<i64>,
}

/// Orchestrates attempt start, event application, and persistence.
#[derive(Clone)]
pub struct QuizAttemptService {
    clock: Clock,
    attempts: Arc<dyn AttemptRepository>,
    shuffle_questions: bool,
}

impl QuizAttemptService {
    #[must_use]
    pub fn new(clock: Clock, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self {
            clock,
            attempts,
            shuffle_questions: false,
        }
    }

    /// Present questions in a fresh random order for each started attempt.
    #[must_use]
    pub fn with_shuffle_questions(mut self, shuffle_questions: bool) -> Self {
        self.shuffle_questions = shuffle_questions;
        self
    }

    /// Start a new attempt, counting the learner's stored attempts against
    /// `max_attempts`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Session` when the quiz is empty or the
    /// learner has no attempts left, or a storage error if the count fails.
    pub async fn start_attempt(
        &self,
        quiz: Arc<Quiz>,
        learner_id: LearnerId,
    ) -> Result<AttemptSession, AttemptServiceError> {
        let prior = self.attempts.count_attempts(quiz.id(), learner_id).await?;
        log::debug!(
            "learner {learner_id} has {prior} stored attempt(s) on quiz {}",
            quiz.id()
        );

        let quiz = if self.shuffle_questions {
            Arc::new(shuffled(&quiz)?)
        } else {
            quiz
        };

        let mut session = QuizSession::new(quiz, self.clock).with_attempts_used(prior);
        session.start()?;
        Ok(AttemptSession::new(session, learner_id))
    }

    /// Apply an event and persist the attempt the first time it completes.
    ///
    /// A restart first makes sure the finished attempt is stored, then
    /// clears the stored id so the next completion is written as a new row.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Session` for rejected events (state is
    /// unchanged), or a storage error when persisting fails. In the latter
    /// case the session is already completed; call [`Self::finalize`] to retry.
    pub async fn apply(
        &self,
        attempt: &mut AttemptSession,
        event: SessionEvent,
    ) -> Result<AttemptUpdate, AttemptServiceError> {
        if matches!(event, SessionEvent::Restart) && attempt.needs_finalize() {
            self.finalize(attempt).await?;
        }

        let transition = attempt.session.apply(event)?;
        if transition == Transition::Restarted {
            attempt.attempt_id = None;
        }

        if attempt.needs_finalize() {
            if let Err(err) = self.persist(attempt).await {
                log::warn!(
                    "quiz {} completed but could not be stored: {err}",
                    attempt.session.quiz().id()
                );
                return Err(err);
            }
        }

        Ok(AttemptUpdate {
            transition,
            is_complete: attempt.is_complete(),
            attempt_id: attempt.attempt_id,
        })
    }

    /// Store a completed attempt that has not been written yet.
    ///
    /// Returns the existing id when the attempt is already stored.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Attempt` if the session is still running,
    /// or a storage error.
    pub async fn finalize(
        &self,
        attempt: &mut AttemptSession,
    ) -> Result<i64, AttemptServiceError> {
        if let Some(id) = attempt.attempt_id {
            return Ok(id);
        }
        log::warn!(
            "retrying storage of quiz {} attempt {}",
            attempt.session.quiz().id(),
            attempt.session.attempts_used()
        );
        self.persist(attempt).await
    }

    /// Stored attempts for a learner, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` if the attempts cannot be read.
    pub async fn history(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<AttemptHistory, AttemptServiceError> {
        let attempts_used = self.attempts.count_attempts(quiz_id, learner_id).await?;
        let rows = self
            .attempts
            .list_attempts(quiz_id, learner_id, limit)
            .await?;
        Ok(AttemptHistory {
            quiz_id,
            learner_id,
            attempts_used,
            rows,
        })
    }

    async fn persist(&self, attempt: &mut AttemptSession) -> Result<i64, AttemptServiceError> {
        let record = Attempt::from_session(&attempt.session, attempt.learner_id)?;
        let id = self.attempts.append_attempt(&record).await?;
        attempt.attempt_id = Some(id);
        log::info!(
            "stored quiz {} attempt {} for learner {} ({})",
            record.quiz_id(),
            record.attempt_number(),
            record.learner_id(),
            record.completion()
        );
        Ok(id)
    }
}

fn shuffled(quiz: &Quiz) -> Result<Quiz, QuizError> {
    let mut questions = quiz.questions().to_vec();
    questions.shuffle(&mut rng());
    Quiz::new(
        quiz.id(),
        quiz.title(),
        questions,
        quiz.time_limit_seconds(),
        quiz.passing_score_percent(),
        quiz.max_attempts(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::SessionError;
    use quiz_core::model::{Answer, CompletionReason, QuestionDraft, QuestionId, QuestionKind};
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn quiz(max_attempts: u32) -> Arc<Quiz> {
        let questions = (1..=4)
            .map(|id| {
                QuestionDraft {
                    id: QuestionId::new(id),
                    prompt: format!("Is {id} even?"),
                    kind: QuestionKind::TrueFalse,
                    options: Vec::new(),
                    correct_answer: Answer::single(if id % 2 == 0 { "True" } else { "False" }),
                    points: 1,
                    explanation: None,
                }
                .validate()
                .unwrap()
            })
            .collect();
        Arc::new(
            Quiz::new(QuizId::new(9), "Parity", questions, 60, 50, max_attempts).unwrap(),
        )
    }

    fn service(repo: &InMemoryRepository) -> QuizAttemptService {
        QuizAttemptService::new(fixed_clock(), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn persists_once_on_submit() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let learner = LearnerId::new(5);

        let mut attempt = svc.start_attempt(quiz(2), learner).await.unwrap();
        svc.apply(
            &mut attempt,
            SessionEvent::Answer {
                question_id: QuestionId::new(2),
                answer: Answer::single("True"),
            },
        )
        .await
        .unwrap();
        let update = svc.apply(&mut attempt, SessionEvent::Submit).await.unwrap();

        assert_eq!(
            update.transition,
            Transition::Completed(CompletionReason::Submitted)
        );
        let id = update.attempt_id.expect("stored on completion");

        let late_tick = svc.apply(&mut attempt, SessionEvent::Tick).await.unwrap();
        assert_eq!(late_tick.transition, Transition::Ignored);
        assert_eq!(late_tick.attempt_id, Some(id));
        assert_eq!(repo.count_attempts(QuizId::new(9), learner).await.unwrap(), 1);

        let stored = repo.get_attempt(id).await.unwrap();
        assert_eq!(stored.result().unwrap().score_percent, 25);
    }

    #[tokio::test]
    async fn stored_attempts_exhaust_new_starts() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let learner = LearnerId::new(5);

        let mut first = svc.start_attempt(quiz(1), learner).await.unwrap();
        svc.apply(&mut first, SessionEvent::Abandon).await.unwrap();

        let err = svc.start_attempt(quiz(1), learner).await.unwrap_err();
        assert!(matches!(
            err,
            AttemptServiceError::Session(SessionError::AttemptsExhausted { max_attempts: 1 })
        ));

        let other = svc.start_attempt(quiz(1), LearnerId::new(6)).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn rejected_events_leave_nothing_stored() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut attempt = svc.start_attempt(quiz(1), LearnerId::new(1)).await.unwrap();

        let err = svc
            .apply(&mut attempt, SessionEvent::Flag(QuestionId::new(99)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttemptServiceError::Session(SessionError::UnknownQuestion(_))
        ));
        assert_eq!(attempt.attempt_id(), None);
        assert!(!attempt.is_complete());
    }

    #[tokio::test]
    async fn restart_stores_next_attempt_as_new_row() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let learner = LearnerId::new(2);

        let mut attempt = svc.start_attempt(quiz(2), learner).await.unwrap();
        let first = svc
            .apply(&mut attempt, SessionEvent::Submit)
            .await
            .unwrap()
            .attempt_id;

        let restarted = svc.apply(&mut attempt, SessionEvent::Restart).await.unwrap();
        assert_eq!(restarted.transition, Transition::Restarted);
        assert_eq!(restarted.attempt_id, None);

        svc.apply(&mut attempt, SessionEvent::Start).await.unwrap();
        let second = svc
            .apply(&mut attempt, SessionEvent::Submit)
            .await
            .unwrap()
            .attempt_id;

        assert_ne!(first, second);
        let history = svc.history(QuizId::new(9), learner, 10).await.unwrap();
        assert_eq!(history.attempts_used, 2);
        assert_eq!(history.attempts_remaining(2), 0);
        assert_eq!(history.rows[0].attempt.attempt_number(), 2);
    }

    #[tokio::test]
    async fn finalize_returns_existing_id() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let mut attempt = svc.start_attempt(quiz(1), LearnerId::new(3)).await.unwrap();

        assert!(matches!(
            svc.finalize(&mut attempt).await,
            Err(AttemptServiceError::Attempt(_))
        ));

        let id = svc
            .apply(&mut attempt, SessionEvent::Submit)
            .await
            .unwrap()
            .attempt_id
            .unwrap();
        assert_eq!(svc.finalize(&mut attempt).await.unwrap(), id);
        assert_eq!(
            repo.count_attempts(QuizId::new(9), LearnerId::new(3))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn shuffled_attempt_keeps_every_question() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo).with_shuffle_questions(true);
        let attempt = svc.start_attempt(quiz(1), LearnerId::new(1)).await.unwrap();

        let mut ids: Vec<u64> = attempt
            .session()
            .quiz()
            .questions()
            .iter()
            .map(|q| q.id().value())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
