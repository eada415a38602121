use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{
    Answer, AnswerRejection, CompletionReason, Question, QuestionId, Quiz, QuizResult,
};
use crate::scoring;
use crate::time::Clock;

use super::event::{SessionEvent, SessionStatus, Transition};
use super::progress::{QuestionReview, SessionProgress};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejections from the session state machine. None of them alter state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("quiz has no questions")]
    InvalidQuiz,

    #[error("all {max_attempts} attempts have been used")]
    AttemptsExhausted { max_attempts: u32 },

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(QuestionId),

    #[error("cannot {action} while the session is {status}")]
    InvalidState {
        action: &'static str,
        status: SessionStatus,
    },

    #[error("answer rejected for question {question_id}: {reason}")]
    InvalidAnswer {
        question_id: QuestionId,
        reason: AnswerRejection,
    },
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's attempt at a quiz.
///
/// All mutation goes through [`QuizSession::apply`]; the named methods are
/// shorthands for the matching [`SessionEvent`]. Timer ticks use the same
/// path, so a tick that arrives after completion is ignored rather than
/// touching the finished attempt.
///
/// While the session is completed or not yet started, every learner action
/// other than `start`/`restart` is rejected with `SessionError::InvalidState`.
#[derive(Clone)]
pub struct QuizSession {
    quiz: Arc<Quiz>,
    clock: Clock,
    status: SessionStatus,
    answers: HashMap<QuestionId, Answer>,
    flagged: BTreeSet<QuestionId>,
    current_index: usize,
    remaining_seconds: u32,
    timer_armed: bool,
    attempts_used: u32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    completion: Option<CompletionReason>,
    result: Option<QuizResult>,
}

impl QuizSession {
    #[must_use]
    pub fn new(quiz: Arc<Quiz>, clock: Clock) -> Self {
        let remaining_seconds = quiz.time_limit_seconds();
        Self {
            quiz,
            clock,
            status: SessionStatus::NotStarted,
            answers: HashMap::new(),
            flagged: BTreeSet::new(),
            current_index: 0,
            remaining_seconds,
            timer_armed: false,
            attempts_used: 0,
            started_at: None,
            completed_at: None,
            completion: None,
            result: None,
        }
    }

    /// Account for attempts already made in earlier sessions.
    #[must_use]
    pub fn with_attempts_used(mut self, attempts_used: u32) -> Self {
        self.attempts_used = attempts_used;
        self
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn quiz(&self) -> &Arc<Quiz> {
        &self.quiz
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, Answer> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<&Answer> {
        self.answers.get(&id)
    }

    #[must_use]
    pub fn flagged(&self) -> &BTreeSet<QuestionId> {
        &self.flagged
    }

    #[must_use]
    pub fn is_flagged(&self, id: QuestionId) -> bool {
        self.flagged.contains(&id)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.question_at(self.current_index)
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// True only while the attempt is running and ticks should be delivered.
    #[must_use]
    pub fn is_timer_armed(&self) -> bool {
        self.timer_armed
    }

    #[must_use]
    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    #[must_use]
    pub fn attempts_remaining(&self) -> u32 {
        self.quiz.max_attempts().saturating_sub(self.attempts_used)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn completion(&self) -> Option<CompletionReason> {
        self.completion
    }

    #[must_use]
    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let unanswered = self
            .quiz
            .questions()
            .iter()
            .map(Question::id)
            .filter(|id| !self.answers.contains_key(id))
            .collect();
        SessionProgress {
            status: self.status,
            total: self.quiz.len(),
            answered: self.answers.len(),
            flagged: self.flagged.len(),
            unanswered,
            current_index: self.current_index,
            remaining_seconds: self.remaining_seconds,
        }
    }

    /// Per-question review for a graded attempt; `None` until a result exists.
    #[must_use]
    pub fn review(&self) -> Option<Vec<QuestionReview<'_>>> {
        let result = self.result.as_ref()?;
        Some(
            self.quiz
                .questions()
                .iter()
                .zip(&result.per_question)
                .map(|(question, outcome)| QuestionReview {
                    question,
                    outcome,
                    was_flagged: self.flagged.contains(&question.id()),
                })
                .collect(),
        )
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Apply one event to the session.
    ///
    /// # Errors
    ///
    /// - `InvalidQuiz` when starting a quiz without questions.
    /// - `AttemptsExhausted` when `start`/`restart` would exceed `max_attempts`.
    /// - `UnknownQuestion` when an event names a question outside the quiz.
    /// - `InvalidAnswer` when an answer does not fit its question.
    /// - `InvalidState` for learner actions outside a running attempt.
    ///
    /// `Tick` never fails; outside a running attempt it is ignored.
    pub fn apply(&mut self, event: SessionEvent) -> Result<Transition, SessionError> {
        if !matches!(
            event,
            SessionEvent::Start | SessionEvent::Restart | SessionEvent::Tick
        ) {
            self.require_in_progress(event.name())?;
        }

        match event {
            SessionEvent::Start => self.begin(),
            SessionEvent::Restart => self.reset_for_retry(),
            SessionEvent::Tick => Ok(self.count_down()),
            SessionEvent::Answer {
                question_id,
                answer,
            } => self.record_answer(question_id, answer),
            SessionEvent::ClearAnswer(id) => {
                self.require_question(id)?;
                self.answers.remove(&id);
                Ok(Transition::Updated)
            }
            SessionEvent::Flag(id) => {
                self.require_question(id)?;
                self.flagged.insert(id);
                Ok(Transition::Updated)
            }
            SessionEvent::Unflag(id) => {
                self.require_question(id)?;
                self.flagged.remove(&id);
                Ok(Transition::Updated)
            }
            SessionEvent::ToggleFlag(id) => {
                self.require_question(id)?;
                if !self.flagged.remove(&id) {
                    self.flagged.insert(id);
                }
                Ok(Transition::Updated)
            }
            SessionEvent::GoTo(index) => {
                self.current_index = index.min(self.last_index());
                Ok(Transition::Updated)
            }
            SessionEvent::Next => {
                self.current_index = self.current_index.saturating_add(1).min(self.last_index());
                Ok(Transition::Updated)
            }
            SessionEvent::Previous => {
                self.current_index = self.current_index.saturating_sub(1);
                Ok(Transition::Updated)
            }
            SessionEvent::Submit => Ok(self.finish(CompletionReason::Submitted)),
            SessionEvent::Abandon => Ok(self.finish(CompletionReason::Abandoned)),
        }
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn start(&mut self) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Start)
    }

    /// Record (or overwrite) the answer to a question. A blank answer clears it.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn answer(
        &mut self,
        question_id: QuestionId,
        answer: Answer,
    ) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Answer {
            question_id,
            answer,
        })
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn clear_answer(&mut self, id: QuestionId) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::ClearAnswer(id))
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn flag(&mut self, id: QuestionId) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Flag(id))
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn unflag(&mut self, id: QuestionId) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Unflag(id))
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn toggle_flag(&mut self, id: QuestionId) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::ToggleFlag(id))
    }

    /// Jump to a question; out-of-range indices clamp to the last question.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn go_to(&mut self, index: usize) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::GoTo(index))
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn next(&mut self) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Next)
    }

    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn previous(&mut self) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Previous)
    }

    /// Advance the countdown by one second, auto-submitting at zero.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` keeps the signature uniform with `apply`.
    pub fn tick(&mut self) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Tick)
    }

    /// Submit the attempt and return its graded result.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn submit(&mut self) -> Result<&QuizResult, SessionError> {
        let status = self.status;
        self.apply(SessionEvent::Submit)?;
        self.result.as_ref().ok_or(SessionError::InvalidState {
            action: "submit",
            status,
        })
    }

    /// Leave the attempt without grading. The attempt still counts.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn abandon(&mut self) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Abandon)
    }

    /// Return a completed session to not-started for another attempt.
    ///
    /// # Errors
    ///
    /// See [`QuizSession::apply`].
    pub fn restart(&mut self) -> Result<Transition, SessionError> {
        self.apply(SessionEvent::Restart)
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn last_index(&self) -> usize {
        self.quiz.len().saturating_sub(1)
    }

    fn require_in_progress(&self, action: &'static str) -> Result<(), SessionError> {
        if self.status == SessionStatus::InProgress {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                action,
                status: self.status,
            })
        }
    }

    fn require_question(&self, id: QuestionId) -> Result<&Question, SessionError> {
        self.quiz
            .question(id)
            .ok_or(SessionError::UnknownQuestion(id))
    }

    fn require_attempt_left(&self) -> Result<(), SessionError> {
        if self.attempts_used >= self.quiz.max_attempts() {
            return Err(SessionError::AttemptsExhausted {
                max_attempts: self.quiz.max_attempts(),
            });
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<Transition, SessionError> {
        if self.status != SessionStatus::NotStarted {
            return Err(SessionError::InvalidState {
                action: "start",
                status: self.status,
            });
        }
        if self.quiz.is_empty() {
            return Err(SessionError::InvalidQuiz);
        }
        self.require_attempt_left()?;

        self.clear_attempt_state();
        self.started_at = Some(self.clock.now());
        self.timer_armed = true;
        self.attempts_used += 1;
        self.status = SessionStatus::InProgress;

        log::info!(
            "quiz {} attempt {}/{} started ({}s limit)",
            self.quiz.id(),
            self.attempts_used,
            self.quiz.max_attempts(),
            self.remaining_seconds
        );
        Ok(Transition::Started)
    }

    fn record_answer(
        &mut self,
        question_id: QuestionId,
        answer: Answer,
    ) -> Result<Transition, SessionError> {
        let question = self.require_question(question_id)?;
        question
            .accepts(&answer)
            .map_err(|reason| SessionError::InvalidAnswer {
                question_id,
                reason,
            })?;

        if answer.is_blank() {
            self.answers.remove(&question_id);
        } else {
            self.answers.insert(question_id, answer);
        }
        Ok(Transition::Updated)
    }

    fn count_down(&mut self) -> Transition {
        if self.status != SessionStatus::InProgress || !self.timer_armed {
            log::debug!("tick ignored: session is {}", self.status);
            return Transition::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            return self.finish(CompletionReason::TimeExpired);
        }
        Transition::Ticked {
            remaining_seconds: self.remaining_seconds,
        }
    }

    fn finish(&mut self, reason: CompletionReason) -> Transition {
        self.timer_armed = false;
        self.status = SessionStatus::Completed;
        self.completed_at = Some(self.clock.now());
        self.completion = Some(reason);

        if reason.is_graded() {
            let time_spent = self
                .quiz
                .time_limit_seconds()
                .saturating_sub(self.remaining_seconds);
            let result = scoring::grade(&self.quiz, &self.answers, time_spent);
            log::info!(
                "quiz {} {}: {}/{} points ({}%), passed={}",
                self.quiz.id(),
                reason,
                result.score_earned,
                result.total_points,
                result.score_percent,
                result.passed
            );
            self.result = Some(result);
        } else {
            log::warn!(
                "quiz {} attempt {} abandoned with {}s left",
                self.quiz.id(),
                self.attempts_used,
                self.remaining_seconds
            );
        }

        Transition::Completed(reason)
    }

    fn reset_for_retry(&mut self) -> Result<Transition, SessionError> {
        if self.status != SessionStatus::Completed {
            return Err(SessionError::InvalidState {
                action: "restart",
                status: self.status,
            });
        }
        self.require_attempt_left()?;

        self.clear_attempt_state();
        self.status = SessionStatus::NotStarted;
        Ok(Transition::Restarted)
    }

    fn clear_attempt_state(&mut self) {
        self.answers.clear();
        self.flagged.clear();
        self.current_index = 0;
        self.remaining_seconds = self.quiz.time_limit_seconds();
        self.timer_armed = false;
        self.started_at = None;
        self.completed_at = None;
        self.completion = None;
        self.result = None;
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("quiz_id", &self.quiz.id())
            .field("status", &self.status)
            .field("answers_len", &self.answers.len())
            .field("flagged_len", &self.flagged.len())
            .field("current_index", &self.current_index)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("attempts_used", &self.attempts_used)
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}
