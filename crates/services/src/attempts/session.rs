use std::fmt;

use quiz_core::QuizSession;
use quiz_core::model::LearnerId;

/// A learner's live session plus the row id it was stored under, once stored.
///
/// Only [`crate::QuizAttemptService`] mutates the inner session, so the
/// completed attempt is persisted exactly once.
#[derive(Clone)]
pub struct AttemptSession {
    pub(crate) session: QuizSession,
    pub(crate) learner_id: LearnerId,
    pub(crate) attempt_id: Option<i64>,
}

impl AttemptSession {
    pub(crate) fn new(session: QuizSession, learner_id: LearnerId) -> Self {
        Self {
            session,
            learner_id,
            attempt_id: None,
        }
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    /// Row id of the stored attempt; `None` until the attempt completes and
    /// has been written.
    #[must_use]
    pub fn attempt_id(&self) -> Option<i64> {
        self.attempt_id
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    /// Completed but not yet written, e.g. after a storage failure.
    #[must_use]
    pub fn needs_finalize(&self) -> bool {
        self.is_complete() && self.attempt_id.is_none()
    }
}

impl fmt::Debug for AttemptSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptSession")
            .field("quiz_id", &self.session.quiz().id())
            .field("learner_id", &self.learner_id)
            .field("status", &self.session.status())
            .field("attempt_id", &self.attempt_id)
            .finish_non_exhaustive()
    }
}
