use chrono::{DateTime, Utc};
use quiz_core::model::{CompletionReason, LearnerId, QuizId};
use storage::repository::AttemptRow;

/// Stored attempts for one learner on one quiz, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptHistory {
    pub quiz_id: QuizId,
    pub learner_id: LearnerId,
    /// Every stored attempt, including abandoned ones and those past `rows`' limit.
    pub attempts_used: u32,
    pub rows: Vec<AttemptRow>,
}

impl AttemptHistory {
    /// Highest graded score among the listed attempts.
    #[must_use]
    pub fn best_score_percent(&self) -> Option<u8> {
        self.rows
            .iter()
            .filter_map(|row| row.attempt.result())
            .map(|result| result.score_percent)
            .max()
    }

    #[must_use]
    pub fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        self.rows.first().map(|row| row.attempt.completed_at())
    }

    #[must_use]
    pub fn has_passed(&self) -> bool {
        self.rows.iter().any(|row| row.attempt.passed())
    }

    #[must_use]
    pub fn abandoned_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.attempt.completion() == CompletionReason::Abandoned)
            .count()
    }

    #[must_use]
    pub fn attempts_remaining(&self, max_attempts: u32) -> u32 {
        max_attempts.saturating_sub(self.attempts_used)
    }
}
