use async_trait::async_trait;
use quiz_core::model::{Attempt, LearnerId, QuizId};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored attempt paired with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRow {
    pub id: i64,
    pub attempt: Attempt,
}

impl AttemptRow {
    #[must_use]
    pub fn new(id: i64, attempt: Attempt) -> Self {
        Self { id, attempt }
    }
}

/// Repository contract for finished quiz attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist a finished attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner already has an attempt
    /// with the same number for this quiz, or other storage errors.
    async fn append_attempt(&self, attempt: &Attempt) -> Result<i64, StorageError>;

    /// Fetch an attempt by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError>;

    /// Number of attempts (graded or abandoned) a learner has made on a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the count cannot be read.
    async fn count_attempts(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
    ) -> Result<u32, StorageError>;

    /// Most recent attempts first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be read or mapped.
    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &Attempt) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let duplicate = guard.iter().any(|row| {
            row.attempt.quiz_id() == attempt.quiz_id()
                && row.attempt.learner_id() == attempt.learner_id()
                && row.attempt.attempt_number() == attempt.attempt_number()
        });
        if duplicate {
            return Err(StorageError::Conflict);
        }
        let id = guard.last().map_or(1, |row| row.id + 1);
        guard.push(AttemptRow::new(id, attempt.clone()));
        Ok(id)
    }

    async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.attempt.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn count_attempts(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
    ) -> Result<u32, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let count = guard
            .iter()
            .filter(|row| {
                row.attempt.quiz_id() == quiz_id && row.attempt.learner_id() == learner_id
            })
            .count();
        u32::try_from(count)
            .map_err(|_| StorageError::Serialization("attempt count overflow".into()))
    }

    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<AttemptRow> = guard
            .iter()
            .filter(|row| {
                row.attempt.quiz_id() == quiz_id && row.attempt.learner_id() == learner_id
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.attempt
                .completed_at()
                .cmp(&a.attempt.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let attempts: Arc<dyn AttemptRepository> = Arc::new(InMemoryRepository::new());
        Self { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::CompletionReason;
    use quiz_core::time::fixed_now;

    fn abandoned(quiz: u64, learner: u64, number: u32, minutes: i64) -> Attempt {
        let started = fixed_now() + Duration::minutes(minutes);
        Attempt::from_persisted(
            QuizId::new(quiz),
            LearnerId::new(learner),
            number,
            started,
            started + Duration::seconds(30),
            CompletionReason::Abandoned,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn counts_per_quiz_and_learner() {
        let repo = InMemoryRepository::new();
        repo.append_attempt(&abandoned(1, 1, 1, 0)).await.unwrap();
        repo.append_attempt(&abandoned(1, 1, 2, 5)).await.unwrap();
        repo.append_attempt(&abandoned(1, 2, 1, 0)).await.unwrap();
        repo.append_attempt(&abandoned(2, 1, 1, 0)).await.unwrap();

        let count = repo
            .count_attempts(QuizId::new(1), LearnerId::new(1))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn lists_newest_first_with_limit() {
        let repo = InMemoryRepository::new();
        let first = repo.append_attempt(&abandoned(1, 1, 1, 0)).await.unwrap();
        let second = repo.append_attempt(&abandoned(1, 1, 2, 10)).await.unwrap();

        let rows = repo
            .list_attempts(QuizId::new(1), LearnerId::new(1), 1)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, second);
        assert_ne!(rows[0].id, first);
    }

    #[tokio::test]
    async fn rejects_duplicate_attempt_number() {
        let repo = InMemoryRepository::new();
        repo.append_attempt(&abandoned(1, 1, 1, 0)).await.unwrap();
        let err = repo.append_attempt(&abandoned(1, 1, 1, 3)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn missing_attempt_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.get_attempt(42).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
