use quiz_core::model::{Attempt, LearnerId, QuizId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_attempt_row, map_attempt_row_with_id, result_to_json};
use crate::repository::{AttemptRepository, AttemptRow, StorageError};

fn storage_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &Attempt) -> Result<i64, StorageError> {
        let quiz_id = id_i64("quiz_id", attempt.quiz_id().value())?;
        let learner_id = id_i64("learner_id", attempt.learner_id().value())?;
        let result_json = result_to_json(attempt.result())?;

        let res = sqlx::query(
            r"
                INSERT INTO quiz_attempts (
                    quiz_id, learner_id, attempt_number, started_at, completed_at,
                    completion, score_percent, passed, result_json
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(quiz_id)
        .bind(learner_id)
        .bind(i64::from(attempt.attempt_number()))
        .bind(attempt.started_at())
        .bind(attempt.completed_at())
        .bind(attempt.completion().as_str())
        .bind(attempt.result().map(|r| i64::from(r.score_percent)))
        .bind(attempt.result().map(|r| r.passed))
        .bind(result_json)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: i64) -> Result<Attempt, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    quiz_id, learner_id, attempt_number, started_at, completed_at,
                    completion, result_json
                FROM quiz_attempts
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or(StorageError::NotFound)?;

        map_attempt_row(&row)
    }

    async fn count_attempts(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
    ) -> Result<u32, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r"
                SELECT COUNT(*)
                FROM quiz_attempts
                WHERE quiz_id = ?1 AND learner_id = ?2
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        u32::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("invalid attempt count: {count}")))
    }

    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<AttemptRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, quiz_id, learner_id, attempt_number, started_at, completed_at,
                    completion, result_json
                FROM quiz_attempts
                WHERE quiz_id = ?1 AND learner_id = ?2
                ORDER BY completed_at DESC, id DESC
                LIMIT ?3
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row_with_id(&row)?);
        }
        Ok(out)
    }
}
