use quiz_core::model::{Attempt, CompletionReason, LearnerId, QuizId, QuizResult};
use sqlx::Row;

use crate::repository::{AttemptRow, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn parse_completion(s: &str) -> Result<CompletionReason, StorageError> {
    s.parse::<CompletionReason>()
        .map_err(StorageError::Serialization)
}

/// Serializes the graded result; abandoned attempts store `NULL`.
pub(crate) fn result_to_json(result: Option<&QuizResult>) -> Result<Option<String>, StorageError> {
    result.map(|r| serde_json::to_string(r).map_err(ser)).transpose()
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let attempt_number = row.try_get::<i64, _>("attempt_number").map_err(ser)?;
    let attempt_number = u32::try_from(attempt_number).map_err(|_| {
        StorageError::Serialization(format!("invalid attempt_number: {attempt_number}"))
    })?;
    let completion = parse_completion(&row.try_get::<String, _>("completion").map_err(ser)?)?;
    let result = row
        .try_get::<Option<String>, _>("result_json")
        .map_err(ser)?
        .map(|json| serde_json::from_str::<QuizResult>(&json).map_err(ser))
        .transpose()?;

    Attempt::from_persisted(
        quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        attempt_number,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
        completion,
        result,
    )
    .map_err(ser)
}

pub(crate) fn map_attempt_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<AttemptRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    Ok(AttemptRow::new(id, map_attempt_row(row)?))
}
