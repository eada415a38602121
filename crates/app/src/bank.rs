//! Quiz bank files: a single quiz object or an array of them.

use std::fmt;
use std::path::{Path, PathBuf};

use quiz_core::model::{Quiz, QuizId};
use serde_json::Value;

#[derive(Debug)]
pub enum BankError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Empty { path: PathBuf },
    NotFound { path: PathBuf, quiz_id: QuizId },
}

impl fmt::Display for BankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankError::Read { path, source } => {
                write!(f, "cannot read quiz bank {}: {source}", path.display())
            }
            BankError::Parse { path, source } => {
                write!(f, "invalid quiz bank {}: {source}", path.display())
            }
            BankError::Empty { path } => write!(f, "quiz bank {} has no quizzes", path.display()),
            BankError::NotFound { path, quiz_id } => {
                write!(f, "quiz {quiz_id} not found in {}", path.display())
            }
        }
    }
}

impl std::error::Error for BankError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BankError::Read { source, .. } => Some(source),
            BankError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parse every quiz in a bank. Each quiz is validated while deserializing.
///
/// # Errors
///
/// Returns `BankError::Parse` for malformed JSON or an invalid quiz.
pub fn parse_bank(path: &Path, raw: &str) -> Result<Vec<Quiz>, BankError> {
    let parse_err = |source| BankError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let value: Value = serde_json::from_str(raw).map_err(parse_err)?;
    if value.is_array() {
        serde_json::from_value(value).map_err(parse_err)
    } else {
        serde_json::from_value(value).map(|quiz| vec![quiz]).map_err(parse_err)
    }
}

/// Load one quiz from a bank file: the requested id, or the first quiz.
///
/// # Errors
///
/// Returns `BankError` when the file cannot be read or parsed, is empty, or
/// lacks the requested quiz.
pub fn load_quiz(path: &Path, quiz_id: Option<QuizId>) -> Result<Quiz, BankError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BankError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let quizzes = parse_bank(path, &raw)?;
    log::debug!("loaded {} quiz(zes) from {}", quizzes.len(), path.display());

    match quiz_id {
        Some(id) => quizzes
            .into_iter()
            .find(|quiz| quiz.id() == id)
            .ok_or_else(|| BankError::NotFound {
                path: path.to_path_buf(),
                quiz_id: id,
            }),
        None => quizzes.into_iter().next().ok_or_else(|| BankError::Empty {
            path: path.to_path_buf(),
        }),
    }
}
