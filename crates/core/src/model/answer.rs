use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// A submitted or expected answer.
///
/// In JSON a plain string is a `Single` answer and an array is a `Multiple`
/// selection, so quiz banks read naturally:
/// `"correct_answer": "B"` or `"correct_answer": ["A", "C"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(String),
    Multiple(BTreeSet<String>),
}

impl Answer {
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    #[must_use]
    pub fn multiple<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multiple(values.into_iter().map(Into::into).collect())
    }

    /// True when nothing meaningful was entered (blank text or no selection).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Single(value) => value.trim().is_empty(),
            Answer::Multiple(values) => values.is_empty(),
        }
    }

    /// Iterates over every value carried by the answer.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let (single, multiple) = match self {
            Answer::Single(value) => (Some(value.as_str()), None),
            Answer::Multiple(values) => (None, Some(values.iter().map(String::as_str))),
        };
        single.into_iter().chain(multiple.into_iter().flatten())
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Single(value) => f.write_str(value),
            Answer::Multiple(values) => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(", "))
            }
        }
    }
}

/// Why a question refused an answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerRejection {
    #[error("expected a set of choices")]
    ExpectedSelection,

    #[error("expected a single value")]
    ExpectedSingleValue,

    #[error("`{0}` is not one of the options")]
    NotAnOption(String),
}
