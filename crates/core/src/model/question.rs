use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::answer::{Answer, AnswerRejection};
use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {0}: prompt cannot be empty")]
    EmptyPrompt(QuestionId),

    #[error("question {0}: points must be > 0")]
    ZeroPoints(QuestionId),

    #[error("question {id}: {kind} questions need at least two options")]
    TooFewOptions { id: QuestionId, kind: QuestionKind },

    #[error("question {id}: duplicate option `{option}`")]
    DuplicateOption { id: QuestionId, option: String },

    #[error("question {id}: {kind} questions do not take options")]
    UnexpectedOptions { id: QuestionId, kind: QuestionKind },

    #[error("question {0}: correct answer cannot be empty")]
    EmptyCorrectAnswer(QuestionId),

    #[error("question {id}: correct answer has the wrong shape for {kind}")]
    CorrectAnswerShape { id: QuestionId, kind: QuestionKind },

    #[error("question {id}: correct answer `{value}` is not one of the options")]
    CorrectAnswerNotAnOption { id: QuestionId, value: String },
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// How a question is presented and graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
    TrueFalse,
    ShortText,
    Essay,
}

impl QuestionKind {
    /// Multi-choice is the only kind answered with a set.
    #[must_use]
    pub fn expects_selection(self) -> bool {
        matches!(self, QuestionKind::MultiChoice)
    }

    /// Kinds whose answers must come from the option list.
    #[must_use]
    pub fn uses_options(self) -> bool {
        matches!(
            self,
            QuestionKind::SingleChoice | QuestionKind::MultiChoice | QuestionKind::TrueFalse
        )
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionKind::SingleChoice => "single-choice",
            QuestionKind::MultiChoice => "multi-choice",
            QuestionKind::TrueFalse => "true/false",
            QuestionKind::ShortText => "short-text",
            QuestionKind::Essay => "essay",
        };
        f.write_str(label)
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

fn default_points() -> u32 {
    1
}

/// Unvalidated question as it appears in a quiz bank file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: Answer,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl QuestionDraft {
    /// Validate the draft into an immutable `Question`.
    ///
    /// True/false questions without options get `True`/`False`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt, points, options or correct
    /// answer do not fit the question kind.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = self.id;
        let kind = self.kind;

        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt(id));
        }
        if self.points == 0 {
            return Err(QuestionError::ZeroPoints(id));
        }

        let options = match kind {
            QuestionKind::TrueFalse if self.options.is_empty() => {
                vec!["True".to_owned(), "False".to_owned()]
            }
            QuestionKind::ShortText | QuestionKind::Essay if !self.options.is_empty() => {
                return Err(QuestionError::UnexpectedOptions { id, kind });
            }
            _ => self.options,
        };

        if kind.uses_options() {
            if options.len() < 2 {
                return Err(QuestionError::TooFewOptions { id, kind });
            }
            let mut seen = HashSet::with_capacity(options.len());
            for option in &options {
                if !seen.insert(option.as_str()) {
                    return Err(QuestionError::DuplicateOption {
                        id,
                        option: option.clone(),
                    });
                }
            }
        }

        if self.correct_answer.is_blank() {
            return Err(QuestionError::EmptyCorrectAnswer(id));
        }
        let shape_fits = match &self.correct_answer {
            Answer::Multiple(_) => kind.expects_selection(),
            Answer::Single(_) => !kind.expects_selection(),
        };
        if !shape_fits {
            return Err(QuestionError::CorrectAnswerShape { id, kind });
        }
        if kind.uses_options() {
            if let Some(value) = self
                .correct_answer
                .values()
                .find(|value| !options.iter().any(|option| option == value))
            {
                return Err(QuestionError::CorrectAnswerNotAnOption {
                    id,
                    value: value.to_owned(),
                });
            }
        }

        Ok(Question {
            id,
            prompt: self.prompt,
            kind,
            options,
            correct_answer: self.correct_answer,
            points: self.points,
            explanation: self.explanation.filter(|text| !text.trim().is_empty()),
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A validated quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    kind: QuestionKind,
    options: Vec<String>,
    correct_answer: Answer,
    points: u32,
    explanation: Option<String>,
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &Answer {
        &self.correct_answer
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Checks that a user answer has the right shape and, for choice kinds,
    /// only names listed options. A blank answer of the right shape is
    /// accepted for every kind; it clears the stored answer.
    ///
    /// # Errors
    ///
    /// Returns `AnswerRejection` describing the mismatch.
    pub fn accepts(&self, answer: &Answer) -> Result<(), AnswerRejection> {
        match (answer, self.kind.expects_selection()) {
            (Answer::Single(_), true) => return Err(AnswerRejection::ExpectedSelection),
            (Answer::Multiple(_), false) => return Err(AnswerRejection::ExpectedSingleValue),
            _ => {}
        }
        if answer.is_blank() {
            return Ok(());
        }
        if self.kind.uses_options() {
            if let Some(value) = answer
                .values()
                .find(|value| !self.options.iter().any(|option| option == value))
            {
                return Err(AnswerRejection::NotAnOption(value.to_owned()));
            }
        }
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
