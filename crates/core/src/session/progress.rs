use super::event::SessionStatus;
use crate::model::{Question, QuestionId, QuestionOutcome};

/// Snapshot of an attempt for rendering the question palette and clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub status: SessionStatus,
    pub total: usize,
    pub answered: usize,
    pub flagged: usize,
    pub unanswered: Vec<QuestionId>,
    pub current_index: usize,
    pub remaining_seconds: u32,
}

/// A question paired with how it was graded, for the post-attempt review screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionReview<'a> {
    pub question: &'a Question,
    pub outcome: &'a QuestionOutcome,
    pub was_flagged: bool,
}
