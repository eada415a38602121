use std::fmt;

use crate::model::{Answer, CompletionReason, QuestionId};

/// Lifecycle of a single attempt. Moves forward only, except `restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionStatus::NotStarted => "not started",
            SessionStatus::InProgress => "in progress",
            SessionStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Everything that can change a session: learner actions and timer ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Answer {
        question_id: QuestionId,
        answer: Answer,
    },
    ClearAnswer(QuestionId),
    Flag(QuestionId),
    Unflag(QuestionId),
    ToggleFlag(QuestionId),
    GoTo(usize),
    Next,
    Previous,
    Tick,
    Submit,
    Abandon,
    Restart,
}

impl SessionEvent {
    /// Short verb used in error messages and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start => "start",
            SessionEvent::Answer { .. } => "answer",
            SessionEvent::ClearAnswer(_) => "clear answer",
            SessionEvent::Flag(_) => "flag",
            SessionEvent::Unflag(_) => "unflag",
            SessionEvent::ToggleFlag(_) => "toggle flag",
            SessionEvent::GoTo(_) => "go to",
            SessionEvent::Next => "next",
            SessionEvent::Previous => "previous",
            SessionEvent::Tick => "tick",
            SessionEvent::Submit => "submit",
            SessionEvent::Abandon => "abandon",
            SessionEvent::Restart => "restart",
        }
    }
}

/// What an applied event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Attempt began; the countdown is armed.
    Started,
    /// In-progress state changed (answer, flag, navigation).
    Updated,
    /// Event was accepted but changed nothing, e.g. a tick outside a running attempt.
    Ignored,
    /// One second elapsed.
    Ticked { remaining_seconds: u32 },
    /// Attempt left the in-progress state; the countdown is released.
    Completed(CompletionReason),
    /// Completed attempt reset to not-started for another try.
    Restarted,
}

impl Transition {
    #[must_use]
    pub fn is_completion(self) -> bool {
        matches!(self, Transition::Completed(_))
    }
}
