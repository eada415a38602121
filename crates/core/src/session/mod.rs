mod event;
mod progress;
mod state;


pub use event::{SessionEvent, SessionStatus, Transition};
pub use progress::{QuestionReview, SessionProgress};
pub use state::{QuizSession, SessionError};
