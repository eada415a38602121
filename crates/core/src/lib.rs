#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod scoring;
pub mod session;
pub mod time;

pub use error::Error;
pub use session::{QuizSession, SessionError, SessionEvent, SessionStatus, Transition};
pub use time::Clock;
