#![forbid(unsafe_code)]

pub mod attempts;
pub mod driver;
pub mod error;
pub mod timer;

pub use quiz_core::Clock;

pub use attempts::{AttemptHistory, AttemptSession, AttemptUpdate, QuizAttemptService};
pub use driver::{DriverUpdate, QuizDriver};
pub use error::AttemptServiceError;
pub use timer::CountdownTimer;
