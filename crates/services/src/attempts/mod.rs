mod history;
mod service;
mod session;

pub use history::AttemptHistory;
pub use service::{AttemptUpdate, QuizAttemptService};
pub use session::AttemptSession;
