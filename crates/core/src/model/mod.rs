mod answer;
mod attempt;
mod ids;
mod question;
mod quiz;
mod result;

pub use answer::{Answer, AnswerRejection};
pub use attempt::{Attempt, AttemptError};
pub use ids::{LearnerId, ParseIdError, QuestionId, QuizId};
pub use question::{Question, QuestionDraft, QuestionError, QuestionKind};
pub use quiz::{Quiz, QuizDraft, QuizError};
pub use result::{CompletionReason, QuestionOutcome, QuizResult};
