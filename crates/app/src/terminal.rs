//! Line-oriented terminal front end for a running attempt.

use std::sync::Arc;

use tokio::sync::mpsc;

use quiz_core::model::{Answer, Question, QuestionKind, Quiz, QuizResult};
use quiz_core::session::SessionProgress;
use quiz_core::{QuizSession, SessionEvent, Transition};
use services::DriverUpdate;

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    GoTo(usize),
    Answer(String),
    Clear,
    Flag,
    Submit,
    Abandon,
    Help,
}

pub const HELP: &str = "\
commands:
  n            next question
  p            previous question
  g <k>        go to question k
  a <value>    answer (option text or number; comma-separate for multi-choice)
  c            clear answer
  f            flag / unflag
  s            submit
  x            abandon
  ?            help and progress";

/// # Errors
///
/// Returns a message for blank, unknown, or incomplete commands.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "n" => Ok(Command::Next),
        "p" => Ok(Command::Previous),
        "g" => rest
            .parse::<usize>()
            .ok()
            .filter(|k| *k >= 1)
            .map(|k| Command::GoTo(k - 1))
            .ok_or_else(|| format!("expected a question number, got {rest:?}")),
        "a" if rest.is_empty() => Err("a needs a value; use c to clear".into()),
        "a" => Ok(Command::Answer(rest.to_string())),
        "c" => Ok(Command::Clear),
        "f" => Ok(Command::Flag),
        "s" => Ok(Command::Submit),
        "x" => Ok(Command::Abandon),
        "?" => Ok(Command::Help),
        "" => Err("empty command; ? for help".into()),
        other => Err(format!("unknown command {other:?}; ? for help")),
    }
}

/// Map one typed value to option text: exact text wins, then a 1-based number.
fn resolve_option(question: &Question, raw: &str) -> String {
    if question.options().iter().any(|option| option == raw) {
        return raw.to_string();
    }
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| question.options().get(i))
        .map_or_else(|| raw.to_string(), Clone::clone)
}

/// Build the answer for a question from what the learner typed.
#[must_use]
pub fn answer_for(question: &Question, raw: &str) -> Answer {
    match question.kind() {
        QuestionKind::MultiChoice => Answer::multiple(
            raw.split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| resolve_option(question, value)),
        ),
        kind if kind.uses_options() => Answer::single(resolve_option(question, raw)),
        _ => Answer::single(raw),
    }
}

impl Command {
    /// Session event for this command, relative to the question on screen.
    /// `None` for commands handled locally.
    #[must_use]
    pub fn into_event(self, current: Option<&Question>) -> Option<SessionEvent> {
        match self {
            Command::Next => Some(SessionEvent::Next),
            Command::Previous => Some(SessionEvent::Previous),
            Command::GoTo(index) => Some(SessionEvent::GoTo(index)),
            Command::Answer(raw) => current.map(|question| SessionEvent::Answer {
                question_id: question.id(),
                answer: answer_for(question, &raw),
            }),
            Command::Clear => current.map(|question| SessionEvent::ClearAnswer(question.id())),
            Command::Flag => current.map(|question| SessionEvent::ToggleFlag(question.id())),
            Command::Submit => Some(SessionEvent::Submit),
            Command::Abandon => Some(SessionEvent::Abandon),
            Command::Help => None,
        }
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn clock_worth_showing(remaining: u32) -> bool {
    remaining <= 10 || remaining % 60 == 0
}

pub fn render_question(quiz: &Quiz, progress: &SessionProgress) {
    let Some(question) = quiz.question_at(progress.current_index) else {
        return;
    };
    println!();
    println!(
        "[{}/{}] {} ({}, {} pt)  {} left",
        progress.current_index + 1,
        progress.total,
        question.prompt(),
        question.kind(),
        question.points(),
        format_clock(progress.remaining_seconds)
    );
    for (i, option) in question.options().iter().enumerate() {
        println!("  {}. {option}", i + 1);
    }
}

pub fn render_result(result: &QuizResult) {
    println!();
    println!(
        "score {}/{} ({}%): {}",
        result.score_earned,
        result.total_points,
        result.score_percent,
        if result.passed { "PASSED" } else { "not passed" }
    );
    println!(
        "{} of {} correct, {} unanswered, time {}",
        result.correct_count,
        result.total_questions,
        result.unanswered_count(),
        format_clock(result.time_spent_seconds)
    );
}

pub fn render_review(session: &QuizSession) {
    let Some(review) = session.review() else {
        return;
    };
    for (i, item) in review.iter().enumerate() {
        let mark = if item.outcome.is_correct { "ok " } else { "   " };
        let flag = if item.was_flagged { " [flagged]" } else { "" };
        let given = item
            .outcome
            .user_answer
            .as_ref()
            .map_or_else(|| "(unanswered)".to_string(), ToString::to_string);
        println!("{mark}{}. {}{flag}", i + 1, item.question.prompt());
        println!(
            "      yours: {given}  correct: {}",
            item.question.correct_answer()
        );
        if let Some(explanation) = item.question.explanation() {
            println!("      {explanation}");
        }
    }
}

//
// ─── CONSOLE ───────────────────────────────────────────────────────────────────
//

/// Feed typed commands to the driver and print its updates.
///
/// Returns when input ends (which closes the event channel and so abandons
/// a running attempt) or when the driver stops sending updates.
pub async fn console(
    quiz: Arc<Quiz>,
    mut lines: mpsc::Receiver<String>,
    events: mpsc::Sender<SessionEvent>,
    mut updates: mpsc::UnboundedReceiver<DriverUpdate>,
    mut progress: SessionProgress,
) {
    render_question(&quiz, &progress);

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                if command == Command::Help {
                    println!("{HELP}");
                    println!(
                        "answered {}/{}, flagged {}, {} left",
                        progress.answered,
                        progress.total,
                        progress.flagged,
                        format_clock(progress.remaining_seconds)
                    );
                    continue;
                }
                let current = quiz.question_at(progress.current_index);
                if let Some(event) = command.into_event(current) {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            }
            update = updates.recv() => {
                let Some(update) = update else { break };
                match update {
                    DriverUpdate::Applied { transition, progress: next, .. } => {
                        let moved = next.current_index != progress.current_index;
                        progress = next;
                        match transition {
                            Transition::Ticked { remaining_seconds } => {
                                if clock_worth_showing(remaining_seconds) {
                                    println!("{} left", format_clock(remaining_seconds));
                                }
                            }
                            Transition::Completed(reason) => {
                                println!("attempt {reason}");
                                break;
                            }
                            Transition::Updated if moved => render_question(&quiz, &progress),
                            Transition::Updated => println!("ok"),
                            _ => {}
                        }
                    }
                    DriverUpdate::Rejected { error, .. } => println!("{error}"),
                    DriverUpdate::StoreFailed(message) => {
                        println!("could not save this attempt: {message}");
                    }
                }
            }
        }
    }
}
