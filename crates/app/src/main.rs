mod args;
mod bank;
mod terminal;

use std::io::BufRead;
use std::sync::Arc;

use quiz_core::model::Quiz;
use services::{Clock, QuizAttemptService, QuizDriver};
use storage::repository::Storage;
use tokio::sync::mpsc;

use args::{ArgsError, Command, HistoryArgs, TakeArgs, prepare_sqlite_file, print_usage};

const HISTORY_LIMIT: u32 = 50;

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn usage_error(err: ArgsError) -> ArgsError {
    eprintln!("{err}");
    print_usage();
    err
}

/// Connect and migrate; only the binary knows about SQLite.
async fn open_storage(db_url: &str) -> Result<Storage, Box<dyn std::error::Error>> {
    prepare_sqlite_file(db_url)?;
    Ok(Storage::sqlite(db_url).await?)
}

/// Read stdin on a plain thread; a blocked read must not hold up runtime shutdown.
fn spawn_stdin_reader(lines: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if lines.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

fn print_intro(quiz: &Quiz, attempt_number: u32) {
    println!(
        "{}: {} question(s), {} point(s), {} to finish, pass at {}%",
        quiz.title(),
        quiz.len(),
        quiz.total_points(),
        terminal::format_clock(quiz.time_limit_seconds()),
        quiz.passing_score_percent()
    );
    println!("attempt {attempt_number} of {}", quiz.max_attempts());
    println!("{}", terminal::HELP);
}

async fn take(args: TakeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let quiz = Arc::new(bank::load_quiz(&args.quiz_file, args.quiz_id)?);
    let storage = open_storage(&args.db_url).await?;
    let service = QuizAttemptService::new(Clock::system(), Arc::clone(&storage.attempts))
        .with_shuffle_questions(args.shuffle);

    let attempt = service.start_attempt(quiz, args.learner_id).await?;
    let quiz = Arc::clone(attempt.session().quiz());
    let progress = attempt.session().progress();
    print_intro(&quiz, attempt.session().attempts_used());

    let (lines_tx, lines_rx) = mpsc::channel(16);
    let (events_tx, events_rx) = mpsc::channel(16);
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    spawn_stdin_reader(lines_tx);

    let console = tokio::spawn(terminal::console(
        quiz,
        lines_rx,
        events_tx,
        updates_rx,
        progress,
    ));
    let mut attempt = QuizDriver::new(service.clone(), attempt)
        .with_updates(updates_tx)
        .run(events_rx)
        .await;
    console.await?;

    if attempt.needs_finalize() {
        service.finalize(&mut attempt).await?;
    }

    let session = attempt.session();
    match session.result() {
        Some(result) => {
            terminal::render_result(result);
            println!();
            terminal::render_review(session);
        }
        None => println!("attempt abandoned; it still counts toward the limit"),
    }
    println!("attempts remaining: {}", session.attempts_remaining());
    Ok(())
}

async fn history(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let max_attempts = args
        .quiz_file
        .as_deref()
        .map(|path| bank::load_quiz(path, Some(args.quiz_id)))
        .transpose()?
        .map(|quiz| quiz.max_attempts());

    let storage = open_storage(&args.db_url).await?;
    let service = QuizAttemptService::new(Clock::system(), Arc::clone(&storage.attempts));
    let history = service
        .history(args.quiz_id, args.learner_id, HISTORY_LIMIT)
        .await?;

    if history.rows.is_empty() {
        println!(
            "no attempts on quiz {} by learner {}",
            history.quiz_id, history.learner_id
        );
        return Ok(());
    }

    for row in &history.rows {
        let attempt = &row.attempt;
        let score = attempt.result().map_or_else(
            || "-".to_string(),
            |result| {
                format!(
                    "{}% {}",
                    result.score_percent,
                    if result.passed { "passed" } else { "failed" }
                )
            },
        );
        println!(
            "#{:<3} {}  {:<12} {score}",
            attempt.attempt_number(),
            attempt.completed_at(),
            attempt.completion().as_str()
        );
    }

    println!();
    println!("attempts used: {}", history.attempts_used);
    if let Some(max_attempts) = max_attempts {
        println!(
            "attempts remaining: {}",
            history.attempts_remaining(max_attempts)
        );
    }
    if let Some(best) = history.best_score_percent() {
        println!("best score: {best}%");
    }
    if history.has_passed() {
        println!("passed at least once");
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    match cmd {
        Command::Take => take(TakeArgs::parse(&mut iter, env_var).map_err(usage_error)?).await,
        Command::History => {
            history(HistoryArgs::parse(&mut iter, env_var).map_err(usage_error)?).await
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        // Errors propagate untouched up to here and are reported once.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
