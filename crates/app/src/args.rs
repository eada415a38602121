use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use quiz_core::model::{LearnerId, ParseIdError, QuizId};

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidId {
        flag: &'static str,
        raw: String,
        source: ParseIdError,
    },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw, source } => {
                write!(f, "invalid {flag} value {raw:?}: {source}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArgsError::InvalidId { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take    --quiz <file.json> [--quiz-id <id>] [--shuffle]");
    eprintln!("                               [--learner <id>] [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- history --quiz-id <id> [--quiz <file.json>]");
    eprintln!("                               [--learner <id>] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --learner 1");
    eprintln!("  --quiz-id first quiz in the file (take)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_FILE, QUIZ_LEARNER_ID, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Take,
    History,
}

impl Command {
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeArgs {
    pub db_url: String,
    pub quiz_file: PathBuf,
    pub quiz_id: Option<QuizId>,
    pub learner_id: LearnerId,
    pub shuffle: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryArgs {
    pub db_url: String,
    pub quiz_id: QuizId,
    pub learner_id: LearnerId,
    pub quiz_file: Option<PathBuf>,
}

/// Flags shared by both subcommands, with environment fallbacks applied.
#[derive(Debug, Default)]
struct Flags {
    db_url: Option<String>,
    quiz_file: Option<PathBuf>,
    quiz_id: Option<QuizId>,
    learner_id: Option<LearnerId>,
    shuffle: bool,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

/// `flag` names where the value came from: a flag or an environment variable.
fn parse_id<T>(flag: &'static str, raw: String) -> Result<T, ArgsError>
where
    T: FromStr<Err = ParseIdError>,
{
    raw.parse()
        .map_err(|source| ArgsError::InvalidId { flag, raw, source })
}

fn parse_flags(
    args: &mut impl Iterator<Item = String>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Flags, ArgsError> {
    let mut flags = Flags {
        db_url: env("QUIZ_DB_URL").map(normalize_sqlite_url),
        quiz_file: env("QUIZ_FILE").map(PathBuf::from),
        learner_id: env("QUIZ_LEARNER_ID")
            .map(|value| parse_id("QUIZ_LEARNER_ID", value))
            .transpose()?,
        ..Flags::default()
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let value = require_value(args, "--db")?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidDbUrl { raw: value });
                }
                flags.db_url = Some(normalize_sqlite_url(value));
            }
            "--quiz" => {
                flags.quiz_file = Some(PathBuf::from(require_value(args, "--quiz")?));
            }
            "--quiz-id" => {
                let value = require_value(args, "--quiz-id")?;
                flags.quiz_id = Some(parse_id("--quiz-id", value)?);
            }
            "--learner" => {
                let value = require_value(args, "--learner")?;
                flags.learner_id = Some(parse_id("--learner", value)?);
            }
            "--shuffle" => flags.shuffle = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    Ok(flags)
}

fn default_db_url() -> String {
    normalize_sqlite_url("sqlite:quiz.sqlite3".into())
}

impl TakeArgs {
    pub fn parse(
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let flags = parse_flags(args, env)?;
        Ok(Self {
            db_url: flags.db_url.unwrap_or_else(default_db_url),
            quiz_file: flags
                .quiz_file
                .ok_or(ArgsError::MissingFlag { flag: "--quiz" })?,
            quiz_id: flags.quiz_id,
            learner_id: flags.learner_id.unwrap_or(LearnerId::new(1)),
            shuffle: flags.shuffle,
        })
    }
}

impl HistoryArgs {
    pub fn parse(
        args: &mut impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let flags = parse_flags(args, env)?;
        Ok(Self {
            db_url: flags.db_url.unwrap_or_else(default_db_url),
            quiz_id: flags
                .quiz_id
                .ok_or(ArgsError::MissingFlag { flag: "--quiz-id" })?,
            learner_id: flags.learner_id.unwrap_or(LearnerId::new(1)),
            quiz_file: flags.quiz_file,
        })
    }
}

const MEMORY_URL: &str = "sqlite::memory:";

/// Turn `--db` input into an absolute `sqlite://` URL. Bare paths and
/// relative `sqlite:` paths resolve against the working directory.
pub fn normalize_sqlite_url(raw: String) -> String {
    let raw = raw.trim();
    if raw == MEMORY_URL || raw.starts_with("sqlite://") {
        return raw.to_string();
    }

    let path = Path::new(raw.strip_prefix("sqlite:").unwrap_or(raw));
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    format!("sqlite://{}", path.display())
}

/// SQLite will not create a missing file on connect; make it and its directory.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == MEMORY_URL {
        return Ok(());
    }

    let invalid = || ArgsError::InvalidDbUrl {
        raw: db_url.to_string(),
    };
    let location = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = Path::new(location.split_once('?').map_or(location, |(path, _)| path));
    if path.as_os_str().is_empty() {
        return Err(invalid().into());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_string()).collect::<Vec<_>>().into_iter()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn take_requires_quiz_file() {
        let err = TakeArgs::parse(&mut argv(&["--learner", "4"]), no_env).unwrap_err();
        assert!(matches!(err, ArgsError::MissingFlag { flag: "--quiz" }));
    }

    #[test]
    fn take_reads_flags() {
        let args = TakeArgs::parse(
            &mut argv(&[
                "--quiz",
                "bank.json",
                "--quiz-id",
                "12",
                "--learner",
                "4",
                "--db",
                "sqlite::memory:",
                "--shuffle",
            ]),
            no_env,
        )
        .unwrap();
        assert_eq!(args.quiz_file, PathBuf::from("bank.json"));
        assert_eq!(args.quiz_id, Some(QuizId::new(12)));
        assert_eq!(args.learner_id, LearnerId::new(4));
        assert_eq!(args.db_url, "sqlite::memory:");
        assert!(args.shuffle);
    }

    #[test]
    fn env_fills_missing_flags() {
        let env = |key: &str| match key {
            "QUIZ_FILE" => Some("from_env.json".to_string()),
            "QUIZ_LEARNER_ID" => Some(" 9 ".to_string()),
            "QUIZ_DB_URL" => Some("sqlite:///tmp/quiz.db".to_string()),
            _ => None,
        };
        let args = TakeArgs::parse(&mut argv(&[]), env).unwrap();
        assert_eq!(args.quiz_file, PathBuf::from("from_env.json"));
        assert_eq!(args.learner_id, LearnerId::new(9));
        assert_eq!(args.db_url, "sqlite:///tmp/quiz.db");
    }

    #[test]
    fn history_requires_quiz_id() {
        let err = HistoryArgs::parse(&mut argv(&[]), no_env).unwrap_err();
        assert!(matches!(err, ArgsError::MissingFlag { flag: "--quiz-id" }));

        let err = HistoryArgs::parse(&mut argv(&["--quiz-id", "x"]), no_env).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidId { flag: "--quiz-id", .. }));
    }

    #[test]
    fn ids_parse_through_the_id_types() {
        let args = HistoryArgs::parse(&mut argv(&["--quiz-id", " 7 ", "--learner", "3"]), no_env)
            .unwrap();
        assert_eq!(args.quiz_id, QuizId::new(7));
        assert_eq!(args.learner_id, LearnerId::new(3));

        let err = TakeArgs::parse(&mut argv(&["--quiz", "q.json", "--learner", "-1"]), no_env)
            .unwrap_err();
        let ArgsError::InvalidId { flag, raw, source } = &err else {
            panic!("expected an id error, got {err:?}");
        };
        assert_eq!((*flag, raw.as_str()), ("--learner", "-1"));
        assert_eq!(source, &"-1".parse::<LearnerId>().unwrap_err());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn malformed_learner_env_is_an_error() {
        let env = |key: &str| (key == "QUIZ_LEARNER_ID").then(|| "nine".to_string());
        let err = TakeArgs::parse(&mut argv(&["--quiz", "q.json"]), env).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidId { flag: "QUIZ_LEARNER_ID", .. }));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = TakeArgs::parse(&mut argv(&["--verbose"]), no_env).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownArg(arg) if arg == "--verbose"));
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/quiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.sqlite3"));
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
    }

    #[test]
    fn prepare_rejects_non_file_urls() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
        assert!(prepare_sqlite_file("postgres://db").is_err());
        assert!(prepare_sqlite_file("sqlite://?mode=rwc").is_err());
    }
}
