mod config;
mod telemetry;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use exam_core::model::{OptionKey, PartKind, PartNumber, PromptId, ThemeId, UserId};
use services::{AppServices, Clock, ExamContent, ExamSession, SaveStatus, SubmitOutcome};

use crate::config::AppConfig;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidUser { raw: String },
    InvalidTheme { raw: String },
    InvalidPart { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidTheme { raw } => write!(f, "invalid --theme value: {raw}"),
            ArgsError::InvalidPart { raw } => write!(f, "invalid --part value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  exam grade   --exercise <file> --answers <file> --user <uuid> [--part <n>] [--give-up] [--db <sqlite_url>]"
    );
    eprintln!("  exam history --user <uuid> [--theme <id>] [--db <sqlite_url>]");
    eprintln!("  exam scores  --user <uuid> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Answers file: {{\"<part>\": {{\"<prompt>\": \"<option>\"}}}}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_CONFIG, EXAM_DB_URL, EXAM_LOG, EXAM_LOG_FORMAT");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Grade,
    History,
    Scores,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "grade" => Some(Self::Grade),
            "history" => Some(Self::History),
            "scores" => Some(Self::Scores),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: Option<String>,
    user: Option<UserId>,
    exercise: Option<PathBuf>,
    answers: Option<PathBuf>,
    part: Option<PartNumber>,
    theme: Option<ThemeId>,
    give_up: bool,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();

        while let Some(arg) = args.next() {
            match (cmd, arg.as_str()) {
                (_, "--db") => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(value);
                }
                (_, "--user") => {
                    let value = require_value(args, "--user")?;
                    let user = value
                        .parse::<UserId>()
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                    parsed.user = Some(user);
                }
                (Command::Grade, "--exercise") => {
                    parsed.exercise = Some(require_value(args, "--exercise")?.into());
                }
                (Command::Grade, "--answers") => {
                    parsed.answers = Some(require_value(args, "--answers")?.into());
                }
                (Command::Grade, "--part") => {
                    let value = require_value(args, "--part")?;
                    let part = value
                        .parse::<PartNumber>()
                        .map_err(|_| ArgsError::InvalidPart { raw: value.clone() })?;
                    parsed.part = Some(part);
                }
                (Command::Grade, "--give-up") => parsed.give_up = true,
                (Command::History, "--theme") => {
                    let value = require_value(args, "--theme")?;
                    let theme = value
                        .parse::<ThemeId>()
                        .map_err(|_| ArgsError::InvalidTheme { raw: value.clone() })?;
                    parsed.theme = Some(theme);
                }
                (_, "--help" | "-h") => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if parsed.user.is_none() {
            return Err(ArgsError::MissingFlag { flag: "--user" });
        }
        if cmd == Command::Grade {
            if parsed.exercise.is_none() {
                return Err(ArgsError::MissingFlag { flag: "--exercise" });
            }
            if parsed.answers.is_none() {
                return Err(ArgsError::MissingFlag { flag: "--answers" });
            }
        }
        Ok(parsed)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// `SQLite` refuses to open a missing file; create it (and its directory) first.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

type Answers = BTreeMap<PartNumber, BTreeMap<PromptId, OptionKey>>;

/// Feed recorded answers through the session, part by part.
fn apply_answers(
    session: &mut ExamSession,
    answers: &Answers,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = session.active_part();
    for (&number, entries) in answers {
        let kind = session
            .part(number)
            .map(exam_core::model::Part::kind)
            .ok_or(services::SessionError::UnknownPart(number))?;
        if number != session.active_part() && !session.switch_part(number)? {
            tracing::warn!(part = %number, "answers for a locked part ignored");
            continue;
        }
        for (&prompt, key) in entries {
            match kind {
                PartKind::Matching => session.assign(prompt, key.clone())?,
                PartKind::MultipleChoice => session.select(prompt, key.clone())?,
            };
        }
    }
    session.switch_part(start)?;
    Ok(())
}

fn print_outcome(content: &ExamContent, session: &ExamSession, outcome: &SubmitOutcome, ppq: u32) {
    println!("{} (exercise {})", content.title, content.exercise_id);
    for part in session.parts() {
        let Some(grade) = session.grade(part.number()) else {
            println!("{}: not graded", part.title());
            continue;
        };
        println!("{}: {}/{}", part.title(), grade.correct(), grade.total());
        for (prompt, correct) in grade.outcomes() {
            let given = session
                .mapping(part.number())
                .and_then(|m| m.get(prompt))
                .map_or("-", OptionKey::as_str);
            let mark = if correct { "correct" } else { "wrong" };
            match session.revealed_solution(part.number(), prompt) {
                Some(solution) => println!("  {:>3}  {given:<3} {mark} ({solution})", prompt.value()),
                None => println!("  {:>3}  {given:<3} {mark}", prompt.value()),
            }
        }
    }

    if let Some(score) = outcome.grade.as_ref().and_then(|g| g.score(ppq).ok()) {
        println!(
            "Score (part {}): {}/{}",
            outcome.part, score.obtained, score.possible
        );
    }
    match &outcome.save {
        SaveStatus::Saved(id) => println!("Saved attempt #{id}"),
        SaveStatus::Skipped => println!("Attempt not saved (nothing to track)"),
        SaveStatus::Failed { error, .. } => println!("Attempt not saved: {error}"),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next().as_deref() {
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

    let parsed = Args::parse(cmd, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = AppConfig::load()?;
    if let Some(url) = parsed.db_url.clone() {
        config.db_url = url;
    }
    let db_url = normalize_sqlite_url(config.db_url.clone());

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&db_url)?;
    let app = AppServices::new_sqlite(
        &db_url,
        Clock::system(),
        config.points_per_question,
        config.outbox_capacity,
    )
    .await?;

    let user = parsed.user.ok_or(ArgsError::MissingFlag { flag: "--user" })?;

    match cmd {
        Command::Grade => {
            let exercise = parsed
                .exercise
                .ok_or(ArgsError::MissingFlag { flag: "--exercise" })?;
            let answers = parsed
                .answers
                .ok_or(ArgsError::MissingFlag { flag: "--answers" })?;

            let content = ExamContent::from_path(&exercise)?;
            let answers: Answers = serde_json::from_str(&std::fs::read_to_string(&answers)?)?;

            let exam_loop = app.exam_loop();
            let mut session = exam_loop.start_session(
                content.parts.clone(),
                parsed.part,
                content.is_practice(),
                Some(content.tracking(user)),
            )?;
            apply_answers(&mut session, &answers)?;

            let outcome = if parsed.give_up {
                exam_loop.give_up(&mut session).await?
            } else {
                exam_loop.submit(&mut session).await?
            };
            print_outcome(&content, &session, &outcome, config.points_per_question);
        }
        Command::History => {
            let attempts = app.attempts();
            let items = match parsed.theme {
                Some(theme) => attempts.latest_theme_attempts(user, theme).await?,
                None => attempts.latest_practice_attempts(user).await?,
            };
            if items.is_empty() {
                println!("No attempts yet.");
            }
            for item in items {
                println!(
                    "#{:<4} exercise {:<4} part {:<3} {}/{} pts  {}",
                    item.id,
                    item.exercise_id.value(),
                    item.part_id.value(),
                    item.score.obtained,
                    item.score.possible,
                    item.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Scores => {
            let attempts = app.attempts();
            let themes = attempts.theme_scores(user).await?;
            let practice = attempts.practice_scores(user).await?;
            for (theme, score) in &themes {
                println!("theme {:<4} {}/{}", theme.value(), score.obtained, score.possible);
            }
            for (exercise, score) in &practice {
                println!(
                    "practice {:<4} {}/{}",
                    exercise.value(),
                    score.obtained,
                    score.possible
                );
            }
            if themes.is_empty() && practice.is_empty() {
                println!("No scores yet.");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> std::vec::IntoIter<String> {
        list.iter()
            .map(|s| (*s).to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn grade_requires_exercise_and_answers() {
        let user = UserId::random().to_string();
        let err = Args::parse(Command::Grade, &mut args(&["--user", user.as_str()])).unwrap_err();
        assert!(matches!(err, ArgsError::MissingFlag { flag: "--exercise" }));

        let parsed = Args::parse(
            Command::Grade,
            &mut args(&[
                "--user", user.as_str(), "--exercise", "e.json", "--answers", "a.json", "--part", "2",
                "--give-up",
            ]),
        )
        .unwrap();
        assert_eq!(parsed.part, Some(PartNumber::new(2)));
        assert!(parsed.give_up);
    }

    #[test]
    fn theme_flag_is_history_only() {
        let user = UserId::random().to_string();
        let err =
            Args::parse(Command::Scores, &mut args(&["--user", user.as_str(), "--theme", "1"])).unwrap_err();
        assert!(matches!(err, ArgsError::UnknownArg(_)));

        let parsed =
            Args::parse(Command::History, &mut args(&["--user", user.as_str(), "--theme", "3"])).unwrap();
        assert_eq!(parsed.theme, Some(ThemeId::new(3)));
    }

    #[test]
    fn bad_user_is_reported() {
        let err = Args::parse(Command::Scores, &mut args(&["--user", "nope"])).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidUser { .. }));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/exam.db".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/exam.db"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
