use std::fmt;

use chrono::NaiveDate;
use koach_core::Clock;
use koach_core::goal::GoalInput;
use koach_core::model::{Book, BookId, PlanId};
use serde::Serialize;
use services::{CreatePlan, LogSession, PlanService};
use storage::repository::Storage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::{Config, prepare_sqlite_file};

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    ConflictingGoal,
    UnexpectedFlag {
        flag: &'static str,
        command: &'static str,
    },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::ConflictingGoal => {
                write!(f, "pass exactly one of --pages-per-day or --finish-by")
            }
            ArgsError::UnexpectedFlag { flag, command } => {
                write!(f, "{flag} is not accepted by {command}")
            }
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
    eprintln!("  koach add-book    --id <n> --title <text> --pages <n>");
    eprintln!(
        "  koach create-plan --book-id <n> (--pages-per-day <n> | --finish-by <YYYY-MM-DD>)"
    );
    eprintln!("                    [--start <YYYY-MM-DD>] [--title <text>] [--total-pages <n>]");
    eprintln!("  koach log         --book-id <n> [--plan-id <n>] --pages <n> [--minutes <n>]");
    eprintln!("                    [--notes <text>]");
    eprintln!("  koach show        --plan-id <n>");
    eprintln!("  koach sessions    --plan-id <n>");
    eprintln!("  koach pause       --plan-id <n>");
    eprintln!("  koach resume      --plan-id <n>");
    eprintln!("  koach list");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: sqlite://koach.sqlite3)");
    eprintln!("  --user <uuid>       Owner of created and listed plans");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  KOACH_DB_URL, KOACH_USER_ID, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    AddBook,
    CreatePlan,
    Log,
    Show,
    Sessions,
    Pause,
    Resume,
    List,
}

impl CommandKind {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "add-book" => Some(Self::AddBook),
            "create-plan" => Some(Self::CreatePlan),
            "log" => Some(Self::Log),
            "show" => Some(Self::Show),
            "sessions" => Some(Self::Sessions),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::AddBook => "add-book",
            Self::CreatePlan => "create-plan",
            Self::Log => "log",
            Self::Show => "show",
            Self::Sessions => "sessions",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::List => "list",
        }
    }
}

/// Flags as given on the command line, before per-command validation.
#[derive(Debug, Default)]
struct Flags {
    db: Option<String>,
    user: Option<String>,
    id: Option<String>,
    title: Option<String>,
    pages: Option<String>,
    book_id: Option<String>,
    plan_id: Option<String>,
    pages_per_day: Option<String>,
    finish_by: Option<String>,
    start: Option<String>,
    total_pages: Option<String>,
    minutes: Option<String>,
    notes: Option<String>,
}

impl Flags {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut flags = Self::default();
        while let Some(arg) = args.next() {
            let (slot, flag) = match arg.as_str() {
                "--db" => (&mut flags.db, "--db"),
                "--user" => (&mut flags.user, "--user"),
                "--id" => (&mut flags.id, "--id"),
                "--title" => (&mut flags.title, "--title"),
                "--pages" => (&mut flags.pages, "--pages"),
                "--book-id" => (&mut flags.book_id, "--book-id"),
                "--plan-id" => (&mut flags.plan_id, "--plan-id"),
                "--pages-per-day" => (&mut flags.pages_per_day, "--pages-per-day"),
                "--finish-by" => (&mut flags.finish_by, "--finish-by"),
                "--start" => (&mut flags.start, "--start"),
                "--total-pages" => (&mut flags.total_pages, "--total-pages"),
                "--minutes" => (&mut flags.minutes, "--minutes"),
                "--notes" => (&mut flags.notes, "--notes"),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            };
            *slot = Some(require_value(args, flag)?);
        }
        Ok(flags)
    }

    /// First command flag still set after the command took what it reads.
    /// `--db` and `--user` are global and never left over.
    fn first_unused(&self) -> Option<&'static str> {
        [
            (&self.id, "--id"),
            (&self.title, "--title"),
            (&self.pages, "--pages"),
            (&self.book_id, "--book-id"),
            (&self.plan_id, "--plan-id"),
            (&self.pages_per_day, "--pages-per-day"),
            (&self.finish_by, "--finish-by"),
            (&self.start, "--start"),
            (&self.total_pages, "--total-pages"),
            (&self.minutes, "--minutes"),
            (&self.notes, "--notes"),
        ]
        .into_iter()
        .find_map(|(value, flag)| value.is_some().then_some(flag))
    }
}

fn parse_opt<T: std::str::FromStr>(
    value: Option<String>,
    flag: &'static str,
) -> Result<Option<T>, ArgsError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ArgsError::InvalidValue { flag, raw })
        })
        .transpose()
}

fn parse_required<T: std::str::FromStr>(
    value: Option<String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    parse_opt(value, flag)?.ok_or(ArgsError::MissingFlag { flag })
}

#[derive(Debug)]
enum Command {
    AddBook {
        id: BookId,
        title: String,
        pages: u32,
    },
    CreatePlan {
        book_id: BookId,
        goal: GoalInput,
        start: Option<NaiveDate>,
        title: Option<String>,
        total_pages: Option<u32>,
    },
    Log(LogSession),
    Show(PlanId),
    Sessions(PlanId),
    Pause(PlanId),
    Resume(PlanId),
    List,
}

impl Command {
    fn build(kind: CommandKind, flags: &mut Flags) -> Result<Self, ArgsError> {
        let command = match kind {
            CommandKind::AddBook => Self::AddBook {
                id: parse_required(flags.id.take(), "--id")?,
                title: flags
                    .title
                    .take()
                    .ok_or(ArgsError::MissingFlag { flag: "--title" })?,
                pages: parse_required(flags.pages.take(), "--pages")?,
            },
            CommandKind::CreatePlan => {
                let pace = parse_opt::<i64>(flags.pages_per_day.take(), "--pages-per-day")?;
                let finish_by = parse_opt::<NaiveDate>(flags.finish_by.take(), "--finish-by")?;
                let goal = match (pace, finish_by) {
                    (Some(pace), None) => GoalInput::PagesPerDay(pace),
                    (None, Some(date)) => GoalInput::FinishBy(date),
                    _ => return Err(ArgsError::ConflictingGoal),
                };
                Self::CreatePlan {
                    book_id: parse_required(flags.book_id.take(), "--book-id")?,
                    goal,
                    start: parse_opt(flags.start.take(), "--start")?,
                    title: flags.title.take(),
                    total_pages: parse_opt(flags.total_pages.take(), "--total-pages")?,
                }
            }
            CommandKind::Log => Self::Log(LogSession {
                book_id: parse_required(flags.book_id.take(), "--book-id")?,
                plan_id: parse_opt(flags.plan_id.take(), "--plan-id")?,
                pages_read: parse_required(flags.pages.take(), "--pages")?,
                minutes_spent: parse_opt(flags.minutes.take(), "--minutes")?,
                notes: flags.notes.take(),
            }),
            CommandKind::Show => Self::Show(parse_required(flags.plan_id.take(), "--plan-id")?),
            CommandKind::Sessions => {
                Self::Sessions(parse_required(flags.plan_id.take(), "--plan-id")?)
            }
            CommandKind::Pause => Self::Pause(parse_required(flags.plan_id.take(), "--plan-id")?),
            CommandKind::Resume => {
                Self::Resume(parse_required(flags.plan_id.take(), "--plan-id")?)
            }
            CommandKind::List => Self::List,
        };
        Ok(command)
    }
}

fn parse_args(argv: Vec<String>) -> Result<(Command, Flags), ArgsError> {
    let mut iter = argv.into_iter();
    let first = iter.next().ok_or(ArgsError::MissingCommand)?;
    if matches!(first.as_str(), "--help" | "-h") {
        print_usage();
        std::process::exit(0);
    }
    let kind = CommandKind::from_arg(&first).ok_or(ArgsError::UnknownCommand(first))?;
    let mut flags = Flags::parse(&mut iter)?;
    let command = Command::build(kind, &mut flags)?;
    if let Some(flag) = flags.first_unused() {
        return Err(ArgsError::UnexpectedFlag {
            flag,
            command: kind.name(),
        });
    }
    Ok((command, flags))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(
    command: Command,
    config: &Config,
    storage: &Storage,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = PlanService::from_storage(Clock::system(), storage);

    match command {
        Command::AddBook { id, title, pages } => {
            let book = Book::new(id, title, pages)?;
            storage.books.upsert_book(&book).await?;
            print_json(&book)
        }
        Command::CreatePlan {
            book_id,
            goal,
            start,
            title,
            total_pages,
        } => {
            let plan = service
                .create_plan(CreatePlan {
                    user_id: config.user_id,
                    book_id,
                    total_pages,
                    start_date: start,
                    goal,
                    title,
                })
                .await?;
            print_json(&plan)
        }
        Command::Log(request) => print_json(&service.log_session(request).await?),
        Command::Show(plan_id) => print_json(&service.get_plan(plan_id).await?),
        Command::Sessions(plan_id) => print_json(&service.plan_sessions(plan_id).await?),
        Command::Pause(plan_id) => print_json(&service.pause_plan(plan_id).await?),
        Command::Resume(plan_id) => print_json(&service.resume_plan(plan_id).await?),
        Command::List => print_json(&service.list_plans(config.user_id).await?),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let (command, flags) = parse_args(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = Config::from_env()?;
    if let Some(db) = flags.db.as_deref() {
        config.set_db_url(db)?;
    }
    if let Some(user) = flags.user.as_deref() {
        config.set_user_id(user)?;
    }

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    prepare_sqlite_file(&config.db_url)?;
    let storage = Storage::sqlite(&config.db_url).await?;
    tracing::debug!(db = %config.db_url, user = %config.user_id, "storage ready");

    execute(command, &config, &storage).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
