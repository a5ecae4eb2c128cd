use std::fmt;

use koach_core::model::{Book, BookId};
use storage::repository::Storage;
use storage::sqlite::{DEFAULT_DB_URL, normalize_sqlite_url};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    books: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidBooks { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidBooks { raw } => write!(f, "invalid --books value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("KOACH_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_URL.into());
        let mut books = std::env::var("KOACH_SEED_BOOKS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--books" => {
                    let value = require_value(&mut args, "--books")?;
                    books = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidBooks { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        // Resolve relative paths the same way the `koach` binary does.
        Ok(Self {
            db_url: normalize_sqlite_url(&db_url),
            books,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --books <n>         Number of catalogue books to upsert (default: 5)");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  KOACH_DB_URL, KOACH_SEED_BOOKS");
}

const SAMPLE_BOOKS: [(&str, u32); 5] = [
    ("Pride and Prejudice", 279),
    ("The Hobbit", 310),
    ("Frankenstein", 280),
    ("Norwegian Wood", 296),
    ("Untitled Manuscript", 0),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    for i in 0..args.books {
        let idx = (i as usize) % SAMPLE_BOOKS.len();
        let (title, pages) = SAMPLE_BOOKS[idx];
        let book = Book::new(BookId::new(u64::from(i + 1)), title, pages)?;
        storage.books.upsert_book(&book).await?;
    }

    println!("Seeded {} books into {}", args.books, args.db_url);

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
