//! plata - Command-line interface for the Plata finance tracker

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use plata_core::db::{Database, EntryRepository, LibSqlEntryRepository};
use plata_core::export::{render_entries_export, suggested_export_file_name, ExportFormat};
use plata_core::models::{debt_installments, now_ms};
use plata_core::remote::{GistRemote, RemoteError, SheetsRemote};
use plata_core::report::{account_balances, debt_schedule, period_report, summarize, Period};
use plata_core::sync::SyncService;
use plata_core::{Entry, EntryId, EntryKind};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] plata_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("No entry found matching '{0}'")]
    EntryNotFound(String),
    #[error("Multiple entries match '{0}', use a longer prefix")]
    AmbiguousEntryId(String),
    #[error("Gist sync is not configured. Set GITHUB_TOKEN and PLATA_GIST_ID.")]
    GistNotConfigured,
    #[error("Sheets sync is not configured. Set PLATA_SHEETS_WEBAPP_URL.")]
    SheetsNotConfigured,
}

#[derive(Parser)]
#[command(name = "plata", version, about = "Personal finance tracker with multi-source sync")]
struct Cli {
    /// Database file path (default: PLATA_DB_PATH, then the platform data dir)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an entry
    Add(AddArgs),
    /// List entries, newest first
    List {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,
        /// Filter by entry type (income, payment, debt, receivable)
        #[arg(long)]
        kind: Option<String>,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry by id or unique id prefix
    Delete {
        /// Entry id or id prefix
        id: String,
    },
    /// Totals per type, balance, and per-account balances
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Aggregate entries by period
    Report {
        /// daily, weekly, monthly, or quarterly
        #[arg(long, default_value = "monthly")]
        period: String,
        #[arg(long)]
        json: bool,
    },
    /// Export all entries to a file
    Export {
        /// csv or json
        #[arg(long, default_value = "csv")]
        format: String,
        /// Output path (default: plata-export-<timestamp>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Sync with the configured GitHub Gist
    Sync {
        #[command(subcommand)]
        direction: Direction,
    },
    /// Sync with the configured Google Sheets web app
    Sheets {
        #[command(subcommand)]
        direction: Direction,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum Direction {
    /// Fetch the remote snapshot and merge it into the local store
    Pull,
    /// Replace the remote snapshot with the local entries
    Push,
}

#[derive(Args)]
struct AddArgs {
    /// Entry type: income, payment, debt, or receivable
    kind: String,

    /// Amount (non-negative)
    #[arg(short, long)]
    amount: Decimal,

    /// Effective date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Due date for debts and receivables
    #[arg(long)]
    due_date: Option<NaiveDate>,

    /// Split a debt into N monthly installments
    #[arg(long)]
    installments: Option<u32>,

    #[arg(long)]
    note: Option<String>,

    #[arg(long)]
    who: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    account: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plata_core=warn".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add(args) => run_add(&db_path, args).await,
        Commands::List { limit, kind, json } => run_list(&db_path, limit, kind, json).await,
        Commands::Delete { id } => run_delete(&db_path, &id).await,
        Commands::Summary { json } => run_summary(&db_path, json).await,
        Commands::Report { period, json } => run_report(&db_path, &period, json).await,
        Commands::Export { format, output } => run_export(&db_path, &format, output).await,
        Commands::Sync { direction } => run_gist_sync(&db_path, direction).await,
        Commands::Sheets { direction } => run_sheets_sync(&db_path, direction).await,
    }
}

/// --db-path flag, then PLATA_DB_PATH, then the platform data directory.
fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("PLATA_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::data_dir().map_or_else(
        || PathBuf::from("plata.db"),
        |dir| dir.join("plata").join("plata.db"),
    )
}

async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Database::open(path).await?)
}

async fn run_add(db_path: &Path, args: AddArgs) -> Result<(), CliError> {
    let kind: EntryKind = args.kind.parse::<EntryKind>().map_err(CliError::Core)?;
    if args.amount < Decimal::ZERO {
        return Err(CliError::Usage("Amount cannot be negative".to_string()));
    }
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());

    let db = open_database(db_path).await?;
    let repo = LibSqlEntryRepository::new(db.connection());

    if let Some(count) = args.installments.filter(|n| *n > 1) {
        if kind != EntryKind::Debt {
            return Err(CliError::Usage(
                "--installments only applies to debt entries".to_string(),
            ));
        }
        let first_due = args.due_date.unwrap_or(date);
        let mut entries = debt_installments(args.amount, count, first_due)?;
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.principal = Some(args.amount);
            let part = format!("{}/{count}", index + 1);
            entry.note = match &args.note {
                Some(note) => format!("{note} {part}"),
                None => part,
            };
            apply_optional_fields(entry, &args);
        }
        repo.upsert_many(&entries).await?;
        println!("Created {count} debt installments:");
        for entry in &entries {
            let due = entry.due_date.map_or_else(|| "-".to_string(), |d| d.to_string());
            println!("  {}  {:>12}  due {due}", entry.id, entry.amount);
        }
        return Ok(());
    }

    let mut entry = Entry::new(kind, args.amount, date);
    if let Some(due) = args.due_date {
        entry = entry.with_due_date(due);
    }
    if let Some(note) = &args.note {
        entry = entry.with_note(note.clone());
    }
    apply_optional_fields(&mut entry, &args);
    repo.upsert(&entry).await?;
    println!("Created {} entry {}", entry.kind, entry.id);
    Ok(())
}

fn apply_optional_fields(entry: &mut Entry, args: &AddArgs) {
    if let Some(who) = &args.who {
        entry.who = who.clone();
    }
    if let Some(category) = &args.category {
        entry.category = category.clone();
    }
    if let Some(account) = &args.account {
        entry.account = account.clone();
    }
    if let Some(tags) = &args.tags {
        entry.tags = tags.clone();
    }
}

async fn run_list(
    db_path: &Path,
    limit: Option<usize>,
    kind: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let kind = match kind {
        Some(raw) => Some(raw.parse::<EntryKind>().map_err(CliError::Core)?),
        None => None,
    };

    let db = open_database(db_path).await?;
    let repo = LibSqlEntryRepository::new(db.connection());
    let mut entries = repo.list().await?;
    if let Some(kind) = kind {
        entries.retain(|entry| entry.kind == kind);
    }
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }
    println!(
        "{:<10} {:<12} {:>12}  {:<10}  {}",
        "ID", "TYPE", "AMOUNT", "DATE", "NOTE"
    );
    for entry in &entries {
        println!(
            "{:<10} {:<12} {:>12}  {:<10}  {}",
            short_id(&entry.id),
            entry.kind,
            entry.amount,
            entry.date,
            entry.note
        );
    }
    Ok(())
}

fn short_id(id: &EntryId) -> String {
    let full = id.as_str();
    full.chars().take(8).collect()
}

async fn run_delete(db_path: &Path, raw_id: &str) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let id = resolve_entry_id(&db, raw_id).await?;
    let repo = LibSqlEntryRepository::new(db.connection());
    repo.delete(&id).await?;
    println!("Deleted entry {id}");
    Ok(())
}

/// Resolve an id or unique id prefix against the entries table.
async fn resolve_entry_id(db: &Database, raw: &str) -> Result<EntryId, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyEntryId);
    }
    if let Ok(id) = trimmed.parse::<EntryId>() {
        return Ok(id);
    }

    let pattern = format!("{trimmed}%");
    let mut rows = db
        .connection()
        .query(
            "SELECT id FROM entries WHERE id LIKE ? LIMIT 2",
            libsql::params![pattern],
        )
        .await
        .map_err(plata_core::Error::from)?;

    let mut matches: Vec<String> = Vec::new();
    while let Some(row) = rows.next().await.map_err(plata_core::Error::from)? {
        matches.push(row.get::<String>(0).map_err(plata_core::Error::from)?);
    }

    match matches.len() {
        0 => Err(CliError::EntryNotFound(trimmed.to_string())),
        1 => matches[0]
            .parse()
            .map_err(|_| CliError::EntryNotFound(trimmed.to_string())),
        _ => Err(CliError::AmbiguousEntryId(trimmed.to_string())),
    }
}

async fn run_summary(db_path: &Path, json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlEntryRepository::new(db.connection());
    let entries = repo.list().await?;

    let summary = summarize(&entries);
    let accounts = account_balances(&entries);
    let debts = debt_schedule(&entries);

    if json {
        let body = serde_json::json!({
            "summary": summary,
            "balance": summary.balance(),
            "accounts": accounts,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Entries:      {}", summary.count);
    println!("Income:       {:>12}", summary.income);
    println!("Payments:     {:>12}", summary.payments);
    println!("Debts:        {:>12}", summary.debts);
    println!("Receivables:  {:>12}", summary.receivables);
    println!("Balance:      {:>12}", summary.balance());

    if !accounts.is_empty() {
        println!();
        println!("Accounts:");
        for (account, balance) in &accounts {
            println!("  {account:<16} {balance:>12}");
        }
    }

    if !debts.is_empty() {
        println!();
        println!("Upcoming debts:");
        for debt in &debts {
            let due = debt.due_date.unwrap_or(debt.date);
            println!("  {due}  {:>12}  {}", debt.amount, debt.note);
        }
    }
    Ok(())
}

async fn run_report(db_path: &Path, period: &str, json: bool) -> Result<(), CliError> {
    let period: Period = period.parse()?;

    let db = open_database(db_path).await?;
    let repo = LibSqlEntryRepository::new(db.connection());
    let entries = repo.list().await?;
    let rows = period_report(&entries, period);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No entries.");
        return Ok(());
    }
    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12} {:>8}",
        "PERIOD", "INCOME", "PAYMENTS", "DEBTS", "BALANCE", "ENTRIES"
    );
    for row in &rows {
        println!(
            "{:<12} {:>12} {:>12} {:>12} {:>12} {:>8}",
            row.key, row.income, row.payments, row.debts, row.balance, row.count
        );
    }
    Ok(())
}

async fn run_export(
    db_path: &Path,
    format: &str,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let format = match format.trim().to_lowercase().as_str() {
        "csv" => ExportFormat::Csv,
        "json" => ExportFormat::Json,
        other => {
            return Err(CliError::Usage(format!(
                "Unknown export format '{other}', expected csv or json"
            )))
        }
    };

    let db = open_database(db_path).await?;
    let repo = LibSqlEntryRepository::new(db.connection());
    let entries = repo.list().await?;

    let content = render_entries_export(&entries, format)?;
    let path =
        output.unwrap_or_else(|| PathBuf::from(suggested_export_file_name(format, now_ms())));
    std::fs::write(&path, content)?;
    println!("Exported {} entries to {}", entries.len(), path.display());
    Ok(())
}

async fn run_gist_sync(db_path: &Path, direction: Direction) -> Result<(), CliError> {
    let token = env_trimmed("GITHUB_TOKEN").ok_or(CliError::GistNotConfigured)?;
    let gist_id = env_trimmed("PLATA_GIST_ID").ok_or(CliError::GistNotConfigured)?;
    let remote = GistRemote::new(token, gist_id)?;

    let db = Arc::new(open_database(db_path).await?);
    let service = SyncService::new(db, Box::new(remote));
    run_sync_direction(&service, direction).await
}

async fn run_sheets_sync(db_path: &Path, direction: Direction) -> Result<(), CliError> {
    let url = env_trimmed("PLATA_SHEETS_WEBAPP_URL").ok_or(CliError::SheetsNotConfigured)?;
    let remote = SheetsRemote::new(url)?;

    let db = Arc::new(open_database(db_path).await?);
    let service = SyncService::new(db, Box::new(remote));
    run_sync_direction(&service, direction).await
}

async fn run_sync_direction(service: &SyncService, direction: Direction) -> Result<(), CliError> {
    match direction {
        Direction::Pull => match service.pull_and_merge().await? {
            Some(total) => println!("Pulled and merged, {total} entries in store"),
            None => println!("Pull superseded by a newer sync"),
        },
        Direction::Push => {
            let pushed = service.push_all().await?;
            println!("Pushed {pushed} entries");
        }
    }
    Ok(())
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
