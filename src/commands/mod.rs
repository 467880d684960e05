use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::config::Config;
use crate::error::AppError;
use crate::services::filter::{SortKey, SortOrder, StatusFilter};
use crate::services::import::{ImportSession, ImportedFile};
use crate::services::notify::{Notification, NotificationKind};

pub mod appointments;
pub mod sheets;

#[derive(Debug, Parser)]
#[command(name = "planning", version, about = "Browse technician appointment exports")]
pub struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the sheets of a workbook
    Sheets(FileArgs),
    /// Column statistics and quality scores of one sheet
    Insights(SheetArgs),
    /// Raw grid of one sheet
    Table(TableArgs),
    /// Filtered, sorted and paginated appointment list
    Appointments(ListArgs),
    /// Stock-parts list, optionally exported as CSV
    Stock(StockArgs),
    /// Next upcoming appointment
    Next(NextArgs),
}

#[derive(Debug, Args)]
pub struct FileArgs {
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct SheetArgs {
    pub file: PathBuf,
    /// Sheet index, starting at 0
    #[arg(long, default_value_t = 0)]
    pub sheet: usize,
}

#[derive(Debug, Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,
    /// Maximum number of data rows shown
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    pub file: PathBuf,
    /// DD-MM-YYYY, "all" or "today"; defaults to the date closest to today
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub status: Option<StatusFilter>,
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub sort: Option<SortKey>,
    #[arg(long, default_value = "asc")]
    pub order: SortOrder,
    #[arg(long)]
    pub per_page: Option<usize>,
    #[arg(long, default_value_t = 1)]
    pub page: usize,
}

#[derive(Debug, Args)]
pub struct StockArgs {
    #[command(flatten)]
    pub list: ListArgs,
    /// Write the filtered list as CSV; without a path the file is named
    /// after the date filter
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub export: Option<String>,
}

#[derive(Debug, Args)]
pub struct NextArgs {
    pub file: PathBuf,
    /// Refresh every minute until Ctrl-C
    #[arg(long)]
    pub watch: bool,
}

/// Prints `Import n%` on a single line until the import completes or the
/// session goes away.
pub(crate) async fn render_progress<W: Write>(mut progress: watch::Receiver<u8>, mut out: W) -> W {
    loop {
        let value = *progress.borrow_and_update();
        if write!(out, "\rImport {}%", value).and_then(|_| out.flush()).is_err() || value >= 100 {
            break;
        }
        if progress.changed().await.is_err() {
            break;
        }
    }
    out
}

pub(crate) fn notification_line(note: &Notification) -> String {
    format!("{}: {}", note.title, note.message)
}

pub(crate) async fn load(path: &Path, config: &Config) -> Result<ImportedFile, AppError> {
    let mut session = ImportSession::new(config.max_file_size);
    let display = io::stderr()
        .is_terminal()
        .then(|| tokio::spawn(render_progress(session.subscribe_progress(), io::stderr())));

    let result = session.import_path(path).await.map(|_| ());

    if let Some(task) = display {
        // On success the display stops by itself at 100.
        if result.is_err() {
            task.abort();
        }
        task.await.ok();
        eprintln!();
    }
    // Failures reach stderr through `AppError::user_message` in main.
    if let Some(note) = session.notifications().latest() {
        if note.kind == NotificationKind::Success {
            eprintln!("{}", notification_line(note));
        } else {
            tracing::debug!("{}", notification_line(note));
        }
    }
    result?;
    session
        .into_current()
        .ok_or_else(|| AppError::Format(format!("Nothing imported from {}", path.display())))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub async fn run<W: Write>(cli: Cli, config: &Config, out: &mut W) -> Result<(), AppError> {
    let json = cli.json;
    match cli.command {
        Command::Sheets(args) => {
            let file = load(&args.file, config).await?;
            writeln!(out, "{}", sheets::render_sheets(&file, json)?)?;
        }
        Command::Insights(args) => {
            let file = load(&args.file, config).await?;
            writeln!(out, "{}", sheets::render_insights(&file, args.sheet, json)?)?;
        }
        Command::Table(args) => {
            let file = load(&args.sheet.file, config).await?;
            writeln!(out, "{}", sheets::render_table(&file, args.sheet.sheet, args.limit, json)?)?;
        }
        Command::Appointments(args) => {
            let file = load(&args.file, config).await?;
            writeln!(out, "{}", appointments::render_appointments(&file.records, &args, config, json)?)?;
        }
        Command::Stock(args) => {
            let file = load(&args.list.file, config).await?;
            writeln!(out, "{}", appointments::render_stock(&file.records, &args, config, json)?)?;
        }
        Command::Next(args) => {
            let file = load(&args.file, config).await?;
            if args.watch {
                appointments::watch_next(&file.records, config, json, out).await?;
            } else {
                writeln!(out, "{}", appointments::render_next(&file.records, config, json)?)?;
            }
        }
    }
    Ok(())
}
