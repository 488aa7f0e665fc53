//! Box-score OCR tool
//!
//! Reads box-score screenshots into JSON documents, then appends them to the
//! friendly, opponent and game tables.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use boxscore_ocr::config::{AppConfig, StoreKind, load_config};
use boxscore_ocr::ingest::{
    CsvStore, GameDocument, MemoryStore, Reconciler, RetryPolicy, SheetsStore, TableStore,
};
use boxscore_ocr::ocr::{TesseractRecognizer, ensure_tessdata};
use boxscore_ocr::paths::WorkDirs;
use boxscore_ocr::pipeline::{extract_folder, ingest_folder};
use boxscore_ocr::record::TeamSide;

#[derive(Parser, Debug)]
#[command(
    name = "boxscore-ocr",
    version,
    about = "Extract box-score screenshots and ingest them into stat tables"
)]
struct Cli {
    /// Path to config.json
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Base directory for the working folders (overrides config)
    #[arg(short = 'b', long = "base-dir", global = true)]
    base_dir: Option<PathBuf>,

    /// Destination store (overrides config)
    #[arg(short = 's', long = "store", global = true)]
    store: Option<StoreArg>,

    /// Enable debug logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn screenshots into pending JSON documents
    Extract,
    /// Append pending JSON documents to the tables
    Ingest {
        /// Which team is the user's; asked per document when omitted
        #[arg(short = 'f', long = "friendly")]
        friendly: Option<FriendlyArg>,
    },
    /// Extract, then ingest
    Run {
        /// Which team is the user's; asked per document when omitted
        #[arg(short = 'f', long = "friendly")]
        friendly: Option<FriendlyArg>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreArg {
    Csv,
    Sheets,
    /// Keep rows in memory and discard them at exit
    DryRun,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FriendlyArg {
    Team1,
    Team2,
}

impl From<FriendlyArg> for TeamSide {
    fn from(arg: FriendlyArg) -> Self {
        match arg {
            FriendlyArg::Team1 => TeamSide::Team1,
            FriendlyArg::Team2 => TeamSide::Team2,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    boxscore_ocr::logging::init(cli.verbose);

    let mut config = load_config(cli.config.as_deref());
    if let Some(base_dir) = &cli.base_dir {
        config.base_dir = base_dir.clone();
    }
    let store = match cli.store {
        Some(StoreArg::Csv) => Some(StoreKind::Csv),
        Some(StoreArg::Sheets) => Some(StoreKind::Sheets),
        Some(StoreArg::DryRun) => None,
        None => Some(config.store.kind),
    };

    let dirs = WorkDirs::from_config(&config);
    dirs.ensure()?;

    match cli.command {
        Command::Extract => extract(&config, &dirs),
        Command::Ingest { friendly } => ingest(&config, &dirs, store, friendly.map(Into::into)),
        Command::Run { friendly } => {
            extract(&config, &dirs)?;
            ingest(&config, &dirs, store, friendly.map(Into::into))
        }
    }
}

fn extract(config: &AppConfig, dirs: &WorkDirs) -> Result<()> {
    let mut tesseract = config.tesseract.clone();
    if tesseract.tessdata.is_none() {
        match ensure_tessdata(&tesseract.language) {
            Ok(dir) => tesseract.tessdata = Some(dir),
            Err(e) => warn!("No tessdata available ({}); relying on Tesseract's default", e),
        }
    }
    let recognizer = TesseractRecognizer::from_config(&tesseract)?;

    let summary = extract_folder(dirs, &recognizer)?;
    info!(
        "Extraction done: {} extracted, {} failed",
        summary.extracted, summary.failed
    );
    Ok(())
}

fn ingest(
    config: &AppConfig,
    dirs: &WorkDirs,
    store: Option<StoreKind>,
    friendly: Option<TeamSide>,
) -> Result<()> {
    let policy = RetryPolicy::from(&config.retry);
    match store {
        Some(StoreKind::Csv) => ingest_into(CsvStore::open(&dirs.tables)?, policy, dirs, friendly),
        Some(StoreKind::Sheets) => {
            ingest_into(SheetsStore::from_config(&config.store)?, policy, dirs, friendly)
        }
        None => {
            info!("Dry run: rows are kept in memory only");
            ingest_into(MemoryStore::new(), policy, dirs, friendly)
        }
    }
}

fn ingest_into<S: TableStore>(
    store: S,
    policy: RetryPolicy,
    dirs: &WorkDirs,
    friendly: Option<TeamSide>,
) -> Result<()> {
    let mut reconciler = Reconciler::open(store, policy)?;
    let summary = ingest_folder(dirs, &mut reconciler, |path, doc| match friendly {
        Some(side) => Ok(side),
        None => prompt_friendly(path, doc),
    })?;
    info!(
        "Ingestion done: {} ingested, {} duplicates, {} unreadable",
        summary.ingested, summary.duplicates, summary.unreadable
    );
    Ok(())
}

/// Shows both rosters and asks which team is the user's.
fn prompt_friendly(path: &Path, doc: &GameDocument) -> Result<TeamSide> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    writeln!(stdout, "\n{}", path.display())?;
    for side in [TeamSide::Team1, TeamSide::Team2] {
        let names: Vec<&str> = doc
            .record
            .players
            .iter()
            .filter(|p| p.team == side)
            .map(|p| p.name.as_str())
            .collect();
        writeln!(stdout, "  {}: {}", doc.team_name(side), names.join(", "))?;
    }

    loop {
        write!(stdout, "Which team is friendly? [1/2]: ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(anyhow!("No team chosen for {}", path.display()));
        }
        match line.parse::<TeamSide>() {
            Ok(side) => return Ok(side),
            Err(e) => writeln!(stdout, "{}", e)?,
        }
    }
}
