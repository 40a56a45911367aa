use clap::{Parser, Subcommand};
use std::path::PathBuf;

use capture_importer::config::Config;
use capture_importer::store::SessionStore;
use capture_importer::{logging, pipeline};

#[derive(Parser)]
#[command(name = "capture-importer")]
#[command(about = "Imports capture-session spreadsheets into SQLite")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the source directory and import every spreadsheet found
    Import {
        /// Directory containing .xlsx/.xls files (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// SQLite database path (overrides config)
        #[arg(long)]
        database: Option<PathBuf>,
        /// Worksheet to read (defaults to the first sheet of each workbook)
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Create the capture_sessions table and exit
    InitDb {
        /// SQLite database path (overrides config)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Import { dir, database, sheet } => {
            if let Some(dir) = dir {
                config.import.source_dir = dir;
            }
            if let Some(database) = database {
                config.import.database = database;
            }
            if let Some(sheet) = sheet {
                config.import.sheet = Some(sheet);
            }

            let summary = pipeline::run_import(&config)?;

            println!("\n📊 Import summary:");
            println!("   Files seen: {}", summary.files_seen);
            println!("   Files imported: {}", summary.files_imported);
            println!("   Files failed: {}", summary.files_failed);
            println!("   Records inserted/updated: {}", summary.records_upserted);
            println!("   Rows skipped: {}", summary.rows_skipped);

            if summary.files_failed > 0 {
                println!("\n⚠️  Some files failed; see the log for details.");
            }
        }
        Commands::InitDb { database } => {
            if let Some(database) = database {
                config.import.database = database;
            }
            let store = SessionStore::open(&config.import.database)?;
            store.ensure_schema()?;
            println!("✅ Schema ensured at {}", config.import.database.display());
        }
    }

    Ok(())
}
