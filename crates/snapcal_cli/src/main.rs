//! SnapCal command-line front end.
//!
//! # Responsibility
//! - Drive the entry store and photo ingestion from a terminal.
//! - Share the database location and credentials with the app through the
//!   same environment variables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use snapcal_core::{
    resolve_db_path, CalorieEntry, Credentials, DayKey, EntryId, EntryStore, GeminiClient,
    IngestionPipeline, NewEntry, SqliteSnapshotRepository, VisionConfig,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "snapcal", version, about = "Calorie ledger with photo estimation")]
struct Cli {
    /// SQLite file; defaults to `SNAPCAL_DB_PATH` or a temp-dir file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a manual entry.
    Add {
        name: String,
        kcal: f64,
        /// Portion in grams.
        #[arg(long)]
        qty: Option<f64>,
        /// Ledger day `YYYY-MM-DD`; defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Show entries and total for one day.
    List {
        #[arg(long)]
        date: Option<String>,
    },
    /// Show past days, newest first.
    History,
    /// Delete one entry by id.
    Remove { id: String },
    /// Delete every entry.
    Clear,
    /// Estimate a meal photo and record its items for today.
    Snap { photo: PathBuf },
    /// Health check.
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        snapcal_core::init_logging(snapcal_core::default_log_level(), log_dir)
            .map_err(anyhow::Error::msg)
            .context("logging init failed")?;
    }

    if let Command::Ping = cli.command {
        println!("snapcal_core ping={}", snapcal_core::ping());
        println!("snapcal_core version={}", snapcal_core::core_version());
        return Ok(());
    }

    let db_path = cli.db.unwrap_or_else(resolve_db_path);
    let repo = SqliteSnapshotRepository::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let store = EntryStore::open_default(repo).context("failed to load entries")?;
    info!(
        "event=cli_start module=cli status=ok entries={}",
        store.len()
    );

    match cli.command {
        Command::Add {
            name,
            kcal,
            qty,
            date,
        } => {
            let mut partial = NewEntry::manual(name, kcal);
            partial.qty_g = qty;
            let entry = match date {
                Some(raw) => store.add_entry_at(partial, parse_day(&raw)?)?,
                None => store.add_entry(partial)?,
            };
            print_entry(&entry);
        }
        Command::List { date } => {
            let day = match date {
                Some(raw) => parse_day(&raw)?,
                None => store.today(),
            };
            for entry in store.entries_on(&day) {
                print_entry(&entry);
            }
            println!("{day} total {:.0} kcal", store.total_kcal_on(&day));
        }
        Command::History => {
            for section in store.entries_before(&store.today()) {
                println!("{} total {:.0} kcal", section.date, section.total_kcal);
                for entry in &section.entries {
                    print!("  ");
                    print_entry(entry);
                }
            }
        }
        Command::Remove { id } => {
            let id = EntryId::parse_str(id.trim()).context("invalid entry id")?;
            match store.remove_entry(id) {
                Some(entry) => print_entry(&entry),
                None => println!("no entry {id}"),
            }
        }
        Command::Clear => {
            println!("removed {} entries", store.clear_all());
        }
        Command::Snap { photo } => {
            let bytes = std::fs::read(&photo)
                .with_context(|| format!("failed to read {}", photo.display()))?;
            let client = GeminiClient::new(&VisionConfig::from_env())?;
            let pipeline = IngestionPipeline::new(client);
            let entries = pipeline
                .submit(&store, &bytes, &Credentials::from_env())
                .await?;
            if entries.is_empty() {
                println!("no food items recognized");
            }
            for entry in &entries {
                print_entry(entry);
            }
        }
        Command::Ping => {}
    }

    let status = store.persistence_status();
    if !status.persisted {
        bail!(
            "entries were not saved: {}",
            status.last_error.unwrap_or_default()
        );
    }
    Ok(())
}

fn parse_day(raw: &str) -> Result<DayKey> {
    Ok(DayKey::parse(raw.trim())?)
}

fn print_entry(entry: &CalorieEntry) {
    let qty = entry
        .qty_g
        .map(|grams| format!(" {grams:.0} g"))
        .unwrap_or_default();
    println!(
        "{} {} [{}] {} {:.0} kcal{qty}",
        entry.id,
        entry.date,
        entry.source.as_str(),
        entry.name,
        entry.kcal
    );
}
