#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the toll fare loader.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tollway_cli_utils::IndicatifProgress;
use tollway_ingest::{LoadOptions, load_tolls, report, store_stats, summarize_fares};

#[derive(Parser)]
#[command(name = "tollway_ingest", about = "Toll fare table loader")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the fare table and geo reference into the toll store,
    /// replacing its contents (the default command)
    Load {
        /// Fare table (default: `data/peajes/precios.json`)
        #[arg(long)]
        fares: Option<PathBuf>,
        /// Geo reference (default: latest `data/peajes/peajes_georeferencias_*.json`)
        #[arg(long)]
        georef: Option<PathBuf>,
        /// Toll store (default: `TOLLWAY_DB_PATH` or `data/shared/tolls.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Reconcile in memory and print the summary without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Describe a fare table's structure without loading it
    Summary {
        /// Fare table (default: `data/peajes/precios.json`)
        #[arg(long)]
        fares: Option<PathBuf>,
    },
    /// Show counts and last-load metadata of the toll store
    Stats {
        /// Toll store (default: `TOLLWAY_DB_PATH` or `data/shared/tolls.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tollway_cli_utils::init_logger();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Load {
        fares: None,
        georef: None,
        db: None,
        dry_run: false,
    });

    match command {
        Commands::Load {
            fares,
            georef,
            db,
            dry_run,
        } => {
            let options = LoadOptions {
                fares,
                georef,
                db,
                dry_run,
            };

            let start = Instant::now();
            let progress = IndicatifProgress::highways_bar(&multi);

            match load_tolls(&options, Some(progress)) {
                Ok(outcome) => {
                    print!("{}", report::render_load(&outcome));
                    log::info!("Load complete in {:.1}s", start.elapsed().as_secs_f64());
                }
                Err(e) => {
                    print!("{}", report::render_failure(&e));
                    return Err(e.into());
                }
            }
        }
        Commands::Summary { fares } => {
            let (path, summary) = summarize_fares(fares.as_deref())?;
            print!("{}", report::render_document_summary(&path, &summary));
        }
        Commands::Stats { db } => {
            let stats = store_stats(db.as_deref())?;
            print!("{}", report::render_stats(&stats));
        }
    }

    Ok(())
}
