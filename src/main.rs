//! Tableroll CLI - manage and roll spreadsheet-defined encounter tables
//!
//! # Main Commands
//!
//! ```bash
//! tableroll serve                       # Start HTTP server
//! tableroll validate workbook.json      # Check a workbook without importing
//! tableroll import 42 workbook.json     # Import a workbook for guild 42
//! tableroll roll 42                     # Roll an encounter for guild 42
//! ```
//!
//! # Maintenance Commands
//!
//! ```bash
//! tableroll export 42 -o current.json   # Export the stored workbook
//! tableroll template -o blank.json      # Write the blank template
//! tableroll delete 42 --yes             # Permanently delete guild 42's tables
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use tableroll::{normalize_workbook, pipeline, roll, store, Config, ImportError, Workbook};

#[derive(Parser)]
#[command(name = "tableroll")]
#[command(about = "Spreadsheet-defined random encounter tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate a workbook without touching the database
    Validate {
        /// Workbook document (JSON)
        input: PathBuf,
    },

    /// Import a workbook for a guild, replacing its current tables
    Import {
        /// Guild id to import for
        guild_id: i64,

        /// Workbook document (JSON)
        input: PathBuf,
    },

    /// Export a guild's stored tables as a workbook
    Export {
        /// Guild id to export
        guild_id: i64,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Roll a composed encounter for a guild
    Roll {
        /// Guild id to roll for
        guild_id: i64,

        /// Region id (required when the guild has several regions)
        #[arg(short, long)]
        region: Option<i64>,
    },

    /// Permanently delete all tables for a guild
    Delete {
        /// Guild id to delete
        guild_id: i64,

        /// Confirm the irreversible delete
        #[arg(long)]
        yes: bool,
    },

    /// Write the blank template workbook
    Template {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tableroll=info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            let pool = store::connect(&config.database_path).await?;
            tableroll::start_server(pool, &config).await?;
        }

        Commands::Validate { input } => {
            let bytes = fs::read(&input)?;
            let workbook = Workbook::from_json_bytes(&bytes)?;
            match normalize_workbook(&workbook) {
                Ok(batch) => {
                    let counts = batch.counts();
                    println!("Workbook is valid.");
                    println!("  Regions:           {}", counts.regions);
                    println!("  Encounter types:   {}", counts.encounter_types);
                    println!("  Encounter entries: {}", counts.encounter_entries);
                    println!("  Reward entries:    {}", counts.reward_entries);
                }
                Err(defects) => {
                    eprintln!("Workbook has {} defect(s):", defects.len());
                    for defect in &defects {
                        eprintln!("  - {defect}");
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Import { guild_id, input } => {
            let bytes = fs::read(&input)?;
            let pool = store::connect(&config.database_path).await?;
            match pipeline::import_workbook_bytes(&pool, guild_id, &bytes).await {
                Ok(counts) => {
                    println!("Import succeeded.");
                    println!("  Regions:           {}", counts.regions);
                    println!("  Encounter types:   {}", counts.encounter_types);
                    println!("  Encounter entries: {}", counts.encounter_entries);
                    println!("  Reward entries:    {}", counts.reward_entries);
                }
                Err(ImportError::Invalid(defects)) => {
                    eprintln!("Import failed. No changes were made.");
                    for defect in &defects {
                        eprintln!("  - {defect}");
                    }
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Export { guild_id, output } => {
            let pool = store::connect(&config.database_path).await?;
            match pipeline::export_workbook_bytes(&pool, guild_id).await? {
                Some(bytes) => write_output(output, &bytes)?,
                None => {
                    eprintln!("No encounter tables imported for guild {guild_id}.");
                    std::process::exit(1);
                }
            }
        }

        Commands::Roll { guild_id, region } => {
            let pool = store::connect(&config.database_path).await?;
            let result = roll::roll_encounter(&pool, guild_id, region).await?;

            if let Some(region_name) = &result.region_name {
                println!("Region:    {region_name}");
            }
            println!(
                "Type:      {} ({})",
                result.encounter_type.result,
                result.encounter_type.detail()
            );
            println!(
                "Encounter: {} ({})",
                result.encounter.result,
                result.encounter.detail()
            );
            println!(
                "Reward:    {} ({})",
                result.reward.result,
                result.reward.detail()
            );
        }

        Commands::Delete { guild_id, yes } => {
            if !yes {
                eprintln!(
                    "This permanently deletes all encounter table data for guild {guild_id}."
                );
                eprintln!("Re-run with --yes to confirm. This cannot be undone.");
                std::process::exit(1);
            }
            let pool = store::connect(&config.database_path).await?;
            store::delete_guild(&pool, guild_id).await?;
            println!("Deleted all encounter table data for guild {guild_id}.");
        }

        Commands::Template { output } => {
            let bytes = Workbook::template().to_json_bytes()?;
            write_output(output, &bytes)?;
        }
    }

    Ok(())
}

fn write_output(output: Option<PathBuf>, bytes: &[u8]) -> std::io::Result<()> {
    match output {
        Some(path) => fs::write(path, bytes),
        None => {
            println!("{}", String::from_utf8_lossy(bytes));
            Ok(())
        }
    }
}
