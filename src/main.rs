use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use collection_board_lib::models::parse_snapshot;
use collection_board_lib::AppState;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "collection-board", version, about = "Project data-collection board")]
struct Cli {
    /// Directory holding data.db and logs/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the store if needed
    Init {
        /// Add the sample projects to an empty store
        #[arg(long)]
        seed: bool,
    },
    /// Print every stored record
    List,
    /// Replace the stored records with a JSON snapshot
    Save {
        /// Snapshot file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Summary,
    Chart,
    Table {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show settings, or merge a JSON patch into them
    Settings {
        #[arg(long)]
        set: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(collection_board_lib::default_data_dir);
    collection_board_lib::init_tracing(&data_dir).map_err(|error| anyhow!(error))?;

    let state = AppState::open(&data_dir)
        .with_context(|| format!("failed to open store in {}", data_dir.display()))?;

    match cli.command {
        Command::Init { seed } => {
            let seeded = if seed {
                collection_board_lib::seed_sample_records(&state).map_err(|error| anyhow!(error))?
            } else {
                0
            };
            print_json(&serde_json::json!({
                "database": state.db().path().display().to_string(),
                "seeded": seeded,
            }))
        }
        Command::List => print_json(&collection_board_lib::load_records(&state).map_err(|error| anyhow!(error))?),
        Command::Save { file } => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("failed to read snapshot from stdin")?;
                    buffer
                }
            };
            let rows = parse_snapshot(&raw)?;
            print_json(&collection_board_lib::save_records(&state, rows).map_err(|error| anyhow!(error))?)
        }
        Command::Summary => {
            print_json(&collection_board_lib::dashboard_summary(&state).map_err(|error| anyhow!(error))?)
        }
        Command::Chart => print_json(&collection_board_lib::dashboard_chart(&state).map_err(|error| anyhow!(error))?),
        Command::Table { page } => {
            print_json(&collection_board_lib::dashboard_table(&state, page).map_err(|error| anyhow!(error))?)
        }
        Command::Settings { set } => {
            let settings = match set {
                Some(patch) => {
                    let update: serde_json::Value =
                        serde_json::from_str(&patch).context("settings patch is not valid JSON")?;
                    collection_board_lib::update_settings(&state, update)
                }
                None => collection_board_lib::get_settings(&state),
            }
            .map_err(|error| anyhow!(error))?;
            print_json(&settings)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
