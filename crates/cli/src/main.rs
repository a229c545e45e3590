//! U-Layout command-line front end.

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use u_layout_core::{ExtractConfig, FloorDump, LayoutJson, Solver};
use u_layout_extract::ConstraintsExtractor;
use u_layout_session::search::{
    DesignSearchQuery, LayoutSearchQuery, RoomTypeEstimate, RoomTypeQuery, SearchResult,
};
use u_layout_session::{
    search_error, IdentitySolver, InspirationData, LayoutSession, ReplaySolver, RetryPolicy,
    SearchService, SessionConfig,
};

#[derive(Parser)]
#[command(name = "u-layout")]
#[command(about = "Constraint extraction and layout replay for furnished rooms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the constraint graph of a layout and print its dump
    Extract {
        /// Layout JSON file (floorDump + contentDumps)
        layout: PathBuf,

        /// Extraction config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail when any item stays unanchored
        #[arg(long)]
        strict: bool,
    },

    /// Replay a layout into another room and print the placements
    Apply {
        /// Layout JSON file (floorDump + contentDumps)
        layout: PathBuf,

        /// Target room floor dump JSON
        #[arg(short, long)]
        room: PathBuf,

        /// Extraction config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Solver used to place the items
        #[arg(short, long, value_enum, default_value = "replay")]
        solver: SolverArg,

        /// Keep curtains and ceiling lights
        #[arg(long)]
        special_types: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SolverArg {
    /// Reproduce measured offsets in the new room
    Replay,
    /// Leave every item where it is
    Identity,
}

impl SolverArg {
    fn build(self) -> Arc<dyn Solver> {
        match self {
            SolverArg::Replay => Arc::new(ReplaySolver::new()),
            SolverArg::Identity => Arc::new(IdentitySolver),
        }
    }
}

/// Search backend for offline use: every lookup fails.
struct OfflineSearch;

#[async_trait]
impl SearchService for OfflineSearch {
    async fn design_search(
        &self,
        _query: &DesignSearchQuery,
    ) -> u_layout_core::Result<Vec<SearchResult>> {
        Err(search_error("no search service in offline mode"))
    }

    async fn estimate_room_type(
        &self,
        _query: &RoomTypeQuery,
    ) -> u_layout_core::Result<Vec<RoomTypeEstimate>> {
        Err(search_error("no search service in offline mode"))
    }

    async fn layout_search(
        &self,
        _query: &LayoutSearchQuery,
    ) -> u_layout_core::Result<Vec<SearchResult>> {
        Err(search_error("no search service in offline mode"))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_layout(path: &Path) -> anyhow::Result<LayoutJson> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    LayoutJson::parse(&text).with_context(|| format!("Invalid layout {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ExtractConfig> {
    match path {
        Some(path) => read_json(path),
        None => Ok(ExtractConfig::default()),
    }
}

fn write_output<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Saved to: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            layout,
            config,
            output,
            strict,
        } => {
            let config = load_config(config.as_deref())?;
            let layout = read_layout(&layout)?;
            let extraction = ConstraintsExtractor::new(config).execute(&layout)?;

            let report = &extraction.report;
            eprintln!(
                "Extracted {} items, {} constraints",
                extraction.graph.len(),
                extraction.dump().num_constraints()
            );
            if !report.is_complete() {
                eprintln!(
                    "  unanchored={} partial={} unresolved_hosts={} unsupported_regions={}",
                    report.unanchored.len(),
                    report.partial_matches.len(),
                    report.unresolved_hosts.len(),
                    report.unsupported_regions.len()
                );
            }
            if strict && !report.unanchored.is_empty() {
                anyhow::bail!("Unanchored items: {}", report.unanchored.join(", "));
            }

            write_output(&extraction.dump(), output.as_deref())?;
        }

        Commands::Apply {
            layout,
            room,
            config,
            solver,
            special_types,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let layout = read_layout(&layout)?;
            let room: FloorDump = read_json(&room)?;

            let session = LayoutSession::new(
                Arc::new(OfflineSearch),
                solver.build(),
                SessionConfig::new()
                    .with_extract(config)
                    .with_retry(RetryPolicy::no_retry()),
            );
            let data = InspirationData {
                layouts: vec![layout],
                group_infos: Vec::new(),
            };
            let result = session
                .apply_inspiration(room, data, None, special_types)
                .await?;

            eprintln!(
                "Placed {} items ({} outside the room)",
                result.outcome.target_cos.len(),
                result.outcome.out_of_room.len()
            );
            for id in &result.outcome.out_of_room {
                log::warn!("{} leaves the room", id);
            }

            write_output(&result.outcome, output.as_deref())?;
            session.dispose()?;
        }
    }

    Ok(())
}
