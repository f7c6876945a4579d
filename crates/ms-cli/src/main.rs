//! minisel CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ms_cutflow::CutflowTable;

mod gen_toy;
mod select;

#[derive(Parser)]
#[command(name = "minisel")]
#[command(about = "minisel - columnar event selection for collision ntuples")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one selection pass over one Parquet ntuple
    Select {
        /// Input Parquet ntuple
        input: PathBuf,

        /// Tag for the minitree output directory (selection_<TAG>/)
        #[arg(short, long, default_value = "default")]
        output: String,

        /// Tag for the cutflow output directory (histos_<TAG>/)
        #[arg(long, default_value = "default")]
        output_histos: String,

        /// Selection configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Channel set to run (dilepton, tautau)
        #[arg(long, default_value = "dilepton")]
        channel_set: String,

        /// Process only the first N events
        #[arg(long)]
        max_events: Option<usize>,
    },

    /// Generate a synthetic ntuple for exercising the pipeline
    GenToy {
        /// Output Parquet file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of events to generate
        #[arg(short, long, default_value = "1000")]
        events: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Render a cutflow JSON file as an aligned text table
    Cutflow {
        /// Cutflow JSON file written by `select`
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Select { input, output, output_histos, config, channel_set, max_events } => {
            select::cmd_select(&input, &output, &output_histos, &config, &channel_set, max_events)
        }
        Commands::GenToy { output, events, seed } => gen_toy::cmd_gen_toy(&output, events, seed),
        Commands::Cutflow { input } => cmd_cutflow(&input),
    }
}

fn cmd_cutflow(input: &std::path::Path) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let table: CutflowTable = serde_json::from_str(&text)
        .with_context(|| format!("parsing cutflow JSON {}", input.display()))?;
    print!("{table}");
    Ok(())
}
