//! RunDQ CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dq_engine::MergePolicy;

mod book;
mod merge;

#[derive(Parser)]
#[command(name = "rundq")]
#[command(about = "RunDQ - per-run data-quality histograms and yield merging")]
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
    /// Produce per-run data-quality artifacts
    Book {
        /// Directory with per-run event column files (<run>.json)
        #[arg(long, short = 'i')]
        events_dir: PathBuf,

        /// Directory with good-run-list .json and luminosity .csv files
        #[arg(long, short = 'g')]
        grl_dir: PathBuf,

        /// Directory with histogram spec fragments (*.yaml)
        #[arg(long, short = 's')]
        specs_dir: PathBuf,

        /// Output directory for per-run artifacts
        #[arg(long, short = 'o', default_value = "output")]
        out_dir: PathBuf,

        /// Runs to process
        #[arg(required = true)]
        runs: Vec<u32>,
    },

    /// Merge yield histograms from per-run artifacts
    Merge {
        /// Output file for the combined yields
        #[arg(long, short = 'o', default_value = "combined_yields.json")]
        output: PathBuf,

        /// Overlapping-run policy: overwrite, sum, or error-on-overlap
        #[arg(long, default_value = "overwrite")]
        policy: MergePolicy,

        /// Per-run artifact files to combine
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Book { events_dir, grl_dir, specs_dir, out_dir, runs } => {
            book::cmd_book(&events_dir, &grl_dir, &specs_dir, &out_dir, &runs)
        }
        Commands::Merge { output, policy, inputs } => merge::cmd_merge(&inputs, &output, policy),
    }
}
