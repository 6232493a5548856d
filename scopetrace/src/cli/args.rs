//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scopetrace",
    version,
    about = "Record and inspect scoped block profiles",
    after_help = "\
EXAMPLES:
    scopetrace demo --output run.prof            Record a sample workload
    scopetrace inspect run.prof                  Print per-block statistics
    scopetrace inspect run.prof --tree           Also print per-thread call trees
    scopetrace inspect run.prof --export t.json  Convert for chrome://tracing"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load a profile file and report on it
    Inspect(InspectArgs),

    /// Record an instrumented multi-threaded workload to a profile file
    Demo(DemoArgs),
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Profile file to load
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Export a Chrome trace (JSON) to this file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Number of blocks to list in the statistics table (0 = all)
    #[arg(long, default_value = "20")]
    pub top: usize,

    /// Print per-thread call trees
    #[arg(long)]
    pub tree: bool,

    /// Deepest tree level to print
    #[arg(long, default_value = "8", requires = "tree")]
    pub max_depth: usize,

    /// Cancel the load after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub timeout: u64,
}

#[derive(clap::Args)]
pub struct DemoArgs {
    /// Where to write the recorded profile
    #[arg(short, long, value_name = "FILE", default_value = "profile.prof")]
    pub output: PathBuf,

    /// Worker threads to run
    #[arg(short = 'n', long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub threads: u32,

    /// Frames each worker processes
    #[arg(long, default_value = "50")]
    pub iterations: u32,
}
