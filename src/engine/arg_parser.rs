use clap::Parser;
use std::path::PathBuf;

/// Batch 3D coordinate generation for SD, MOL, MDL and SMILES files.
#[derive(Clone, Parser)]
#[command(name = "balloonpipe")]
#[command(
    about = "Generate 3D coordinates with Balloon. SD files are converted record by record in parallel; other inputs in one run."
)]
pub struct Cli {
    /// Input files (.sdf, .mol, .mdl, .smi).
    #[arg(value_name = "INPUT", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Output file. Default: `<stem>_3d.<ext>` next to the input, never overwriting. Single input only.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Conformers to generate per record.
    #[arg(long, short = 'c', value_parser = clap::value_parser!(u32).range(1..))]
    pub conformers: Option<u32>,

    /// Converter workers. Default: available parallelism (capped by the FD limit).
    #[arg(long, short = 'j', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Per-record timeout in seconds (0 = default of 60).
    #[arg(long, short = 't', value_parser = clap::value_parser!(u64))]
    pub timeout: Option<u64>,

    /// Path to the balloon executable. Also read from BALLOONPIPE_TOOL / .env.
    #[arg(long)]
    pub tool: Option<PathBuf>,

    /// Capacity of the input and output channels.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub channel_cap: Option<usize>,

    /// Seconds to wait for lingering workers after cancellation.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub grace_period: Option<u64>,

    /// Write a JSON report of the run (including failed records) here. Single input only.
    #[arg(long, short = 'r')]
    pub report: Option<PathBuf>,

    /// Verbose output and progress bar.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
