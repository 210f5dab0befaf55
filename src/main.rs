//! Balloonpipe CLI: generate 3D coordinates for SD, MOL, MDL and SMILES files.

use anyhow::Result;
use balloonpipe::engine::arg_parser::Cli;
use balloonpipe::engine::handle_run;
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
