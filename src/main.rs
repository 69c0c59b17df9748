use anyhow::Result;
use clap::Parser;
use nsd2byob_core::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    nsd2byob_core::run_cli(&args)
}
