use anyhow::{Context, Result};
use clap::Args;
use mqtt5_fuzz_transport::SeedCorpus;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct SeedsCommand {
    /// Output directory, created if missing
    #[arg(long, short, default_value = "seeds")]
    pub out: PathBuf,
}

pub fn execute(cmd: &SeedsCommand) -> Result<()> {
    let corpus = SeedCorpus::generate().context("Failed to build seed corpus")?;
    let written = corpus
        .write_to_dir(&cmd.out)
        .with_context(|| format!("Failed to write seeds to {}", cmd.out.display()))?;

    info!(count = written.len(), "Seed corpus written");
    println!("Generated {} seeds in: {}", written.len(), cmd.out.display());
    Ok(())
}
