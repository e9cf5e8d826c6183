#![warn(clippy::pedantic)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{run_cmd, seeds_cmd};

#[derive(Parser)]
#[command(name = "mqtt5-fuzz")]
#[command(about = "Replay fuzz inputs against an emulated MQTT broker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run inputs through the fuzz transport and the reference client
    Run(run_cmd::RunCommand),
    /// Write the starter seed corpus
    Seeds(seeds_cmd::SeedsCommand),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(cmd) => run_cmd::execute(&cmd),
        Commands::Seeds(cmd) => seeds_cmd::execute(&cmd),
    }
}
