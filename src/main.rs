mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ListArgs, TransformArgs};
use everglade::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "everglade")]
#[command(version)]
#[command(about = "Encrypt and decrypt files in place", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./.everglade.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files discovered under a directory
    List(ListArgs),

    /// Encrypt a file, or every file under a directory
    Encrypt(TransformArgs),

    /// Decrypt a file, or every file under a directory
    Decrypt(TransformArgs),
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("EVERGLADE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List(args) => commands::list(&settings, &args),
        Commands::Encrypt(args) => commands::encrypt(&settings, &args),
        Commands::Decrypt(args) => commands::decrypt(&settings, &args),
    }
}
