//! enrich - research a topic into a structured record

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, run_command, schema_command, status_command, RunArgs};

/// enrich - fill a schema from web research
#[derive(Parser)]
#[command(name = "enrich")]
#[command(about = "Research a topic and extract a structured record matching a schema")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and report directory
    Init,
    /// Research a topic
    Run {
        /// What to research
        #[arg(short, long)]
        topic: String,
        /// Schema file (native or JSON Schema)
        #[arg(short, long)]
        schema: PathBuf,
        /// Reflection rounds after the first pass
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,
        /// Text file stored as evidence before research starts
        #[arg(long)]
        seed: Vec<PathBuf>,
        /// URL or local path fetched on the first pass
        #[arg(short, long)]
        document: Vec<String>,
        /// Where to write the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a schema file
    Schema {
        /// Schema file (native or JSON Schema)
        file: PathBuf,
    },
    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            if let Err(e) = init_command().await {
                error!("Init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Run {
            topic,
            schema,
            max_iterations,
            seed,
            document,
            output,
        } => {
            let args = RunArgs {
                topic,
                schema,
                max_iterations,
                seeds: seed,
                documents: document,
                output,
            };
            match run_command(args).await {
                Ok(true) => {}
                Ok(false) => std::process::exit(1),
                Err(e) => {
                    error!("Run failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Schema { file } => {
            if let Err(e) = schema_command(&file).await {
                eprintln!("Invalid schema: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Status => {
            if let Err(e) = status_command().await {
                error!("Status failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
