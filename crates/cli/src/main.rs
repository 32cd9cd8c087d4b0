//! precept CLI
//!
//! Trains surrogate models from operating-point tables, inspects their
//! metadata sidecars and runs predictions locally or against a server.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, query, train};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// precept CLI
#[derive(Parser)]
#[command(name = "pct")]
#[command(author, version, about = "CLI for precept device surrogates", long_about = None)]
pub struct Cli {
    /// Prediction server URL (can also be set via PCT_SERVER_URL env var)
    #[arg(
        long = "url",
        env = "PCT_SERVER_URL",
        default_value = "http://localhost:8080",
        global = true
    )]
    pub server_url: String,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from a YAML configuration and export it
    Train {
        /// Training configuration file
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Predict outputs for a CSV table with a local model
    Predict {
        /// Model artifact (.mlp or .onnx) with its .yml sidecar alongside
        #[arg(long, short)]
        model: PathBuf,

        /// CSV table holding the model's input columns
        #[arg(long, short)]
        input: PathBuf,

        /// Write predictions to this CSV file instead of printing them
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the normalization metadata of a model
    Inspect {
        /// Model artifact (.mlp or .onnx) with its .yml sidecar alongside
        #[arg(long, short)]
        model: PathBuf,
    },

    /// Predict outputs for a CSV table with a running server
    Query {
        /// CSV table holding the served model's input columns
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Show the columns of the served model
    Columns,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Train { config } => train::train(&config)?,
        Commands::Predict {
            model,
            input,
            output,
        } => predict::predict(&model, &input, output.as_deref(), cli.format)?,
        Commands::Inspect { model } => inspect::inspect(&model, cli.format)?,
        Commands::Query { input } => {
            let client = client::ApiClient::new(&cli.server_url)?;
            query::query(&client, &input, cli.format).await?;
        }
        Commands::Columns => {
            let client = client::ApiClient::new(&cli.server_url)?;
            query::columns(&client, cli.format).await?;
        }
    }

    Ok(())
}
