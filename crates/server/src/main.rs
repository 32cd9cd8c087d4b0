//! Prediction server
//!
//! Loads one trained surrogate and its metadata sidecar and answers
//! batched prediction requests over HTTP.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use precept_lib::{
    health::{components, HealthRegistry},
    observability::{EventLogger, PreceptMetrics},
    Predictor, ServingFacade,
};
use precept_server::{
    api,
    config::{ServerConfig, ServerOverrides},
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "prc")]
#[command(author, version, about = "Serve precept surrogate models over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one model from a model directory
    Serve {
        /// Directory holding the model artifact and its sidecar
        #[arg(short, long, env = "PRC_MODEL_DIR")]
        model_dir: Option<PathBuf>,

        /// Base name of the model, required when the directory holds several
        #[arg(short, long)]
        name: Option<String>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            model_dir,
            name,
            host,
            port,
        } => {
            let config = ServerConfig::load(ServerOverrides {
                model_dir,
                name,
                host,
                port,
            })?;
            serve(config).await
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    info!(version = SERVER_VERSION, "Starting precept server");

    let health_registry = HealthRegistry::new();
    let metrics = PreceptMetrics::new();
    let logger = EventLogger::new("server");

    let model_path = config.model_path()?;
    let load_path = model_path.clone();
    let predictor = tokio::task::spawn_blocking(move || Predictor::load(&load_path))
        .await?
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;

    let spec = predictor.metadata().spec().clone();
    let model_name = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    logger.model_loaded(
        &model_path.display().to_string(),
        predictor.runtime_kind(),
        spec.num_x(),
        spec.num_y(),
    );
    metrics.set_model(&model_name, predictor.runtime_kind());

    health_registry.register(components::MODEL).await;

    let facade = Arc::new(ServingFacade::new(Arc::new(predictor)));
    let app_state = Arc::new(api::AppState::new(
        facade,
        health_registry.clone(),
        metrics,
    ));

    // Mark server as ready after the model is loaded
    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    api::serve(&config.addr(), app_state, async move {
        let _ = tokio::signal::ctrl_c().await;
        shutdown_logger.server_shutdown("SIGINT received");
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
