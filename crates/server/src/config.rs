//! Server configuration

use anyhow::{bail, Context, Result};
use precept_lib::model::{NATIVE_EXTENSION, ONNX_EXTENSION};
use precept_lib::ModelMetadata;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `PRC_PORT=9000`
pub const ENV_PREFIX: &str = "PRC";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Directory holding model artifacts and their sidecars
    pub model_dir: PathBuf,

    /// Base name of the model to serve; optional when the directory holds one model
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Values given on the command line; they win over the environment
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    pub model_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServerConfig {
    /// Load configuration from environment and command-line overrides
    pub fn load(overrides: ServerOverrides) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option(
                "model_dir",
                overrides
                    .model_dir
                    .map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("name", overrides.name)?
            .set_override_option("host", overrides.host)?
            .set_override_option("port", overrides.port.map(i64::from))?
            .build()?;

        config
            .try_deserialize()
            .context("Invalid server configuration (is --model-dir or PRC_MODEL_DIR set?)")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Locate the model artifact to serve
    pub fn model_path(&self) -> Result<PathBuf> {
        if !self.model_dir.is_dir() {
            bail!("Model directory {} does not exist", self.model_dir.display());
        }

        if let Some(name) = &self.name {
            return [NATIVE_EXTENSION, ONNX_EXTENSION]
                .iter()
                .map(|ext| self.model_dir.join(format!("{}.{}", name, ext)))
                .find(|p| p.is_file())
                .with_context(|| {
                    format!(
                        "No {}.{} or {}.{} in {}",
                        name,
                        NATIVE_EXTENSION,
                        name,
                        ONNX_EXTENSION,
                        self.model_dir.display()
                    )
                });
        }

        let entries = std::fs::read_dir(&self.model_dir)
            .with_context(|| format!("Failed to list {}", self.model_dir.display()))?;
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_servable(p))
            .collect();
        candidates.sort();

        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => bail!(
                "No model with a metadata sidecar found in {}",
                self.model_dir.display()
            ),
            n => bail!(
                "{} models found in {}, choose one with --name",
                n,
                self.model_dir.display()
            ),
        }
    }
}

fn is_servable(path: &Path) -> bool {
    let known = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext == NATIVE_EXTENSION || ext == ONNX_EXTENSION
    );
    known && path.is_file() && ModelMetadata::sidecar_path(path).is_file()
}
