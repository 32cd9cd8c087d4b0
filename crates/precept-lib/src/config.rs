//! Training configuration
//!
//! Read once from a YAML file, overridable through `PCT_` environment
//! variables, then turned into the typed settings of each component.

use crate::columns::ColumnSpec;
use crate::data::DataConfig;
use crate::error::{PreceptError, Result};
use crate::model::Activation;
use crate::training::TrainingConfig;
use crate::transform::{LambdaSource, ScaleRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `PCT_EPOCHS=20`
pub const ENV_PREFIX: &str = "PCT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Base name of the exported model and sidecar
    pub device_name: String,
    /// CSV table of operating points
    pub data_path: PathBuf,
    pub model_dir: PathBuf,

    pub params_x: Vec<String>,
    pub params_y: Vec<String>,
    #[serde(default)]
    pub trafo_mask_x: Vec<String>,
    #[serde(default)]
    pub trafo_mask_y: Vec<String>,
    /// Empty means fit lambdas on the training data
    #[serde(default)]
    pub lambdas_x: Vec<f64>,
    #[serde(default)]
    pub lambdas_y: Vec<f64>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_test_split")]
    pub test_split: f64,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
    #[serde(default = "default_range")]
    pub range: Vec<f64>,

    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<usize>,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

fn default_batch_size() -> usize {
    DataConfig::default().batch_size
}

fn default_test_split() -> f64 {
    DataConfig::default().test_split
}

fn default_num_workers() -> usize {
    DataConfig::default().num_workers
}

fn default_rng_seed() -> u64 {
    DataConfig::default().rng_seed
}

fn default_range() -> Vec<f64> {
    ScaleRange::default().as_array().to_vec()
}

fn default_epochs() -> usize {
    TrainingConfig::default().epochs
}

fn default_learning_rate() -> f64 {
    TrainingConfig::default().learning_rate
}

fn default_hidden_layers() -> Vec<usize> {
    TrainingConfig::default().hidden_layers
}

impl TrainConfig {
    /// Load from a YAML file with environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when given
    fn load_with_env(path: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        if !path.exists() {
            return Err(PreceptError::Configuration(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        let builder = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            );
        Self::build(builder)
    }

    /// Parse YAML text without environment overrides
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Yaml));
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| PreceptError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every derived setting once
    pub fn validate(&self) -> Result<()> {
        if self.device_name.trim().is_empty() {
            return Err(PreceptError::Configuration(
                "device_name must not be empty".to_string(),
            ));
        }
        self.column_spec()?;
        self.data_config()?;
        self.training_config().validate()
    }

    pub fn column_spec(&self) -> Result<ColumnSpec> {
        ColumnSpec::new(
            self.params_x.as_slice(),
            self.params_y.as_slice(),
            self.trafo_mask_x.as_slice(),
            self.trafo_mask_y.as_slice(),
        )
    }

    pub fn data_config(&self) -> Result<DataConfig> {
        let range = match self.range.as_slice() {
            &[lo, hi] => ScaleRange::new(lo, hi),
            other => {
                return Err(PreceptError::Configuration(format!(
                    "range needs exactly two bounds, got {:?}",
                    other
                )))
            }
        };
        if !range.is_valid() {
            return Err(PreceptError::Configuration(format!(
                "range [{}, {}] is not a proper interval",
                range.lo, range.hi
            )));
        }
        if self.batch_size == 0 {
            return Err(PreceptError::Configuration(
                "batch_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.test_split) {
            return Err(PreceptError::Configuration(format!(
                "test_split {} must be within [0, 1)",
                self.test_split
            )));
        }
        for (lambdas, mask, side) in [
            (&self.lambdas_x, &self.trafo_mask_x, "x"),
            (&self.lambdas_y, &self.trafo_mask_y, "y"),
        ] {
            if !lambdas.is_empty() && lambdas.len() != mask.len() {
                return Err(PreceptError::Configuration(format!(
                    "lambdas_{} has {} entries for {} masked columns",
                    side,
                    lambdas.len(),
                    mask.len()
                )));
            }
        }

        Ok(DataConfig {
            batch_size: self.batch_size,
            test_split: self.test_split,
            num_workers: self.num_workers,
            rng_seed: self.rng_seed,
            lambdas_x: LambdaSource::from_list(self.lambdas_x.clone()),
            lambdas_y: LambdaSource::from_list(self.lambdas_y.clone()),
            range,
        })
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            hidden_layers: self.hidden_layers.clone(),
            activation: self.activation,
            seed: self.rng_seed,
            max_steps: self.max_steps,
        }
    }
}
