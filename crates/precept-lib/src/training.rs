//! Surrogate training
//!
//! Fits an [`Mlp`] on normalized operating points with Adam, evaluates it on
//! the held-out partition after every epoch and exports the trained network
//! together with its metadata sidecar.

use crate::data::{BatchLoader, OperatingPointData};
use crate::error::{PreceptError, Result};
use crate::metadata::ModelMetadata;
use crate::model::{file_digest, Activation, Adam, Mlp, NATIVE_EXTENSION};
use crate::observability::{EventLogger, PreceptMetrics};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Network and optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub hidden_layers: Vec<usize>,
    #[serde(default)]
    pub activation: Activation,
    /// Seeds weight initialization
    pub seed: u64,
    /// Stop after this many optimizer steps, across epochs
    #[serde(default)]
    pub max_steps: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 1e-3,
            hidden_layers: vec![64, 128, 64],
            activation: Activation::Relu,
            seed: 666,
            max_steps: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(PreceptError::Configuration(
                "epochs must be positive".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PreceptError::Configuration(format!(
                "learning rate {} must be a positive number",
                self.learning_rate
            )));
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(PreceptError::Configuration(
                "hidden layers must have at least one unit".to_string(),
            ));
        }
        if self.max_steps == Some(0) {
            return Err(PreceptError::Configuration(
                "max_steps must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Losses of one epoch, in normalized units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_loss: f64,
    /// `None` when the test partition is empty
    pub test_loss: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub steps: usize,
}

impl TrainingReport {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

/// Files written by [`Trainer::export`]
#[derive(Debug, Clone)]
pub struct ExportedModel {
    pub model_path: PathBuf,
    pub sidecar_path: PathBuf,
    pub sha256: String,
}

pub struct Trainer {
    config: TrainingConfig,
    logger: EventLogger,
    metrics: PreceptMetrics,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            logger: EventLogger::new("trainer"),
            metrics: PreceptMetrics::new(),
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train a fresh network on the training partition of `data`
    pub fn fit(&self, data: &OperatingPointData) -> Result<(Mlp, TrainingReport)> {
        let spec = data.spec();
        let mut model = Mlp::new(
            spec.num_x(),
            &self.config.hidden_layers,
            spec.num_y(),
            self.config.activation,
            self.config.seed,
        );
        let mut optimizer = Adam::new(self.config.learning_rate);

        let train = data.train_loader()?;
        let test = data.test_loader()?;
        self.logger
            .training_started(train.num_rows(), test.num_rows(), self.config.epochs);

        let mut report = TrainingReport::default();
        'epochs: for epoch in 0..self.config.epochs {
            let mut loss_sum = 0.0;
            let mut rows = 0usize;

            let seed = data.config().rng_seed.wrapping_add(epoch as u64);
            for batch in train.iter_shuffled(seed) {
                let batch = batch?;
                let (loss, grads) = model.gradients(batch.x.view(), batch.y.view())?;
                if !loss.is_finite() {
                    return Err(PreceptError::Inference(format!(
                        "training loss diverged in epoch {}",
                        epoch
                    )));
                }
                optimizer.step(&mut model, &grads);

                loss_sum += loss * batch.len() as f64;
                rows += batch.len();
                report.steps += 1;

                if self.config.max_steps.is_some_and(|max| report.steps >= max) {
                    self.finish_epoch(&model, &test, epoch, loss_sum, rows, &mut report)?;
                    debug!(steps = report.steps, "Step limit reached");
                    break 'epochs;
                }
            }

            self.finish_epoch(&model, &test, epoch, loss_sum, rows, &mut report)?;
        }

        Ok((model, report))
    }

    fn finish_epoch(
        &self,
        model: &Mlp,
        test: &BatchLoader,
        epoch: usize,
        loss_sum: f64,
        rows: usize,
        report: &mut TrainingReport,
    ) -> Result<()> {
        let train_loss = if rows > 0 { loss_sum / rows as f64 } else { 0.0 };
        let test_loss = evaluate(model, test)?;

        self.logger.epoch_completed(epoch, train_loss, test_loss);
        self.metrics.set_epoch_loss(train_loss, test_loss);
        report.epochs.push(EpochReport {
            epoch,
            train_loss,
            test_loss,
        });
        Ok(())
    }

    /// Write `<model_dir>/<name>.mlp` and its `.yml` sidecar
    pub fn export(
        &self,
        model: &Mlp,
        data: &OperatingPointData,
        model_dir: &Path,
        name: &str,
    ) -> Result<ExportedModel> {
        std::fs::create_dir_all(model_dir).map_err(|e| PreceptError::io(model_dir, e))?;

        let model_path = model_dir.join(format!("{}.{}", name, NATIVE_EXTENSION));
        model.save(&model_path)?;
        let sha256 = file_digest(&model_path)?;

        let sidecar_path = ModelMetadata::sidecar_path(&model_path);
        ModelMetadata::new(Arc::clone(data.spec()), Arc::clone(data.stats()))?
            .with_model_sha256(sha256.clone())
            .save(&sidecar_path)?;

        self.logger.model_exported(
            &model_path.display().to_string(),
            &sidecar_path.display().to_string(),
            &sha256,
        );

        Ok(ExportedModel {
            model_path,
            sidecar_path,
            sha256,
        })
    }
}

/// Row-weighted mean squared error over every batch of `loader`
pub fn evaluate(model: &Mlp, loader: &BatchLoader) -> Result<Option<f64>> {
    let mut sum = 0.0;
    let mut rows = 0usize;
    for batch in loader.iter() {
        let batch = batch?;
        let prediction = model.forward(batch.x.view())?;
        let diff = prediction - &batch.y;
        sum += diff.mapv(|d| d * d).mean().unwrap_or(0.0) * batch.len() as f64;
        rows += batch.len();
    }
    Ok((rows > 0).then(|| sum / rows as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnSpec;
    use crate::data::{DataConfig, DataSource};
    use crate::models::Frame;
    use crate::transform::LambdaSource;

    fn data(rows: usize) -> OperatingPointData {
        seeded_data(rows, DataConfig::default().rng_seed)
    }

    fn seeded_data(rows: usize, rng_seed: u64) -> OperatingPointData {
        let spec = Arc::new(ColumnSpec::new(&["a", "b"], &["y"], &[], &["y"]).unwrap());
        let a: Vec<f64> = (0..rows).map(|i| (i % 17) as f64 / 16.0).collect();
        let b: Vec<f64> = (0..rows).map(|i| (i % 11) as f64 / 10.0).collect();
        let y = a.iter().zip(&b).map(|(a, b)| 1e-3 * (a + 2.0 * b * b)).collect();
        let frame = Frame::from_columns(vec![("a", a), ("b", b), ("y", y)]).unwrap();
        let config = DataConfig {
            batch_size: 32,
            num_workers: 2,
            rng_seed,
            lambdas_y: LambdaSource::Fixed(vec![0.2]),
            ..DataConfig::default()
        };
        OperatingPointData::new(DataSource::Frame(frame), spec, config).unwrap()
    }

    fn config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            learning_rate: 5e-3,
            hidden_layers: vec![16, 16],
            activation: Activation::Tanh,
            seed: 1,
            max_steps: None,
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let data = data(400);
        let (_, report) = Trainer::new(config(40)).unwrap().fit(&data).unwrap();
        assert_eq!(report.epochs.len(), 40);

        let first = report.epochs[0].train_loss;
        let last = report.last().unwrap();
        assert!(last.train_loss < first * 0.5, "{} -> {}", first, last.train_loss);
        assert!(last.test_loss.unwrap().is_finite());
    }

    #[test]
    fn test_training_is_deterministic() {
        let data = data(120);
        let trainer = Trainer::new(config(3)).unwrap();
        let (a, _) = trainer.fit(&data).unwrap();
        let (b, _) = trainer.fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_largest_seed_wraps_across_epochs() {
        let data = seeded_data(120, u64::MAX);
        let (_, report) = Trainer::new(config(3)).unwrap().fit(&data).unwrap();
        assert_eq!(report.epochs.len(), 3);
        assert!(report.epochs.iter().all(|e| e.train_loss.is_finite()));
    }

    #[test]
    fn test_max_steps_stops_early() {
        let data = data(320);
        let trainer = Trainer::new(TrainingConfig {
            max_steps: Some(5),
            ..config(10)
        })
        .unwrap();
        let (_, report) = trainer.fit(&data).unwrap();
        assert_eq!(report.steps, 5);
        assert_eq!(report.epochs.len(), 1);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Trainer::new(config(0)).is_err());
        assert!(Trainer::new(TrainingConfig {
            learning_rate: -1.0,
            ..config(1)
        })
        .is_err());
        assert!(Trainer::new(TrainingConfig {
            hidden_layers: vec![8, 0],
            ..config(1)
        })
        .is_err());
    }

    #[test]
    fn test_export_writes_model_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let data = data(100);
        let trainer = Trainer::new(config(1)).unwrap();
        let (model, _) = trainer.fit(&data).unwrap();

        let exported = trainer
            .export(&model, &data, &dir.path().join("models"), "ptmn90")
            .unwrap();
        assert!(exported.model_path.ends_with("ptmn90.mlp"));
        assert!(exported.sidecar_path.ends_with("ptmn90.yml"));

        let meta = ModelMetadata::load(&exported.sidecar_path).unwrap();
        assert_eq!(meta.model_sha256(), Some(exported.sha256.as_str()));
        assert_eq!(meta.stats(), data.stats());
        assert_eq!(Mlp::load(&exported.model_path).unwrap(), model);
    }
}
