//! Dataset adapter
//!
//! Ingests an operating-point table, splits it into seeded train/test
//! partitions, fits normalization statistics on the training rows only and
//! hands out batched views over transformed data.

mod ingest;
mod loader;
mod split;

pub use ingest::{read_csv, read_csv_from, write_csv};
pub use loader::{Batch, BatchLoader, Batches};
pub use split::{split_indices, Partition};

use crate::columns::ColumnSpec;
use crate::error::{PreceptError, Result};
use crate::models::Frame;
use crate::transform::{LambdaSource, NormalizationStats, ScaleRange, Transformer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Where operating points come from
#[derive(Debug, Clone)]
pub enum DataSource {
    Csv(PathBuf),
    Frame(Frame),
}

/// Loading, splitting and normalization settings
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub batch_size: usize,
    /// Fraction of rows held out for testing, within `[0, 1)`
    pub test_split: f64,
    /// Batch transform workers; 0 transforms on the caller thread
    pub num_workers: usize,
    pub rng_seed: u64,
    pub lambdas_x: LambdaSource,
    pub lambdas_y: LambdaSource,
    pub range: ScaleRange,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            test_split: 0.2,
            num_workers: 6,
            rng_seed: 666,
            lambdas_x: LambdaSource::Fit,
            lambdas_y: LambdaSource::Fit,
            range: ScaleRange::default(),
        }
    }
}

/// Split, normalized operating-point data ready for training
pub struct OperatingPointData {
    spec: Arc<ColumnSpec>,
    config: DataConfig,
    partition: Partition,
    stats: Arc<NormalizationStats>,
    train: Frame,
    test: Frame,
}

impl OperatingPointData {
    pub fn new(source: DataSource, spec: Arc<ColumnSpec>, config: DataConfig) -> Result<Self> {
        let wanted: Vec<&str> = spec
            .inputs()
            .iter()
            .chain(spec.outputs().iter())
            .map(String::as_str)
            .collect();

        let frame = match source {
            DataSource::Csv(path) => read_csv(&path, &wanted)?,
            DataSource::Frame(frame) => {
                // Validates presence of every column, in spec order
                let matrix = frame.select(&wanted)?;
                if let Some(((row, col), value)) =
                    matrix.indexed_iter().find(|(_, v)| !v.is_finite())
                {
                    return Err(PreceptError::DataShape(format!(
                        "row {} column '{}' holds non-finite value {}",
                        row, wanted[col], value
                    )));
                }
                Frame::from_matrix(&wanted, matrix.view())?
            }
        };

        let partition = split_indices(frame.num_rows(), config.test_split, config.rng_seed)?;
        let train = frame.take_rows(&partition.train);
        let test = frame.take_rows(&partition.test);

        // Frozen before any loader worker exists
        let stats = Arc::new(NormalizationStats::fit(
            &train,
            &spec,
            &config.lambdas_x,
            &config.lambdas_y,
            config.range,
        )?);

        info!(
            rows = frame.num_rows(),
            train_rows = train.num_rows(),
            test_rows = test.num_rows(),
            seed = config.rng_seed,
            "Operating points split"
        );

        Ok(Self {
            spec,
            config,
            partition,
            stats,
            train,
            test,
        })
    }

    pub fn spec(&self) -> &Arc<ColumnSpec> {
        &self.spec
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Statistics to persist as inference metadata
    pub fn stats(&self) -> &Arc<NormalizationStats> {
        &self.stats
    }

    pub fn transformer(&self) -> Transformer {
        Transformer::new(Arc::clone(&self.stats))
    }

    pub fn train_frame(&self) -> &Frame {
        &self.train
    }

    pub fn test_frame(&self) -> &Frame {
        &self.test
    }

    pub fn train_loader(&self) -> Result<BatchLoader> {
        self.loader(&self.train)
    }

    pub fn test_loader(&self) -> Result<BatchLoader> {
        self.loader(&self.test)
    }

    fn loader(&self, frame: &Frame) -> Result<BatchLoader> {
        BatchLoader::new(
            frame.select(self.spec.inputs())?,
            frame.select(self.spec.outputs())?,
            self.transformer(),
            self.config.batch_size,
            self.config.num_workers,
        )
    }
}
