//! Batched prediction in training units
//!
//! Forward transforms a table of raw inputs with the frozen statistics, runs
//! the model once over the whole batch and inverse transforms the outputs.

use crate::error::{PreceptError, Result};
use crate::metadata::ModelMetadata;
use crate::model::{self, ModelRuntime};
use crate::models::Frame;
use crate::observability::PreceptMetrics;
use crate::transform::{Side, Transformer};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Loaded model plus the metadata it was trained with.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct Predictor {
    runtime: Arc<dyn ModelRuntime>,
    metadata: ModelMetadata,
    transformer: Transformer,
    metrics: PreceptMetrics,
}

impl Predictor {
    pub fn new(runtime: Arc<dyn ModelRuntime>, metadata: ModelMetadata) -> Self {
        let transformer = Transformer::new(Arc::clone(metadata.stats()));
        Self {
            runtime,
            metadata,
            transformer,
            metrics: PreceptMetrics::new(),
        }
    }

    /// Load a model artifact and the sidecar sharing its base name
    pub fn load(model_path: &Path) -> Result<Self> {
        let metadata = ModelMetadata::load(&ModelMetadata::sidecar_path(model_path))?;
        let spec = metadata.spec();
        let runtime = model::load(model_path, spec.num_x(), spec.num_y())?;

        if let Some(expected) = metadata.model_sha256() {
            let actual = model::file_digest(model_path)?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(PreceptError::ModelLoad(format!(
                    "{} has digest {}, metadata expects {}",
                    model_path.display(),
                    actual,
                    expected
                )));
            }
        }

        Ok(Self::new(runtime, metadata))
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn runtime_kind(&self) -> &'static str {
        self.runtime.kind()
    }

    /// Predict outputs for every row of `input`.
    ///
    /// `input` must hold exactly the declared input columns, in any order.
    /// The result holds the declared output columns in declared order.
    pub fn predict(&self, input: &Frame) -> Result<Frame> {
        let spec = self.metadata.spec();

        if let Some(extra) = input
            .names()
            .find(|name| !spec.inputs().iter().any(|c| c == name))
        {
            return Err(PreceptError::DataShape(format!(
                "unexpected input column '{}'",
                extra
            )));
        }
        let x = input.select(spec.inputs())?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PreceptError::DataShape(
                "inputs must be finite numbers".to_string(),
            ));
        }

        let rows = x.nrows();
        if rows == 0 {
            return Frame::from_columns(spec.outputs().iter().map(|name| (name.clone(), Vec::new())));
        }

        let start = Instant::now();
        let xn = self.transformer.forward_matrix(Side::Inputs, x.view())?;
        let yn = self.runtime.infer(xn.view())?;

        if yn.dim() != (rows, spec.num_y()) {
            return Err(PreceptError::Inference(format!(
                "model returned {:?} for {} rows of {} outputs",
                yn.dim(),
                rows,
                spec.num_y()
            )));
        }
        if yn.iter().any(|v| !v.is_finite()) {
            return Err(PreceptError::Inference(
                "model produced non-finite outputs".to_string(),
            ));
        }

        let y = self.transformer.inverse_matrix(Side::Outputs, yn.view())?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(PreceptError::Inference(
                "outputs left the invertible range of the power transform".to_string(),
            ));
        }
        let output = Frame::from_matrix(spec.outputs(), y.view())?;

        let elapsed = start.elapsed();
        self.metrics.observe_prediction(elapsed.as_secs_f64(), rows);
        debug!(rows, elapsed_us = elapsed.as_micros(), "Prediction completed");

        Ok(output)
    }
}
