//! Normalization statistics
//!
//! Column-wise bounds and power-transform lambdas, fitted once on the
//! training partition and frozen afterwards. Bounds are measured after the
//! power transform, so they describe exactly what the scaler sees.

use super::power::{fit_lambda, yeo_johnson};
use super::scale::ScaleRange;
use crate::columns::ColumnSpec;
use crate::error::{PreceptError, Result};
use crate::models::Frame;
use rayon::prelude::*;
use tracing::debug;

/// Bounds and optional lambda for one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    pub name: String,
    pub min: f64,
    pub max: f64,
    /// Present only for power-transformed columns
    pub lambda: Option<f64>,
}

impl ColumnStats {
    pub fn is_transformed(&self) -> bool {
        self.lambda.is_some()
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Where the lambdas of one side's masked columns come from
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LambdaSource {
    /// Maximum-likelihood fit on the training partition
    #[default]
    Fit,
    /// One lambda per masked column, in mask order
    Fixed(Vec<f64>),
}

impl LambdaSource {
    /// An empty list means "fit"; anything else is taken verbatim
    pub fn from_list(lambdas: Vec<f64>) -> Self {
        if lambdas.is_empty() {
            LambdaSource::Fit
        } else {
            LambdaSource::Fixed(lambdas)
        }
    }
}

/// Frozen normalization parameters for every input and output column
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationStats {
    inputs: Vec<ColumnStats>,
    outputs: Vec<ColumnStats>,
    range: ScaleRange,
}

impl NormalizationStats {
    /// Fit statistics on a training partition.
    ///
    /// Callers must pass the training rows only.
    pub fn fit(
        train: &Frame,
        spec: &ColumnSpec,
        lambdas_x: &LambdaSource,
        lambdas_y: &LambdaSource,
        range: ScaleRange,
    ) -> Result<Self> {
        if !range.is_valid() {
            return Err(PreceptError::Configuration(format!(
                "scaling range [{}, {}] is not a proper interval",
                range.lo, range.hi
            )));
        }
        if train.is_empty() {
            return Err(PreceptError::Configuration(
                "training partition is empty".to_string(),
            ));
        }

        let inputs = fit_side(train, spec.inputs(), spec.mask_x(), lambdas_x, "input")?;
        let outputs = fit_side(train, spec.outputs(), spec.mask_y(), lambdas_y, "output")?;

        debug!(
            rows = train.num_rows(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "Normalization statistics fitted"
        );

        Ok(Self {
            inputs,
            outputs,
            range,
        })
    }

    /// Rebuild statistics from persisted parts, re-checking invariants
    pub fn from_parts(
        inputs: Vec<ColumnStats>,
        outputs: Vec<ColumnStats>,
        range: ScaleRange,
    ) -> Result<Self> {
        if !range.is_valid() {
            return Err(PreceptError::MetadataCodec(format!(
                "scaling range [{}, {}] is not a proper interval",
                range.lo, range.hi
            )));
        }
        for col in inputs.iter().chain(outputs.iter()) {
            if !col.min.is_finite() || !col.max.is_finite() {
                return Err(PreceptError::MetadataCodec(format!(
                    "bounds of '{}' are not finite",
                    col.name
                )));
            }
            if col.min > col.max {
                return Err(PreceptError::MetadataCodec(format!(
                    "column '{}' has min {} above max {}",
                    col.name, col.min, col.max
                )));
            }
            if let Some(lambda) = col.lambda {
                if !lambda.is_finite() {
                    return Err(PreceptError::MetadataCodec(format!(
                        "lambda of '{}' is not finite",
                        col.name
                    )));
                }
            }
        }
        Ok(Self {
            inputs,
            outputs,
            range,
        })
    }

    pub fn inputs(&self) -> &[ColumnStats] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ColumnStats] {
        &self.outputs
    }

    pub fn range(&self) -> ScaleRange {
        self.range
    }

    /// Look up a column on either side by name
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .find(|c| c.name == name)
    }

    /// Lambdas of the transformed inputs, in column order
    pub fn lambdas_x(&self) -> Vec<f64> {
        self.inputs.iter().filter_map(|c| c.lambda).collect()
    }

    /// Lambdas of the transformed outputs, in column order
    pub fn lambdas_y(&self) -> Vec<f64> {
        self.outputs.iter().filter_map(|c| c.lambda).collect()
    }
}

fn fit_side(
    train: &Frame,
    columns: &[String],
    mask: &[String],
    lambdas: &LambdaSource,
    side: &str,
) -> Result<Vec<ColumnStats>> {
    if let LambdaSource::Fixed(values) = lambdas {
        if values.len() != mask.len() {
            return Err(PreceptError::Configuration(format!(
                "{} side has {} transformed columns but {} lambdas",
                side,
                mask.len(),
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|l| !l.is_finite()) {
            return Err(PreceptError::Configuration(format!(
                "{} lambda {} is not finite",
                side, bad
            )));
        }
    }

    columns
        .par_iter()
        .map(|name| {
            let values = train.column(name).ok_or_else(|| {
                PreceptError::DataShape(format!("training data lacks column '{}'", name))
            })?;
            if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
                return Err(PreceptError::DataShape(format!(
                    "column '{}' holds a non-finite value at row {}",
                    name, pos
                )));
            }

            let lambda = match mask.iter().position(|m| m == name) {
                None => None,
                Some(k) => Some(match lambdas {
                    LambdaSource::Fixed(fixed) => fixed[k],
                    LambdaSource::Fit => fit_lambda(values),
                }),
            };

            let (min, max) = values
                .iter()
                .map(|&v| lambda.map_or(v, |l| yeo_johnson(v, l)))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                    (lo.min(t), hi.max(t))
                });
            if !min.is_finite() || !max.is_finite() {
                return Err(PreceptError::DataShape(format!(
                    "column '{}' overflows under lambda {:?}",
                    name, lambda
                )));
            }

            Ok(ColumnStats {
                name: name.clone(),
                min,
                max,
                lambda,
            })
        })
        .collect()
}
