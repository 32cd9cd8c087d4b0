//! Forward and inverse column transforms
//!
//! Forward: optional Yeo-Johnson power transform, then min-max scaling.
//! Inverse: un-scale, then invert the power transform. Both are pure
//! functions of the value and the frozen [`NormalizationStats`].

pub mod power;
pub mod scale;
mod stats;

pub use power::{fit_lambda, inv_yeo_johnson, yeo_johnson};
pub use scale::{scale, unscale, ScaleRange};
pub use stats::{ColumnStats, LambdaSource, NormalizationStats};

use crate::error::{PreceptError, Result};
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Which half of the column spec a matrix belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Inputs,
    Outputs,
}

/// Forward transform of one value of one column
pub fn forward(raw: f64, column: &ColumnStats, range: ScaleRange) -> f64 {
    let t = match column.lambda {
        Some(lambda) => yeo_johnson(raw, lambda),
        None => raw,
    };
    scale(t, column.min, column.max, range)
}

/// Inverse transform of one normalized value of one column
pub fn inverse(normalized: f64, column: &ColumnStats, range: ScaleRange) -> f64 {
    let t = unscale(normalized, column.min, column.max, range);
    match column.lambda {
        Some(lambda) => inv_yeo_johnson(t, lambda),
        None => t,
    }
}

/// Applies frozen statistics to values, rows and matrices.
///
/// Cheap to clone; workers share the same statistics through an `Arc`.
#[derive(Debug, Clone)]
pub struct Transformer {
    stats: Arc<NormalizationStats>,
}

impl Transformer {
    pub fn new(stats: Arc<NormalizationStats>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    fn columns(&self, side: Side) -> &[ColumnStats] {
        match side {
            Side::Inputs => self.stats.inputs(),
            Side::Outputs => self.stats.outputs(),
        }
    }

    fn lookup(&self, name: &str) -> Result<&ColumnStats> {
        self.stats.column(name).ok_or_else(|| {
            PreceptError::DataShape(format!("no normalization statistics for column '{}'", name))
        })
    }

    /// Forward transform a raw value of the named column
    pub fn forward(&self, name: &str, raw: f64) -> Result<f64> {
        Ok(forward(raw, self.lookup(name)?, self.stats.range()))
    }

    /// Inverse transform a normalized value of the named column
    pub fn inverse(&self, name: &str, normalized: f64) -> Result<f64> {
        Ok(inverse(normalized, self.lookup(name)?, self.stats.range()))
    }

    /// Forward transform one row laid out in the side's column order
    pub fn forward_row(&self, side: Side, raw: &[f64]) -> Result<Vec<f64>> {
        self.apply_row(side, raw, forward)
    }

    /// Inverse transform one row laid out in the side's column order
    pub fn inverse_row(&self, side: Side, normalized: &[f64]) -> Result<Vec<f64>> {
        self.apply_row(side, normalized, inverse)
    }

    fn apply_row(
        &self,
        side: Side,
        row: &[f64],
        f: fn(f64, &ColumnStats, ScaleRange) -> f64,
    ) -> Result<Vec<f64>> {
        let columns = self.columns(side);
        if row.len() != columns.len() {
            return Err(PreceptError::DataShape(format!(
                "{:?} row has {} values, statistics describe {}",
                side,
                row.len(),
                columns.len()
            )));
        }
        let range = self.stats.range();
        Ok(row
            .iter()
            .zip(columns)
            .map(|(&v, stats)| f(v, stats, range))
            .collect())
    }

    /// Forward transform a matrix whose columns follow the side's order
    pub fn forward_matrix(&self, side: Side, raw: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.apply(side, raw, forward)
    }

    /// Inverse transform a matrix whose columns follow the side's order
    pub fn inverse_matrix(
        &self,
        side: Side,
        normalized: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        self.apply(side, normalized, inverse)
    }

    fn apply(
        &self,
        side: Side,
        values: ArrayView2<'_, f64>,
        f: fn(f64, &ColumnStats, ScaleRange) -> f64,
    ) -> Result<Array2<f64>> {
        let columns = self.columns(side);
        if values.ncols() != columns.len() {
            return Err(PreceptError::DataShape(format!(
                "{:?} matrix has {} columns, statistics describe {}",
                side,
                values.ncols(),
                columns.len()
            )));
        }

        let range = self.stats.range();
        let mut out = values.to_owned();
        for (mut col, stats) in out.columns_mut().into_iter().zip(columns) {
            col.mapv_inplace(|v| f(v, stats, range));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnSpec;
    use crate::models::Frame;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn column(min: f64, max: f64, lambda: Option<f64>) -> ColumnStats {
        ColumnStats {
            name: "c".into(),
            min,
            max,
            lambda,
        }
    }

    #[test]
    fn test_round_trip_composed() {
        let range = ScaleRange::default();
        for &lambda in &[None, Some(0.0), Some(0.2), Some(1.0), Some(2.0), Some(-0.7)] {
            let raw = [-0.3, 0.0, 1e-7, 0.02, 0.5, 0.9];
            let lo = raw.iter().map(|&v| lambda.map_or(v, |l| yeo_johnson(v, l)));
            let min = lo.clone().fold(f64::INFINITY, f64::min);
            let max = lo.fold(f64::NEG_INFINITY, f64::max);
            let col = column(min, max, lambda);
            for &v in &raw {
                let n = forward(v, &col, range);
                assert!((-1e-12..=1.0 + 1e-12).contains(&n));
                assert_relative_eq!(inverse(n, &col, range), v, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_inverse_then_forward() {
        let col = column(-2.0, 3.0, Some(0.5));
        let range = ScaleRange::new(-1.0, 1.0);
        for &n in &[-1.0, -0.25, 0.0, 0.8, 1.0] {
            let raw = inverse(n, &col, range);
            assert_relative_eq!(forward(raw, &col, range), n, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_column_fallback() {
        let col = column(5.0, 5.0, None);
        let range = ScaleRange::default();
        for _ in 0..3 {
            let n = forward(5.0, &col, range);
            assert_eq!(n, range.lo);
            assert!(n.is_finite());
        }
        assert_eq!(inverse(0.3, &col, range), 5.0);
    }

    #[test]
    fn test_degenerate_column_from_training_data() {
        let spec = ColumnSpec::new(&["T", "Vgs"], &["id"], &[], &[]).unwrap();
        let train = Frame::from_columns(vec![
            ("T", vec![5.0, 5.0, 5.0]),
            ("Vgs", vec![0.1, 0.5, 0.9]),
            ("id", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();
        let stats = NormalizationStats::fit(
            &train,
            &spec,
            &LambdaSource::Fit,
            &LambdaSource::Fit,
            ScaleRange::default(),
        )
        .unwrap();
        assert!(stats.column("T").unwrap().is_degenerate());

        let transformer = Transformer::new(Arc::new(stats));
        assert_eq!(transformer.forward("T", 5.0).unwrap(), 0.0);
        assert_eq!(transformer.inverse("T", 0.0).unwrap(), 5.0);
    }

    #[test]
    fn test_matrix_transform_is_columnwise() {
        let stats = NormalizationStats::from_parts(
            vec![column(0.0, 10.0, None), column(-1.0, 1.0, None)],
            vec![column(0.0, 4.0, Some(1.0))],
            ScaleRange::default(),
        )
        .unwrap();
        let transformer = Transformer::new(Arc::new(stats));

        let x = array![[5.0, 0.0], [10.0, 1.0]];
        let n = transformer.forward_matrix(Side::Inputs, x.view()).unwrap();
        assert_eq!(n, array![[0.5, 0.5], [1.0, 1.0]]);

        let back = transformer.inverse_matrix(Side::Inputs, n.view()).unwrap();
        assert_eq!(back, x);

        let wrong = array![[1.0, 2.0, 3.0]];
        assert!(transformer
            .forward_matrix(Side::Inputs, wrong.view())
            .is_err());
    }

    #[test]
    fn test_row_transform() {
        let stats = NormalizationStats::from_parts(
            vec![column(0.0, 10.0, None), column(-1.0, 1.0, None)],
            vec![column(0.0, 4.0, None)],
            ScaleRange::default(),
        )
        .unwrap();
        let transformer = Transformer::new(Arc::new(stats));

        let row = transformer.forward_row(Side::Inputs, &[5.0, 1.0]).unwrap();
        assert_eq!(row, vec![0.5, 1.0]);
        assert_eq!(
            transformer.inverse_row(Side::Outputs, &[0.25]).unwrap(),
            vec![1.0]
        );
        assert!(transformer
            .forward_row(Side::Outputs, &[1.0, 2.0])
            .unwrap_err()
            .is_data_error());
    }

    #[test]
    fn test_unknown_column() {
        let stats = NormalizationStats::from_parts(vec![], vec![], ScaleRange::default()).unwrap();
        let transformer = Transformer::new(Arc::new(stats));
        assert!(transformer.forward("W", 1.0).unwrap_err().is_data_error());
    }
}
