//! Core data models for operating-point tables

use crate::error::{PreceptError, Result};
use indexmap::IndexMap;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Column-oriented table of operating points.
///
/// Keeps insertion order and guarantees every column has the same number
/// of rows. Serializes as `{"name": [values...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "IndexMap<String, Vec<f64>>",
    into = "IndexMap<String, Vec<f64>>"
)]
pub struct Frame {
    columns: IndexMap<String, Vec<f64>>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from `(name, values)` pairs
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut frame = Self::new();
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    /// Build a frame from a row-major matrix whose columns follow `names`
    pub fn from_matrix<S: AsRef<str>>(names: &[S], matrix: ArrayView2<'_, f64>) -> Result<Self> {
        if matrix.ncols() != names.len() {
            return Err(PreceptError::DataShape(format!(
                "matrix has {} columns but {} names were given",
                matrix.ncols(),
                names.len()
            )));
        }
        Self::from_columns(
            names
                .iter()
                .zip(matrix.columns())
                .map(|(name, col)| (name.as_ref().to_string(), col.to_vec())),
        )
    }

    /// Append a column; its length must match the existing columns
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(PreceptError::DataShape(format!(
                "column '{}' appears more than once",
                name
            )));
        }
        if let Some(rows) = self.num_rows_checked() {
            if values.len() != rows {
                return Err(PreceptError::DataShape(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    rows
                )));
            }
        }
        self.columns.insert(name, values);
        Ok(())
    }

    fn num_rows_checked(&self) -> Option<usize> {
        self.columns.values().next().map(Vec::len)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows_checked().unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Keep only the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), rows.iter().map(|&r| values[r]).collect()))
            .collect();
        Frame { columns }
    }

    /// Gather the named columns into a `rows x names.len()` matrix.
    ///
    /// The matrix column order is the order of `names`, never the frame's
    /// own insertion order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let rows = self.num_rows();
        let mut matrix = Array2::zeros((rows, names.len()));
        for (j, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let values = self.column(name).ok_or_else(|| {
                PreceptError::DataShape(format!("required column '{}' is missing", name))
            })?;
            for (i, v) in values.iter().enumerate() {
                matrix[[i, j]] = *v;
            }
        }
        Ok(matrix)
    }
}

impl TryFrom<IndexMap<String, Vec<f64>>> for Frame {
    type Error = PreceptError;

    fn try_from(columns: IndexMap<String, Vec<f64>>) -> Result<Self> {
        Frame::from_columns(columns)
    }
}

impl From<Frame> for IndexMap<String, Vec<f64>> {
    fn from(frame: Frame) -> Self {
        frame.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ragged_column_rejected() {
        let mut frame = Frame::new();
        frame.push_column("W", vec![1.0, 2.0]).unwrap();
        let err = frame.push_column("L", vec![1.0]).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut frame = Frame::new();
        frame.push_column("W", vec![1.0]).unwrap();
        assert!(frame.push_column("W", vec![2.0]).is_err());
    }

    #[test]
    fn test_select_follows_requested_order() {
        let frame = Frame::from_columns(vec![
            ("Vds", vec![0.6, 0.7]),
            ("W", vec![1e-6, 2e-6]),
            ("L", vec![3e-7, 4e-7]),
        ])
        .unwrap();
        let m = frame.select(&["W", "L", "Vds"]).unwrap();
        assert_eq!(m, array![[1e-6, 3e-7, 0.6], [2e-6, 4e-7, 0.7]]);
    }

    #[test]
    fn test_select_missing_column() {
        let frame = Frame::from_columns(vec![("W", vec![1.0])]).unwrap();
        let err = frame.select(&["W", "L"]).unwrap_err();
        assert!(err.to_string().contains("'L'"));
    }

    #[test]
    fn test_from_matrix_and_take_rows() {
        let m = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let frame = Frame::from_matrix(&["a", "b"], m.view()).unwrap();
        let picked = frame.take_rows(&[2, 0]);
        assert_eq!(picked.column("a").unwrap(), &[3.0, 1.0]);
        assert_eq!(picked.column("b").unwrap(), &[30.0, 10.0]);
    }

    #[test]
    fn test_json_keeps_column_order() {
        let frame = Frame::from_columns(vec![("vdsat", vec![0.1]), ("id", vec![2e-5])]).unwrap();
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.find("vdsat").unwrap() < json.find("id").unwrap());

        let ragged = serde_json::from_str::<Frame>(r#"{"a":[1.0],"b":[1.0,2.0]}"#);
        assert!(ragged.is_err());
    }
}
