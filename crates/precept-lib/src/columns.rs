//! Column specification
//!
//! Declares which named columns are model inputs and outputs, and which of
//! them pass through the power transform. The declared order is the
//! positional order of every numeric row built from a spec.

use crate::error::{PreceptError, Result};
use serde::Serialize;
use std::collections::HashSet;

/// Input/output column names with their transform masks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    inputs: Vec<String>,
    outputs: Vec<String>,
    mask_x: Vec<String>,
    mask_y: Vec<String>,
}

impl ColumnSpec {
    /// Build and validate a column spec.
    ///
    /// Masks are reordered to follow the declared column order.
    pub fn new<S: AsRef<str>>(
        inputs: &[S],
        outputs: &[S],
        mask_x: &[S],
        mask_y: &[S],
    ) -> Result<Self> {
        let inputs: Vec<String> = inputs.iter().map(|s| s.as_ref().to_string()).collect();
        let outputs: Vec<String> = outputs.iter().map(|s| s.as_ref().to_string()).collect();

        if inputs.is_empty() {
            return Err(PreceptError::Configuration(
                "at least one input column is required".to_string(),
            ));
        }
        if outputs.is_empty() {
            return Err(PreceptError::Configuration(
                "at least one output column is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in inputs.iter().chain(outputs.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(PreceptError::Configuration(format!(
                    "column '{}' is declared more than once",
                    name
                )));
            }
        }

        let mask_x = ordered_mask(&inputs, mask_x, "input")?;
        let mask_y = ordered_mask(&outputs, mask_y, "output")?;

        Ok(Self {
            inputs,
            outputs,
            mask_x,
            mask_y,
        })
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn num_x(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_y(&self) -> usize {
        self.outputs.len()
    }

    /// Transformed input columns, in input order
    pub fn mask_x(&self) -> &[String] {
        &self.mask_x
    }

    /// Transformed output columns, in output order
    pub fn mask_y(&self) -> &[String] {
        &self.mask_y
    }

    /// Per-input flags telling whether the column is power transformed
    pub fn input_flags(&self) -> Vec<bool> {
        flags(&self.inputs, &self.mask_x)
    }

    /// Per-output flags telling whether the column is power transformed
    pub fn output_flags(&self) -> Vec<bool> {
        flags(&self.outputs, &self.mask_y)
    }
}

fn ordered_mask<S: AsRef<str>>(columns: &[String], mask: &[S], side: &str) -> Result<Vec<String>> {
    let mut requested = HashSet::new();
    for name in mask {
        let name = name.as_ref();
        if !columns.iter().any(|c| c == name) {
            return Err(PreceptError::Configuration(format!(
                "{} transform mask names unknown column '{}'",
                side, name
            )));
        }
        if !requested.insert(name) {
            return Err(PreceptError::Configuration(format!(
                "{} transform mask lists '{}' twice",
                side, name
            )));
        }
    }
    Ok(columns
        .iter()
        .filter(|c| requested.contains(c.as_str()))
        .cloned()
        .collect())
}

fn flags(columns: &[String], mask: &[String]) -> Vec<bool> {
    columns.iter().map(|c| mask.contains(c)).collect()
}
