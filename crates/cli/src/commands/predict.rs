//! Run a trained model locally over a CSV table of inputs

use anyhow::{Context, Result};
use precept_lib::data::{read_csv, write_csv};
use precept_lib::Predictor;
use std::path::Path;

use crate::output::{print_frame, print_success, OutputFormat};

pub fn predict(
    model_path: &Path,
    input_path: &Path,
    output_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let predictor = Predictor::load(model_path)
        .with_context(|| format!("Failed to load model {}", model_path.display()))?;

    let inputs = read_csv(input_path, predictor.metadata().spec().inputs())?;
    let outputs = predictor.predict(&inputs)?;

    match output_path {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&outputs, file)?;
            print_success(&format!(
                "Wrote {} rows to {}",
                outputs.num_rows(),
                path.display()
            ));
        }
        None => print_frame(&outputs, format)?,
    }

    Ok(())
}
