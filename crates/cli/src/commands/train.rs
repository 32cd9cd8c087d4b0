//! Train a surrogate from a YAML configuration and export it

use anyhow::{Context, Result};
use precept_lib::training::TrainingReport;
use precept_lib::{DataSource, OperatingPointData, TrainConfig, Trainer};
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use crate::output::{color_loss, format_loss, print_info, print_success, print_table};

/// Row for the epoch table
#[derive(Tabled)]
struct EpochRow {
    #[tabled(rename = "Epoch")]
    epoch: usize,
    #[tabled(rename = "Train loss")]
    train_loss: String,
    #[tabled(rename = "Test loss")]
    test_loss: String,
}

fn epoch_rows(report: &TrainingReport) -> Vec<EpochRow> {
    let first = report.epochs.first().map(|e| e.train_loss).unwrap_or(0.0);
    report
        .epochs
        .iter()
        .map(|e| EpochRow {
            epoch: e.epoch,
            train_loss: color_loss(e.train_loss, first),
            test_loss: format_loss(e.test_loss),
        })
        .collect()
}

pub fn train(config_path: &Path) -> Result<()> {
    let config = TrainConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let spec = Arc::new(config.column_spec()?);
    let data = OperatingPointData::new(
        DataSource::Csv(config.data_path.clone()),
        spec,
        config.data_config()?,
    )?;
    print_info(&format!(
        "{} training rows, {} test rows",
        data.train_frame().num_rows(),
        data.test_frame().num_rows()
    ));

    let trainer = Trainer::new(config.training_config())?;
    let (model, report) = trainer.fit(&data)?;
    print_table(&epoch_rows(&report));

    let exported = trainer.export(&model, &data, &config.model_dir, &config.device_name)?;
    print_success(&format!(
        "Exported {} and {}",
        exported.model_path.display(),
        exported.sidecar_path.display()
    ));
    print_info(&format!("sha256 {}", exported.sha256));

    Ok(())
}
