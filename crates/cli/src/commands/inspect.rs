//! Show the metadata sidecar of a trained model

use anyhow::{Context, Result};
use precept_lib::model::file_digest;
use precept_lib::transform::ColumnStats;
use precept_lib::ModelMetadata;
use serde_json::json;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    format_value, print_info, print_success, print_table, print_warning, OutputFormat,
};

/// Row for the column table
#[derive(Tabled)]
struct ColumnRow {
    #[tabled(rename = "Column")]
    name: String,
    #[tabled(rename = "Role")]
    role: &'static str,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Lambda")]
    lambda: String,
}

fn column_row(stats: &ColumnStats, role: &'static str) -> ColumnRow {
    ColumnRow {
        name: stats.name.clone(),
        role,
        min: format_value(stats.min),
        max: format_value(stats.max),
        lambda: stats
            .lambda
            .map(|l| format!("{:.4}", l))
            .unwrap_or_else(|| "-".to_string()),
    }
}

pub fn inspect(model_path: &Path, format: OutputFormat) -> Result<()> {
    let sidecar = ModelMetadata::sidecar_path(model_path);
    let metadata = ModelMetadata::load(&sidecar)
        .with_context(|| format!("Failed to read {}", sidecar.display()))?;
    let stats = metadata.stats();
    let range = stats.range();

    if let OutputFormat::Json = format {
        let value = json!({
            "inputs": metadata.spec().inputs(),
            "outputs": metadata.spec().outputs(),
            "range": [range.lo, range.hi],
            "model_sha256": metadata.model_sha256(),
            "columns": stats
                .inputs()
                .iter()
                .chain(stats.outputs())
                .map(|c| json!({"name": c.name, "min": c.min, "max": c.max, "lambda": c.lambda}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let rows: Vec<ColumnRow> = stats
        .inputs()
        .iter()
        .map(|c| column_row(c, "input"))
        .chain(stats.outputs().iter().map(|c| column_row(c, "output")))
        .collect();
    print_table(&rows);
    print_info(&format!("Scaled range [{}, {}]", range.lo, range.hi));

    match (metadata.model_sha256(), model_path.is_file()) {
        (Some(expected), true) => {
            if file_digest(model_path)? == expected {
                print_success("Model checksum matches");
            } else {
                print_warning("Model checksum does not match the sidecar");
            }
        }
        (Some(_), false) => print_warning("Model artifact not found"),
        (None, _) => print_info("Sidecar carries no model checksum"),
    }

    Ok(())
}
