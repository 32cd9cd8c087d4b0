//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use precept_lib::Frame;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a frame as one table row per operating point, or as column JSON
pub fn print_frame(frame: &Frame, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_frame(frame)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(frame)?),
    }
    Ok(())
}

/// Render a frame as a table with one row per operating point
pub fn render_frame(frame: &Frame) -> String {
    if frame.num_columns() == 0 {
        return "No items found".yellow().to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(frame.names().map(String::from));
    for row in 0..frame.num_rows() {
        builder.push_record(frame.iter().map(|(_, values)| format_value(values[row])));
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a device quantity in scientific notation
pub fn format_value(value: f64) -> String {
    format!("{:.4e}", value)
}

/// Format an optional loss, `-` when absent
pub fn format_loss(loss: Option<f64>) -> String {
    match loss {
        Some(loss) => format!("{:.6}", loss),
        None => "-".to_string(),
    }
}

/// Color a loss against the first epoch's loss
pub fn color_loss(loss: f64, first: f64) -> String {
    let formatted = format_loss(Some(loss));
    if loss <= first * 0.5 {
        formatted.green().to_string()
    } else if loss <= first {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
