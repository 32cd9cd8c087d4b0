//! Query a running prediction server

use anyhow::Result;
use precept_lib::data::read_csv;
use std::path::Path;

use crate::client::ApiClient;
use crate::output::{print_frame, print_info, print_warning, OutputFormat};

/// Send the model's input columns of a CSV table to the server
pub async fn query(client: &ApiClient, input_path: &Path, format: OutputFormat) -> Result<()> {
    let columns = client.columns().await?;
    let inputs = read_csv(input_path, columns.inputs.as_slice())?;
    let outputs = match client.predict(&inputs).await {
        Ok(outputs) => outputs,
        Err(e) => {
            if e.is_client_failure() {
                print_warning("The server rejected the table; `pct columns` lists what it expects");
            }
            return Err(e.into());
        }
    };
    print_frame(&outputs, format)
}

/// Show the columns the served model expects and returns
pub async fn columns(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let columns = client.columns().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&columns)?),
        OutputFormat::Table => {
            print_info(&format!("Inputs:  {}", columns.inputs.join(", ")));
            print_info(&format!("Outputs: {}", columns.outputs.join(", ")));
        }
    }
    Ok(())
}
