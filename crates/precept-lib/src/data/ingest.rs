//! CSV ingestion of operating-point tables
//!
//! Only the requested columns are read. The first bad row aborts the
//! whole load; rows are never skipped silently.

use crate::error::{PreceptError, Result};
use crate::models::Frame;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Read the named columns of a CSV file into a frame
pub fn read_csv<S: AsRef<str>>(path: &Path, columns: &[S]) -> Result<Frame> {
    let file = std::fs::File::open(path).map_err(|e| PreceptError::io(path, e))?;
    let frame = read_csv_from(file, columns)?;
    info!(
        path = %path.display(),
        rows = frame.num_rows(),
        columns = frame.num_columns(),
        "Loaded operating points"
    );
    Ok(frame)
}

/// Read the named columns of CSV data from any reader
pub fn read_csv_from<R: Read, S: AsRef<str>>(source: R, columns: &[S]) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let indices = columns
        .iter()
        .map(|name| {
            let name = name.as_ref();
            headers.iter().position(|h| h == name).ok_or_else(|| {
                PreceptError::DataShape(format!(
                    "CSV header lacks column '{}' (available: {})",
                    name,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut data: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        for (k, &idx) in indices.iter().enumerate() {
            let name = columns[k].as_ref();
            let cell = record.get(idx).unwrap_or_default();
            let value: f64 = cell.parse().map_err(|_| {
                PreceptError::DataShape(format!(
                    "line {}: column '{}' holds non-numeric value '{}'",
                    line, name, cell
                ))
            })?;
            if !value.is_finite() {
                return Err(PreceptError::DataShape(format!(
                    "line {}: column '{}' holds non-finite value '{}'",
                    line, name, cell
                )));
            }
            data[k].push(value);
        }
    }

    Frame::from_columns(
        columns
            .iter()
            .map(|c| c.as_ref().to_string())
            .zip(data),
    )
}

/// Write a frame as CSV with a header row
pub fn write_csv<W: Write>(frame: &Frame, sink: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(frame.names())?;

    let columns: Vec<&[f64]> = frame.iter().map(|(_, values)| values).collect();
    for row in 0..frame.num_rows() {
        writer.write_record(columns.iter().map(|c| c[row].to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| PreceptError::io("<csv output>", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const SAMPLE: &str = "\
W,L,Vgs,comment,id
1e-6,1e-6,0.6,ok,2.5e-5
2e-6, 1e-6 ,0.7,ok,4.0e-5
";

    #[test]
    fn test_reads_requested_columns_in_requested_order() {
        let frame = read_csv_from(SAMPLE.as_bytes(), &["id", "W"]).unwrap();
        assert_eq!(frame.names().collect::<Vec<_>>(), vec!["id", "W"]);
        assert_eq!(frame.column("W").unwrap(), &[1e-6, 2e-6]);
        assert_eq!(frame.num_rows(), 2);
    }

    #[test]
    fn test_missing_header() {
        let err = read_csv_from(SAMPLE.as_bytes(), &["Vds"]).unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("Vds"));
    }

    #[test]
    fn test_non_numeric_cell_reports_line() {
        let data = "W,id\n1e-6,1.0\n2e-6,abc\n";
        let err = read_csv_from(data.as_bytes(), &["W", "id"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "{}", msg);
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_non_finite_cell_rejected() {
        let data = "W,id\n1e-6,NaN\n";
        assert!(read_csv_from(data.as_bytes(), &["W", "id"])
            .unwrap_err()
            .is_data_error());
    }

    #[test]
    fn test_read_csv_from_file_and_write_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let frame = read_csv(file.path(), &["W", "Vgs"]).unwrap();

        let mut out = Vec::new();
        write_csv(&frame, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("W,Vgs\n"));

        let again = read_csv_from(text.as_bytes(), &["W", "Vgs"]).unwrap();
        assert_eq!(again, frame);
    }

    #[test]
    fn test_missing_file() {
        let err = read_csv(Path::new("/nonexistent/precept.csv"), &["W"]).unwrap_err();
        assert!(matches!(err, PreceptError::Io { .. }));
    }
}
