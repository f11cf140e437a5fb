//! CSV export of a store snapshot and its run summary.
//!
//! - `export_csv` writes one row per sample: time,setpoint,measured,error,p,i,d
//!   (an unset error is an empty cell).
//! - `export_summary` writes `metric,value,description` rows.

use std::{fs::create_dir_all, path::Path};

use csv::WriterBuilder;
use log::info;

use crate::control::sample::Sample;
use crate::error::ExportError;
use crate::utils::metrics::RunSummary;

const SAMPLE_HEADER: [&str; 7] = ["time", "setpoint", "measured", "error", "p", "i", "d"];

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes every sample to `path`, returning the number of data rows.
pub fn export_csv<P: AsRef<Path>>(samples: &[Sample], path: P) -> Result<usize, ExportError> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(SAMPLE_HEADER)?;
    for sample in samples {
        wtr.serialize(sample)?;
    }
    wtr.flush()?;

    info!("[Export] {} rows written to {:?}", samples.len(), path);
    Ok(samples.len())
}

pub fn export_summary<P: AsRef<Path>>(summary: &RunSummary, path: P) -> Result<(), ExportError> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let final_measured = summary
        .final_measured
        .map(|v| format!("{:.6}", v))
        .unwrap_or_default();

    let rows = [
        ("rows", summary.rows.to_string(), "Rows in the store"),
        ("processed", summary.processed.to_string(), "Rows processed by the controller"),
        ("mean_abs_error", format!("{:.6}", summary.mean_abs_error), "Mean absolute error"),
        ("max_abs_error", format!("{:.6}", summary.max_abs_error), "Maximum absolute error"),
        ("iae", format!("{:.6}", summary.iae), "Integral of absolute error"),
        ("final_measured", final_measured, "Last processed measured value"),
    ];

    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(["metric", "value", "description"])?;
    for (metric, value, description) in rows {
        wtr.write_record([metric, value.as_str(), description])?;
    }
    wtr.flush()?;

    info!("[Export] summary written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn samples_export_with_header_and_blank_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs/run.csv");
        let samples = [
            Sample::new(0.0, 50.0, 41.0).with_error(10.0),
            Sample::new(0.1, 50.0, 40.0),
        ];

        let written = export_csv(&samples, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(written, 2);
        assert_eq!(lines[0], "time,setpoint,measured,error,p,i,d");
        assert_eq!(lines[1], "0.0,50.0,41.0,10.0,0.0,0.0,0.0");
        assert_eq!(lines[2], "0.1,50.0,40.0,,0.0,0.0,0.0");
    }

    #[test]
    fn summary_export_lists_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let summary = RunSummary {
            rows: 4,
            processed: 2,
            ..Default::default()
        };

        export_summary(&summary, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("metric,value,description\n"));
        assert!(text.contains("processed,2,"));
        assert!(text.contains("final_measured,,"));
    }
}
