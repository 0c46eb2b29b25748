//! Flat CSV exports.
//!
//! - per-sweep lineshape results (one row per frequency)
//! - raw sweeps plus a manifest, in the layout `load_manifest` reads back

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::{ColumnNames, LineshapeFitResult, ParamEstimate, Sweep};
use crate::error::AppError;

/// One manifest row.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub frequency: f64,
    /// Written as given; relative paths are resolved against the manifest's directory on load.
    pub path: PathBuf,
}

/// Write the per-sweep lineshape table.
pub fn write_lineshape_csv(path: &Path, results: &[LineshapeFitResult]) -> Result<(), AppError> {
    let mut file = create(path)?;

    writeln!(
        file,
        "{}",
        concat!(
            "frequency_ghz,k1,k1_stderr,k2,k2_stderr,h_fmr,h_fmr_stderr,dh,dh_stderr,",
            "chi_square,reduced_chi_square,iterations,termination"
        )
    )
    .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in results {
        writeln!(
            file,
            "{},{},{},{},{},{:.10e},{},{},{}",
            r.frequency,
            estimate_cells(&r.k1),
            estimate_cells(&r.k2),
            estimate_cells(&r.h_fmr),
            estimate_cells(&r.dh),
            r.quality.chi_square,
            r.quality.reduced_chi_square.map(|v| format!("{v:.10e}")).unwrap_or_default(),
            r.quality.iterations,
            r.quality.termination.as_str(),
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Write one sweep as a two-column CSV.
pub fn write_sweep_csv(path: &Path, sweep: &Sweep, columns: &ColumnNames) -> Result<(), AppError> {
    let mut writer = csv_writer(path)?;

    writer
        .write_record([columns.field.as_str(), columns.signal.as_str()])
        .map_err(|e| AppError::new(2, format!("Failed to write sweep CSV header: {e}")))?;
    for (h, s) in sweep.field.iter().zip(&sweep.signal) {
        writer
            .write_record([h.to_string(), s.to_string()])
            .map_err(|e| AppError::new(2, format!("Failed to write sweep CSV row: {e}")))?;
    }

    flush(writer, path)
}

/// Write a `frequency,path` manifest.
///
/// Cells are quoted as needed, so paths containing commas or quotes load back.
pub fn write_manifest_csv(path: &Path, entries: &[ManifestEntry], columns: &ColumnNames) -> Result<(), AppError> {
    let mut writer = csv_writer(path)?;

    writer
        .write_record([columns.frequency.as_str(), "path"])
        .map_err(|e| AppError::new(2, format!("Failed to write manifest header: {e}")))?;
    for entry in entries {
        let sweep_path = entry.path.to_str().ok_or_else(|| {
            AppError::new(2, format!("Sweep path '{}' is not valid UTF-8.", entry.path.display()))
        })?;
        writer
            .write_record([entry.frequency.to_string().as_str(), sweep_path])
            .map_err(|e| AppError::new(2, format!("Failed to write manifest row: {e}")))?;
    }

    flush(writer, path)
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    Ok(csv::Writer::from_writer(create(path)?))
}

fn flush(mut writer: csv::Writer<File>, path: &Path) -> Result<(), AppError> {
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))
}

fn estimate_cells(p: &ParamEstimate) -> String {
    format!(
        "{:.10e},{}",
        p.value,
        p.stderr.map(|v| format!("{v:.10e}")).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitQuality;
    use crate::math::Termination;
    use crate::io::ingest::load_manifest;

    #[test]
    fn lineshape_table_has_one_row_per_sweep_and_blank_missing_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineshapes.csv");
        let result = LineshapeFitResult {
            frequency: 4.0,
            k1: ParamEstimate { value: 1.0e4, stderr: Some(12.5) },
            k2: ParamEstimate { value: -3.0, stderr: None },
            h_fmr: ParamEstimate { value: 250.0, stderr: Some(0.1) },
            dh: ParamEstimate { value: 17.0, stderr: Some(0.2) },
            quality: FitQuality::new(201, 4, 1.0, 9, Termination::StepTolerance),
        };

        write_lineshape_csv(&path, &[result]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("frequency_ghz,k1,k1_stderr"));

        let cells: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(cells.len(), 13);
        assert_eq!(cells[0], "4");
        assert_eq!(cells[4], "");
        assert_eq!(cells[5].parse::<f64>().unwrap(), 250.0);
        assert_eq!(cells[11], "9");
        assert_eq!(cells[12], "step_tolerance");
    }

    #[test]
    fn sweeps_and_manifest_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let columns = ColumnNames::default();
        let sweep = Sweep::new(5.5, vec![100.0, 100.5, 101.0], vec![0.125, -1.0e-7, 3.0]).unwrap();

        write_sweep_csv(&dir.path().join("sweep_5.5.csv"), &sweep, &columns).unwrap();
        let manifest = dir.path().join("manifest.csv");
        let entries = [ManifestEntry {
            frequency: 5.5,
            path: PathBuf::from("sweep_5.5.csv"),
        }];
        write_manifest_csv(&manifest, &entries, &columns).unwrap();

        let loaded = load_manifest(&manifest, &columns).unwrap();
        assert_eq!(loaded.inputs.len(), 1);
        assert_eq!(loaded.inputs[0].sweep, sweep);
    }

    #[test]
    fn commas_and_quotes_in_names_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let columns = ColumnNames {
            frequency: "f, GHz".to_string(),
            field: "H \"applied\"".to_string(),
            signal: "dP/dH, a.u.".to_string(),
        };
        let sweep = Sweep::new(4.0, vec![10.0, 20.0], vec![1.0, -1.0]).unwrap();

        write_sweep_csv(&dir.path().join("run,1.csv"), &sweep, &columns).unwrap();
        let manifest = dir.path().join("manifest.csv");
        let entries = [ManifestEntry {
            frequency: 4.0,
            path: PathBuf::from("run,1.csv"),
        }];
        write_manifest_csv(&manifest, &entries, &columns).unwrap();

        let loaded = load_manifest(&manifest, &columns).unwrap();
        assert!(loaded.failures.is_empty());
        assert_eq!(loaded.inputs.len(), 1);
        assert_eq!(loaded.inputs[0].sweep, sweep);
    }
}
