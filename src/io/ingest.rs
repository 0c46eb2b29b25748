//! CSV ingest for field sweeps.
//!
//! Two explicit encodings are supported:
//!
//! - a **manifest** listing `frequency,path` (plus an optional initial guess
//!   `k1,k2,h_fmr,dh`), where each path is a per-sweep CSV with field and signal
//!   columns
//! - a **long table** with frequency, field and signal columns, grouped by
//!   frequency in first-appearance order
//!
//! Bad rows are skipped and reported. A manifest sweep that cannot be read is
//! recorded against its frequency and the remaining sweeps still load; only a
//! source with no usable sweep at all is an error. No fitting logic here.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::domain::{ColumnNames, LineshapeParams, Sweep, SweepSource};
use crate::error::AppError;
use crate::fit::SweepInput;

const GUESS_COLUMNS: [&str; 4] = ["k1", "k2", "h_fmr", "dh"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

/// A manifest sweep that could not be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepLoadFailure {
    pub frequency: f64,
    pub path: PathBuf,
    pub message: String,
}

/// Ingest output: sweeps ready for fitting plus what was skipped.
#[derive(Debug, Clone)]
pub struct LoadedSweeps {
    pub inputs: Vec<SweepInput>,
    pub failures: Vec<SweepLoadFailure>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl LoadedSweeps {
    fn empty() -> Self {
        Self {
            inputs: Vec::new(),
            failures: Vec::new(),
            row_errors: Vec::new(),
            rows_read: 0,
            rows_used: 0,
        }
    }
}

/// Load sweeps from whichever source the run was configured with.
pub fn load_sweeps(source: &SweepSource, columns: &ColumnNames) -> Result<LoadedSweeps, AppError> {
    let loaded = match source {
        SweepSource::Manifest(path) => load_manifest(path, columns)?,
        SweepSource::Long(path) => load_long_csv(path, columns)?,
    };

    for e in &loaded.row_errors {
        log::warn!("{}:{}: {}", e.path.display(), e.line, e.message);
    }
    for f in &loaded.failures {
        log::warn!("sweep at {} GHz not loaded: {}", f.frequency, f.message);
    }
    log::info!(
        "loaded {} sweeps ({} of {} rows used)",
        loaded.inputs.len(),
        loaded.rows_used,
        loaded.rows_read
    );
    Ok(loaded)
}

/// Load a manifest CSV and every sweep it lists.
///
/// Relative sweep paths are resolved against the manifest's directory.
pub fn load_manifest(path: &Path, columns: &ColumnNames) -> Result<LoadedSweeps, AppError> {
    let (mut reader, header_map) = open_csv(path)?;
    let frequency_idx = require_column(&header_map, &columns.frequency, path)?;
    let path_idx = require_column(&header_map, "path", path)?;
    let guess_idx: Vec<Option<usize>> = GUESS_COLUMNS.iter().map(|c| header_map.get(*c).copied()).collect();

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut out = LoadedSweeps::empty();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let row = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_manifest_row(&record, frequency_idx, path_idx, &guess_idx));

        let (frequency, sweep_path, guess) = match row {
            Ok(row) => row,
            Err(message) => {
                out.row_errors.push(RowError {
                    path: path.to_path_buf(),
                    line,
                    message,
                });
                continue;
            }
        };

        let sweep_path = if sweep_path.is_absolute() {
            sweep_path
        } else {
            base_dir.join(sweep_path)
        };
        let sweep = match load_sweep_csv(&sweep_path, frequency, columns) {
            Ok(sweep) => sweep,
            Err(e) => {
                out.failures.push(SweepLoadFailure {
                    frequency,
                    path: sweep_path,
                    message: e.to_string(),
                });
                continue;
            }
        };
        out.rows_read += sweep.rows_read;
        out.rows_used += sweep.sweep.len();
        out.row_errors.extend(sweep.row_errors);
        out.inputs.push(SweepInput {
            sweep: sweep.sweep,
            guess,
        });
    }

    if out.inputs.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "Manifest '{}' lists no usable sweeps ({} could not be loaded).",
                path.display(),
                out.failures.len()
            ),
        ));
    }
    Ok(out)
}

/// One sweep file's contents.
#[derive(Debug, Clone)]
pub struct LoadedSweep {
    pub sweep: Sweep,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load one per-sweep CSV (field and signal columns) measured at `frequency`.
pub fn load_sweep_csv(path: &Path, frequency: f64, columns: &ColumnNames) -> Result<LoadedSweep, AppError> {
    let (mut reader, header_map) = open_csv(path)?;
    let field_idx = require_column(&header_map, &columns.field, path)?;
    let signal_idx = require_column(&header_map, &columns.signal, path)?;

    let mut field = Vec::new();
    let mut signal = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let parsed = result.map_err(|e| format!("CSV parse error: {e}")).and_then(|record| {
            Ok((
                parse_value(&record, field_idx, &columns.field)?,
                parse_value(&record, signal_idx, &columns.signal)?,
            ))
        });
        match parsed {
            Ok((h, s)) => {
                field.push(h);
                signal.push(s);
            }
            Err(message) => row_errors.push(RowError {
                path: path.to_path_buf(),
                line,
                message,
            }),
        }
    }

    if field.is_empty() {
        return Err(AppError::new(
            3,
            format!("Sweep '{}' ({frequency} GHz) has no usable rows.", path.display()),
        ));
    }

    Ok(LoadedSweep {
        sweep: Sweep::new(frequency, field, signal)?,
        row_errors,
        rows_read,
    })
}

/// Load a single table holding every sweep, grouped by its frequency column.
pub fn load_long_csv(path: &Path, columns: &ColumnNames) -> Result<LoadedSweeps, AppError> {
    let (mut reader, header_map) = open_csv(path)?;
    let frequency_idx = require_column(&header_map, &columns.frequency, path)?;
    let field_idx = require_column(&header_map, &columns.field, path)?;
    let signal_idx = require_column(&header_map, &columns.signal, path)?;

    // (frequency, field, signal) in first-appearance order.
    let mut groups: Vec<(f64, Vec<f64>, Vec<f64>)> = Vec::new();
    let mut out = LoadedSweeps::empty();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        out.rows_read += 1;
        let parsed = result.map_err(|e| format!("CSV parse error: {e}")).and_then(|record| {
            Ok((
                parse_value(&record, frequency_idx, &columns.frequency)?,
                parse_value(&record, field_idx, &columns.field)?,
                parse_value(&record, signal_idx, &columns.signal)?,
            ))
        });

        let (f, h, s) = match parsed {
            Ok(row) => row,
            Err(message) => {
                out.row_errors.push(RowError {
                    path: path.to_path_buf(),
                    line,
                    message,
                });
                continue;
            }
        };

        match groups.iter_mut().find(|g| g.0 == f) {
            Some(group) => {
                group.1.push(h);
                group.2.push(s);
            }
            None => groups.push((f, vec![h], vec![s])),
        }
        out.rows_used += 1;
    }

    if groups.is_empty() {
        return Err(AppError::new(
            3,
            format!("No usable rows in '{}'.", path.display()),
        ));
    }

    for (frequency, field, signal) in groups {
        out.inputs.push(SweepInput::new(Sweep::new(frequency, field, signal)?));
    }
    Ok(out)
}

fn parse_manifest_row(
    record: &StringRecord,
    frequency_idx: usize,
    path_idx: usize,
    guess_idx: &[Option<usize>],
) -> Result<(f64, PathBuf, Option<LineshapeParams>), String> {
    let frequency = parse_value(record, frequency_idx, "frequency")?;
    let path = get_value(record, path_idx).ok_or("Missing required value: `path`")?;

    let guess_values: Vec<Option<&str>> = guess_idx
        .iter()
        .map(|idx| idx.and_then(|i| get_value(record, i)))
        .collect();
    let guess = if guess_values.iter().all(Option::is_none) {
        None
    } else if guess_values.iter().all(Option::is_some) {
        let mut p = [0.0; 4];
        for (slot, (value, name)) in p.iter_mut().zip(guess_values.iter().flatten().zip(GUESS_COLUMNS)) {
            *slot = parse_f64(value, name)?;
        }
        Some(LineshapeParams::from_slice(&p))
    } else {
        return Err("Incomplete initial guess: `k1`, `k2`, `h_fmr` and `dh` must all be given".to_string());
    };

    Ok((frequency, PathBuf::from(path), guess))
}

fn open_csv(path: &Path) -> Result<(csv::Reader<File>, HashMap<String, usize>), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers of '{}': {e}", path.display())))?
        .clone();

    Ok((reader, build_header_map(&headers)))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column `{name}` in '{}'.", path.display())))
}

fn get_value(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_value(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let s = get_value(record, idx).ok_or_else(|| format!("Missing required value: `{name}`"))?;
    parse_f64(s, name)
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid number '{s}' in `{name}`"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value '{s}' in `{name}`"))
    }
}
