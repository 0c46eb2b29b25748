//! Shared pipeline logic behind the CLI commands.
//!
//! Keeping this in one place avoids mixing the workflow with presentation:
//! load sweeps -> per-sweep lineshape fits -> dispersion + damping -> results file

use std::path::{Path, PathBuf};

use crate::data::{SyntheticSpec, generate_sweeps};
use crate::domain::{ColumnNames, FitConfig, ResultsFile, SweepFailure};
use crate::error::{AppError, FitError};
use crate::fit::{Analysis, analyze};
use crate::io::{LoadedSweeps, ManifestEntry, build_results_file, load_sweeps, write_manifest_csv, write_sweep_csv};

/// All computed outputs of a single `fmr fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub loaded: LoadedSweeps,
    pub analysis: Analysis,
    pub results: ResultsFile,
}

/// Execute the full fitting pipeline and return the computed outputs.
///
/// Individual sweep failures are part of the output; the run itself only fails
/// when nothing could be loaded or no sweep could be fit.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Load sweeps.
    let loaded = load_sweeps(&config.source, &config.columns)?;

    // 2) Fit every sweep, then the aggregate relations.
    let mut analysis = analyze(&loaded.inputs, &config.analysis);

    // Sweeps that never loaded are failures at their frequency too.
    analysis.failures.extend(loaded.failures.iter().map(|f| SweepFailure {
        frequency: f.frequency,
        error: FitError::invalid_input(f.message.clone()),
    }));
    analysis.failures.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

    if analysis.lineshapes.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No lineshape fit succeeded ({} sweeps failed).",
                analysis.failures.len()
            ),
        ));
    }

    // 3) Snapshot for reporting/export.
    let results = build_results_file(&analysis);

    Ok(RunOutput {
        loaded,
        analysis,
        results,
    })
}

/// Write a synthetic data set (one CSV per sweep plus `manifest.csv`) into `out_dir`.
///
/// Returns the manifest path.
pub fn run_simulate(spec: &SyntheticSpec, out_dir: &Path, columns: &ColumnNames) -> Result<PathBuf, AppError> {
    let sweeps = generate_sweeps(spec)?;

    std::fs::create_dir_all(out_dir)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", out_dir.display())))?;

    let mut entries = Vec::with_capacity(sweeps.len());
    for (i, sweep) in sweeps.iter().enumerate() {
        let name = PathBuf::from(format!("sweep_{:02}_{}ghz.csv", i + 1, sweep.frequency));
        write_sweep_csv(&out_dir.join(&name), sweep, columns)?;
        entries.push(ManifestEntry {
            frequency: sweep.frequency,
            path: name,
        });
    }

    let manifest = out_dir.join("manifest.csv");
    write_manifest_csv(&manifest, &entries, columns)?;
    log::info!("wrote {} sweeps to {}", entries.len(), out_dir.display());

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisConfig, SweepSource};

    fn config(manifest: PathBuf) -> FitConfig {
        FitConfig {
            source: SweepSource::Manifest(manifest),
            columns: ColumnNames::default(),
            analysis: AnalysisConfig::default(),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_results: None,
            export_json: None,
        }
    }

    #[test]
    fn simulated_data_set_fits_back_to_its_ground_truth() {
        let dir = tempfile::tempdir().unwrap();
        let spec = SyntheticSpec::default();
        let manifest = run_simulate(&spec, &dir.path().join("sim"), &ColumnNames::default()).unwrap();

        let run = run_fit(&config(manifest)).unwrap();
        assert_eq!(run.loaded.inputs.len(), 4);
        assert!(run.loaded.row_errors.is_empty());
        assert!(run.results.failures.is_empty());

        let d = run.results.dispersion.result().unwrap();
        assert!((d.gamma.value - spec.kittel.gamma).abs() / spec.kittel.gamma < 1e-4);
        assert!((d.ms.value - spec.kittel.ms).abs() / spec.kittel.ms < 1e-3);

        let g = run.results.damping.result().unwrap();
        assert!((g.slope - spec.damping_slope).abs() < 1e-5);
        assert!((g.intercept - spec.damping_intercept).abs() < 1e-4);
    }

    #[test]
    fn missing_sweep_file_is_a_failure_not_an_abort() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = run_simulate(&SyntheticSpec::default(), dir.path(), &ColumnNames::default()).unwrap();
        std::fs::remove_file(dir.path().join("sweep_02_4ghz.csv")).unwrap();

        let run = run_fit(&config(manifest)).unwrap();
        assert_eq!(run.loaded.inputs.len(), 3);
        assert_eq!(run.results.lineshapes.len(), 3);

        assert_eq!(run.results.failures.len(), 1);
        assert_eq!(run.results.failures[0].frequency, 4.0);
        assert_eq!(run.results.failures[0].kind, "invalid_input");
        assert!(run.results.dispersion.result().is_some());
        assert!(run.results.damping.result().is_some());
    }

    #[test]
    fn run_fails_when_no_sweep_can_be_fit() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = run_simulate(&SyntheticSpec::default(), dir.path(), &ColumnNames::default()).unwrap();

        let mut cfg = config(manifest);
        cfg.analysis.auto_guess = false;
        let err = run_fit(&cfg).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
