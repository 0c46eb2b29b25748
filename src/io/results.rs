//! Read/write results JSON files.
//!
//! The schema is defined by `domain::ResultsFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{
    DispersionCurve, DispersionFitResult, FailureRecord, LineshapeFitResult, ResultsFile, StageOutcome,
};
use crate::error::AppError;
use crate::fit::Analysis;
use crate::models::kittel_frequency;

const CURVE_POINTS: usize = 101;

/// Snapshot an analysis into its portable form.
pub fn build_results_file(analysis: &Analysis) -> ResultsFile {
    let failures = analysis
        .failures
        .iter()
        .map(|f| FailureRecord {
            frequency: f.frequency,
            kind: f.error.kind().to_string(),
            message: f.error.to_string(),
        })
        .collect();

    let dispersion_curve = analysis
        .dispersion
        .as_ref()
        .ok()
        .and_then(|d| build_curve(d, &analysis.lineshapes, CURVE_POINTS));

    ResultsFile {
        tool: "fmr".to_string(),
        generated_at: Utc::now(),
        lineshapes: analysis.lineshapes.clone(),
        failures,
        dispersion: StageOutcome::from_result(&analysis.dispersion),
        damping: StageOutcome::from_result(&analysis.damping),
        gilbert_alpha: analysis.gilbert_alpha(),
        dispersion_curve,
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, results)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;

    Ok(())
}

/// Read a results JSON file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid results JSON: {e}")))?;
    Ok(results)
}

/// Sample the fitted Kittel relation across the observed resonance fields.
fn build_curve(fit: &DispersionFitResult, lineshapes: &[LineshapeFitResult], n: usize) -> Option<DispersionCurve> {
    let params = fit.params();
    let mut h0 = f64::INFINITY;
    let mut h1 = f64::NEG_INFINITY;
    for r in lineshapes {
        h0 = h0.min(r.h_fmr.value);
        h1 = h1.max(r.h_fmr.value);
    }
    if !(h0.is_finite() && h1.is_finite()) {
        return None;
    }
    let pad = ((h1 - h0) * 0.1).max(1.0);
    let (h0, h1) = (h0 - pad, h1 + pad);

    let n = n.max(2);
    let mut field = Vec::with_capacity(n);
    let mut frequency = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let h = h0 + u * (h1 - h0);
        let f = kittel_frequency(h, &params);
        // Below the lowest resonance the relation has no real solution.
        if f.is_finite() {
            field.push(h);
            frequency.push(f);
        }
    }

    (field.len() >= 2).then_some(DispersionCurve { field, frequency })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, generate_sweeps};
    use crate::domain::AnalysisConfig;
    use crate::fit::{SweepInput, analyze};

    fn analysis() -> Analysis {
        let inputs: Vec<SweepInput> = generate_sweeps(&SyntheticSpec::default())
            .unwrap()
            .into_iter()
            .map(SweepInput::new)
            .collect();
        analyze(&inputs, &AnalysisConfig::default())
    }

    #[test]
    fn results_file_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let results = build_results_file(&analysis());
        assert_eq!(results.tool, "fmr");
        assert_eq!(results.lineshapes.len(), 4);
        assert!(results.dispersion.result().is_some());
        assert!(results.gilbert_alpha.is_some());

        write_results_json(&path, &results).unwrap();
        let back = read_results_json(&path).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn failed_stages_are_recorded_with_their_kind() {
        let mut a = analysis();
        a.damping = Err(crate::error::FitError::Underdetermined { required: 2, available: 1 });

        let results = build_results_file(&a);
        match &results.damping {
            StageOutcome::Failed { kind, message } => {
                assert_eq!(kind, "underdetermined");
                assert!(message.contains("1 usable points"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(results.gilbert_alpha, None);
    }

    #[test]
    fn curve_follows_the_fitted_relation() {
        let a = analysis();
        let results = build_results_file(&a);
        let curve = results.dispersion_curve.unwrap();
        let params = a.dispersion.as_ref().unwrap().params();

        assert!(curve.field.len() >= 2);
        assert!(curve.field.windows(2).all(|w| w[1] > w[0]));
        for (h, f) in curve.field.iter().zip(&curve.frequency) {
            assert!((kittel_frequency(*h, &params) - f).abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_json_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_results_json(&path).unwrap_err().exit_code(), 2);
    }
}
