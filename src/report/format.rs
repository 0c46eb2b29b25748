//! Formatted terminal output.
//!
//! Formatting lives here so the fitting code stays free of presentation
//! concerns and output changes stay localized.

use crate::domain::{
    DampingFitResult, DispersionFitResult, KittelParam, ParamEstimate, ResultsFile, StageOutcome, SweepSource,
};
use crate::io::ingest::LoadedSweeps;

/// Format what was read from disk.
pub fn format_ingest_summary(source: &SweepSource, loaded: &LoadedSweeps) -> String {
    let mut out = String::new();

    let (kind, path) = match source {
        SweepSource::Manifest(p) => ("manifest", p),
        SweepSource::Long(p) => ("table", p),
    };
    out.push_str(&format!("Input: {kind} {}\n", path.display()));
    out.push_str(&format!(
        "Sweeps: {} | rows used {}/{}\n",
        loaded.inputs.len(),
        loaded.rows_used,
        loaded.rows_read
    ));
    if !loaded.failures.is_empty() {
        out.push_str(&format!("Sweeps not loaded: {}\n", loaded.failures.len()));
        for f in &loaded.failures {
            out.push_str(&format!("  {:>8.3} GHz  {}\n", f.frequency, f.message));
        }
    }
    if !loaded.row_errors.is_empty() {
        out.push_str(&format!("Skipped rows: {}\n", loaded.row_errors.len()));
        for e in loaded.row_errors.iter().take(5) {
            out.push_str(&format!("  {}:{}: {}\n", e.path.display(), e.line, e.message));
        }
        if loaded.row_errors.len() > 5 {
            out.push_str(&format!("  ... and {} more\n", loaded.row_errors.len() - 5));
        }
    }

    out
}

/// Format the full run summary (per-sweep table, failures, aggregate fits).
pub fn format_run_summary(results: &ResultsFile) -> String {
    let mut out = String::new();

    out.push_str("=== fmr - FMR lineshape / dispersion / damping fit ===\n");
    out.push_str(&format!("Generated: {}\n", results.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    out.push_str(&format!(
        "Sweeps: {} fitted, {} failed\n",
        results.lineshapes.len(),
        results.failures.len()
    ));

    out.push_str("\nLineshape fits:\n");
    out.push_str(&format_lineshape_table(results));

    if !results.failures.is_empty() {
        out.push_str("\nFailed sweeps:\n");
        for f in &results.failures {
            out.push_str(&format!("  {:>8.3} GHz  [{}] {}\n", f.frequency, f.kind, f.message));
        }
    }

    out.push_str("\nDispersion (Kittel):\n");
    match &results.dispersion {
        StageOutcome::Ok { result } => out.push_str(&format_dispersion(result)),
        StageOutcome::Failed { message, .. } => out.push_str(&format!("  failed: {message}\n")),
    }

    out.push_str("\nDamping (DH vs f):\n");
    match &results.damping {
        StageOutcome::Ok { result } => out.push_str(&format_damping(result)),
        StageOutcome::Failed { message, .. } => out.push_str(&format!("  failed: {message}\n")),
    }

    match results.gilbert_alpha {
        Some(alpha) => out.push_str(&format!("\nGilbert alpha: {alpha:.6}\n")),
        None => out.push_str("\nGilbert alpha: n/a\n"),
    }

    out
}

fn format_lineshape_table(results: &ResultsFile) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>9} {:>24} {:>22} {:>12} {:>12} {:>11} {:>5}",
            "f (GHz)", "H_FMR (Oe)", "DH (Oe)", "K1", "K2", "chi2", "iter"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<9} {:-<24} {:-<22} {:-<12} {:-<12} {:-<11} {:-<5}\n",
        "", "", "", "", "", "", ""
    ));

    for r in &results.lineshapes {
        out.push_str(
            format!(
                "{:>9.3} {:>24} {:>22} {:>12.4e} {:>12.4e} {:>11.3e} {:>5}",
                r.frequency,
                fmt_estimate(&r.h_fmr, 3),
                fmt_estimate(&r.dh, 3),
                r.k1.value,
                r.k2.value,
                r.quality.chi_square,
                r.quality.iterations,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    for r in results.lineshapes.iter().filter(|r| !r.quality.converged()) {
        out.push_str(&format!(
            "  note: {:.3} GHz stopped without converging ({})\n",
            r.frequency,
            r.quality.termination.as_str()
        ));
    }

    out
}

fn format_dispersion(fit: &DispersionFitResult) -> String {
    let mut out = String::new();
    for param in KittelParam::ALL {
        let est = fit.estimate(param);
        let precision = if param == KittelParam::Gamma { 6 } else { 3 };
        let note = match (fit.free.contains(&param), est.stderr) {
            (false, _) => "  (fixed)",
            (true, None) => "  (no stderr)",
            (true, Some(_)) => "",
        };
        out.push_str(&format!("  {:<6} {}{note}\n", param.label(), fmt_estimate(&est, precision)));
    }
    out.push_str(&format!(
        "  weighting={:?} n={} chi2={:.4e} iters={} stop={}\n",
        fit.weighting,
        fit.quality.n,
        fit.quality.chi_square,
        fit.quality.iterations,
        fit.quality.termination.as_str()
    ));
    out
}

fn format_damping(fit: &DampingFitResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  slope     {:.5} ± {:.5} Oe/GHz\n",
        fit.slope, fit.slope_stderr
    ));
    out.push_str(&format!(
        "  intercept {:.4} ± {:.4} Oe\n",
        fit.intercept, fit.intercept_stderr
    ));
    out.push_str(&format!(
        "  n={} r={:.5} p={:.3e}\n",
        fit.n, fit.r_value, fit.p_value
    ));
    out
}

fn fmt_estimate(p: &ParamEstimate, precision: usize) -> String {
    match p.stderr {
        Some(se) => format!("{:.precision$} ± {:.precision$}", p.value, se),
        None => format!("{:.precision$}", p.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::domain::{FailureRecord, FitQuality, LineshapeFitResult, Weighting};
    use crate::math::Termination;

    fn results() -> ResultsFile {
        let quality = FitQuality::new(201, 4, 1.0e-3, 7, Termination::CostTolerance);
        ResultsFile {
            tool: "fmr".to_string(),
            generated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            lineshapes: vec![LineshapeFitResult {
                frequency: 4.0,
                k1: ParamEstimate::fixed(1.0e4),
                k2: ParamEstimate::fixed(0.0),
                h_fmr: ParamEstimate { value: 250.123456, stderr: Some(0.0126) },
                dh: ParamEstimate { value: 17.0, stderr: None },
                quality: quality.clone(),
            }],
            failures: vec![FailureRecord {
                frequency: 7.0,
                kind: "invalid_input".to_string(),
                message: "invalid input: flat signal".to_string(),
            }],
            dispersion: StageOutcome::Ok {
                result: DispersionFitResult {
                    gamma: ParamEstimate { value: 0.0176, stderr: Some(1.0e-5) },
                    ms: ParamEstimate { value: 640.0, stderr: Some(2.0) },
                    hu: ParamEstimate::fixed(0.0),
                    hk: ParamEstimate { value: 20.0, stderr: None },
                    hr: ParamEstimate::fixed(0.0),
                    free: vec![KittelParam::Gamma, KittelParam::Ms, KittelParam::Hk],
                    weighting: Weighting::Uniform,
                    quality,
                },
            },
            damping: StageOutcome::Failed {
                kind: "underdetermined".to_string(),
                message: "underdetermined fit: 1 usable points, 2 required".to_string(),
            },
            gilbert_alpha: None,
            dispersion_curve: None,
        }
    }

    #[test]
    fn summary_lists_sweeps_failures_and_stages() {
        let txt = format_run_summary(&results());

        assert!(txt.contains("Generated: 2026-01-02 03:04:05 UTC"));
        assert!(txt.contains("Sweeps: 1 fitted, 1 failed"));
        assert!(txt.contains("250.123 ± 0.013"));
        assert!(txt.contains("[invalid_input] invalid input: flat signal"));
        assert!(txt.contains("gamma  0.017600 ± 0.000010"));
        assert!(txt.contains("Hk     20.000  (no stderr)"));
        assert!(txt.contains("Hr     0.000  (fixed)"));
        assert!(txt.contains("failed: underdetermined fit: 1 usable points, 2 required"));
        assert!(txt.contains("iters=7 stop=cost_tolerance"));
        assert!(!txt.contains("without converging"));
        assert!(txt.ends_with("Gilbert alpha: n/a\n"));
    }

    #[test]
    fn stalled_lineshape_fit_is_flagged() {
        let mut r = results();
        r.lineshapes[0].quality.termination = Termination::Stalled;

        let txt = format_run_summary(&r);
        assert!(txt.contains("note: 4.000 GHz stopped without converging (stalled)"));
    }

    #[test]
    fn damping_section_shows_regression_statistics() {
        let mut r = results();
        r.damping = StageOutcome::Ok {
            result: DampingFitResult {
                n: 4,
                slope: 3.0,
                intercept: 5.0,
                r_value: 1.0,
                p_value: 0.0,
                slope_stderr: 0.0,
                intercept_stderr: 0.0,
            },
        };
        r.gilbert_alpha = Some(0.008403);

        let txt = format_run_summary(&r);
        assert!(txt.contains("slope     3.00000 ± 0.00000 Oe/GHz"));
        assert!(txt.contains("intercept 5.0000 ± 0.0000 Oe"));
        assert!(txt.contains("Gilbert alpha: 0.008403"));
    }

    #[test]
    fn ingest_summary_lists_sweeps_that_did_not_load() {
        use crate::io::ingest::SweepLoadFailure;
        use std::path::PathBuf;

        let loaded = LoadedSweeps {
            inputs: Vec::new(),
            failures: vec![SweepLoadFailure {
                frequency: 4.0,
                path: PathBuf::from("runs/missing.csv"),
                message: "Failed to open CSV 'runs/missing.csv'".to_string(),
            }],
            row_errors: Vec::new(),
            rows_read: 0,
            rows_used: 0,
        };
        let source = SweepSource::Manifest(PathBuf::from("runs/manifest.csv"));

        let txt = format_ingest_summary(&source, &loaded);
        assert!(txt.starts_with("Input: manifest runs/manifest.csv\n"));
        assert!(txt.contains("Sweeps not loaded: 1\n"));
        assert!(txt.contains("   4.000 GHz  Failed to open CSV 'runs/missing.csv'"));
    }
}
