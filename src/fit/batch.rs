//! Multi-sweep analysis.
//!
//! Sweeps are fit independently (in parallel), then the surviving results are
//! aggregated into the dispersion and damping fits. A failed sweep is recorded
//! and skipped; it never aborts the batch.

use rayon::prelude::*;

use crate::domain::{
    AnalysisConfig, DampingFitResult, DispersionFitResult, DispersionPoint, LineshapeFitResult, LineshapeParams,
    Sweep, SweepFailure,
};
use crate::error::FitError;
use crate::fit::{estimate_initial_guess, fit_damping, fit_dispersion, fit_sweep};

/// One sweep plus its (optional) initial guess.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepInput {
    pub sweep: Sweep,
    pub guess: Option<LineshapeParams>,
}

impl SweepInput {
    pub fn new(sweep: Sweep) -> Self {
        Self { sweep, guess: None }
    }

    pub fn with_guess(sweep: Sweep, guess: LineshapeParams) -> Self {
        Self {
            sweep,
            guess: Some(guess),
        }
    }
}

/// Everything computed from one batch of sweeps.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Successful lineshape fits, sorted by frequency.
    pub lineshapes: Vec<LineshapeFitResult>,
    /// Sweeps whose lineshape fit failed, sorted by frequency.
    pub failures: Vec<SweepFailure>,
    pub dispersion: Result<DispersionFitResult, FitError>,
    pub damping: Result<DampingFitResult, FitError>,
}

impl Analysis {
    /// Gilbert damping from the linewidth slope and the fitted gyromagnetic ratio.
    pub fn gilbert_alpha(&self) -> Option<f64> {
        match (&self.dispersion, &self.damping) {
            (Ok(d), Ok(g)) => Some(g.gilbert_alpha(d.gamma.value)),
            _ => None,
        }
    }

    pub fn lineshape_at(&self, frequency: f64) -> Option<&LineshapeFitResult> {
        self.lineshapes.iter().find(|r| r.frequency == frequency)
    }

    pub fn dispersion_points(&self) -> Vec<DispersionPoint> {
        dispersion_points(&self.lineshapes)
    }

    /// `(frequency, DH)` pairs for the damping regression.
    pub fn linewidth_points(&self) -> Vec<(f64, f64)> {
        linewidth_points(&self.lineshapes)
    }
}

/// Fit every sweep, then the dispersion and damping relations.
pub fn analyze(inputs: &[SweepInput], config: &AnalysisConfig) -> Analysis {
    let outcomes: Vec<Result<LineshapeFitResult, SweepFailure>> = inputs
        .par_iter()
        .map(|input| {
            fit_input(input, config).map_err(|error| SweepFailure {
                frequency: input.sweep.frequency,
                error,
            })
        })
        .collect();

    let mut lineshapes = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(fit) => lineshapes.push(fit),
            Err(failure) => {
                log::warn!("sweep at {} GHz failed: {}", failure.frequency, failure.error);
                failures.push(failure);
            }
        }
    }
    lineshapes.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    failures.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    log::info!(
        "lineshape fits: {} succeeded, {} failed",
        lineshapes.len(),
        failures.len()
    );

    let points = dispersion_points(&lineshapes);
    let widths = linewidth_points(&lineshapes);
    let (dispersion, damping) = rayon::join(
        || fit_dispersion(&points, &config.dispersion),
        || fit_damping(&widths),
    );

    match &dispersion {
        Ok(d) => log::info!(
            "dispersion: gamma={:.6} Ms={:.3} Hk={:.3} (chi2={:.3e})",
            d.gamma.value,
            d.ms.value,
            d.hk.value,
            d.quality.chi_square
        ),
        Err(e) => log::warn!("dispersion fit failed: {e}"),
    }
    match &damping {
        Ok(g) => log::info!("damping: slope={:.5} intercept={:.4} r={:.4}", g.slope, g.intercept, g.r_value),
        Err(e) => log::warn!("damping fit failed: {e}"),
    }

    Analysis {
        lineshapes,
        failures,
        dispersion,
        damping,
    }
}

fn fit_input(input: &SweepInput, config: &AnalysisConfig) -> Result<LineshapeFitResult, FitError> {
    let guess = match input.guess {
        Some(g) => g,
        None if config.auto_guess => estimate_initial_guess(&input.sweep)?,
        None => {
            return Err(FitError::invalid_input(format!(
                "no initial guess for the sweep at {} GHz",
                input.sweep.frequency
            )));
        }
    };
    fit_sweep(&input.sweep, &guess, &config.lineshape)
}

fn dispersion_points(lineshapes: &[LineshapeFitResult]) -> Vec<DispersionPoint> {
    lineshapes
        .iter()
        .map(|r| DispersionPoint {
            frequency: r.frequency,
            field: r.h_fmr.value,
            field_stderr: r.h_fmr.stderr,
        })
        .collect()
}

fn linewidth_points(lineshapes: &[LineshapeFitResult]) -> Vec<(f64, f64)> {
    lineshapes.iter().map(|r| (r.frequency, r.dh.value)).collect()
}
