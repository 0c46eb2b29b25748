//! Single-sweep lineshape fitting.
//!
//! Given a sweep `(field_i, signal_i)` and an explicit initial guess, we
//! minimize `Σ (signal_i − y(field_i; K1, K2, H_FMR, DH))²` with
//! Levenberg–Marquardt and an analytic Jacobian.
//!
//! The model is invariant under `(K1, DH) → (−K1, −DH)`, so a fit that lands on
//! a negative linewidth is reported as the equivalent positive-linewidth
//! solution.

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    FitQuality, LineshapeFitResult, LineshapeOptions, LineshapeParams, ParamEstimate, Sweep, validate_columns,
};
use crate::error::FitError;
use crate::math::{LeastSquaresProblem, minimize};
use crate::models::{lineshape, lineshape_gradient};

const N_PARAMS: usize = 4;

struct LineshapeProblem<'a> {
    field: &'a [f64],
    signal: &'a [f64],
}

impl LeastSquaresProblem for LineshapeProblem<'_> {
    fn n_params(&self) -> usize {
        N_PARAMS
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = LineshapeParams::from_slice(params.as_slice());
        DVector::from_iterator(
            self.field.len(),
            self.field
                .iter()
                .zip(self.signal)
                .map(|(&h, &s)| s - lineshape(h, &p)),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let p = LineshapeParams::from_slice(params.as_slice());
        let mut jac = DMatrix::<f64>::zeros(self.field.len(), N_PARAMS);
        for (i, &h) in self.field.iter().enumerate() {
            let g = lineshape_gradient(h, &p);
            for j in 0..N_PARAMS {
                jac[(i, j)] = -g[j];
            }
        }
        jac
    }
}

/// Fit one sweep.
pub fn fit_sweep(
    sweep: &Sweep,
    guess: &LineshapeParams,
    opts: &LineshapeOptions,
) -> Result<LineshapeFitResult, FitError> {
    fit_lineshape(sweep.frequency, &sweep.field, &sweep.signal, guess, opts)
}

/// Fit raw `field`/`signal` columns measured at `frequency`.
pub fn fit_lineshape(
    frequency: f64,
    field: &[f64],
    signal: &[f64],
    guess: &LineshapeParams,
    opts: &LineshapeOptions,
) -> Result<LineshapeFitResult, FitError> {
    validate_columns(frequency, field, signal)?;
    if !guess.is_finite() {
        return Err(FitError::invalid_input("initial guess contains non-finite values"));
    }
    if guess.dh == 0.0 {
        return Err(FitError::invalid_input("initial linewidth guess must be non-zero"));
    }

    let distinct = count_distinct(field);
    if distinct < N_PARAMS {
        return Err(FitError::Underdetermined {
            required: N_PARAMS,
            available: distinct,
        });
    }

    let problem = LineshapeProblem { field, signal };
    let report = minimize(&problem, DVector::from_row_slice(&guess.to_array()), &opts.lm)?;

    let mut p = LineshapeParams::from_slice(report.params.as_slice());
    if !p.is_finite() {
        return Err(FitError::Convergence {
            iterations: report.iterations,
            chi_square: report.chi_square,
        });
    }
    if p.dh == 0.0 {
        return Err(FitError::NonPhysical(format!(
            "zero linewidth at {frequency} GHz"
        )));
    }
    if p.dh < 0.0 {
        p.dh = -p.dh;
        p.k1 = -p.k1;
    }

    let quality = FitQuality::new(field.len(), N_PARAMS, report.chi_square, report.iterations, report.termination);
    if !quality.converged() {
        log::warn!("lineshape fit at {frequency} GHz stalled after {} iterations", report.iterations);
    }

    log::debug!(
        "lineshape {frequency} GHz: H_FMR={:.3} DH={:.3} chi2={:.3e} iters={} ({:?})",
        p.h_fmr,
        p.dh,
        report.chi_square,
        report.iterations,
        report.termination
    );

    Ok(LineshapeFitResult {
        frequency,
        k1: ParamEstimate { value: p.k1, stderr: report.stderr(0) },
        k2: ParamEstimate { value: p.k2, stderr: report.stderr(1) },
        h_fmr: ParamEstimate { value: p.h_fmr, stderr: report.stderr(2) },
        dh: ParamEstimate { value: p.dh, stderr: report.stderr(3) },
        quality,
    })
}

/// Estimate a starting point from the raw sweep.
///
/// Uses the positions of the signal maximum and minimum: for a Lorentzian
/// derivative they sit at `H_FMR ∓ DH/√3`, and the peak-to-peak amplitude is
/// `|K1|·9/(4√3·DH²)`. `K2` starts at zero.
pub fn estimate_initial_guess(sweep: &Sweep) -> Result<LineshapeParams, FitError> {
    validate_columns(sweep.frequency, &sweep.field, &sweep.signal)?;

    let mut i_max = 0;
    let mut i_min = 0;
    for (i, &s) in sweep.signal.iter().enumerate() {
        if s > sweep.signal[i_max] {
            i_max = i;
        }
        if s < sweep.signal[i_min] {
            i_min = i;
        }
    }

    let peak_to_peak = sweep.signal[i_max] - sweep.signal[i_min];
    if !(peak_to_peak > 0.0) {
        return Err(FitError::invalid_input(format!(
            "flat signal at {} GHz; cannot estimate an initial guess",
            sweep.frequency
        )));
    }

    let h_max = sweep.field[i_max];
    let h_min = sweep.field[i_min];
    let mut dh = 3.0_f64.sqrt() / 2.0 * (h_max - h_min).abs();
    if dh == 0.0 {
        let (lo, hi) = sweep.field_range().unwrap_or((0.0, 0.0));
        dh = (hi - lo) / 20.0;
    }
    if !(dh > 0.0) {
        return Err(FitError::invalid_input(format!(
            "zero field span at {} GHz; cannot estimate an initial guess",
            sweep.frequency
        )));
    }

    let magnitude = peak_to_peak * dh * dh * 4.0 * 3.0_f64.sqrt() / 9.0;
    let k1 = if h_max < h_min { magnitude } else { -magnitude };

    Ok(LineshapeParams {
        k1,
        k2: 0.0,
        h_fmr: (h_max + h_min) / 2.0,
        dh,
    })
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    sorted.len()
}
