//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)²` for a problem exposing residuals and (optionally) an
//! analytic Jacobian. Each iteration solves the damped linear system
//!
//! ```text
//! [J; √λ·D] δ = [−r; 0]
//! ```
//!
//! with Marquardt scaling `D = diag(‖J_j‖)`, which makes the step invariant to
//! the units of each parameter. Accepted steps shrink λ by 10, rejected steps
//! grow it by 10.
//!
//! Termination:
//! - zero cost
//! - relative cost reduction of an accepted step `≤ ftol`
//! - scaled step `‖D δ‖ ≤ xtol·(‖D p‖ + xtol)`, split by whether the small
//!   step was accepted (`StepTolerance`) or rejected (`NoProgress`)
//! - scaled gradient `max_j |J_jᵀ r| / (‖J_j‖·‖r‖) ≤ gtol`
//! - λ saturates (`Stalled`: no downhill step representable in floating point)
//!
//! The reason is returned in `LmReport::termination`; only `Stalled` counts as
//! not converged.
//!
//! Every trial step counts against `max_iter`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::math::ols::{normal_matrix_inverse, solve_least_squares};

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

/// A nonlinear least-squares problem.
pub trait LeastSquaresProblem {
    /// Number of free parameters.
    fn n_params(&self) -> usize;

    /// Residual vector at `params`.
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of the residuals, one row per residual.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        forward_difference_jacobian(self, params)
    }
}

/// Numerical Jacobian by forward differences.
pub fn forward_difference_jacobian<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    params: &DVector<f64>,
) -> DMatrix<f64> {
    let r0 = problem.residuals(params);
    let mut jac = DMatrix::<f64>::zeros(r0.len(), params.len());
    for j in 0..params.len() {
        let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        let mut shifted = params.clone();
        shifted[j] += h;
        let r = problem.residuals(&shifted);
        jac.set_column(j, &((r - &r0) / h));
    }
    jac
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LmOptions {
    /// Maximum number of trial steps.
    pub max_iter: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
            initial_lambda: 1e-3,
        }
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    ZeroResidual,
    CostTolerance,
    StepTolerance,
    /// A step below `xtol` was rejected: the cost cannot decrease further at this precision.
    NoProgress,
    Gradient,
    Stalled,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        self != Termination::Stalled
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Termination::ZeroResidual => "zero_residual",
            Termination::CostTolerance => "cost_tolerance",
            Termination::StepTolerance => "step_tolerance",
            Termination::NoProgress => "no_progress",
            Termination::Gradient => "gradient",
            Termination::Stalled => "stalled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LmError {
    /// Starting point has the wrong dimension or a non-finite cost.
    #[error("invalid starting point: {0}")]
    InvalidStart(String),
    /// Iteration budget exhausted.
    #[error("iteration budget of {iterations} exhausted (chi-square {chi_square:.4e})")]
    MaxIterations { iterations: usize, chi_square: f64 },
}

/// Converged optimizer state.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: DVector<f64>,
    pub residuals: DVector<f64>,
    /// Sum of squared residuals.
    pub chi_square: f64,
    /// `(JᵀJ)⁻¹ · χ²/(n−p)`; `None` when singular or `n ≤ p`.
    pub covariance: Option<DMatrix<f64>>,
    pub iterations: usize,
    pub termination: Termination,
}

impl LmReport {
    pub fn n_residuals(&self) -> usize {
        self.residuals.len()
    }

    /// Standard error of parameter `j`, if the covariance is available.
    pub fn stderr(&self, j: usize) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        let var = cov[(j, j)];
        (var.is_finite() && var >= 0.0).then(|| var.sqrt())
    }
}

/// Minimize the problem starting from `initial`.
pub fn minimize<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    initial: DVector<f64>,
    opts: &LmOptions,
) -> Result<LmReport, LmError> {
    let p = problem.n_params();
    if initial.len() != p {
        return Err(LmError::InvalidStart(format!(
            "expected {p} parameters, got {}",
            initial.len()
        )));
    }

    let mut params = initial;
    let mut residuals = problem.residuals(&params);
    let mut cost = residuals.norm_squared();
    if !cost.is_finite() {
        return Err(LmError::InvalidStart("non-finite residuals at the initial guess".to_string()));
    }

    let n = residuals.len();
    let mut jac = problem.jacobian(&params);
    let mut lambda = opts.initial_lambda;
    let mut iterations = 0usize;

    let termination = loop {
        if cost == 0.0 {
            break Termination::ZeroResidual;
        }

        let scale = column_scale(&jac);
        if scaled_gradient(&jac, &residuals, &scale, cost) <= opts.gtol {
            break Termination::Gradient;
        }

        if iterations >= opts.max_iter {
            return Err(LmError::MaxIterations {
                iterations,
                chi_square: cost,
            });
        }
        iterations += 1;

        let Some(step) = damped_step(&jac, &residuals, &scale, lambda) else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break Termination::Stalled;
            }
            continue;
        };

        let step_norm = step.component_mul(&scale).norm();
        let params_norm = params.component_mul(&scale).norm();
        let step_is_small = step_norm <= opts.xtol * (params_norm + opts.xtol);

        let trial = &params + &step;
        let trial_residuals = problem.residuals(&trial);
        let trial_cost = trial_residuals.norm_squared();

        if trial_cost.is_finite() && trial_cost < cost {
            let reduction = (cost - trial_cost) / cost;
            params = trial;
            residuals = trial_residuals;
            cost = trial_cost;
            jac = problem.jacobian(&params);
            lambda = (lambda / 10.0).max(LAMBDA_MIN);

            log::trace!("lm iter={iterations} cost={cost:.6e} lambda={lambda:.1e} accepted");

            if reduction <= opts.ftol {
                break Termination::CostTolerance;
            }
            if step_is_small {
                break Termination::StepTolerance;
            }
        } else {
            log::trace!("lm iter={iterations} trial_cost={trial_cost:.6e} lambda={lambda:.1e} rejected");

            if step_is_small {
                break Termination::NoProgress;
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break Termination::Stalled;
            }
        }
    };

    let covariance = if n > p {
        let s2 = cost / (n - p) as f64;
        normal_matrix_inverse(&jac).map(|inv| inv * s2)
    } else {
        None
    };

    Ok(LmReport {
        params,
        residuals,
        chi_square: cost,
        covariance,
        iterations,
        termination,
    })
}

fn column_scale(jac: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        jac.ncols(),
        jac.column_iter().map(|c| {
            let norm = c.norm();
            if norm > 0.0 && norm.is_finite() { norm } else { 1.0 }
        }),
    )
}

fn scaled_gradient(jac: &DMatrix<f64>, residuals: &DVector<f64>, scale: &DVector<f64>, cost: f64) -> f64 {
    let r_norm = cost.sqrt();
    if r_norm == 0.0 {
        return 0.0;
    }
    let g = jac.tr_mul(residuals);
    g.iter()
        .zip(scale.iter())
        .map(|(gj, sj)| gj.abs() / (sj * r_norm))
        .fold(0.0, f64::max)
}

fn damped_step(
    jac: &DMatrix<f64>,
    residuals: &DVector<f64>,
    scale: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    let n = jac.nrows();
    let p = jac.ncols();
    let sqrt_lambda = lambda.sqrt();

    let mut a = DMatrix::<f64>::zeros(n + p, p);
    a.rows_mut(0, n).copy_from(jac);
    for j in 0..p {
        a[(n + j, j)] = sqrt_lambda * scale[j];
    }

    let mut b = DVector::<f64>::zeros(n + p);
    b.rows_mut(0, n).copy_from(&(-residuals));

    solve_least_squares(&a, &b)
}
