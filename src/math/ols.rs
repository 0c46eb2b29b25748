//! Linear least-squares building blocks for the nonlinear optimizer.
//!
//! Every Levenberg–Marquardt step is a small linear problem of the form:
//!
//! ```text
//! minimize ‖A δ − b‖²,   A = [J; √λ·D],   b = [−r; 0]
//! ```
//!
//! Implementation choices:
//! - We solve with SVD so tall (more rows than columns) and near-singular
//!   systems are handled without panicking.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter counts are tiny (4–5 columns), so SVD cost is irrelevant next to
//!   model evaluation.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

/// Invert the normal matrix `JᵀJ`.
///
/// Fitted parameters routinely differ by many orders of magnitude (e.g. a
/// gyromagnetic ratio of 1e-2 next to a magnetization of 1e3), so the matrix is
/// scaled to unit diagonal before the Cholesky inverse and unscaled afterwards.
///
/// Returns `None` when the matrix is singular (a parameter with no influence on
/// the residuals, or two parameters that always enter as a sum).
pub fn normal_matrix_inverse(jacobian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let jtj = jacobian.tr_mul(jacobian);
    let p = jtj.nrows();

    let mut scale = DVector::<f64>::zeros(p);
    for i in 0..p {
        let d = jtj[(i, i)];
        if !(d.is_finite() && d > 0.0) {
            return None;
        }
        scale[i] = 1.0 / d.sqrt();
    }

    let scaled = DMatrix::from_fn(p, p, |i, j| jtj[(i, j)] * scale[i] * scale[j]);
    let inv = scaled.cholesky()?.inverse();
    let out = DMatrix::from_fn(p, p, |i, j| inv[(i, j)] * scale[i] * scale[j]);

    out.iter().all(|v| v.is_finite()).then_some(out)
}
