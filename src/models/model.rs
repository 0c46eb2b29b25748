//! Closed-form FMR models.
//!
//! The fitters rely on two primitive operations per model:
//! - evaluate the model at one abscissa (for residuals/plots)
//! - evaluate its gradient with respect to the parameters (for the Jacobian)
//!
//! Lineshape (absorption derivative, `d = h − H_FMR`):
//!
//! ```text
//! y(h) = (−K1·2·d·DH − K2·(DH² − d²)) / (DH² + d²)²
//! ```
//!
//! Kittel relation (in-plane thin film):
//!
//! ```text
//! f(H) = (γ/2π)·sqrt((4π·Ms + Hu + H + Hk + Hr)·(H + Hk + Hr))
//! ```

use std::f64::consts::PI;

use crate::domain::{KittelParams, LineshapeParams};

/// Derivative-Lorentzian signal at field `h`.
pub fn lineshape(h: f64, p: &LineshapeParams) -> f64 {
    let d = h - p.h_fmr;
    let dh2 = p.dh * p.dh;
    let q = dh2 + d * d;
    let numer = -p.k1 * 2.0 * d * p.dh - p.k2 * (dh2 - d * d);
    numer / (q * q)
}

/// Gradient of `lineshape` with respect to `[K1, K2, H_FMR, DH]`.
pub fn lineshape_gradient(h: f64, p: &LineshapeParams) -> [f64; 4] {
    let d = h - p.h_fmr;
    let dh = p.dh;
    let dh2 = dh * dh;
    let q = dh2 + d * d;
    let q2 = q * q;
    let q3 = q2 * q;
    let numer = -p.k1 * 2.0 * d * dh - p.k2 * (dh2 - d * d);

    let d_k1 = -2.0 * d * dh / q2;
    let d_k2 = -(dh2 - d * d) / q2;

    // ∂y/∂d, then ∂d/∂H_FMR = −1.
    let dn_dd = -2.0 * p.k1 * dh + 2.0 * p.k2 * d;
    let dy_dd = dn_dd / q2 - 4.0 * d * numer / q3;
    let d_h_fmr = -dy_dd;

    let dn_ddh = -2.0 * p.k1 * d - 2.0 * p.k2 * dh;
    let d_dh = dn_ddh / q2 - 4.0 * dh * numer / q3;

    [d_k1, d_k2, d_h_fmr, d_dh]
}

/// Kittel resonance frequency (GHz) at field `h` (Oe).
///
/// Returns NaN when the product under the square root is negative.
pub fn kittel_frequency(h: f64, p: &KittelParams) -> f64 {
    let (a, b) = kittel_factors(h, p);
    p.gamma / (2.0 * PI) * (a * b).sqrt()
}

/// Gradient of `kittel_frequency` with respect to `[gamma, Ms, Hu, Hk, Hr]`.
pub fn kittel_gradient(h: f64, p: &KittelParams) -> [f64; 5] {
    let (a, b) = kittel_factors(h, p);
    let root = (a * b).sqrt();
    let c = p.gamma / (2.0 * PI);
    let half = c / (2.0 * root);

    let d_gamma = root / (2.0 * PI);
    let d_ms = half * 4.0 * PI * b;
    let d_hu = half * b;
    let d_hk = half * (a + b);
    let d_hr = d_hk;

    [d_gamma, d_ms, d_hu, d_hk, d_hr]
}

/// Slope `df/dH` of the Kittel relation at field `h`.
pub fn kittel_field_slope(h: f64, p: &KittelParams) -> f64 {
    let (a, b) = kittel_factors(h, p);
    p.gamma / (2.0 * PI) * (a + b) / (2.0 * (a * b).sqrt())
}

/// Resonance field (Oe) for frequency `f` (GHz): inverse of `kittel_frequency`.
///
/// With `B = H + Hk + Hr` and `M = 4π·Ms + Hu`, the relation is
/// `B·(B + M) = (2πf/γ)²`; the positive root is taken. Returns `None` for a
/// non-positive gyromagnetic ratio or a non-finite result.
pub fn kittel_resonance_field(f: f64, p: &KittelParams) -> Option<f64> {
    if !(p.gamma.is_finite() && p.gamma > 0.0) {
        return None;
    }
    let m = 4.0 * PI * p.ms + p.hu;
    let w = 2.0 * PI * f / p.gamma;
    let b = (-m + (m * m + 4.0 * w * w).sqrt()) / 2.0;
    let h = b - p.hk - p.hr;
    h.is_finite().then_some(h)
}

fn kittel_factors(h: f64, p: &KittelParams) -> (f64, f64) {
    let b = h + p.hk + p.hr;
    let a = 4.0 * PI * p.ms + p.hu + b;
    (a, b)
}
