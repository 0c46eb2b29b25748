//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for reporting

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::math::Termination;

/// One field sweep measured at a single microwave frequency.
///
/// Units: frequency in GHz, field in Oe. The field ordering is arbitrary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub frequency: f64,
    pub field: Vec<f64>,
    pub signal: Vec<f64>,
}

impl Sweep {
    /// Build a sweep, checking that both columns are non-empty, of equal length and finite.
    pub fn new(frequency: f64, field: Vec<f64>, signal: Vec<f64>) -> Result<Self, FitError> {
        validate_columns(frequency, &field, &signal)?;
        Ok(Self {
            frequency,
            field,
            signal,
        })
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }

    /// `(min, max)` of the field column.
    pub fn field_range(&self) -> Option<(f64, f64)> {
        let min = self.field.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.field.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min.is_finite() && max.is_finite()).then_some((min, max))
    }
}

/// Validate a `(frequency, field, signal)` triple.
pub fn validate_columns(frequency: f64, field: &[f64], signal: &[f64]) -> Result<(), FitError> {
    if !frequency.is_finite() {
        return Err(FitError::invalid_input(format!("non-finite frequency {frequency}")));
    }
    if field.is_empty() || signal.is_empty() {
        return Err(FitError::invalid_input(format!(
            "empty sweep at {frequency} GHz (field={}, signal={})",
            field.len(),
            signal.len()
        )));
    }
    if field.len() != signal.len() {
        return Err(FitError::invalid_input(format!(
            "field/signal length mismatch at {frequency} GHz: {} vs {}",
            field.len(),
            signal.len()
        )));
    }
    if let Some(i) = field.iter().position(|v| !v.is_finite()) {
        return Err(FitError::invalid_input(format!("non-finite field value at index {i}")));
    }
    if let Some(i) = signal.iter().position(|v| !v.is_finite()) {
        return Err(FitError::invalid_input(format!("non-finite signal value at index {i}")));
    }
    Ok(())
}

/// Derivative-Lorentzian lineshape parameters.
///
/// - `k1`: antisymmetric (dispersive-derivative) amplitude
/// - `k2`: symmetric amplitude
/// - `h_fmr`: resonance field (Oe)
/// - `dh`: linewidth (Oe)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineshapeParams {
    pub k1: f64,
    pub k2: f64,
    pub h_fmr: f64,
    pub dh: f64,
}

impl LineshapeParams {
    pub fn to_array(self) -> [f64; 4] {
        [self.k1, self.k2, self.h_fmr, self.dh]
    }

    pub fn from_slice(p: &[f64]) -> Self {
        Self {
            k1: p[0],
            k2: p[1],
            h_fmr: p[2],
            dh: p[3],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// A fitted value and its standard error.
///
/// `stderr` is `None` when the parameter was held fixed or the covariance
/// matrix could not be formed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub value: f64,
    pub stderr: Option<f64>,
}

impl ParamEstimate {
    pub fn fixed(value: f64) -> Self {
        Self { value, stderr: None }
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Number of residuals.
    pub n: usize,
    /// Number of free parameters.
    pub n_free: usize,
    pub chi_square: f64,
    /// `None` when there are no residual degrees of freedom.
    pub reduced_chi_square: Option<f64>,
    pub rmse: f64,
    pub iterations: usize,
    /// Why the optimizer stopped; `Stalled` results are not converged.
    pub termination: Termination,
}

impl FitQuality {
    pub fn new(n: usize, n_free: usize, chi_square: f64, iterations: usize, termination: Termination) -> Self {
        Self {
            n,
            n_free,
            chi_square,
            reduced_chi_square: (n > n_free).then(|| chi_square / (n - n_free) as f64),
            rmse: if n > 0 { (chi_square / n as f64).sqrt() } else { 0.0 },
            iterations,
            termination,
        }
    }

    pub fn converged(&self) -> bool {
        self.termination.is_converged()
    }
}

/// Result of fitting one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineshapeFitResult {
    pub frequency: f64,
    pub k1: ParamEstimate,
    pub k2: ParamEstimate,
    pub h_fmr: ParamEstimate,
    /// Always positive.
    pub dh: ParamEstimate,
    pub quality: FitQuality,
}

impl LineshapeFitResult {
    pub fn params(&self) -> LineshapeParams {
        LineshapeParams {
            k1: self.k1.value,
            k2: self.k2.value,
            h_fmr: self.h_fmr.value,
            dh: self.dh.value,
        }
    }
}

/// Kittel dispersion parameters.
///
/// - `gamma`: gyromagnetic ratio in rad·GHz/Oe (≈ 0.0176 for g ≈ 2)
/// - `ms`: saturation magnetization in emu/cm³ (enters as `4π·Ms`)
/// - `hu`: uniaxial anisotropy field (Oe)
/// - `hk`: anisotropy offset (Oe)
/// - `hr`: residual field shift (Oe)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KittelParams {
    pub gamma: f64,
    pub ms: f64,
    pub hu: f64,
    pub hk: f64,
    pub hr: f64,
}

impl Default for KittelParams {
    fn default() -> Self {
        Self {
            gamma: 0.0176,
            ms: 800.0,
            hu: 0.0,
            hk: 0.0,
            hr: 0.0,
        }
    }
}

impl KittelParams {
    pub fn get(&self, param: KittelParam) -> f64 {
        match param {
            KittelParam::Gamma => self.gamma,
            KittelParam::Ms => self.ms,
            KittelParam::Hu => self.hu,
            KittelParam::Hk => self.hk,
            KittelParam::Hr => self.hr,
        }
    }

    pub fn set(&mut self, param: KittelParam, value: f64) {
        match param {
            KittelParam::Gamma => self.gamma = value,
            KittelParam::Ms => self.ms = value,
            KittelParam::Hu => self.hu = value,
            KittelParam::Hk => self.hk = value,
            KittelParam::Hr => self.hr = value,
        }
    }
}

/// Names one Kittel parameter (used to select the free set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KittelParam {
    Gamma,
    Ms,
    Hu,
    Hk,
    Hr,
}

impl KittelParam {
    pub const ALL: [KittelParam; 5] = [
        KittelParam::Gamma,
        KittelParam::Ms,
        KittelParam::Hu,
        KittelParam::Hk,
        KittelParam::Hr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            KittelParam::Gamma => "gamma",
            KittelParam::Ms => "Ms",
            KittelParam::Hu => "Hu",
            KittelParam::Hk => "Hk",
            KittelParam::Hr => "Hr",
        }
    }
}

/// Residual weighting for the dispersion fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// All points count equally.
    Uniform,
    /// Weight by the propagated resonance-field standard error (two-pass refit).
    FieldStderr,
}

/// One `(frequency, H_FMR)` observation for the dispersion fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionPoint {
    pub frequency: f64,
    pub field: f64,
    pub field_stderr: Option<f64>,
}

/// Result of the Kittel fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispersionFitResult {
    pub gamma: ParamEstimate,
    pub ms: ParamEstimate,
    pub hu: ParamEstimate,
    pub hk: ParamEstimate,
    pub hr: ParamEstimate,
    pub free: Vec<KittelParam>,
    pub weighting: Weighting,
    pub quality: FitQuality,
}

impl DispersionFitResult {
    pub fn params(&self) -> KittelParams {
        KittelParams {
            gamma: self.gamma.value,
            ms: self.ms.value,
            hu: self.hu.value,
            hk: self.hk.value,
            hr: self.hr.value,
        }
    }

    pub fn estimate(&self, param: KittelParam) -> ParamEstimate {
        match param {
            KittelParam::Gamma => self.gamma,
            KittelParam::Ms => self.ms,
            KittelParam::Hu => self.hu,
            KittelParam::Hk => self.hk,
            KittelParam::Hr => self.hr,
        }
    }
}

/// Result of the linewidth-vs-frequency regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampingFitResult {
    pub n: usize,
    /// Oe/GHz.
    pub slope: f64,
    /// Inhomogeneous broadening (Oe).
    pub intercept: f64,
    pub r_value: f64,
    pub p_value: f64,
    pub slope_stderr: f64,
    pub intercept_stderr: f64,
}

impl DampingFitResult {
    /// Gilbert damping from `DH = (2π α / gamma)·f + DH0`.
    pub fn gilbert_alpha(&self, gamma: f64) -> f64 {
        self.slope * gamma / (2.0 * std::f64::consts::PI)
    }
}

/// A sweep whose lineshape fit failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    pub frequency: f64,
    pub error: FitError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_new_rejects_mismatched_and_empty_columns() {
        let err = Sweep::new(3.0, vec![1.0, 2.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));

        let err = Sweep::new(3.0, vec![], vec![]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));

        let err = Sweep::new(3.0, vec![1.0, f64::NAN], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));

        let sweep = Sweep::new(3.0, vec![3.0, 1.0, 2.0], vec![0.0, 0.0, 0.0]).unwrap();
        assert_eq!(sweep.len(), 3);
        assert_eq!(sweep.field_range(), Some((1.0, 3.0)));
    }

    #[test]
    fn gilbert_alpha_from_slope() {
        let damping = DampingFitResult {
            n: 4,
            slope: 2.0 * std::f64::consts::PI,
            intercept: 1.0,
            r_value: 1.0,
            p_value: 0.0,
            slope_stderr: 0.0,
            intercept_stderr: 0.0,
        };
        assert!((damping.gilbert_alpha(0.0176) - 0.0176).abs() < 1e-15);
    }

    #[test]
    fn kittel_params_get_set_round_trip_by_name() {
        let mut p = KittelParams::default();
        for (i, param) in KittelParam::ALL.iter().enumerate() {
            p.set(*param, i as f64 + 0.5);
        }
        assert_eq!(p.get(KittelParam::Hk), 3.5);
        assert_eq!(p.gamma, 0.5);
    }
}
