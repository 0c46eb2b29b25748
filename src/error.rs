//! Error types.
//!
//! - `FitError` is returned by the fitting core. Each variant is local to a single
//!   fit call; a failed fit never affects the next one.
//! - `AppError` is the front-end error: a message plus the process exit code.
//!
//! Exit codes:
//! - 2: invalid input, configuration, or IO
//! - 3: not enough usable data
//! - 4: computation failure

use crate::math::LmError;

/// Failure of a single fit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Malformed input: empty or mismatched arrays, non-finite values, missing guess.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer distinct data points than free parameters.
    #[error("underdetermined fit: {available} usable points, {required} required")]
    Underdetermined { required: usize, available: usize },

    /// The optimizer exhausted its iteration budget or produced non-finite residuals.
    #[error("fit did not converge after {iterations} iterations (chi-square {chi_square:.4e})")]
    Convergence { iterations: usize, chi_square: f64 },

    /// The fit converged onto a parameter set with no physical meaning.
    #[error("non-physical result: {0}")]
    NonPhysical(String),
}

impl FitError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Short stable name, used in exports.
    pub fn kind(&self) -> &'static str {
        match self {
            FitError::InvalidInput(_) => "invalid_input",
            FitError::Underdetermined { .. } => "underdetermined",
            FitError::Convergence { .. } => "convergence",
            FitError::NonPhysical(_) => "non_physical",
        }
    }
}

impl From<LmError> for FitError {
    fn from(err: LmError) -> Self {
        match err {
            LmError::InvalidStart(message) => FitError::InvalidInput(message),
            LmError::MaxIterations { iterations, chi_square } => FitError::Convergence { iterations, chi_square },
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::InvalidInput(_) => 2,
            FitError::Underdetermined { .. } => 3,
            FitError::Convergence { .. } | FitError::NonPhysical(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_maps_to_exit_codes() {
        let e: AppError = FitError::invalid_input("empty sweep").into();
        assert_eq!(e.exit_code(), 2);
        assert_eq!(e.to_string(), "invalid input: empty sweep");

        let e: AppError = FitError::Underdetermined { required: 3, available: 2 }.into();
        assert_eq!(e.exit_code(), 3);

        let e: AppError = FitError::Convergence { iterations: 10, chi_square: 1.0 }.into();
        assert_eq!(e.exit_code(), 4);
    }
}
