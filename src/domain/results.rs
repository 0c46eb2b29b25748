//! Saved run results.
//!
//! `ResultsFile` is the portable record of one analysis: the per-sweep table,
//! the failures, both aggregate fits (or why they failed), and a precomputed
//! Kittel curve for plotting without refitting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DampingFitResult, DispersionFitResult, LineshapeFitResult};
use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub lineshapes: Vec<LineshapeFitResult>,
    pub failures: Vec<FailureRecord>,
    pub dispersion: StageOutcome<DispersionFitResult>,
    pub damping: StageOutcome<DampingFitResult>,
    pub gilbert_alpha: Option<f64>,
    /// Fitted Kittel relation sampled over the observed field range.
    pub dispersion_curve: Option<DispersionCurve>,
}

/// A sweep whose lineshape fit failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub frequency: f64,
    /// Stable error name (`FitError::kind`).
    pub kind: String,
    pub message: String,
}

/// Result of an aggregate fit, or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Ok { result: T },
    Failed { kind: String, message: String },
}

impl<T: Clone> StageOutcome<T> {
    pub fn from_result(result: &Result<T, FitError>) -> Self {
        match result {
            Ok(r) => StageOutcome::Ok { result: r.clone() },
            Err(e) => StageOutcome::Failed {
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
        }
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            StageOutcome::Ok { result } => Some(result),
            StageOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispersionCurve {
    /// Oe.
    pub field: Vec<f64>,
    /// GHz.
    pub frequency: Vec<f64>,
}
