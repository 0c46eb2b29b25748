//! Run configuration.
//!
//! Everything here is plain data derived from CLI flags (plus defaults); the
//! fitting code never reads the environment or global state.

use std::path::PathBuf;

use crate::domain::{KittelParam, KittelParams, Weighting};
use crate::math::LmOptions;

/// Options for a single lineshape fit.
#[derive(Debug, Clone, Default)]
pub struct LineshapeOptions {
    pub lm: LmOptions,
}

/// Options for the Kittel dispersion fit.
#[derive(Debug, Clone)]
pub struct DispersionConfig {
    /// Starting values; parameters not in `free` stay at these values.
    pub initial: KittelParams,
    /// Parameters varied by the optimizer.
    pub free: Vec<KittelParam>,
    pub weighting: Weighting,
    pub lm: LmOptions,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            initial: KittelParams::default(),
            free: vec![KittelParam::Gamma, KittelParam::Ms, KittelParam::Hk],
            weighting: Weighting::Uniform,
            lm: LmOptions::default(),
        }
    }
}

impl DispersionConfig {
    /// Free parameters in canonical order, without duplicates.
    pub fn free_params(&self) -> Vec<KittelParam> {
        KittelParam::ALL
            .iter()
            .copied()
            .filter(|p| self.free.contains(p))
            .collect()
    }
}

/// Options for a batch analysis over many sweeps.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub lineshape: LineshapeOptions,
    pub dispersion: DispersionConfig,
    /// Estimate an initial guess from the data when a sweep has none.
    pub auto_guess: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lineshape: LineshapeOptions::default(),
            dispersion: DispersionConfig::default(),
            auto_guess: true,
        }
    }
}

/// Where sweeps are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepSource {
    /// CSV listing `frequency,path[,k1,k2,h_fmr,dh]`, one row per sweep.
    Manifest(PathBuf),
    /// One CSV with frequency, field and signal columns.
    Long(PathBuf),
}

/// Column names used when reading sweep tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub frequency: String,
    pub field: String,
    pub signal: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            frequency: "frequency".to_string(),
            field: "field".to_string(),
            signal: "signal".to_string(),
        }
    }
}

/// A full `fmr fit` run's configuration as understood by the pipeline.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub source: SweepSource,
    pub columns: ColumnNames,
    pub analysis: AnalysisConfig,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    /// Per-sweep lineshape table (CSV).
    pub export_results: Option<PathBuf>,
    /// Full run results (JSON).
    pub export_json: Option<PathBuf>,
}
