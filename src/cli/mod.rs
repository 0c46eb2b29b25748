//! Command-line parsing for the FMR fitting pipeline.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use crate::domain::KittelParam;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fmr", version, about = "FMR lineshape, Kittel dispersion and damping fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every sweep, then the Kittel dispersion and the linewidth regression.
    Fit(FitArgs),
    /// Print a previously exported results JSON.
    Show(ShowArgs),
    /// Write synthetic sweeps and a manifest for them.
    Simulate(SimulateArgs),
}

/// Options for `fmr fit`.
#[derive(Debug, Parser, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["manifest", "data"])))]
pub struct FitArgs {
    /// Manifest CSV with `frequency,path[,k1,k2,h_fmr,dh]` rows.
    #[arg(long, value_name = "CSV")]
    pub manifest: Option<PathBuf>,

    /// Single CSV holding frequency, field and signal columns.
    #[arg(long, value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Name of the frequency column (GHz).
    #[arg(long, default_value = "frequency")]
    pub frequency_column: String,

    /// Name of the field column (Oe).
    #[arg(long, default_value = "field")]
    pub field_column: String,

    /// Name of the signal column.
    #[arg(long, default_value = "signal")]
    pub signal_column: String,

    /// Fail sweeps without an explicit initial guess instead of estimating one.
    #[arg(long)]
    pub no_auto_guess: bool,

    /// Levenberg–Marquardt iteration budget per fit.
    #[arg(long, default_value_t = 500)]
    pub max_iter: usize,

    /// Initial gyromagnetic ratio (rad·GHz/Oe).
    #[arg(long, default_value_t = 0.0176)]
    pub gamma: f64,

    /// Initial saturation magnetization (emu/cm³).
    #[arg(long, default_value_t = 800.0)]
    pub ms: f64,

    /// Initial uniaxial anisotropy field (Oe).
    #[arg(long, default_value_t = 0.0)]
    pub hu: f64,

    /// Initial anisotropy offset (Oe).
    #[arg(long, default_value_t = 0.0)]
    pub hk: f64,

    /// Initial residual field shift (Oe).
    #[arg(long, default_value_t = 0.0)]
    pub hr: f64,

    /// Kittel parameters varied by the dispersion fit.
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [KittelParam::Gamma, KittelParam::Ms, KittelParam::Hk]
    )]
    pub free: Vec<KittelParam>,

    /// Weight the dispersion fit by the resonance-field standard errors.
    #[arg(long)]
    pub weighted: bool,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the per-sweep lineshape table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full results (tables, fits, curve grid) to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

/// Options for `fmr show`.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Results JSON produced by `fmr fit --export-json`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Options for `fmr simulate`.
#[derive(Debug, Parser)]
pub struct SimulateArgs {
    /// Directory receiving `manifest.csv` and one CSV per sweep.
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Frequencies to simulate (GHz).
    #[arg(long, value_delimiter = ',', default_values_t = [3.0, 4.0, 5.0, 6.0])]
    pub frequencies: Vec<f64>,

    /// Gyromagnetic ratio (rad·GHz/Oe).
    #[arg(long, default_value_t = 0.0176)]
    pub gamma: f64,

    /// Saturation magnetization (emu/cm³).
    #[arg(long, default_value_t = 640.0)]
    pub ms: f64,

    /// Uniaxial anisotropy field (Oe).
    #[arg(long, default_value_t = 0.0)]
    pub hu: f64,

    /// Anisotropy offset (Oe).
    #[arg(long, default_value_t = 20.0)]
    pub hk: f64,

    /// Residual field shift (Oe).
    #[arg(long, default_value_t = 0.0)]
    pub hr: f64,

    /// Linewidth slope (Oe/GHz).
    #[arg(long, default_value_t = 3.0)]
    pub damping_slope: f64,

    /// Linewidth at zero frequency (Oe).
    #[arg(long, default_value_t = 5.0)]
    pub damping_intercept: f64,

    /// Antisymmetric lineshape amplitude.
    #[arg(long, default_value_t = 1.0e4)]
    pub k1: f64,

    /// Symmetric lineshape amplitude.
    #[arg(long, default_value_t = 2.0e3)]
    pub k2: f64,

    /// Samples per sweep.
    #[arg(long, default_value_t = 201)]
    pub points: usize,

    /// Half-width of each field window, in linewidths.
    #[arg(long, default_value_t = 8.0)]
    pub span: f64,

    /// Standard deviation of the additive signal noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["fmr", "fit"]).is_err());
        assert!(Cli::try_parse_from(["fmr", "fit", "--manifest", "m.csv", "--data", "d.csv"]).is_err());

        let cli = Cli::try_parse_from(["fmr", "fit", "--data", "d.csv", "--free", "gamma,ms"]).unwrap();
        match cli.command {
            Command::Fit(args) => {
                assert_eq!(args.data, Some(PathBuf::from("d.csv")));
                assert_eq!(args.free, vec![KittelParam::Gamma, KittelParam::Ms]);
                assert_eq!(args.max_iter, 500);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn simulate_parses_frequency_list() {
        let cli = Cli::try_parse_from(["fmr", "simulate", "--out-dir", "out", "--frequencies", "2,8.5"]).unwrap();
        match cli.command {
            Command::Simulate(args) => {
                assert_eq!(args.frequencies, vec![2.0, 8.5]);
                assert_eq!(args.points, 201);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
