//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads sweeps and runs the fitting pipeline
//! - prints reports/plots
//! - writes optional exports
//! - generates synthetic data sets

use clap::Parser;

use crate::cli::{Command, FitArgs, ShowArgs, SimulateArgs};
use crate::data::SyntheticSpec;
use crate::domain::{
    AnalysisConfig, ColumnNames, DispersionConfig, FitConfig, KittelParams, LineshapeOptions, ResultsFile,
    SweepSource, Weighting,
};
use crate::error::AppError;
use crate::math::LmOptions;

pub mod pipeline;

/// Entry point for the `fmr` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Show(args) => handle_show(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_ingest_summary(&config.source, &run.loaded));
    println!("{}", crate::report::format_run_summary(&run.results));

    if config.plot {
        print_plots(&run.results, config.plot_width, config.plot_height);
    }

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::write_lineshape_csv(path, &run.results.lineshapes)?;
        log::info!("wrote lineshape table to {}", path.display());
    }
    if let Some(path) = &config.export_json {
        crate::io::write_results_json(path, &run.results)?;
        log::info!("wrote results to {}", path.display());
    }

    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let results = crate::io::read_results_json(&args.results)?;

    println!("{}", crate::report::format_run_summary(&results));
    if !args.no_plot {
        print_plots(&results, args.width, args.height);
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = synthetic_spec_from_args(&args);
    let manifest = pipeline::run_simulate(&spec, &args.out_dir, &ColumnNames::default())?;

    println!(
        "Wrote {} synthetic sweeps; manifest: {}",
        spec.frequencies.len(),
        manifest.display()
    );
    Ok(())
}

fn print_plots(results: &ResultsFile, width: usize, height: usize) {
    if results.lineshapes.is_empty() {
        return;
    }
    println!("{}", crate::plot::render_dispersion_plot(results, width, height));
    println!("{}", crate::plot::render_damping_plot(results, width, height));
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let source = match (&args.manifest, &args.data) {
        (Some(path), None) => SweepSource::Manifest(path.clone()),
        (None, Some(path)) => SweepSource::Long(path.clone()),
        _ => return Err(AppError::new(2, "Exactly one of --manifest or --data is required.")),
    };
    if args.max_iter == 0 {
        return Err(AppError::new(2, "--max-iter must be > 0."));
    }

    let lm = LmOptions {
        max_iter: args.max_iter,
        ..LmOptions::default()
    };

    Ok(FitConfig {
        source,
        columns: ColumnNames {
            frequency: args.frequency_column.clone(),
            field: args.field_column.clone(),
            signal: args.signal_column.clone(),
        },
        analysis: AnalysisConfig {
            lineshape: LineshapeOptions { lm: lm.clone() },
            dispersion: DispersionConfig {
                initial: KittelParams {
                    gamma: args.gamma,
                    ms: args.ms,
                    hu: args.hu,
                    hk: args.hk,
                    hr: args.hr,
                },
                free: args.free.clone(),
                weighting: if args.weighted {
                    Weighting::FieldStderr
                } else {
                    Weighting::Uniform
                },
                lm,
            },
            auto_guess: !args.no_auto_guess,
        },
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_results: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}

pub fn synthetic_spec_from_args(args: &SimulateArgs) -> SyntheticSpec {
    SyntheticSpec {
        frequencies: args.frequencies.clone(),
        kittel: KittelParams {
            gamma: args.gamma,
            ms: args.ms,
            hu: args.hu,
            hk: args.hk,
            hr: args.hr,
        },
        damping_slope: args.damping_slope,
        damping_intercept: args.damping_intercept,
        k1: args.k1,
        k2: args.k2,
        points: args.points,
        span: args.span,
        noise: args.noise,
        seed: args.seed,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::KittelParam;

    #[test]
    fn fit_args_map_onto_config() {
        let cli = crate::cli::Cli::try_parse_from([
            "fmr",
            "fit",
            "--manifest",
            "runs/manifest.csv",
            "--max-iter",
            "50",
            "--free",
            "gamma,hk",
            "--weighted",
            "--no-plot",
            "--no-auto-guess",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };

        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.source, SweepSource::Manifest(PathBuf::from("runs/manifest.csv")));
        assert_eq!(config.analysis.lineshape.lm.max_iter, 50);
        assert_eq!(config.analysis.dispersion.lm.max_iter, 50);
        assert_eq!(
            config.analysis.dispersion.free_params(),
            vec![KittelParam::Gamma, KittelParam::Hk]
        );
        assert_eq!(config.analysis.dispersion.weighting, Weighting::FieldStderr);
        assert!(!config.analysis.auto_guess);
        assert!(!config.plot);
        assert_eq!(config.columns, ColumnNames::default());
    }

    #[test]
    fn zero_iteration_budget_is_rejected() {
        let cli = crate::cli::Cli::try_parse_from(["fmr", "fit", "--data", "d.csv", "--max-iter", "0"]).unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(fit_config_from_args(&args).unwrap_err().exit_code(), 2);
    }
}
