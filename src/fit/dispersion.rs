//! Kittel dispersion fitting.
//!
//! Fits `frequency_i ≈ f(H_FMR,i; gamma, Ms, Hu, Hk, Hr)` over a caller-chosen
//! free subset of the Kittel parameters; the rest stay at their configured
//! values.
//!
//! Identifiability: `Hk`/`Hr` only appear as `Hk + Hr`, and `Ms`/`Hu` only as
//! `4π·Ms + Hu`. When both members of a pair are free the optimizer still
//! returns a solution, but neither member has a meaningful standard error and
//! both are reported with `stderr = None`.

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    DispersionConfig, DispersionFitResult, DispersionPoint, FitQuality, KittelParam, KittelParams, ParamEstimate,
    Weighting,
};
use crate::error::FitError;
use crate::math::{LeastSquaresProblem, LmOptions, LmReport, minimize};
use crate::models::{kittel_field_slope, kittel_frequency, kittel_gradient};

const DEGENERATE_PAIRS: [(KittelParam, KittelParam); 2] =
    [(KittelParam::Hk, KittelParam::Hr), (KittelParam::Ms, KittelParam::Hu)];

struct KittelProblem<'a> {
    points: &'a [DispersionPoint],
    weights: &'a [f64],
    free: &'a [KittelParam],
    base: KittelParams,
}

impl KittelProblem<'_> {
    fn expand(&self, params: &DVector<f64>) -> KittelParams {
        expand(self.free, self.base, params)
    }
}

impl LeastSquaresProblem for KittelProblem<'_> {
    fn n_params(&self) -> usize {
        self.free.len()
    }

    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let p = self.expand(params);
        DVector::from_iterator(
            self.points.len(),
            self.points
                .iter()
                .zip(self.weights)
                .map(|(pt, &w)| w * (pt.frequency - kittel_frequency(pt.field, &p))),
        )
    }

    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64> {
        let p = self.expand(params);
        let mut jac = DMatrix::<f64>::zeros(self.points.len(), self.free.len());
        for (i, (pt, &w)) in self.points.iter().zip(self.weights).enumerate() {
            let g = kittel_gradient(pt.field, &p);
            for (j, &param) in self.free.iter().enumerate() {
                jac[(i, j)] = -w * g[param_index(param)];
            }
        }
        jac
    }
}

/// Fit the Kittel relation to `(frequency, H_FMR)` points.
pub fn fit_dispersion(
    points: &[DispersionPoint],
    config: &DispersionConfig,
) -> Result<DispersionFitResult, FitError> {
    validate_points(points)?;

    let free = config.free_params();
    if free.is_empty() {
        return Err(FitError::invalid_input("dispersion fit needs at least one free parameter"));
    }
    let initial = config.initial;
    if KittelParam::ALL.iter().any(|&p| !initial.get(p).is_finite()) {
        return Err(FitError::invalid_input("initial Kittel parameters contain non-finite values"));
    }

    let distinct = count_distinct_frequencies(points);
    if distinct < free.len() {
        return Err(FitError::Underdetermined {
            required: free.len(),
            available: distinct,
        });
    }

    let unit = vec![1.0; points.len()];
    let mut report = solve(points, &unit, &free, initial, &config.lm)?;
    let mut fitted = expand(&free, initial, &report.params);

    if config.weighting == Weighting::FieldStderr {
        let weights = field_stderr_weights(points, &fitted);
        report = solve(points, &weights, &free, fitted, &config.lm)?;
        fitted = expand(&free, initial, &report.params);
    }

    if KittelParam::ALL.iter().any(|&p| !fitted.get(p).is_finite()) {
        return Err(FitError::Convergence {
            iterations: report.iterations,
            chi_square: report.chi_square,
        });
    }

    let mut unidentified = Vec::new();
    for (a, b) in DEGENERATE_PAIRS {
        if free.contains(&a) && free.contains(&b) {
            log::warn!(
                "{} and {} are both free but only their sum is identifiable; standard errors dropped",
                a.label(),
                b.label()
            );
            unidentified.extend([a, b]);
        }
    }

    let estimate = |param: KittelParam| -> ParamEstimate {
        let value = fitted.get(param);
        match free.iter().position(|&p| p == param) {
            Some(_) if unidentified.contains(&param) => ParamEstimate::fixed(value),
            Some(j) => ParamEstimate { value, stderr: report.stderr(j) },
            None => ParamEstimate::fixed(value),
        }
    };

    let quality = FitQuality::new(points.len(), free.len(), report.chi_square, report.iterations, report.termination);
    if !quality.converged() {
        log::warn!("dispersion fit stalled after {} iterations", report.iterations);
    }

    log::debug!(
        "dispersion: gamma={:.6} Ms={:.3} Hk={:.3} chi2={:.3e} iters={} ({:?})",
        fitted.gamma,
        fitted.ms,
        fitted.hk,
        report.chi_square,
        report.iterations,
        report.termination
    );

    Ok(DispersionFitResult {
        gamma: estimate(KittelParam::Gamma),
        ms: estimate(KittelParam::Ms),
        hu: estimate(KittelParam::Hu),
        hk: estimate(KittelParam::Hk),
        hr: estimate(KittelParam::Hr),
        free,
        weighting: config.weighting,
        quality,
    })
}

fn solve(
    points: &[DispersionPoint],
    weights: &[f64],
    free: &[KittelParam],
    start: KittelParams,
    lm: &LmOptions,
) -> Result<LmReport, FitError> {
    let problem = KittelProblem {
        points,
        weights,
        free,
        base: start,
    };
    let p0 = DVector::from_iterator(free.len(), free.iter().map(|&p| start.get(p)));
    Ok(minimize(&problem, p0, lm)?)
}

fn expand(free: &[KittelParam], base: KittelParams, params: &DVector<f64>) -> KittelParams {
    let mut p = base;
    for (j, &param) in free.iter().enumerate() {
        p.set(param, params[j]);
    }
    p
}

/// Residual weights `1/σ_f,i` with `σ_f,i = |df/dH|·σ_H,i` at the first-pass fit.
///
/// Points without a usable field uncertainty get the median weight of the others
/// (unit weight when none has one).
fn field_stderr_weights(points: &[DispersionPoint], fitted: &KittelParams) -> Vec<f64> {
    let raw: Vec<Option<f64>> = points
        .iter()
        .map(|pt| {
            let sigma_h = pt.field_stderr.filter(|s| s.is_finite() && *s > 0.0)?;
            let sigma_f = kittel_field_slope(pt.field, fitted).abs() * sigma_h;
            (sigma_f.is_finite() && sigma_f > 0.0).then(|| 1.0 / sigma_f)
        })
        .collect();

    let mut known: Vec<f64> = raw.iter().flatten().copied().collect();
    let fallback = median_mut(&mut known).unwrap_or(1.0);
    let missing = raw.iter().filter(|w| w.is_none()).count();
    if missing > 0 {
        log::warn!("{missing} dispersion point(s) have no usable field stderr; using median weight");
    }

    raw.into_iter().map(|w| w.unwrap_or(fallback)).collect()
}

fn validate_points(points: &[DispersionPoint]) -> Result<(), FitError> {
    for pt in points {
        if !(pt.frequency.is_finite() && pt.field.is_finite()) {
            return Err(FitError::invalid_input(format!(
                "non-finite dispersion point (frequency={}, field={})",
                pt.frequency, pt.field
            )));
        }
    }
    Ok(())
}

fn count_distinct_frequencies(points: &[DispersionPoint]) -> usize {
    let mut f: Vec<f64> = points.iter().map(|p| p.frequency).collect();
    f.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    f.dedup();
    f.len()
}

fn param_index(param: KittelParam) -> usize {
    match param {
        KittelParam::Gamma => 0,
        KittelParam::Ms => 1,
        KittelParam::Hu => 2,
        KittelParam::Hk => 3,
        KittelParam::Hr => 4,
    }
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::kittel_resonance_field;

    const TRUTH: KittelParams = KittelParams {
        gamma: 0.0176,
        ms: 640.0,
        hu: 0.0,
        hk: 20.0,
        hr: 0.0,
    };

    fn kittel_points(truth: &KittelParams, frequencies: &[f64]) -> Vec<DispersionPoint> {
        frequencies
            .iter()
            .map(|&f| DispersionPoint {
                frequency: f,
                field: kittel_resonance_field(f, truth).unwrap(),
                field_stderr: Some(0.5),
            })
            .collect()
    }

    fn start() -> DispersionConfig {
        DispersionConfig {
            initial: KittelParams {
                gamma: 0.017,
                ms: 800.0,
                hu: 0.0,
                hk: 0.0,
                hr: 0.0,
            },
            ..DispersionConfig::default()
        }
    }

    #[test]
    fn recovers_noise_free_kittel_parameters() {
        let freqs: Vec<f64> = (2..=12).map(|f| f as f64).collect();
        let points = kittel_points(&TRUTH, &freqs);

        let fit = fit_dispersion(&points, &start()).unwrap();

        assert!((fit.gamma.value - TRUTH.gamma).abs() / TRUTH.gamma < 1e-6, "gamma={}", fit.gamma.value);
        assert!((fit.ms.value - TRUTH.ms).abs() / TRUTH.ms < 1e-6, "ms={}", fit.ms.value);
        assert!((fit.hk.value - TRUTH.hk).abs() < 1e-3, "hk={}", fit.hk.value);
        assert_eq!(fit.free, vec![KittelParam::Gamma, KittelParam::Ms, KittelParam::Hk]);

        // Fixed parameters are untouched and carry no uncertainty.
        assert_eq!(fit.hu, ParamEstimate::fixed(0.0));
        assert_eq!(fit.hr, ParamEstimate::fixed(0.0));
        assert!(fit.gamma.stderr.is_some());
    }

    #[test]
    fn fewer_frequencies_than_free_parameters_is_underdetermined() {
        let points = kittel_points(&TRUTH, &[3.0, 4.0]);
        let err = fit_dispersion(&points, &start()).unwrap_err();
        assert_eq!(err, FitError::Underdetermined { required: 3, available: 2 });
    }

    #[test]
    fn repeated_frequencies_do_not_count_as_distinct() {
        let mut points = kittel_points(&TRUTH, &[3.0, 4.0]);
        points.push(points[0]);
        let err = fit_dispersion(&points, &start()).unwrap_err();
        assert_eq!(err, FitError::Underdetermined { required: 3, available: 2 });
    }

    #[test]
    fn field_stderr_weighting_agrees_on_clean_data() {
        let freqs = [3.0, 4.0, 5.0, 6.0, 8.0, 10.0];
        let points = kittel_points(&TRUTH, &freqs);
        let config = DispersionConfig {
            weighting: Weighting::FieldStderr,
            ..start()
        };

        let fit = fit_dispersion(&points, &config).unwrap();
        assert_eq!(fit.weighting, Weighting::FieldStderr);
        assert!((fit.ms.value - TRUTH.ms).abs() / TRUTH.ms < 1e-6);
        assert!((fit.hk.value - TRUTH.hk).abs() < 1e-3);
    }

    #[test]
    fn degenerate_pair_drops_standard_errors() {
        let freqs = [3.0, 4.0, 5.0, 6.0, 8.0, 10.0];
        let points = kittel_points(&TRUTH, &freqs);
        let config = DispersionConfig {
            free: vec![KittelParam::Gamma, KittelParam::Ms, KittelParam::Hk, KittelParam::Hr],
            ..start()
        };

        let fit = fit_dispersion(&points, &config).unwrap();
        assert!(fit.hk.stderr.is_none());
        assert!(fit.hr.stderr.is_none());
        assert!((fit.hk.value + fit.hr.value - TRUTH.hk).abs() < 1e-2);
    }

    #[test]
    fn missing_field_stderr_takes_the_median_weight() {
        let mut points = kittel_points(&TRUTH, &[3.0, 4.0, 5.0, 6.0, 8.0]);
        let stderrs = [Some(0.5), None, Some(0.0), Some(1.0), Some(2.0)];
        for (pt, s) in points.iter_mut().zip(stderrs) {
            pt.field_stderr = s;
        }

        let weights = field_stderr_weights(&points, &TRUTH);
        let direct = |i: usize, sigma_h: f64| 1.0 / (kittel_field_slope(points[i].field, &TRUTH).abs() * sigma_h);
        let mut known = [direct(0, 0.5), direct(3, 1.0), direct(4, 2.0)];
        known.sort_by(f64::total_cmp);

        assert_eq!(weights[0], direct(0, 0.5));
        assert_eq!(weights[3], direct(3, 1.0));
        assert_eq!(weights[4], direct(4, 2.0));
        // `None` and a zero stderr both fall back to the median of the usable ones.
        assert_eq!(weights[1], known[1]);
        assert_eq!(weights[2], known[1]);
    }

    #[test]
    fn field_stderr_weighting_without_any_stderr_matches_the_uniform_fit() {
        // Offsets keep the data off the exact Kittel curve so weighting could matter.
        let offsets = [0.8, -1.1, 0.4, 1.3, -0.6, -0.9];
        let mut points = kittel_points(&TRUTH, &[3.0, 4.0, 5.0, 6.0, 8.0, 10.0]);
        for (pt, dh) in points.iter_mut().zip(offsets) {
            pt.field += dh;
            pt.field_stderr = None;
        }
        assert_eq!(field_stderr_weights(&points, &TRUTH), vec![1.0; points.len()]);

        let uniform = fit_dispersion(&points, &start()).unwrap();
        let weighted = fit_dispersion(
            &points,
            &DispersionConfig {
                weighting: Weighting::FieldStderr,
                ..start()
            },
        )
        .unwrap();

        for param in [KittelParam::Gamma, KittelParam::Ms, KittelParam::Hk] {
            let (u, w) = (uniform.estimate(param).value, weighted.estimate(param).value);
            assert!((u - w).abs() <= 1e-6 * u.abs().max(1.0), "{}: {u} vs {w}", param.label());
        }
    }

    #[test]
    fn exhausted_iteration_budget_is_a_convergence_error() {
        let points = kittel_points(&TRUTH, &[3.0, 4.0, 5.0, 6.0]);
        let config = DispersionConfig {
            lm: LmOptions {
                max_iter: 1,
                ..LmOptions::default()
            },
            ..start()
        };
        let err = fit_dispersion(&points, &config).unwrap_err();
        assert!(matches!(err, FitError::Convergence { iterations: 1, .. }), "{err:?}");
    }

    #[test]
    fn empty_free_set_is_invalid() {
        let points = kittel_points(&TRUTH, &[3.0, 4.0, 5.0]);
        let config = DispersionConfig {
            free: Vec::new(),
            ..start()
        };
        assert!(matches!(fit_dispersion(&points, &config), Err(FitError::InvalidInput(_))));
    }
}
