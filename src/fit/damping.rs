//! Linewidth-vs-frequency regression.
//!
//! Ordinary least squares `DH = slope·f + intercept`, closed form. The slope is
//! proportional to the Gilbert damping and the intercept is the inhomogeneous
//! broadening. Statistics follow the usual `linregress` conventions.

use crate::domain::DampingFitResult;
use crate::error::FitError;
use crate::math::student_t_two_sided_p;

/// Guards the t statistic against `r = ±1`.
const TINY: f64 = 1e-20;

/// Regress linewidth against frequency. `points` are `(frequency, DH)`.
pub fn fit_damping(points: &[(f64, f64)]) -> Result<DampingFitResult, FitError> {
    if let Some(&(f, dh)) = points.iter().find(|(f, dh)| !(f.is_finite() && dh.is_finite())) {
        return Err(FitError::invalid_input(format!(
            "non-finite damping point (frequency={f}, DH={dh})"
        )));
    }

    let distinct = count_distinct_frequencies(points);
    if distinct < 2 {
        return Err(FitError::Underdetermined {
            required: 2,
            available: distinct,
        });
    }

    let n = points.len();
    let n_f = n as f64;
    let x_mean = points.iter().map(|p| p.0).sum::<f64>() / n_f;
    let y_mean = points.iter().map(|p| p.1).sum::<f64>() / n_f;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for &(x, y) in points {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r_value = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let (p_value, slope_stderr, intercept_stderr) = if n == 2 {
        // A line through two points is exact.
        let p = if syy == 0.0 { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        let dof = (n - 2) as f64;
        let t = r_value * (dof / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
        let p = student_t_two_sided_p(t, dof);
        let slope_se = ((1.0 - r_value * r_value) * syy / sxx / dof).max(0.0).sqrt();
        let intercept_se = slope_se * (sxx / n_f + x_mean * x_mean).sqrt();
        (p, slope_se, intercept_se)
    };

    Ok(DampingFitResult {
        n,
        slope,
        intercept,
        r_value,
        p_value,
        slope_stderr,
        intercept_stderr,
    })
}

fn count_distinct_frequencies(points: &[(f64, f64)]) -> usize {
    let mut f: Vec<f64> = points.iter().map(|p| p.0).collect();
    f.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    f.dedup();
    f.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_points_give_the_exact_line() {
        let pts = [(3.0, 12.5), (7.0, 20.1)];
        let fit = fit_damping(&pts).unwrap();

        let expected = (20.1 - 12.5) / (7.0 - 3.0);
        assert!((fit.slope - expected).abs() < 1e-12);
        for &(f, dh) in &pts {
            assert!((fit.slope * f + fit.intercept - dh).abs() < 1e-12);
        }
        assert!((fit.r_value - 1.0).abs() < 1e-12);
        assert_eq!(fit.p_value, 0.0);
        assert_eq!(fit.slope_stderr, 0.0);
    }

    #[test]
    fn fewer_than_two_distinct_frequencies_is_underdetermined() {
        let err = fit_damping(&[(3.0, 10.0)]).unwrap_err();
        assert_eq!(err, FitError::Underdetermined { required: 2, available: 1 });

        let err = fit_damping(&[(3.0, 10.0), (3.0, 11.0), (3.0, 12.0)]).unwrap_err();
        assert_eq!(err, FitError::Underdetermined { required: 2, available: 1 });

        let err = fit_damping(&[]).unwrap_err();
        assert_eq!(err, FitError::Underdetermined { required: 2, available: 0 });
    }

    #[test]
    fn matches_reference_regression_statistics() {
        let pts = [(1.0, 2.1), (2.0, 3.9), (3.0, 6.2), (4.0, 7.8), (5.0, 10.1)];
        let fit = fit_damping(&pts).unwrap();

        assert_eq!(fit.n, 5);
        assert!((fit.slope - 1.99).abs() < 1e-12);
        assert!((fit.intercept - 0.05).abs() < 1e-12);
        assert!((fit.r_value - 0.998_651_755_568_965_7).abs() < 1e-12);
        assert!((fit.slope_stderr - 0.059_721_576_223_895_34).abs() < 1e-12);
        assert!((fit.intercept_stderr - 0.198_074_060_223_270_9).abs() < 1e-12);

        // Student's t with 3 d.o.f. has a closed-form CDF.
        let t: f64 = 33.321_290_659_501_36;
        let u = t / 3.0_f64.sqrt();
        let expected_p = 1.0 - 2.0 / std::f64::consts::PI * (u.atan() + u / (1.0 + u * u));
        assert!((fit.p_value - expected_p).abs() / expected_p < 1e-8, "p={}", fit.p_value);
    }

    #[test]
    fn flat_linewidth_has_zero_correlation() {
        let fit = fit_damping(&[(3.0, 10.0), (4.0, 10.0), (5.0, 10.0)]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 10.0);
        assert_eq!(fit.r_value, 0.0);
        assert!((fit.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let err = fit_damping(&[(3.0, f64::NAN), (4.0, 1.0)]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }
}
