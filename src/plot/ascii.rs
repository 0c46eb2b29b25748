//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output (helpful for golden tests).
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line

use crate::domain::ResultsFile;

/// Axis labelling for one plot.
#[derive(Debug, Clone, Copy)]
pub struct Axes<'a> {
    pub title: &'a str,
    pub x_unit: &'a str,
    pub y_unit: &'a str,
}

/// Resonance frequency vs resonance field, with the fitted Kittel curve.
pub fn render_dispersion_plot(results: &ResultsFile, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = results
        .lineshapes
        .iter()
        .map(|r| (r.h_fmr.value, r.frequency))
        .collect();
    let curve: Option<Vec<(f64, f64)>> = results.dispersion_curve.as_ref().map(|c| {
        c.field
            .iter()
            .zip(c.frequency.iter())
            .map(|(&h, &f)| (h, f))
            .collect()
    });

    let axes = Axes {
        title: "f vs H_FMR",
        x_unit: "Oe",
        y_unit: "GHz",
    };
    render_ascii_plot(&axes, &points, curve.as_deref(), width, height)
}

/// Linewidth vs frequency, with the damping regression line.
pub fn render_damping_plot(results: &ResultsFile, width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = results
        .lineshapes
        .iter()
        .map(|r| (r.frequency, r.dh.value))
        .collect();

    let curve = match (results.damping.result(), x_range(&points, None)) {
        (Some(fit), Some((f0, f1))) => Some(
            (0..width.max(2))
                .map(|i| {
                    let f = f0 + (f1 - f0) * i as f64 / (width.max(2) - 1) as f64;
                    (f, fit.slope * f + fit.intercept)
                })
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    let axes = Axes {
        title: "DH vs f",
        x_unit: "GHz",
        y_unit: "Oe",
    };
    render_ascii_plot(&axes, &points, curve.as_deref(), width, height)
}

/// Render observed points and an optional curve on one grid.
pub fn render_ascii_plot(
    axes: &Axes<'_>,
    points: &[(f64, f64)],
    curve: Option<&[(f64, f64)]>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = x_range(points, curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = y_range(points, curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so points overlay it.
    if let Some(curve) = curve {
        draw_curve(&mut grid, curve, (x_min, x_max), (y_min, y_max));
    }
    for &(x, y) in points {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} | x=[{x_min:.3}, {x_max:.3}] {} | y=[{y_min:.3}, {y_max:.3}] {}\n",
        axes.title, axes.x_unit, axes.y_unit
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn x_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    extent(points.iter().chain(curve.unwrap_or_default()).map(|p| p.0))
}

fn y_range(points: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let (min, max) = extent(points.iter().chain(curve.unwrap_or_default()).map(|p| p.1))?;
    if max > min {
        Some((min, max))
    } else {
        // Flat data: centre it.
        Some((min - 0.5, max + 0.5))
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else if min.is_finite() {
        Some((min, min))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    if x_max <= x_min {
        return (width - 1) / 2;
    }
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top (y_max).
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], (x_min, x_max): (f64, f64), (y_min, y_max): (f64, f64)) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, '-'),
            None => grid[row][col] = '-',
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
