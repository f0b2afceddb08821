use crate::common::ComparisonTolerance;

pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for value in values {
        let corrected = value - correction;
        let next = sum + corrected;
        correction = (next - sum) - corrected;
        sum = next;
    }

    sum
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be non-decreasing; repeated abscissae are allowed. Outside
/// `[xp[0], xp[last]]` the nearest endpoint value is returned, so a grid with
/// no overlap never extrapolates. Returns NaN for an empty grid.
pub fn interpolate_clamped(xp: &[f64], fp: &[f64], x: f64) -> f64 {
    let len = xp.len().min(fp.len());
    if len == 0 {
        return f64::NAN;
    }

    let xp = &xp[..len];
    let upper = xp.partition_point(|point| *point <= x);
    if upper == 0 {
        return fp[0];
    }
    if upper == len {
        return fp[len - 1];
    }

    let lower = upper - 1;
    let span = xp[upper] - xp[lower];
    let weight = (x - xp[lower]) / span;
    fp[lower] + weight * (fp[upper] - fp[lower])
}

pub fn interpolate_onto(xp: &[f64], fp: &[f64], targets: &[f64]) -> Vec<f64> {
    targets
        .iter()
        .map(|target| interpolate_clamped(xp, fp, *target))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrmsNorm {
    pub value: f64,
    pub abs_tol: f64,
    pub sample_count: usize,
}

/// Weighted root-mean-square difference between `computed` and `reference`.
///
/// NaN reference samples are treated as missing and excluded. With fewer than
/// two usable samples the norm is defined as zero.
pub fn wrms_norm(reference: &[f64], computed: &[f64], tolerance: ComparisonTolerance) -> WrmsNorm {
    let samples = reference
        .iter()
        .zip(computed.iter())
        .filter(|(reference, _)| !reference.is_nan())
        .map(|(reference, computed)| (*reference, *computed))
        .collect::<Vec<_>>();

    let abs_max = samples
        .iter()
        .map(|(reference, _)| reference.abs())
        .fold(0.0_f64, f64::max);
    let abs_tol = tolerance.abs_tol_scale * abs_max + tolerance.abs_tol_floor;

    if samples.len() < 2 {
        return WrmsNorm {
            value: 0.0,
            abs_tol,
            sample_count: samples.len(),
        };
    }

    let squares = samples.iter().map(|(reference, computed)| {
        let weight = 1.0 / (tolerance.rel_tol * reference.abs() + abs_tol);
        let diff = (computed - reference) * weight;
        diff * diff
    });
    let mean = stable_sum(squares) / samples.len() as f64;

    WrmsNorm {
        value: mean.sqrt(),
        abs_tol,
        sample_count: samples.len(),
    }
}

/// Formats `value` with `digits` significant digits, trimming trailing zeros
/// and switching to exponent notation for very small or large magnitudes.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let digits = digits.max(1);
    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        );
    }

    let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
