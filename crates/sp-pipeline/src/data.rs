//! Observed-data error models and blinding.
//!
//! Data uncertainties are recomputed from bin counts, not read from the
//! stored variance: either symmetric `sqrt(variance)` (normal model) or
//! asymmetric Garwood 68% Poisson intervals. Blinding zeroes content and
//! variance inside the window before any of this runs, so blinded bins
//! report zero events with zero error.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use sp_core::BinnedSeries;

use crate::config::{ErrorsType, Range};

fn is_near_integer_nonneg(x: f64) -> Option<u64> {
    if !(x.is_finite() && x >= 0.0) {
        return None;
    }
    let r = x.round();
    if (x - r).abs() <= 1e-9 { Some(r as u64) } else { None }
}

/// Central 68.2689% Poisson interval for an observed count `n`.
fn garwood_68_interval(n: u64) -> (f64, f64) {
    let alpha = 0.31731_f64;
    // Chi-square quantiles:
    // lo = n - 0.5 * chi2_{alpha/2, 2n}
    // hi = 0.5 * chi2_{1-alpha/2, 2(n+1)} - n
    let lo = if n == 0 {
        0.0
    } else {
        let dist = ChiSquared::new(2.0 * (n as f64)).unwrap();
        (n as f64) - 0.5 * dist.inverse_cdf(alpha / 2.0)
    };
    let dist_hi = ChiSquared::new(2.0 * ((n + 1) as f64)).unwrap();
    let hi = 0.5 * dist_hi.inverse_cdf(1.0 - alpha / 2.0) - (n as f64);
    (lo, hi)
}

/// Per-bin asymmetric errors for an observed series, plus the name of
/// the model actually used.
pub fn data_errors(series: &BinnedSeries, errors_type: ErrorsType) -> (Vec<f64>, Vec<f64>, String) {
    let n = series.n_bins();
    let mut lo = Vec::with_capacity(n);
    let mut hi = Vec::with_capacity(n);

    if errors_type == ErrorsType::Normal {
        for i in 0..n {
            let e = series.bin_error(i);
            lo.push(e);
            hi.push(e);
        }
        return (lo, hi, "normal".to_string());
    }

    let mut all_poisson = true;
    for &y in &series.content {
        if let Some(count) = is_near_integer_nonneg(y) {
            let (dl, dh) = garwood_68_interval(count);
            lo.push(dl);
            hi.push(dh);
        } else {
            all_poisson = false;
            let e = if y.is_finite() && y > 0.0 { y.sqrt() } else { f64::NAN };
            lo.push(e);
            hi.push(e);
        }
    }
    let model =
        if all_poisson { "garwood_poisson_68".to_string() } else { "sqrt_y_fallback".to_string() };
    (lo, hi, model)
}

/// Zero out data content and variance for every bin whose center falls
/// in `[range.start, range.end)`. Bins outside are left untouched.
///
/// Returns the indices of the first and last blinded bin, for the
/// renderer's shaded marker, or `None` if the window covers nothing.
pub fn blind(series: &mut BinnedSeries, range: Range) -> Option<(usize, usize)> {
    let mut blinded: Option<(usize, usize)> = None;
    for i in 0..series.n_bins() {
        let center = series.bin_center(i);
        if center >= range.start && center < range.end {
            series.content[i] = 0.0;
            series.variance[i] = 0.0;
            blinded = match blinded {
                None => Some((i, i)),
                Some((first, _)) => Some((first, i)),
            };
        }
    }
    blinded
}
