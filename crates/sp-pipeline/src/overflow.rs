//! Out-of-range bin folding.
//!
//! When a plot shows overflow, everything outside the displayed range
//! (the under/overflow accumulators plus any bins outside an explicit
//! X-axis range) is moved into the first and last displayed bins, so the
//! integral over the displayed range equals the full integral.

use sp_core::BinnedSeries;

use crate::config::Range;
use crate::sample::SampleKind;

/// Fold under/overflow content into the edge bins of the active range.
///
/// For DATA the variance is left untouched: data uncertainties are
/// recomputed from bin counts later, not carried as additive variance.
/// An empty series is a no-op.
pub fn fold_overflow(series: &mut BinnedSeries, kind: SampleKind, active_range: Option<Range>) {
    if series.is_empty() {
        return;
    }

    let n = series.n_bins();
    let (first_bin, last_bin) = match active_range {
        Some(range) => {
            let first = series.bin_index(range.start).unwrap_or(0);
            let last = series.bin_index(range.end).unwrap_or(n - 1);
            (first, last.max(first))
        }
        None => (0, n - 1),
    };

    let mut underflow = series.underflow;
    let mut underflow_variance = series.underflow_variance;
    for i in 0..first_bin {
        underflow += series.content[i];
        underflow_variance += series.variance[i];
        series.content[i] = 0.0;
        series.variance[i] = 0.0;
    }

    let mut overflow = series.overflow;
    let mut overflow_variance = series.overflow_variance;
    for i in last_bin + 1..n {
        overflow += series.content[i];
        overflow_variance += series.variance[i];
        series.content[i] = 0.0;
        series.variance[i] = 0.0;
    }

    series.underflow = 0.0;
    series.underflow_variance = 0.0;
    series.overflow = 0.0;
    series.overflow_variance = 0.0;

    series.content[first_bin] += underflow;
    series.content[last_bin] += overflow;
    if kind != SampleKind::Data {
        series.variance[first_bin] += underflow_variance;
        series.variance[last_bin] += overflow_variance;
    }
}
