//! Y-axis range resolution for the main panel.

use crate::config::Range;
use sp_core::BinnedSeries;

const LINEAR_HEADROOM: f64 = 1.2;
const LOG_HEADROOM: f64 = 8.0;
const LOG_FLOOR: f64 = 0.1;

/// Largest per-bin value of `content + error` across the given series.
fn max_with_errors(series: &BinnedSeries, error_high: Option<&[f64]>) -> f64 {
    let mut max = f64::NEG_INFINITY;
    for i in 0..series.n_bins() {
        let err = match error_high {
            Some(errors) => errors[i],
            None => series.bin_error(i),
        };
        let v = series.content[i] + err;
        if v > max {
            max = v;
        }
    }
    max
}

/// Resolve the y-axis range of the main panel.
///
/// An explicit request always wins. Otherwise the maximum is taken over the
/// total prediction (including its error band), the data points with their
/// upper errors and every overlaid series, padded by 20% on a linear scale
/// and a factor 8 on a log scale. On a log scale the lower edge is the
/// smallest positive bin content, clamped to 0.1.
pub fn resolve_y_range(
    explicit: Option<Range>,
    prediction: Option<&BinnedSeries>,
    data: Option<(&BinnedSeries, &[f64])>,
    overlays: &[&BinnedSeries],
    log_y: bool,
    show_zero: bool,
) -> Range {
    if let Some(range) = explicit {
        return range;
    }

    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut min_positive = f64::INFINITY;
    if let Some(pred) = prediction {
        max = max.max(max_with_errors(pred, None));
        min = min.min(pred.min_content());
        min_positive = min_positive.min(pred.min_positive_content());
    }
    if let Some((series, error_high)) = data {
        max = max.max(max_with_errors(series, Some(error_high)));
        min = min.min(series.min_content());
        min_positive = min_positive.min(series.min_positive_content());
    }
    for series in overlays {
        max = max.max(series.max_content());
        min = min.min(series.min_content());
        min_positive = min_positive.min(series.min_positive_content());
    }
    if !max.is_finite() || max <= 0.0 {
        max = 1.0;
    }

    if log_y {
        let start = if !min_positive.is_finite() {
            tracing::warn!(floor = LOG_FLOOR, "no positive bin content, log-scale lower edge floored");
            LOG_FLOOR
        } else if min_positive < LOG_FLOOR {
            tracing::warn!(
                requested = min_positive,
                floor = LOG_FLOOR,
                "log-scale lower edge clamped"
            );
            LOG_FLOOR
        } else {
            min_positive
        };
        Range { start, end: max * LOG_HEADROOM }
    } else {
        if !min.is_finite() {
            min = 0.0;
        }
        // Deflate the minimum by the same relative margin the maximum is
        // inflated by; negative minima grow downwards.
        let mut start = if min >= 0.0 { min / LINEAR_HEADROOM } else { min * LINEAR_HEADROOM };
        if show_zero {
            start = start.min(0.0);
        }
        Range { start, end: max * LINEAR_HEADROOM }
    }
}
