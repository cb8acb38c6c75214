//! Data/prediction ratio graph with asymmetric uncertainty propagation.

use serde::Serialize;

use sp_core::BinnedSeries;

/// One point of the ratio panel. Bins failing the validity tests are
/// omitted from the graph, not zero-filled.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RatioPoint {
    pub x: f64,
    pub y: f64,
    pub error_low: f64,
    pub error_high: f64,
}

/// How the ratio panel is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioMode {
    /// `data / prediction`.
    Simple,
    /// `(data - prediction) / data error` (pull-like data excess).
    DataExcess,
}

/// Compute the ratio graph between observed data and the prediction.
///
/// `data_error_low`/`data_error_high` are the per-bin one-sided data
/// errors (Poisson or normal, see [`crate::data::data_errors`]); the
/// prediction carries symmetric statistical errors from its variance.
pub fn ratio(
    data: &BinnedSeries,
    data_error_low: &[f64],
    data_error_high: &[f64],
    prediction: &BinnedSeries,
    mode: RatioMode,
) -> Vec<RatioPoint> {
    let mut points = Vec::with_capacity(data.n_bins());

    for i in 0..data.n_bins() {
        let d = data.content[i];
        let p = prediction.content[i];
        if d == 0.0 || p == 0.0 {
            continue;
        }

        let d_err_low = data_error_low[i];
        let d_err_high = data_error_high[i];
        let p_err = prediction.bin_error(i);

        let (y, error_low, error_high) = match mode {
            RatioMode::DataExcess => {
                if d_err_high == 0.0 || d_err_low == 0.0 {
                    continue;
                }
                let y = (d - p) / d_err_high;
                let error_high =
                    ((d_err_high * d_err_high + p_err * p_err) / (d_err_high * d_err_high)).sqrt();
                let error_low =
                    ((d_err_low * d_err_low + p_err * p_err) / (d_err_low * d_err_low)).sqrt();
                (y, error_low, error_high)
            }
            RatioMode::Simple => {
                let dsq = d * d;
                let psq = p * p;
                let y = d / p;
                let error_high =
                    ((d_err_high * d_err_high * psq + p_err * p_err * dsq) / (psq * psq)).sqrt();
                let error_low =
                    ((d_err_low * d_err_low * psq + p_err * p_err * dsq) / (psq * psq)).sqrt();
                (y, error_low, error_high)
            }
        };

        points.push(RatioPoint { x: data.bin_center(i), y, error_low, error_high });
    }

    points
}

/// Relative systematic band around 1 for the ratio panel: per bin,
/// `1 ± systErr/content` where the combined prediction is nonzero with a
/// nonzero systematic error.
pub fn ratio_systematics_band(syst_only: &BinnedSeries) -> Vec<(f64, f64, f64)> {
    let mut band = Vec::new();
    for i in 0..syst_only.n_bins() {
        let content = syst_only.content[i];
        let error = syst_only.bin_error(i);
        if content == 0.0 || error == 0.0 {
            continue;
        }
        let rel = error / content;
        band.push((syst_only.bin_center(i), 1.0 - rel, 1.0 + rel));
    }
    band
}
