//! Numbers-first plot artifacts for downstream renderers.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use sp_core::Result;

use crate::config::Range;
use crate::ratio::RatioPoint;
use crate::sample::PlotStyle;

pub const PLOT_ARTIFACT_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct PlotArtifact {
    pub schema_version: String,
    pub meta: PlotMeta,
    pub name: String,
    pub bin_edges: Vec<f64>,
    pub log_x: bool,
    pub log_y: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis_range: Option<Range>,
    pub y_axis_range: Range,
    pub ratio_y_axis_range: Range,
    pub stack: Vec<StackedSeriesArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_band_stat: Option<BandEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_band_syst: Option<BandEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_band_stat_syst: Option<BandEnvelope>,
    pub signals: Vec<OverlaySeriesArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSeriesArtifact>,
    pub ratio: Vec<RatioPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ratio_band: Vec<(f64, f64, f64)>,
    pub error_fill_color: i16,
    pub error_fill_style: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blinded_x_range: Option<Range>,
    pub blinded_range_fill_color: i16,
    pub blinded_range_fill_style: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlotMeta {
    pub tool: String,
    pub tool_version: String,
    pub created_unix_ms: u128,
}

impl PlotMeta {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tool: "stackplot".to_string(),
            tool_version: sp_core::VERSION.to_string(),
            created_unix_ms: now_unix_ms()?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BandEnvelope {
    pub lo: Vec<f64>,
    pub hi: Vec<f64>,
}

/// One layer of the stacked prediction, bottom to top, already cumulative.
#[derive(Debug, Clone, Serialize)]
pub struct StackedSeriesArtifact {
    pub label: String,
    pub y: Vec<f64>,
    pub style: PlotStyle,
}

/// A series drawn on top of the stack rather than inside it.
#[derive(Debug, Clone, Serialize)]
pub struct OverlaySeriesArtifact {
    pub label: String,
    pub y: Vec<f64>,
    pub style: PlotStyle,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSeriesArtifact {
    pub label: String,
    pub y: Vec<f64>,
    pub yerr_lo: Vec<f64>,
    pub yerr_hi: Vec<f64>,
    pub error_model: String,
    /// Renderers omit zero-content points entirely (poisson2 mode).
    pub drop_zero_bins: bool,
    pub style: PlotStyle,
}

fn now_unix_ms() -> Result<u128> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| sp_core::Error::Computation(format!("system time error: {}", e)))?;
    Ok(d.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_carries_tool_version() {
        let meta = PlotMeta::new().unwrap();
        assert_eq!(meta.tool, "stackplot");
        assert_eq!(meta.tool_version, sp_core::VERSION);
        assert!(meta.created_unix_ms > 0);
    }
}
