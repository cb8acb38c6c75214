//! Global configuration and per-plot request descriptors.
//!
//! These are plain values filled by the configuration loader (out of
//! scope here, see `sp-cli`) and consumed read-only by the pipeline.
//! There is no ambient style singleton: everything the renderer needs
//! rides on these values and on the emitted artifact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sp_core::{Error, Result};

/// How observed-data uncertainties are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorsType {
    /// Symmetric `sqrt(variance)` errors.
    Normal,
    /// Asymmetric Garwood 68% Poisson intervals.
    Poisson,
    /// Garwood intervals, with zero-content bins dropped from the graph.
    Poisson2,
}

impl ErrorsType {
    /// Parse the configuration-file spelling. Anything unknown falls back
    /// to `Poisson`, matching the historical behaviour.
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "normal" => ErrorsType::Normal,
            "poisson2" => ErrorsType::Poisson2,
            _ => ErrorsType::Poisson,
        }
    }
}

/// A closed axis interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub end: f64,
}

impl Range {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Yields-table formatting options.
#[derive(Debug, Clone)]
pub struct YieldsOptions {
    /// LaTeX `arraystretch` factor.
    pub stretch: f64,
    /// Table orientation; only `"h"` (processes as columns) is supported.
    pub align: String,
    /// Cell text alignment specifier (`l`, `c` or `r`).
    pub text_align: String,
    /// Decimal places for yields.
    pub num_prec_yields: usize,
    /// Decimal places for the Data/MC ratio.
    pub num_prec_ratio: usize,
}

impl Default for YieldsOptions {
    fn default() -> Self {
        Self {
            stretch: 1.15,
            align: "h".to_string(),
            text_align: "c".to_string(),
            num_prec_yields: 1,
            num_prec_ratio: 2,
        }
    }
}

/// Run-wide configuration shared by every plot.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Integrated luminosity per era, in pb⁻¹. Samples without an era use
    /// the entry under the empty key.
    pub luminosity: BTreeMap<String, f64>,
    /// Relative luminosity uncertainty (e.g. 0.025 for 2.5%). When
    /// positive, a constant `lumi` systematic source is synthesized for
    /// every MC and signal sample.
    pub luminosity_error: f64,
    /// Global scale factor applied on top of per-sample scales.
    pub scale: f64,
    /// Skip the user scale factors entirely.
    pub ignore_scales: bool,
    /// Skip the luminosity rescaling entirely.
    pub no_lumi_rescaling: bool,
    /// Ignore any blinded range in the plot requests.
    pub unblind: bool,
    /// Default for plots that do not specify `show_overflow`.
    pub show_overflow: bool,
    /// Default data error model.
    pub errors_type: ErrorsType,
    /// Fill style for the uncertainty band, forwarded to the renderer.
    pub error_fill_color: i16,
    /// Fill pattern for the uncertainty band.
    pub error_fill_style: i16,
    /// Fill style for the blinded-region marker.
    pub blinded_range_fill_color: i16,
    /// Fill pattern for the blinded-region marker.
    pub blinded_range_fill_style: i16,
    /// Yields-table formatting.
    pub yields: YieldsOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            luminosity: BTreeMap::new(),
            luminosity_error: 0.0,
            scale: 1.0,
            ignore_scales: false,
            no_lumi_rescaling: false,
            unblind: false,
            show_overflow: false,
            errors_type: ErrorsType::Poisson,
            error_fill_color: 42,
            error_fill_style: 3154,
            blinded_range_fill_color: 42,
            blinded_range_fill_style: 1001,
            yields: YieldsOptions::default(),
        }
    }
}

impl Configuration {
    /// Luminosity for the given era. A missing entry is a configuration
    /// error and aborts the run.
    pub fn luminosity_for(&self, era: &str) -> Result<f64> {
        self.luminosity.get(era).copied().ok_or_else(|| {
            if era.is_empty() {
                Error::Configuration("'configuration' block is missing luminosity".to_string())
            } else {
                Error::Configuration(format!("no luminosity defined for era '{}'", era))
            }
        })
    }
}

/// One plot request: immutable input to a single pipeline run.
#[derive(Debug, Clone)]
pub struct PlotRequest {
    /// Name of the histogram object to pull from every sample.
    pub name: String,
    /// Merge this many adjacent bins (1 = no rebinning).
    pub rebin: usize,
    /// Fold under/overflow into the edge bins.
    pub show_overflow: bool,
    /// Area-normalize data, signal and the stack.
    pub normalized: bool,
    pub log_x: bool,
    pub log_y: bool,
    /// Explicit X-axis range.
    pub x_axis_range: Option<Range>,
    /// Explicit Y-axis range; wins over any computed range.
    pub y_axis_range: Option<Range>,
    /// Y range of the ratio panel.
    pub ratio_y_axis_range: Range,
    /// Force the computed Y minimum to zero (linear scale only).
    pub y_axis_show_zero: bool,
    /// Data blinding window, `[start, end)`.
    pub blinded_range: Option<Range>,
    /// Data error model for this plot.
    pub errors_type: ErrorsType,
    /// Draw the combined uncertainty band.
    pub show_errors: bool,
    /// Compute the data/prediction ratio panel.
    pub show_ratio: bool,
    /// Ratio panel shows (data - pred) / data error instead of data/pred.
    pub data_excess_ratio: bool,
    /// Re-sort stack members by ascending integral.
    pub sort_by_yields: bool,
    /// Ignore any DATA samples for this plot.
    pub no_data: bool,
    /// Include this plot in the yields table.
    pub use_for_yields: bool,
    /// Category title in the yields table.
    pub yields_title: String,
    /// Category ordering key in the yields table.
    pub yields_table_order: i32,
}

impl PlotRequest {
    /// A request with the defaults of the declarative format: no
    /// rebinning, linear axes, Poisson errors, no ratio.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            yields_title: name.clone(),
            name,
            rebin: 1,
            show_overflow: false,
            normalized: false,
            log_x: false,
            log_y: false,
            x_axis_range: None,
            y_axis_range: None,
            ratio_y_axis_range: Range::new(0.5, 1.5),
            y_axis_show_zero: false,
            blinded_range: None,
            errors_type: ErrorsType::Poisson,
            show_errors: true,
            show_ratio: false,
            data_excess_ratio: false,
            sort_by_yields: false,
            no_data: false,
            use_for_yields: false,
            yields_table_order: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_type_parsing_falls_back_to_poisson() {
        assert_eq!(ErrorsType::from_config_str("normal"), ErrorsType::Normal);
        assert_eq!(ErrorsType::from_config_str("poisson2"), ErrorsType::Poisson2);
        assert_eq!(ErrorsType::from_config_str("poisson"), ErrorsType::Poisson);
        assert_eq!(ErrorsType::from_config_str("garbage"), ErrorsType::Poisson);
    }

    #[test]
    fn missing_luminosity_is_a_configuration_error() {
        let cfg = Configuration::default();
        let err = cfg.luminosity_for("").unwrap_err();
        assert!(err.is_fatal());
    }
}
