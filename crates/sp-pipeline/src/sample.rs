//! Sample descriptors: one physical input (MC, signal or data) with its
//! nominal series, attached systematic variations and drawing style.

use serde::{Deserialize, Serialize};

use sp_core::BinnedSeries;

/// Closed set of process kinds. Scaling, styling and stacking all
/// dispatch on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Mc,
    Signal,
    Data,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Mc => "MC",
            SampleKind::Signal => "Signal",
            SampleKind::Data => "Data",
        }
    }
}

/// Drawing style forwarded untouched to the renderer.
///
/// Unset fields mean "renderer default". Colors are kept as strings so a
/// renderer can accept palette indices or hex codes alike.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_type: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_type: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_type: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_size: Option<f32>,
    /// Renderer drawing options string.
    #[serde(default)]
    pub drawing_options: String,
    /// Legend entry text; empty means no legend line.
    #[serde(default)]
    pub legend: String,
    #[serde(default)]
    pub legend_style: String,
    #[serde(default)]
    pub legend_order: i16,
}

impl PlotStyle {
    /// Per-kind defaults used when the configuration omits styling.
    pub fn defaults_for(kind: SampleKind) -> Self {
        let mut style = PlotStyle::default();
        match kind {
            SampleKind::Mc => {
                style.drawing_options = "hist".to_string();
                style.legend_style = "lf".to_string();
            }
            SampleKind::Signal => {
                style.drawing_options = "hist".to_string();
                style.legend_style = "l".to_string();
            }
            SampleKind::Data => {
                style.drawing_options = "P".to_string();
                style.legend_style = "pe".to_string();
                style.marker_size = Some(1.0);
                style.marker_type = Some(20);
            }
        }
        style
    }
}

/// One named source of shape uncertainty attached to a sample. All three
/// shapes share the sample's binning. A shape missing for this sample is
/// represented as `None` and skipped by the combiner.
#[derive(Debug, Clone)]
pub struct SystematicVariation {
    pub name: String,
    pub pretty_name: String,
    pub nominal_shape: Option<BinnedSeries>,
    pub up_shape: Option<BinnedSeries>,
    pub down_shape: Option<BinnedSeries>,
}

impl SystematicVariation {
    /// A shape systematic from explicitly provided variations.
    pub fn shape(
        name: impl Into<String>,
        pretty_name: impl Into<String>,
        nominal: BinnedSeries,
        up: BinnedSeries,
        down: BinnedSeries,
    ) -> Self {
        Self {
            name: name.into(),
            pretty_name: pretty_name.into(),
            nominal_shape: Some(nominal),
            up_shape: Some(up),
            down_shape: Some(down),
        }
    }

    /// A flat systematic: up/down shapes are the nominal scaled by
    /// `value` and `2 - value` (e.g. `value = 1.025` for a 2.5% source).
    pub fn constant(
        name: impl Into<String>,
        pretty_name: impl Into<String>,
        value: f64,
        nominal: &BinnedSeries,
    ) -> Self {
        let mut up = nominal.clone();
        up.scale(value);
        let mut down = nominal.clone();
        down.scale(2.0 - value);
        Self {
            name: name.into(),
            pretty_name: pretty_name.into(),
            nominal_shape: Some(nominal.clone()),
            up_shape: Some(up),
            down_shape: Some(down),
        }
    }

    /// Whether all three shapes are present.
    pub fn is_complete(&self) -> bool {
        self.nominal_shape.is_some() && self.up_shape.is_some() && self.down_shape.is_some()
    }
}

/// Static description of one input sample, before any histogram is
/// attached. Filled by the configuration loader.
#[derive(Debug, Clone)]
pub struct SampleSpec {
    /// Path of the sample file, used as process identifier.
    pub path: String,
    /// Human-readable name for summaries and legends.
    pub pretty_name: String,
    pub kind: SampleKind,
    pub cross_section: f64,
    pub branching_ratio: f64,
    pub generated_events: f64,
    /// Per-sample user scale factor.
    pub scale: f64,
    /// Luminosity era; empty uses the default luminosity entry.
    pub era: String,
    /// Merge with other samples sharing this legend group.
    pub legend_group: Option<String>,
    /// Process bucket in the yields table.
    pub yields_group: String,
    /// Stacking order (ascending).
    pub order: i16,
    pub style: PlotStyle,
}

impl SampleSpec {
    pub fn new(path: impl Into<String>, kind: SampleKind) -> Self {
        let path = path.into();
        Self {
            pretty_name: path.clone(),
            yields_group: path.clone(),
            path,
            kind,
            cross_section: 1.0,
            branching_ratio: 1.0,
            generated_events: 1.0,
            scale: 1.0,
            era: String::new(),
            legend_group: None,
            order: i16::MIN,
            style: PlotStyle::defaults_for(kind),
        }
    }
}

/// One sample during a single plot's pipeline run. Owns its nominal
/// series exclusively for the duration of the run; the whole value is
/// dropped when the plot completes.
#[derive(Debug, Clone)]
pub struct Sample {
    pub spec: SampleSpec,
    pub nominal: BinnedSeries,
    pub systematics: Vec<SystematicVariation>,
}

impl Sample {
    pub fn new(spec: SampleSpec, nominal: BinnedSeries) -> Self {
        Self { spec, nominal, systematics: Vec::new() }
    }

    pub fn kind(&self) -> SampleKind {
        self.spec.kind
    }
}
