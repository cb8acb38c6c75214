//! # sp-pipeline
//!
//! The histogram aggregation and uncertainty-propagation pipeline behind
//! stackplot: per-sample rescaling, legend grouping, MC stacking, combined
//! systematic envelopes, data/prediction ratio, blinding, axis ranges and
//! yields tables.
//!
//! The pipeline is numbers-first: its output per plot is a serializable
//! [`artifact::PlotArtifact`] handed to an external renderer. No graphics
//! library is involved here.

/// Plot-ready output artifacts (serde, JSON-friendly arrays).
pub mod artifact;

/// Global configuration and per-plot request descriptors.
pub mod config;

/// Observed-data error models (normal and Garwood/Poisson) and blinding.
pub mod data;

/// Out-of-range bin folding into edge bins.
pub mod overflow;

/// Per-plot pipeline driver.
pub mod plot;

/// The histogram provider seam (external collaborator).
pub mod provider;

/// Axis-range resolution.
pub mod range;

/// Data/prediction ratio graph.
pub mod ratio;

/// Sample, systematic-variation and style descriptors.
pub mod sample;

/// Physical normalization of samples.
pub mod scale;

/// Legend grouping and MC stacking.
pub mod stack;

/// Per-process yield summaries.
pub mod summary;

/// Combined per-bin systematic envelopes.
pub mod systematics;

/// LaTeX yields tables.
pub mod yields;

pub use artifact::PlotArtifact;
pub use config::{Configuration, ErrorsType, PlotRequest, Range, YieldsOptions};
pub use plot::{run_plot, PlotOutcome};
pub use provider::SeriesProvider;
pub use sample::{Sample, SampleKind, SampleSpec, SystematicVariation};
pub use stack::Stack;
pub use summary::{Summary, SummaryItem};
pub use systematics::SystematicSpec;
pub use yields::YieldsReport;
