//! Series loading seam
//!
//! The pipeline never touches files itself: callers hand it a
//! [`SeriesProvider`] and the pipeline asks for nominal and varied
//! shapes by plot and sample. This keeps the aggregation logic
//! independent of the on-disk histogram format.

use sp_core::{BinnedSeries, Result};

use crate::sample::SampleSpec;

/// Source of binned series for a run.
pub trait SeriesProvider: Send + Sync {
    /// Load the nominal series of `spec` for the plot `plot_name`.
    ///
    /// A missing series is a [`sp_core::Error::DataUnavailable`]: it
    /// aborts the current plot but not the run.
    fn nominal(&self, spec: &SampleSpec, plot_name: &str) -> Result<BinnedSeries>;

    /// Load one side of a shape variation, or `Ok(None)` when the source
    /// does not carry that variation for this sample.
    fn variation(
        &self,
        spec: &SampleSpec,
        plot_name: &str,
        systematic: &str,
        up: bool,
    ) -> Result<Option<BinnedSeries>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapProvider {
        series: HashMap<String, BinnedSeries>,
    }

    impl SeriesProvider for MapProvider {
        fn nominal(&self, spec: &SampleSpec, plot_name: &str) -> Result<BinnedSeries> {
            self.series
                .get(&format!("{}/{}", spec.path, plot_name))
                .cloned()
                .ok_or_else(|| {
                    sp_core::Error::DataUnavailable(format!(
                        "no series '{}' in '{}'",
                        plot_name, spec.path
                    ))
                })
        }

        fn variation(
            &self,
            spec: &SampleSpec,
            plot_name: &str,
            systematic: &str,
            up: bool,
        ) -> Result<Option<BinnedSeries>> {
            let side = if up { "up" } else { "down" };
            let key = format!("{}/{}__{}{}", spec.path, plot_name, systematic, side);
            Ok(self.series.get(&key).cloned())
        }
    }

    #[test]
    fn missing_nominal_is_data_unavailable() {
        let provider = MapProvider { series: HashMap::new() };
        let spec = SampleSpec::new("a.json", crate::sample::SampleKind::Mc);
        let err = provider.nominal(&spec, "mll").unwrap_err();
        assert!(matches!(err, sp_core::Error::DataUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_variation_is_none() {
        let provider = MapProvider { series: HashMap::new() };
        let spec = SampleSpec::new("a.json", crate::sample::SampleKind::Mc);
        assert!(provider.variation(&spec, "mll", "jec", true).unwrap().is_none());
    }
}
