//! Per-plot pipeline driver.
//!
//! One call to [`run_plot`] takes the configuration, a plot request and
//! the sample roster, loads everything through the provider, and runs
//! the full chain: rescale, rebin, overflow folding, data merging,
//! blinding, stacking, systematic combination, data errors, ratio and
//! axis ranges. The result is a renderer-ready [`PlotArtifact`] plus the
//! per-process [`Summary`].

use sp_core::{BinnedSeries, Error, Result};

use crate::artifact::{
    BandEnvelope, DataSeriesArtifact, OverlaySeriesArtifact, PlotArtifact, PlotMeta,
    StackedSeriesArtifact, PLOT_ARTIFACT_SCHEMA_VERSION,
};
use crate::config::{Configuration, ErrorsType, PlotRequest, Range};
use crate::data::{blind, data_errors};
use crate::overflow::fold_overflow;
use crate::provider::SeriesProvider;
use crate::range::resolve_y_range;
use crate::ratio::{ratio, ratio_systematics_band, RatioMode};
use crate::sample::{PlotStyle, Sample, SampleKind, SampleSpec, SystematicVariation};
use crate::scale::rescale_sample;
use crate::stack::build_stack;
use crate::summary::{Summary, SummaryItem};
use crate::systematics::{compute_systematics, SystematicSpec};

/// Everything a single plot run produces.
#[derive(Debug)]
pub struct PlotOutcome {
    pub artifact: PlotArtifact,
    pub summary: Summary,
}

/// The merged observed-data series of a plot, or `None` when the plot
/// carries no data (none configured, `no-data` set, or all empty).
fn merge_data(samples: &[Sample]) -> Result<Option<BinnedSeries>> {
    let mut merged: Option<BinnedSeries> = None;
    for sample in samples {
        if sample.kind() != SampleKind::Data || sample.nominal.is_empty() {
            continue;
        }
        match merged.as_mut() {
            Some(acc) => acc.add(&sample.nominal)?,
            None => merged = Some(sample.nominal.clone()),
        }
    }
    Ok(merged)
}

fn load_samples(
    config: &Configuration,
    request: &PlotRequest,
    specs: &[SampleSpec],
    systematics: &[SystematicSpec],
    provider: &dyn SeriesProvider,
) -> Result<Vec<Sample>> {
    let mut samples = Vec::with_capacity(specs.len());

    for spec in specs {
        if request.no_data && spec.kind == SampleKind::Data {
            continue;
        }

        let nominal = provider.nominal(spec, &request.name)?;
        let mut sample = Sample::new(spec.clone(), nominal);

        if sample.kind() != SampleKind::Data {
            for syst in systematics {
                if !syst.applies_to(&sample.spec.path) {
                    continue;
                }
                if let SystematicSpec::Shape { name, pretty_name, .. } = syst {
                    let up = provider.variation(spec, &request.name, name, true)?;
                    let down = provider.variation(spec, &request.name, name, false)?;
                    // A missing side is kept as None and later skipped by
                    // the combiner, with a log line.
                    sample.systematics.push(SystematicVariation {
                        name: name.clone(),
                        pretty_name: pretty_name.clone(),
                        nominal_shape: Some(sample.nominal.clone()),
                        up_shape: up,
                        down_shape: down,
                    });
                }
            }
        }

        // Physical normalization; systematic shapes scale along.
        rescale_sample(config, &mut sample)?;

        // Constant sources act on the rescaled nominal.
        if sample.kind() != SampleKind::Data {
            for syst in systematics {
                if !syst.applies_to(&sample.spec.path) {
                    continue;
                }
                if let SystematicSpec::Const { name, pretty_name, value, .. } = syst {
                    sample.systematics.push(SystematicVariation::constant(
                        name,
                        pretty_name,
                        *value,
                        &sample.nominal,
                    ));
                }
            }
            if config.luminosity_error > 0.0 && !config.no_lumi_rescaling {
                sample.systematics.push(SystematicVariation::constant(
                    "lumi",
                    "Luminosity",
                    1.0 + config.luminosity_error,
                    &sample.nominal,
                ));
            }
        }

        samples.push(sample);
    }

    // Configuration order, then explicit stacking order.
    samples.sort_by_key(|s| s.spec.order);

    Ok(samples)
}

/// Run the whole pipeline for one plot.
pub fn run_plot(
    config: &Configuration,
    request: &PlotRequest,
    specs: &[SampleSpec],
    systematics: &[SystematicSpec],
    provider: &dyn SeriesProvider,
) -> Result<PlotOutcome> {
    if request.rebin == 0 {
        return Err(Error::Configuration(format!(
            "plot '{}': rebin factor must be at least 1",
            request.name
        )));
    }

    let mut samples = load_samples(config, request, specs, systematics, provider)?;
    if samples.is_empty() {
        return Err(Error::DataUnavailable(format!(
            "plot '{}': no sample contributes",
            request.name
        )));
    }

    for sample in &mut samples {
        if request.rebin > 1 {
            sample.nominal.rebin(request.rebin)?;
            for syst in &mut sample.systematics {
                for shape in [&mut syst.nominal_shape, &mut syst.up_shape, &mut syst.down_shape] {
                    if let Some(s) = shape.as_mut() {
                        s.rebin(request.rebin)?;
                    }
                }
            }
        }
        if request.show_overflow {
            let kind = sample.kind();
            fold_overflow(&mut sample.nominal, kind, request.x_axis_range);
            for syst in &mut sample.systematics {
                for shape in [&mut syst.nominal_shape, &mut syst.up_shape, &mut syst.down_shape] {
                    if let Some(s) = shape.as_mut() {
                        fold_overflow(s, kind, request.x_axis_range);
                    }
                }
            }
        }
    }

    let mut data = merge_data(&samples)?;
    let mut blinded_x_range = None;
    let mut blinded_bins = None;
    if !config.unblind {
        if let (Some(series), Some(window)) = (data.as_mut(), request.blinded_range) {
            if let Some((first, last)) = blind(series, window) {
                blinded_x_range = Some(Range::new(
                    series.bin_edges[first],
                    series.bin_edges[last + 1],
                ));
                blinded_bins = Some((first, last));
            }
        }
    }

    // Data is summarized after blinding, so blinded bins count as zero
    // events in the yield report.
    let mut summary = Summary::default();
    for sample in &samples {
        if sample.kind() == SampleKind::Data {
            continue;
        }
        let (events, events_uncertainty) = sample.nominal.integral_and_error();
        summary.add(
            sample.kind(),
            SummaryItem {
                process_id: sample.spec.path.clone(),
                name: sample.spec.pretty_name.clone(),
                events,
                events_uncertainty,
            },
        );
    }
    if let Some(series) = data.as_ref() {
        if let Some(first) = samples.iter().find(|s| s.kind() == SampleKind::Data) {
            let (events, events_uncertainty) = series.integral_and_error();
            summary.add(
                SampleKind::Data,
                SummaryItem {
                    process_id: first.spec.path.clone(),
                    name: first.spec.pretty_name.clone(),
                    events,
                    events_uncertainty,
                },
            );
        }
    }

    let mut stack = build_stack(&samples, request.sort_by_yields)?;
    if let Some(stack) = stack.as_mut() {
        if let Some(data) = data.as_ref() {
            if !stack.stat_only.same_binning(data) {
                return Err(Error::Computation(format!(
                    "plot '{}': data and prediction binnings differ",
                    request.name
                )));
            }
        }
        // Normalized plots carry no systematic band.
        if request.show_errors && !request.normalized {
            compute_systematics(stack, &samples, &mut summary)?;
        }
    }

    if stack.is_none() && data.is_none() {
        return Err(Error::DataUnavailable(format!(
            "plot '{}': nothing to draw, every series is empty",
            request.name
        )));
    }

    // Data errors come from raw counts; normalization rescales them after.
    let mut data_series = data.clone();
    let (mut data_err_lo, mut data_err_hi, data_error_model) = match data.as_ref() {
        Some(series) => data_errors(series, request.errors_type),
        None => (Vec::new(), Vec::new(), String::new()),
    };
    // Blinded bins report zero events with zero error, not a Poisson
    // interval around zero.
    if let Some((first, last)) = blinded_bins {
        for i in first..=last {
            data_err_lo[i] = 0.0;
            data_err_hi[i] = 0.0;
        }
    }

    let mut signals: Vec<(String, BinnedSeries, PlotStyle)> = samples
        .iter()
        .filter(|s| s.kind() == SampleKind::Signal && !s.nominal.is_empty())
        .map(|s| (s.spec.pretty_name.clone(), s.nominal.clone(), s.spec.style.clone()))
        .collect();

    if request.normalized {
        if let Some(stack) = stack.as_mut() {
            let total = stack.stat_only.integral();
            if total != 0.0 {
                let f = 1.0 / total;
                for entry in &mut stack.entries {
                    entry.series.scale(f);
                }
                stack.stat_only.scale(f);
                if let Some(s) = stack.syst_only.as_mut() {
                    s.scale(f);
                }
                if let Some(s) = stack.stat_and_syst.as_mut() {
                    s.scale(f);
                }
            }
        }
        if let Some(series) = data_series.as_mut() {
            let total = series.integral();
            if total != 0.0 {
                let f = 1.0 / total;
                series.scale(f);
                data_err_lo.iter_mut().for_each(|e| *e *= f);
                data_err_hi.iter_mut().for_each(|e| *e *= f);
            }
        }
        for (_, series, _) in &mut signals {
            let total = series.integral();
            if total != 0.0 {
                series.scale(1.0 / total);
            }
        }
    }

    let bin_edges = match (stack.as_ref(), data_series.as_ref()) {
        (Some(stack), _) => stack.stat_only.bin_edges.clone(),
        (None, Some(series)) => series.bin_edges.clone(),
        (None, None) => unreachable!("checked above"),
    };

    let ratio_points = match (request.show_ratio, data_series.as_ref(), stack.as_ref()) {
        (true, Some(series), Some(stack)) => {
            let mode =
                if request.data_excess_ratio { RatioMode::DataExcess } else { RatioMode::Simple };
            ratio(series, &data_err_lo, &data_err_hi, &stack.stat_only, mode)
        }
        _ => Vec::new(),
    };
    let ratio_band = match stack.as_ref().and_then(|s| s.syst_only.as_ref()) {
        Some(syst_only) if !ratio_points.is_empty() => ratio_systematics_band(syst_only),
        _ => Vec::new(),
    };

    let band_reference = stack.as_ref().map(|s| {
        s.stat_and_syst.as_ref().unwrap_or(&s.stat_only)
    });
    let overlay_series: Vec<&BinnedSeries> = signals.iter().map(|(_, s, _)| s).collect();
    let y_axis_range = resolve_y_range(
        request.y_axis_range,
        band_reference,
        data_series.as_ref().map(|s| (s, data_err_hi.as_slice())),
        &overlay_series,
        request.log_y,
        request.y_axis_show_zero,
    );

    let envelope = |series: &BinnedSeries| BandEnvelope {
        lo: (0..series.n_bins()).map(|i| series.content[i] - series.bin_error(i)).collect(),
        hi: (0..series.n_bins()).map(|i| series.content[i] + series.bin_error(i)).collect(),
    };

    // Stack layers are emitted cumulatively, bottom first.
    let mut stacked = Vec::new();
    if let Some(stack) = stack.as_ref() {
        let mut cumulative = BinnedSeries::new_like(&stack.stat_only);
        for entry in &stack.entries {
            cumulative.add(&entry.series)?;
            stacked.push(StackedSeriesArtifact {
                label: entry.label.clone(),
                y: cumulative.content.clone(),
                style: entry.style.clone(),
            });
        }
    }

    let artifact = PlotArtifact {
        schema_version: PLOT_ARTIFACT_SCHEMA_VERSION.to_string(),
        meta: PlotMeta::new()?,
        name: request.name.clone(),
        bin_edges,
        log_x: request.log_x,
        log_y: request.log_y,
        x_axis_range: request.x_axis_range,
        y_axis_range,
        ratio_y_axis_range: request.ratio_y_axis_range,
        stack: stacked,
        total_y: stack.as_ref().map(|s| s.stat_only.content.clone()),
        total_band_stat: stack.as_ref().map(|s| envelope(&s.stat_only)),
        total_band_syst: stack.as_ref().and_then(|s| s.syst_only.as_ref()).map(&envelope),
        total_band_stat_syst: stack.as_ref().and_then(|s| s.stat_and_syst.as_ref()).map(&envelope),
        signals: signals
            .into_iter()
            .map(|(label, series, style)| OverlaySeriesArtifact {
                label,
                y: series.content,
                style,
            })
            .collect(),
        data: data_series.map(|series| DataSeriesArtifact {
            label: "Data".to_string(),
            y: series.content,
            yerr_lo: data_err_lo,
            yerr_hi: data_err_hi,
            error_model: data_error_model,
            drop_zero_bins: request.errors_type == ErrorsType::Poisson2,
            style: PlotStyle::defaults_for(SampleKind::Data),
        }),
        ratio: ratio_points,
        ratio_band,
        error_fill_color: config.error_fill_color,
        error_fill_style: config.error_fill_style,
        blinded_x_range,
        blinded_range_fill_color: config.blinded_range_fill_color,
        blinded_range_fill_style: config.blinded_range_fill_style,
    };

    tracing::info!(
        plot = %request.name,
        samples = samples.len(),
        stacked = artifact.stack.len(),
        has_data = artifact.data.is_some(),
        "plot pipeline complete"
    );

    Ok(PlotOutcome { artifact, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    struct MapProvider {
        series: HashMap<String, BinnedSeries>,
    }

    impl MapProvider {
        fn new() -> Self {
            Self { series: HashMap::new() }
        }

        fn insert(&mut self, path: &str, plot: &str, content: Vec<f64>) {
            let n = content.len();
            let edges: Vec<f64> = (0..=n).map(|i| i as f64).collect();
            let variance = content.clone();
            self.series.insert(
                format!("{}/{}", path, plot),
                BinnedSeries::from_parts(edges, content, variance).unwrap(),
            );
        }
    }

    impl SeriesProvider for MapProvider {
        fn nominal(&self, spec: &SampleSpec, plot_name: &str) -> Result<BinnedSeries> {
            self.series.get(&format!("{}/{}", spec.path, plot_name)).cloned().ok_or_else(|| {
                Error::DataUnavailable(format!("no '{}' in '{}'", plot_name, spec.path))
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
            Ok(self
                .series
                .get(&format!("{}/{}__{}{}", spec.path, plot_name, systematic, side))
                .cloned())
        }
    }

    fn unit_config() -> Configuration {
        let mut config = Configuration::default();
        config.luminosity.insert(String::new(), 1.0);
        config
    }

    fn mc_spec(path: &str) -> SampleSpec {
        SampleSpec::new(path, SampleKind::Mc)
    }

    #[test]
    fn stack_matches_sample_sum() {
        let mut provider = MapProvider::new();
        provider.insert("a.json", "mll", vec![1.0, 2.0, 3.0]);
        provider.insert("b.json", "mll", vec![4.0, 5.0, 6.0]);
        let specs = vec![mc_spec("a.json"), mc_spec("b.json")];

        let outcome = run_plot(
            &unit_config(),
            &PlotRequest::new("mll"),
            &specs,
            &[],
            &provider,
        )
        .unwrap();

        let total = outcome.artifact.total_y.unwrap();
        assert_eq!(total, vec![5.0, 7.0, 9.0]);
        // Topmost cumulative layer equals the total.
        assert_eq!(outcome.artifact.stack.last().unwrap().y, total);
    }

    #[test]
    fn missing_series_aborts_only_this_plot() {
        let provider = MapProvider::new();
        let specs = vec![mc_spec("a.json")];
        let err = run_plot(
            &unit_config(),
            &PlotRequest::new("missing"),
            &specs,
            &[],
            &provider,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn data_over_prediction_ratio_of_identical_series_is_one() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![4.0, 9.0, 16.0]);
        provider.insert("data.json", "mll", vec![4.0, 9.0, 16.0]);
        let specs = vec![mc_spec("mc.json"), SampleSpec::new("data.json", SampleKind::Data)];

        let mut request = PlotRequest::new("mll");
        request.show_ratio = true;
        let outcome = run_plot(&unit_config(), &request, &specs, &[], &provider).unwrap();

        assert_eq!(outcome.artifact.ratio.len(), 3);
        for p in &outcome.artifact.ratio {
            assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn tall_signal_overlay_widens_the_y_range() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![10.0, 11.0]);
        provider.insert("sig.json", "mll", vec![500.0, 2.0]);
        let specs = vec![mc_spec("mc.json"), SampleSpec::new("sig.json", SampleKind::Signal)];

        let outcome = run_plot(
            &unit_config(),
            &PlotRequest::new("mll"),
            &specs,
            &[],
            &provider,
        )
        .unwrap();

        assert_abs_diff_eq!(outcome.artifact.y_axis_range.end, 500.0 * 1.2);
    }

    #[test]
    fn blinded_bins_are_zeroed_and_window_reported() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![5.0, 5.0, 5.0, 5.0]);
        provider.insert("data.json", "mll", vec![5.0, 5.0, 5.0, 5.0]);
        let specs = vec![mc_spec("mc.json"), SampleSpec::new("data.json", SampleKind::Data)];

        let mut request = PlotRequest::new("mll");
        request.blinded_range = Some(Range::new(1.0, 3.0));
        let outcome = run_plot(&unit_config(), &request, &specs, &[], &provider).unwrap();

        let data = outcome.artifact.data.unwrap();
        assert_eq!(data.y, vec![5.0, 0.0, 0.0, 5.0]);
        let window = outcome.artifact.blinded_x_range.unwrap();
        assert_abs_diff_eq!(window.start, 1.0);
        assert_abs_diff_eq!(window.end, 3.0);
    }

    #[test]
    fn unblind_overrides_blinded_range() {
        let mut provider = MapProvider::new();
        provider.insert("data.json", "mll", vec![5.0, 5.0]);
        let specs = vec![SampleSpec::new("data.json", SampleKind::Data)];

        let mut config = unit_config();
        config.unblind = true;
        let mut request = PlotRequest::new("mll");
        request.blinded_range = Some(Range::new(0.0, 2.0));
        let outcome = run_plot(&config, &request, &specs, &[], &provider).unwrap();

        assert_eq!(outcome.artifact.data.unwrap().y, vec![5.0, 5.0]);
        assert!(outcome.artifact.blinded_x_range.is_none());
    }

    #[test]
    fn no_data_flag_drops_data_samples() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![1.0]);
        provider.insert("data.json", "mll", vec![9.0]);
        let specs = vec![mc_spec("mc.json"), SampleSpec::new("data.json", SampleKind::Data)];

        let mut request = PlotRequest::new("mll");
        request.no_data = true;
        let outcome = run_plot(&unit_config(), &request, &specs, &[], &provider).unwrap();
        assert!(outcome.artifact.data.is_none());
    }

    #[test]
    fn normalized_mode_scales_stack_and_data_to_unit_area() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![2.0, 6.0]);
        provider.insert("data.json", "mll", vec![3.0, 9.0]);
        let specs = vec![mc_spec("mc.json"), SampleSpec::new("data.json", SampleKind::Data)];

        let mut request = PlotRequest::new("mll");
        request.normalized = true;
        request.errors_type = ErrorsType::Normal;
        let outcome = run_plot(&unit_config(), &request, &specs, &[], &provider).unwrap();

        let total: f64 = outcome.artifact.total_y.unwrap().iter().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        let data = outcome.artifact.data.unwrap();
        assert_abs_diff_eq!(data.y.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn shape_systematic_widens_the_band() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![10.0]);
        provider.insert("mc.json", "mll__jecup", vec![12.0]);
        provider.insert("mc.json", "mll__jecdown", vec![9.0]);
        let specs = vec![mc_spec("mc.json")];
        let systs = vec![SystematicSpec::Shape {
            name: "jec".to_string(),
            pretty_name: "JEC".to_string(),
            on: None,
        }];

        let outcome =
            run_plot(&unit_config(), &PlotRequest::new("mll"), &specs, &systs, &provider).unwrap();

        let syst = outcome.artifact.total_band_syst.unwrap();
        // Symmetrized deviation is max(|12-10|, |10-9|) = 2.
        assert_abs_diff_eq!(syst.hi[0], 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(syst.lo[0], 8.0, epsilon = 1e-12);
    }

    #[test]
    fn poisson2_requests_zero_bin_dropping() {
        let mut provider = MapProvider::new();
        provider.insert("data.json", "mll", vec![3.0, 0.0, 5.0]);
        let specs = vec![SampleSpec::new("data.json", SampleKind::Data)];

        let mut request = PlotRequest::new("mll");
        request.errors_type = ErrorsType::Poisson2;
        let outcome = run_plot(&unit_config(), &request, &specs, &[], &provider).unwrap();
        assert!(outcome.artifact.data.unwrap().drop_zero_bins);
    }

    #[test]
    fn rebin_factor_must_divide_bin_count() {
        let mut provider = MapProvider::new();
        provider.insert("mc.json", "mll", vec![1.0, 2.0, 3.0]);
        let specs = vec![mc_spec("mc.json")];

        let mut request = PlotRequest::new("mll");
        request.rebin = 2;
        let err = run_plot(&unit_config(), &request, &specs, &[], &provider).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }
}
