//! Declarative YAML configuration for a plotting run.
//!
//! One file describes the whole run: a `configuration` block with
//! run-wide settings, a `files` block listing every input sample, an
//! optional `groups` block overriding the style of legend groups, a
//! `plots` block with one entry per requested plot and an optional
//! `systematics` list. The loader translates all of it into the plain
//! pipeline descriptors.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use sp_pipeline::config::{Range, YieldsOptions};
use sp_pipeline::sample::PlotStyle;
use sp_pipeline::{Configuration, ErrorsType, PlotRequest, SampleKind, SampleSpec, SystematicSpec};

/// Everything the run needs, translated from one YAML file.
pub struct RunSetup {
    pub configuration: Configuration,
    pub samples: Vec<SampleSpec>,
    pub plots: Vec<PlotRequest>,
    pub systematics: Vec<SystematicSpec>,
}

pub fn load(path: &Path) -> Result<RunSetup> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("cannot read configuration '{}'", path.display()))?;
    let file: ConfigFile = serde_yaml_ng::from_slice(&bytes)
        .with_context(|| format!("cannot parse configuration '{}'", path.display()))?;
    file.into_setup()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigFile {
    configuration: ConfigurationBlock,
    files: BTreeMap<String, FileBlock>,
    #[serde(default)]
    groups: BTreeMap<String, GroupBlock>,
    plots: BTreeMap<String, PlotBlock>,
    #[serde(default)]
    systematics: Vec<serde_yaml_ng::Value>,
}

/// `luminosity` accepts either a single number or a per-era map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LuminosityValue {
    Flat(f64),
    PerEra(BTreeMap<String, f64>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigurationBlock {
    luminosity: LuminosityValue,
    #[serde(default)]
    luminosity_error: f64,
    #[serde(default = "one")]
    scale: f64,
    #[serde(default)]
    no_lumi_rescaling: bool,
    #[serde(default)]
    show_overflow: bool,
    #[serde(default)]
    errors_type: Option<String>,
    #[serde(default)]
    error_fill_color: Option<i16>,
    #[serde(default)]
    error_fill_style: Option<i16>,
    #[serde(default)]
    blinded_range_fill_color: Option<i16>,
    #[serde(default)]
    blinded_range_fill_style: Option<i16>,
    #[serde(default)]
    yields_table: Option<YieldsBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct YieldsBlock {
    #[serde(default = "default_stretch")]
    stretch: f64,
    #[serde(default = "default_align")]
    align: String,
    #[serde(default = "default_text_align")]
    text_align: String,
    #[serde(default = "default_prec_yields")]
    num_prec_yields: usize,
    #[serde(default = "default_prec_ratio")]
    num_prec_ratio: usize,
}

fn one() -> f64 {
    1.0
}
fn default_stretch() -> f64 {
    1.15
}
fn default_align() -> String {
    "h".to_string()
}
fn default_text_align() -> String {
    "c".to_string()
}
fn default_prec_yields() -> usize {
    1
}
fn default_prec_ratio() -> usize {
    2
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StyleBlock {
    #[serde(default)]
    fill_color: Option<String>,
    #[serde(default)]
    fill_type: Option<i16>,
    #[serde(default)]
    line_color: Option<String>,
    #[serde(default)]
    line_type: Option<i16>,
    #[serde(default)]
    line_width: Option<f32>,
    #[serde(default)]
    marker_color: Option<String>,
    #[serde(default)]
    marker_type: Option<i16>,
    #[serde(default)]
    marker_size: Option<f32>,
    #[serde(default)]
    drawing_options: Option<String>,
    #[serde(default)]
    legend: Option<String>,
    #[serde(default)]
    legend_style: Option<String>,
    #[serde(default)]
    legend_order: Option<i16>,
}

impl StyleBlock {
    fn apply_to(&self, style: &mut PlotStyle) {
        if self.fill_color.is_some() {
            style.fill_color = self.fill_color.clone();
        }
        if self.fill_type.is_some() {
            style.fill_type = self.fill_type;
        }
        if self.line_color.is_some() {
            style.line_color = self.line_color.clone();
        }
        if self.line_type.is_some() {
            style.line_type = self.line_type;
        }
        if self.line_width.is_some() {
            style.line_width = self.line_width;
        }
        if self.marker_color.is_some() {
            style.marker_color = self.marker_color.clone();
        }
        if self.marker_type.is_some() {
            style.marker_type = self.marker_type;
        }
        if self.marker_size.is_some() {
            style.marker_size = self.marker_size;
        }
        if let Some(v) = &self.drawing_options {
            style.drawing_options = v.clone();
        }
        if let Some(v) = &self.legend {
            style.legend = v.clone();
        }
        if let Some(v) = &self.legend_style {
            style.legend_style = v.clone();
        }
        if let Some(v) = self.legend_order {
            style.legend_order = v;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileBlock {
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    pretty_name: Option<String>,
    #[serde(default = "one")]
    cross_section: f64,
    #[serde(default = "one")]
    branching_ratio: f64,
    #[serde(default = "one")]
    generated_events: f64,
    #[serde(default = "one")]
    scale: f64,
    #[serde(default)]
    era: Option<String>,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    yields_group: Option<String>,
    #[serde(default)]
    order: Option<i16>,
    #[serde(flatten)]
    style: StyleBlock,
}

fn default_kind() -> String {
    "mc".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GroupBlock {
    #[serde(default)]
    order: Option<i16>,
    #[serde(flatten)]
    style: StyleBlock,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PlotBlock {
    #[serde(default = "one_usize")]
    rebin: usize,
    #[serde(default)]
    show_overflow: Option<bool>,
    #[serde(default)]
    normalized: bool,
    #[serde(default)]
    log_x: bool,
    #[serde(default)]
    log_y: bool,
    #[serde(default)]
    x_axis_range: Option<[f64; 2]>,
    #[serde(default)]
    y_axis_range: Option<[f64; 2]>,
    #[serde(default)]
    ratio_y_axis_range: Option<[f64; 2]>,
    #[serde(default)]
    y_axis_show_zero: bool,
    #[serde(default)]
    blinded_range: Option<[f64; 2]>,
    #[serde(default)]
    errors_type: Option<String>,
    #[serde(default = "yes")]
    show_errors: bool,
    #[serde(default)]
    show_ratio: bool,
    #[serde(default)]
    data_excess_ratio: bool,
    #[serde(default)]
    sort_by_yields: bool,
    #[serde(default)]
    no_data: bool,
    #[serde(default)]
    yields: bool,
    #[serde(default)]
    yields_title: Option<String>,
    #[serde(default)]
    yields_table_order: i32,
}

fn one_usize() -> usize {
    1
}
fn yes() -> bool {
    true
}

impl ConfigFile {
    fn into_setup(self) -> Result<RunSetup> {
        let mut configuration = Configuration::default();
        match self.configuration.luminosity {
            LuminosityValue::Flat(value) => {
                configuration.luminosity.insert(String::new(), value);
            }
            LuminosityValue::PerEra(map) => configuration.luminosity = map,
        }
        configuration.luminosity_error = self.configuration.luminosity_error;
        configuration.scale = self.configuration.scale;
        configuration.no_lumi_rescaling = self.configuration.no_lumi_rescaling;
        configuration.show_overflow = self.configuration.show_overflow;
        if let Some(s) = &self.configuration.errors_type {
            configuration.errors_type = ErrorsType::from_config_str(s);
        }
        if let Some(v) = self.configuration.error_fill_color {
            configuration.error_fill_color = v;
        }
        if let Some(v) = self.configuration.error_fill_style {
            configuration.error_fill_style = v;
        }
        if let Some(v) = self.configuration.blinded_range_fill_color {
            configuration.blinded_range_fill_color = v;
        }
        if let Some(v) = self.configuration.blinded_range_fill_style {
            configuration.blinded_range_fill_style = v;
        }
        if let Some(y) = self.configuration.yields_table {
            configuration.yields = YieldsOptions {
                stretch: y.stretch,
                align: y.align,
                text_align: y.text_align,
                num_prec_yields: y.num_prec_yields,
                num_prec_ratio: y.num_prec_ratio,
            };
        }

        let mut samples = Vec::with_capacity(self.files.len());
        for (path, file) in self.files {
            let kind = match file.kind.as_str() {
                "mc" => SampleKind::Mc,
                "signal" => SampleKind::Signal,
                "data" => SampleKind::Data,
                other => bail!("file '{}': unknown type '{}'", path, other),
            };
            let mut spec = SampleSpec::new(path, kind);
            if let Some(name) = file.pretty_name {
                spec.pretty_name = name;
            }
            spec.cross_section = file.cross_section;
            spec.branching_ratio = file.branching_ratio;
            spec.generated_events = file.generated_events;
            spec.scale = file.scale;
            if let Some(era) = file.era {
                spec.era = era;
            }
            spec.legend_group = file.group.clone();
            if let Some(group) = file.yields_group.or(file.group) {
                spec.yields_group = group;
            }
            if let Some(order) = file.order {
                spec.order = order;
            }
            file.style.apply_to(&mut spec.style);

            if let Some(group) = spec.legend_group.as_deref() {
                if let Some(block) = self.groups.get(group) {
                    block.style.apply_to(&mut spec.style);
                    if let Some(order) = block.order {
                        spec.order = order;
                    }
                }
            }

            samples.push(spec);
        }

        let mut plots = Vec::with_capacity(self.plots.len());
        for (name, block) in self.plots {
            let mut request = PlotRequest::new(name);
            request.rebin = block.rebin;
            request.show_overflow = block.show_overflow.unwrap_or(configuration.show_overflow);
            request.normalized = block.normalized;
            request.log_x = block.log_x;
            request.log_y = block.log_y;
            request.x_axis_range = block.x_axis_range.map(|[a, b]| Range::new(a, b));
            request.y_axis_range = block.y_axis_range.map(|[a, b]| Range::new(a, b));
            if let Some([a, b]) = block.ratio_y_axis_range {
                request.ratio_y_axis_range = Range::new(a, b);
            }
            request.y_axis_show_zero = block.y_axis_show_zero;
            request.blinded_range = block.blinded_range.map(|[a, b]| Range::new(a, b));
            request.errors_type = block
                .errors_type
                .as_deref()
                .map(ErrorsType::from_config_str)
                .unwrap_or(configuration.errors_type);
            request.show_errors = block.show_errors;
            request.show_ratio = block.show_ratio;
            request.data_excess_ratio = block.data_excess_ratio;
            request.sort_by_yields = block.sort_by_yields;
            request.no_data = block.no_data;
            request.use_for_yields = block.yields;
            if let Some(title) = block.yields_title {
                request.yields_title = title;
            }
            request.yields_table_order = block.yields_table_order;
            plots.push(request);
        }

        let systematics = parse_systematics(&self.systematics)?;

        Ok(RunSetup { configuration, samples, plots, systematics })
    }
}

/// A systematics entry is either a bare string (a shape source) or a
/// one-key map; a numeric value declares a constant source, a nested map
/// spells out type, pretty name and sample filter.
fn parse_systematics(entries: &[serde_yaml_ng::Value]) -> Result<Vec<SystematicSpec>> {
    use serde_yaml_ng::Value;

    let mut specs = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(name) => specs.push(SystematicSpec::Shape {
                name: name.clone(),
                pretty_name: name.clone(),
                on: None,
            }),
            Value::Mapping(map) if map.len() == 1 => {
                let Some((key, value)) = map.iter().next() else {
                    bail!("empty systematics entry");
                };
                let Value::String(name) = key else {
                    bail!("systematics entry keys must be strings");
                };
                match value {
                    Value::Number(n) => {
                        let value = n
                            .as_f64()
                            .with_context(|| format!("systematic '{}': bad value", name))?;
                        specs.push(SystematicSpec::Const {
                            name: name.clone(),
                            pretty_name: name.clone(),
                            value,
                            on: None,
                        });
                    }
                    Value::Mapping(_) => {
                        #[derive(Deserialize)]
                        #[serde(rename_all = "kebab-case")]
                        struct Detailed {
                            #[serde(rename = "type", default)]
                            kind: Option<String>,
                            #[serde(default)]
                            pretty_name: Option<String>,
                            #[serde(default)]
                            value: Option<f64>,
                            #[serde(default)]
                            on: Option<String>,
                        }
                        let detailed: Detailed = serde_yaml_ng::from_value(value.clone())
                            .with_context(|| format!("systematic '{}'", name))?;
                        let pretty_name =
                            detailed.pretty_name.unwrap_or_else(|| name.clone());
                        match detailed.kind.as_deref() {
                            Some("const") => {
                                let value = detailed.value.with_context(|| {
                                    format!("constant systematic '{}' needs a value", name)
                                })?;
                                specs.push(SystematicSpec::Const {
                                    name: name.clone(),
                                    pretty_name,
                                    value,
                                    on: detailed.on,
                                });
                            }
                            Some("shape") | None => specs.push(SystematicSpec::Shape {
                                name: name.clone(),
                                pretty_name,
                                on: detailed.on,
                            }),
                            Some(other) => {
                                bail!("systematic '{}': unknown type '{}'", name, other)
                            }
                        }
                    }
                    _ => bail!("systematic '{}': unsupported value", name),
                }
            }
            _ => bail!("systematics entries must be strings or one-key mappings"),
        }
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_from(yaml: &str) -> RunSetup {
        let file: ConfigFile = serde_yaml_ng::from_str(yaml).unwrap();
        file.into_setup().unwrap()
    }

    #[test]
    fn minimal_configuration_round_trips() {
        let setup = setup_from(
            r#"
configuration:
  luminosity: 100000
  luminosity-error: 0.025

files:
  "ttbar.json":
    cross-section: 245.8
    generated-events: 21675970
    group: "top"
  "data.json":
    type: data

plots:
  "mll":
    show-ratio: true
    blinded-range: [100, 200]
"#,
        );

        assert_eq!(setup.configuration.luminosity_for("").unwrap(), 100000.0);
        assert_eq!(setup.configuration.luminosity_error, 0.025);
        assert_eq!(setup.samples.len(), 2);
        let ttbar = setup.samples.iter().find(|s| s.path == "ttbar.json").unwrap();
        assert_eq!(ttbar.kind, SampleKind::Mc);
        assert_eq!(ttbar.legend_group.as_deref(), Some("top"));
        assert_eq!(ttbar.yields_group, "top");
        assert_eq!(setup.plots.len(), 1);
        assert!(setup.plots[0].show_ratio);
        assert_eq!(setup.plots[0].blinded_range.unwrap().start, 100.0);
    }

    #[test]
    fn per_era_luminosity_is_accepted() {
        let setup = setup_from(
            r#"
configuration:
  luminosity:
    "2016": 36300
    "2017": 41500
files: {}
plots: {}
"#,
        );
        assert_eq!(setup.configuration.luminosity_for("2017").unwrap(), 41500.0);
        assert!(setup.configuration.luminosity_for("2018").is_err());
    }

    #[test]
    fn systematics_spellings_are_parsed() {
        let setup = setup_from(
            r#"
configuration:
  luminosity: 1
files: {}
plots: {}
systematics:
  - jec
  - lumi: 1.025
  - jer: { type: shape, pretty-name: "JER", on: "ttbar" }
"#,
        );
        assert_eq!(setup.systematics.len(), 3);
        assert!(matches!(&setup.systematics[0], SystematicSpec::Shape { name, .. } if name == "jec"));
        assert!(
            matches!(&setup.systematics[1], SystematicSpec::Const { value, .. } if *value == 1.025)
        );
        assert!(setup.systematics[2].applies_to("ttbar.json"));
        assert!(!setup.systematics[2].applies_to("data.json"));
    }

    #[test]
    fn group_style_overrides_member_style() {
        let setup = setup_from(
            r##"
configuration:
  luminosity: 1
files:
  "a.json":
    group: "top"
    fill-color: "#111111"
groups:
  "top":
    fill-color: "#d95f02"
    legend: "Top quark"
plots: {}
"##,
        );
        let a = &setup.samples[0];
        assert_eq!(a.style.fill_color.as_deref(), Some("#d95f02"));
        assert_eq!(a.style.legend, "Top quark");
    }

    #[test]
    fn unknown_sample_type_is_rejected() {
        let file: ConfigFile = serde_yaml_ng::from_str(
            r#"
configuration:
  luminosity: 1
files:
  "a.json":
    type: background
plots: {}
"#,
        )
        .unwrap();
        assert!(file.into_setup().is_err());
    }
}
