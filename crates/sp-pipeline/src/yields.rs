//! LaTeX yields tables.
//!
//! Plots flagged `yields: true` contribute one category (row) each; the
//! columns are the per-process yield groups, the total expectation, the
//! observed data and the Data/MC ratio. Only the horizontal orientation
//! (processes as columns) is supported.

use std::collections::BTreeMap;

use sp_core::{Error, Result};

use crate::config::{PlotRequest, YieldsOptions};
use crate::sample::{SampleKind, SampleSpec};
use crate::summary::Summary;

/// Yield of one process group in one category.
#[derive(Debug, Clone, Copy, Default)]
struct YieldsEntry {
    events: f64,
    stat: f64,
    syst: f64,
}

/// Accumulator for the yields table across the whole run.
#[derive(Debug, Default)]
pub struct YieldsReport {
    /// Category key is `(order, title)`, so iteration renders rows in
    /// table order with ties broken alphabetically.
    categories: BTreeMap<(i32, String), CategoryYields>,
    /// Column order: first appearance across categories.
    groups: Vec<(String, SampleKind)>,
}

#[derive(Debug, Default)]
struct CategoryYields {
    per_group: BTreeMap<String, YieldsEntry>,
    data: Option<(f64, f64)>,
    total: YieldsEntry,
}

impl YieldsReport {
    /// Record one plot's yields. Plots not flagged for the table are
    /// ignored; two plots mapping to the same category title is a
    /// configuration error.
    pub fn add_plot(
        &mut self,
        request: &PlotRequest,
        specs: &[SampleSpec],
        summary: &Summary,
    ) -> Result<()> {
        if !request.use_for_yields {
            return Ok(());
        }

        let key = (request.yields_table_order, request.yields_title.clone());
        if self.categories.contains_key(&key) {
            return Err(Error::Configuration(format!(
                "duplicated yields category '{}'",
                request.yields_title
            )));
        }

        let group_of = |process_id: &str| -> Option<(&str, SampleKind)> {
            specs
                .iter()
                .find(|s| s.path == process_id)
                .map(|s| (s.yields_group.as_str(), s.kind))
        };

        let mut category = CategoryYields::default();

        for kind in [SampleKind::Mc, SampleKind::Signal] {
            for item in summary.get(kind) {
                let Some((group, _)) = group_of(&item.process_id) else { continue };
                if !self.groups.iter().any(|(g, _)| g == group) {
                    self.groups.push((group.to_string(), kind));
                }
                let entry = category.per_group.entry(group.to_string()).or_default();
                entry.events += item.events;
                // Statistical uncertainties of distinct samples are
                // independent.
                entry.stat = (entry.stat * entry.stat
                    + item.events_uncertainty * item.events_uncertainty)
                    .sqrt();
                if kind == SampleKind::Mc {
                    category.total.events += item.events;
                    category.total.stat = (category.total.stat * category.total.stat
                        + item.events_uncertainty * item.events_uncertainty)
                        .sqrt();
                }
            }

            // Within one source samples are correlated (linear sum);
            // across sources, quadrature.
            let mut per_source: BTreeMap<(String, String), f64> = BTreeMap::new();
            let mut total_per_source: BTreeMap<String, f64> = BTreeMap::new();
            for item in summary.get_systematics(kind) {
                let Some((group, _)) = group_of(&item.process_id) else { continue };
                *per_source.entry((group.to_string(), item.name.clone())).or_default() +=
                    item.events_uncertainty;
                if kind == SampleKind::Mc {
                    *total_per_source.entry(item.name.clone()).or_default() +=
                        item.events_uncertainty;
                }
            }
            for ((group, _), deviation) in per_source {
                let entry = category.per_group.entry(group).or_default();
                entry.syst = (entry.syst * entry.syst + deviation * deviation).sqrt();
            }
            if kind == SampleKind::Mc {
                for deviation in total_per_source.values() {
                    category.total.syst =
                        (category.total.syst * category.total.syst + deviation * deviation).sqrt();
                }
            }
        }

        let data_items = summary.get(SampleKind::Data);
        if !data_items.is_empty() {
            let events: f64 = data_items.iter().map(|i| i.events).sum();
            let stat = data_items
                .iter()
                .map(|i| i.events_uncertainty * i.events_uncertainty)
                .sum::<f64>()
                .sqrt();
            category.data = Some((events, stat));
        }

        self.categories.insert(key, category);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Render the accumulated table as a LaTeX `tabular`.
    pub fn render_latex(&self, options: &YieldsOptions) -> Result<String> {
        if options.align != "h" {
            return Err(Error::Configuration(format!(
                "unsupported yields table orientation '{}': only 'h' is implemented",
                options.align
            )));
        }

        let has_data = self.categories.values().any(|c| c.data.is_some());
        let prec = options.num_prec_yields;

        let mut columns = String::from("l");
        let n_value_columns =
            self.groups.len() + 1 + if has_data { 2 } else { 0 };
        for _ in 0..n_value_columns {
            columns.push_str(&options.text_align);
        }

        let mut out = String::new();
        out.push_str(&format!(
            "\\renewcommand{{\\arraystretch}}{{{}}}\n",
            options.stretch
        ));
        out.push_str(&format!("\\begin{{tabular}}{{ {} }}\n", columns));
        out.push_str("  \\hline\n");

        out.push_str("  ");
        for (group, _) in &self.groups {
            out.push_str(&format!(" & {}", latex_escape(group)));
        }
        out.push_str(" & Total MC");
        if has_data {
            out.push_str(" & Data & Data / MC");
        }
        out.push_str(" \\\\\n  \\hline\n");

        for ((_, title), category) in &self.categories {
            out.push_str(&format!("  {}", latex_escape(title)));
            for (group, _) in &self.groups {
                match category.per_group.get(group) {
                    Some(entry) => out.push_str(&format!(" & {}", format_entry(entry, prec))),
                    None => out.push_str(" & --"),
                }
            }
            out.push_str(&format!(" & {}", format_entry(&category.total, prec)));
            if has_data {
                match category.data {
                    Some((events, _)) => {
                        out.push_str(&format!(" & ${:.*}$", prec, events));
                        let ratio = if category.total.events != 0.0 {
                            events / category.total.events
                        } else {
                            f64::NAN
                        };
                        out.push_str(&format!(" & ${:.*}$", options.num_prec_ratio, ratio));
                    }
                    None => out.push_str(" & -- & --"),
                }
            }
            out.push_str(" \\\\\n");
        }

        out.push_str("  \\hline\n\\end{tabular}\n");
        Ok(out)
    }
}

// Statistical and systematic parts are combined in quadrature into a
// single quoted uncertainty.
fn format_entry(entry: &YieldsEntry, prec: usize) -> String {
    let uncertainty = (entry.stat * entry.stat + entry.syst * entry.syst).sqrt();
    format!("${:.*} \\pm {:.*}$", prec, entry.events, prec, uncertainty)
}

fn latex_escape(s: &str) -> String {
    s.replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryItem;

    fn summary_with(mc: &[(&str, f64, f64)], data: Option<(f64, f64)>) -> Summary {
        let mut summary = Summary::default();
        for (path, events, stat) in mc {
            summary.add(
                SampleKind::Mc,
                SummaryItem {
                    process_id: path.to_string(),
                    name: path.to_string(),
                    events: *events,
                    events_uncertainty: *stat,
                },
            );
        }
        if let Some((events, stat)) = data {
            summary.add(
                SampleKind::Data,
                SummaryItem {
                    process_id: "data".to_string(),
                    name: "Data".to_string(),
                    events,
                    events_uncertainty: stat,
                },
            );
        }
        summary
    }

    fn specs() -> Vec<SampleSpec> {
        let mut a = SampleSpec::new("a.json", SampleKind::Mc);
        a.yields_group = "ttbar".to_string();
        let mut b = SampleSpec::new("b.json", SampleKind::Mc);
        b.yields_group = "ttbar".to_string();
        let mut d = SampleSpec::new("data", SampleKind::Data);
        d.yields_group = "Data".to_string();
        vec![a, b, d]
    }

    fn flagged(name: &str, order: i32) -> PlotRequest {
        let mut request = PlotRequest::new(name);
        request.use_for_yields = true;
        request.yields_table_order = order;
        request
    }

    #[test]
    fn groups_merge_and_ratio_is_rendered() {
        let mut report = YieldsReport::default();
        let summary = summary_with(&[("a.json", 30.0, 3.0), ("b.json", 10.0, 4.0)], Some((50.0, 7.0)));
        report.add_plot(&flagged("mll", 0), &specs(), &summary).unwrap();

        let tex = report.render_latex(&YieldsOptions::default()).unwrap();
        assert!(tex.contains("ttbar"));
        assert!(tex.contains("$40.0 \\pm 5.0$"));
        assert!(tex.contains("$50.0$"));
        assert!(tex.contains("$1.25$"));
    }

    #[test]
    fn stat_and_syst_combine_into_one_uncertainty() {
        let mut report = YieldsReport::default();
        let mut summary = summary_with(&[("a.json", 40.0, 3.0)], None);
        summary.add_systematics(
            SampleKind::Mc,
            SummaryItem {
                process_id: "a.json".to_string(),
                name: "jec".to_string(),
                events: 0.0,
                events_uncertainty: 4.0,
            },
        );
        report.add_plot(&flagged("mll", 0), &specs(), &summary).unwrap();

        let tex = report.render_latex(&YieldsOptions::default()).unwrap();
        assert!(tex.contains("$40.0 \\pm 5.0$"));
        assert!(!tex.contains("\\pm 3.0 \\pm"));
    }

    #[test]
    fn duplicate_category_is_a_configuration_error() {
        let mut report = YieldsReport::default();
        let summary = summary_with(&[("a.json", 1.0, 1.0)], None);
        report.add_plot(&flagged("mll", 0), &specs(), &summary).unwrap();
        let err = report.add_plot(&flagged("mll", 0), &specs(), &summary).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn vertical_orientation_is_rejected() {
        let mut report = YieldsReport::default();
        let summary = summary_with(&[("a.json", 1.0, 1.0)], None);
        report.add_plot(&flagged("mll", 0), &specs(), &summary).unwrap();

        let mut options = YieldsOptions::default();
        options.align = "v".to_string();
        assert!(report.render_latex(&options).is_err());
    }

    #[test]
    fn underscores_are_escaped() {
        let mut report = YieldsReport::default();
        let summary = summary_with(&[("a.json", 1.0, 1.0)], None);
        let mut request = flagged("mll", 0);
        request.yields_title = "signal_region".to_string();
        report.add_plot(&request, &specs(), &summary).unwrap();

        let tex = report.render_latex(&YieldsOptions::default()).unwrap();
        assert!(tex.contains("signal\\_region"));
    }

    #[test]
    fn categories_follow_table_order() {
        let mut report = YieldsReport::default();
        let summary = summary_with(&[("a.json", 1.0, 1.0)], None);
        report.add_plot(&flagged("zzz", 0), &specs(), &summary).unwrap();
        report.add_plot(&flagged("aaa", 1), &specs(), &summary).unwrap();

        let tex = report.render_latex(&YieldsOptions::default()).unwrap();
        let zzz = tex.find("zzz").unwrap();
        let aaa = tex.find("aaa").unwrap();
        assert!(zzz < aaa);
    }

    #[test]
    fn unflagged_plots_are_ignored() {
        let mut report = YieldsReport::default();
        let summary = summary_with(&[("a.json", 1.0, 1.0)], None);
        report.add_plot(&PlotRequest::new("mll"), &specs(), &summary).unwrap();
        assert!(report.is_empty());
    }
}
