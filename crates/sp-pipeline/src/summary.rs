//! Per-process yield summaries.
//!
//! One [`Summary`] is built per plot: an ordered list of nominal yield
//! items per process kind, plus a parallel list of per-systematic
//! uncertainty items. The summary is returned to the caller and also
//! reported on the console.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sample::SampleKind;

/// One row of the yield report.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryItem {
    /// Process identifier (the sample path).
    pub process_id: String,
    /// Human-readable name.
    pub name: String,
    /// Integrated yield.
    pub events: f64,
    /// Uncertainty on the yield.
    pub events_uncertainty: f64,
}

/// Per-plot yield summary, grouped by process kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    items: BTreeMap<SampleKind, Vec<SummaryItem>>,
    systematics_items: BTreeMap<SampleKind, Vec<SummaryItem>>,
}

impl Summary {
    pub fn add(&mut self, kind: SampleKind, item: SummaryItem) {
        self.items.entry(kind).or_default().push(item);
    }

    pub fn add_systematics(&mut self, kind: SampleKind, item: SummaryItem) {
        self.systematics_items.entry(kind).or_default().push(item);
    }

    pub fn get(&self, kind: SampleKind) -> &[SummaryItem] {
        self.items.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_systematics(&self, kind: SampleKind) -> &[SummaryItem] {
        self.systematics_items.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Log the summary: per-process yields, per-systematic uncertainties,
    /// and the combined total per kind.
    pub fn report(&self) {
        for kind in [SampleKind::Data, SampleKind::Mc, SampleKind::Signal] {
            let nominal = self.get(kind);
            if nominal.is_empty() {
                continue;
            }

            tracing::info!(kind = kind.as_str(), "yield summary");

            let mut events = 0.0;
            let mut uncertainty_squared = 0.0;
            for item in nominal {
                tracing::info!(
                    process = %item.name,
                    events = format_args!("{:.2}", item.events),
                    uncertainty = format_args!("{:.2}", item.events_uncertainty),
                    "  nominal"
                );
                events += item.events;
                uncertainty_squared += item.events_uncertainty * item.events_uncertainty;
            }

            for item in self.get_systematics(kind) {
                tracing::info!(
                    source = %item.name,
                    process = %item.process_id,
                    uncertainty = format_args!("{:.2}", item.events_uncertainty),
                    "  systematic"
                );
                uncertainty_squared += item.events_uncertainty * item.events_uncertainty;
            }

            tracing::info!(
                kind = kind.as_str(),
                events = format_args!("{:.2}", events),
                uncertainty = format_args!("{:.2}", uncertainty_squared.sqrt()),
                "total"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_kept_per_kind_in_insertion_order() {
        let mut summary = Summary::default();
        summary.add(
            SampleKind::Mc,
            SummaryItem {
                process_id: "a".into(),
                name: "A".into(),
                events: 1.0,
                events_uncertainty: 0.1,
            },
        );
        summary.add(
            SampleKind::Mc,
            SummaryItem {
                process_id: "b".into(),
                name: "B".into(),
                events: 2.0,
                events_uncertainty: 0.2,
            },
        );

        let items = summary.get(SampleKind::Mc);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "A");
        assert!(summary.get(SampleKind::Data).is_empty());
    }
}
