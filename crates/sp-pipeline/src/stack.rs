//! Legend grouping and MC stacking.
//!
//! MC samples sharing a legend group are merged into one series; the
//! merged and ungrouped series are then stacked in configuration order
//! (optionally re-sorted by yield). The stack keeps four views of the
//! combined prediction: the ordered members, the statistics-only sum,
//! and the systematics-only and stat+syst envelopes filled in later by
//! the uncertainty combiner.

use sp_core::{BinnedSeries, Result};

use crate::sample::{PlotStyle, Sample, SampleKind};

/// One drawable member of the MC stack.
#[derive(Debug, Clone)]
pub struct StackEntry {
    /// Legend-group name for merged entries, sample name otherwise.
    pub label: String,
    pub series: BinnedSeries,
    pub style: PlotStyle,
}

/// The combined MC prediction. Never mutated after the uncertainty
/// combiner has finalized it.
#[derive(Debug, Clone)]
pub struct Stack {
    /// Members in draw order (bottom of the stack first).
    pub entries: Vec<StackEntry>,
    /// Plain sum of all members; variance is purely statistical.
    pub stat_only: BinnedSeries,
    /// Zero statistical variance, combined-systematic variance only.
    /// `None` until the combiner runs, or when systematics are disabled.
    pub syst_only: Option<BinnedSeries>,
    /// Quadrature sum of statistical and systematic variance.
    pub stat_and_syst: Option<BinnedSeries>,
}

/// Build the MC stack from the plot's samples.
///
/// Returns `None` when no MC sample contributes anything: downstream
/// treats "no MC" distinctly from "MC present but all zero".
pub fn build_stack(samples: &[Sample], sort_by_yields: bool) -> Result<Option<Stack>> {
    // First pass: merge all members of a legend group into one series.
    // Only samples with nonzero entries contribute.
    let mut group_series: Vec<(String, BinnedSeries, PlotStyle)> = Vec::new();
    for sample in samples {
        if sample.kind() != SampleKind::Mc || sample.nominal.is_empty() {
            continue;
        }
        let Some(group) = sample.spec.legend_group.as_deref() else {
            continue;
        };
        match group_series.iter_mut().find(|(name, _, _)| name == group) {
            Some((_, series, _)) => series.add(&sample.nominal)?,
            None => group_series.push((
                group.to_string(),
                sample.nominal.clone(),
                sample.spec.style.clone(),
            )),
        }
    }

    // Second pass: assemble the members in configuration order. The first
    // sample of a group contributes the merged series; later members are
    // skipped.
    let mut entries: Vec<StackEntry> = Vec::new();
    for sample in samples {
        if sample.kind() != SampleKind::Mc {
            continue;
        }
        if sample.nominal.is_empty() && sample.spec.legend_group.is_none() {
            continue;
        }

        match sample.spec.legend_group.as_deref() {
            Some(group) => {
                let Some(pos) = group_series.iter().position(|(name, _, _)| name == group)
                else {
                    // Group already consumed by an earlier member.
                    continue;
                };
                let (label, series, style) = group_series.remove(pos);
                entries.push(StackEntry { label, series, style });
            }
            None => entries.push(StackEntry {
                label: sample.spec.pretty_name.clone(),
                series: sample.nominal.clone(),
                style: sample.spec.style.clone(),
            }),
        }
    }

    if entries.is_empty() {
        return Ok(None);
    }

    // Draw order only; totals are unaffected.
    if sort_by_yields {
        entries.sort_by(|a, b| {
            a.series.integral().partial_cmp(&b.series.integral()).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let mut stat_only = BinnedSeries::new_like(&entries[0].series);
    for entry in &entries {
        stat_only.add(&entry.series)?;
    }

    Ok(Some(Stack { entries, stat_only, syst_only: None, stat_and_syst: None }))
}
