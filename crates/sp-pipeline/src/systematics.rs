//! Combined per-bin systematic envelopes.
//!
//! Per named source, up/down deviations from the nominal shape are
//! symmetrized with `max(|up - nominal|, |nominal - down|)`. Within one
//! source the deviations of all MC samples are fully correlated (linear
//! per-bin sum); different sources are uncorrelated (quadrature across
//! sources). Signal systematics are tracked for reporting only.

use std::collections::BTreeMap;

use sp_core::Result;

use crate::sample::{Sample, SampleKind, SystematicVariation};
use crate::stack::Stack;
use crate::summary::{Summary, SummaryItem};

/// Declaration of one systematic source in the configuration.
#[derive(Debug, Clone)]
pub enum SystematicSpec {
    /// Up/down shapes stored alongside the nominal histogram.
    Shape {
        name: String,
        pretty_name: String,
        /// Restrict the source to sample paths containing this substring.
        on: Option<String>,
    },
    /// A flat relative variation, e.g. `1.025` for a 2.5% source.
    Const {
        name: String,
        pretty_name: String,
        value: f64,
        on: Option<String>,
    },
}

impl SystematicSpec {
    pub fn name(&self) -> &str {
        match self {
            SystematicSpec::Shape { name, .. } | SystematicSpec::Const { name, .. } => name,
        }
    }

    /// Whether this source applies to the sample at `path`.
    pub fn applies_to(&self, path: &str) -> bool {
        let on = match self {
            SystematicSpec::Shape { on, .. } | SystematicSpec::Const { on, .. } => on,
        };
        on.as_deref().map(|needle| path.contains(needle)).unwrap_or(true)
    }
}

/// Per-bin symmetrized deviation of one variation.
///
/// Asymmetric errors are not propagated asymmetrically: the larger of
/// the two one-sided deviations is used for both sides.
fn symmetrized_errors(syst: &SystematicVariation, n_bins: usize) -> Option<Vec<f64>> {
    let nominal = syst.nominal_shape.as_ref()?;
    let up = syst.up_shape.as_ref()?;
    let down = syst.down_shape.as_ref()?;
    if nominal.n_bins() != n_bins || up.n_bins() != n_bins || down.n_bins() != n_bins {
        return None;
    }

    let mut errors = Vec::with_capacity(n_bins);
    for i in 0..n_bins {
        let error_up = (up.content[i] - nominal.content[i]).abs();
        let error_down = (nominal.content[i] - down.content[i]).abs();
        errors.push(error_up.max(error_down));
    }
    Some(errors)
}

/// Fold every sample's systematic variations into the stack envelopes
/// and record one summary item per (sample, source).
///
/// Initializes `stack.syst_only` (combined-systematic variance, zero
/// statistical part) and `stack.stat_and_syst` (quadrature sum with the
/// statistical variance). A variation missing one of its three shapes is
/// skipped for that sample; other samples and sources still combine.
pub fn compute_systematics(
    stack: &mut Stack,
    samples: &[Sample],
    summary: &mut Summary,
) -> Result<()> {
    let n_bins = stack.stat_only.n_bins();

    let mut syst_only = stack.stat_only.clone();
    syst_only.variance.iter_mut().for_each(|v| *v = 0.0);

    // Key is the source name, value the combined per-bin deviation.
    let mut combined: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for sample in samples {
        if sample.kind() == SampleKind::Data || sample.systematics.is_empty() {
            continue;
        }

        for syst in &sample.systematics {
            let Some(errors) = symmetrized_errors(syst, n_bins) else {
                tracing::debug!(
                    sample = %sample.spec.path,
                    source = %syst.name,
                    "skipping systematic with missing or mismatched shapes"
                );
                continue;
            };

            let total_syst_error: f64 = errors.iter().sum();

            // Within one source, bins and samples are fully correlated.
            // Only MC feeds the stack envelope; signal is report-only.
            if sample.kind() == SampleKind::Mc {
                let slot = combined.entry(syst.name.clone()).or_insert_with(|| vec![0.0; n_bins]);
                for (acc, e) in slot.iter_mut().zip(&errors) {
                    *acc += e;
                }
            }

            summary.add_systematics(
                sample.kind(),
                SummaryItem {
                    process_id: sample.spec.path.clone(),
                    name: syst.pretty_name.clone(),
                    events: 0.0,
                    events_uncertainty: total_syst_error,
                },
            );
        }
    }

    // Different sources are uncorrelated: quadrature across names.
    for deviations in combined.values() {
        for i in 0..n_bins {
            syst_only.variance[i] += deviations[i] * deviations[i];
        }
    }

    let mut stat_and_syst = stack.stat_only.clone();
    for i in 0..n_bins {
        stat_and_syst.variance[i] = syst_only.variance[i] + stack.stat_only.variance[i];
    }

    stack.syst_only = Some(syst_only);
    stack.stat_and_syst = Some(stat_and_syst);
    Ok(())
}
