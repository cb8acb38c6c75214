//! Binned-series value container.
//!
//! A [`BinnedSeries`] is an ordered sequence of bins, each holding a content
//! (weighted count) and a variance, plus underflow/overflow accumulators.
//! Series sharing the same binning can be added together; every pipeline
//! transformation either mutates a logically owned series in place or
//! derives a fresh one with [`BinnedSeries::new_like`].

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A one-dimensional binned series with per-bin content and variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedSeries {
    /// Bin edges, strictly increasing (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Bin contents (length = n_bins, excluding under/overflow).
    pub content: Vec<f64>,
    /// Per-bin variance (sum of squared weights).
    pub variance: Vec<f64>,
    /// Underflow accumulator.
    #[serde(default)]
    pub underflow: f64,
    /// Underflow variance.
    #[serde(default)]
    pub underflow_variance: f64,
    /// Overflow accumulator.
    #[serde(default)]
    pub overflow: f64,
    /// Overflow variance.
    #[serde(default)]
    pub overflow_variance: f64,
    /// Total number of raw entries filled into the series.
    #[serde(default)]
    pub entries: f64,
}

impl BinnedSeries {
    /// Create an empty series over the given edges.
    pub fn new(bin_edges: Vec<f64>) -> Result<Self> {
        if bin_edges.len() < 2 {
            return Err(Error::Computation(format!(
                "a binned series needs at least 2 edges, got {}",
                bin_edges.len()
            )));
        }
        if bin_edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::Computation("bin edges must be strictly increasing".to_string()));
        }
        let n = bin_edges.len() - 1;
        Ok(Self {
            bin_edges,
            content: vec![0.0; n],
            variance: vec![0.0; n],
            underflow: 0.0,
            underflow_variance: 0.0,
            overflow: 0.0,
            overflow_variance: 0.0,
            entries: 0.0,
        })
    }

    /// Create a series from edges, contents and variances, validating the
    /// container invariants.
    pub fn from_parts(bin_edges: Vec<f64>, content: Vec<f64>, variance: Vec<f64>) -> Result<Self> {
        let mut s = Self::new(bin_edges)?;
        if content.len() != s.n_bins() || variance.len() != s.n_bins() {
            return Err(Error::Computation(format!(
                "content/variance length mismatch: {} bins, {} contents, {} variances",
                s.n_bins(),
                content.len(),
                variance.len()
            )));
        }
        if variance.iter().any(|v| *v < 0.0) {
            return Err(Error::Computation("negative bin variance".to_string()));
        }
        s.entries = content.iter().filter(|c| **c != 0.0).count() as f64;
        s.content = content;
        s.variance = variance;
        Ok(s)
    }

    /// A zeroed series with the same binning as `template`.
    pub fn new_like(template: &Self) -> Self {
        Self {
            bin_edges: template.bin_edges.clone(),
            content: vec![0.0; template.n_bins()],
            variance: vec![0.0; template.n_bins()],
            underflow: 0.0,
            underflow_variance: 0.0,
            overflow: 0.0,
            overflow_variance: 0.0,
            entries: 0.0,
        }
    }

    /// Number of bins, excluding under/overflow.
    pub fn n_bins(&self) -> usize {
        self.bin_edges.len() - 1
    }

    /// Whether nothing was ever filled into this series. Deserialized
    /// series may omit the entry counter, so zero contents also count.
    pub fn is_empty(&self) -> bool {
        self.entries == 0.0 && self.content.iter().all(|c| *c == 0.0)
    }

    /// Center of bin `i`.
    pub fn bin_center(&self, i: usize) -> f64 {
        0.5 * (self.bin_edges[i] + self.bin_edges[i + 1])
    }

    /// Width of bin `i`.
    pub fn bin_width(&self, i: usize) -> f64 {
        self.bin_edges[i + 1] - self.bin_edges[i]
    }

    /// Index of the bin containing `x`, or `None` if out of range or NaN.
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if x.is_nan() || x < self.bin_edges[0] || x >= self.bin_edges[self.n_bins()] {
            return None;
        }
        // Last bin whose low edge is <= x.
        let idx = match self.bin_edges.binary_search_by(|e| e.total_cmp(&x)) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        Some(idx.min(self.n_bins() - 1))
    }

    /// Whether `other` has the exact same binning.
    pub fn same_binning(&self, other: &Self) -> bool {
        self.bin_edges == other.bin_edges
    }

    /// Per-bin addition of content and variance. Both series must share
    /// the same binning; rebinning/regridding is never attempted.
    pub fn add(&mut self, other: &Self) -> Result<()> {
        if !self.same_binning(other) {
            return Err(Error::Computation(
                "cannot add series with different binnings".to_string(),
            ));
        }
        for i in 0..self.n_bins() {
            self.content[i] += other.content[i];
            self.variance[i] += other.variance[i];
        }
        self.underflow += other.underflow;
        self.underflow_variance += other.underflow_variance;
        self.overflow += other.overflow;
        self.overflow_variance += other.overflow_variance;
        self.entries += other.entries;
        Ok(())
    }

    /// Multiply every content by `factor` and every variance by `factor²`.
    pub fn scale(&mut self, factor: f64) {
        let f2 = factor * factor;
        for c in &mut self.content {
            *c *= factor;
        }
        for v in &mut self.variance {
            *v *= f2;
        }
        self.underflow *= factor;
        self.underflow_variance *= f2;
        self.overflow *= factor;
        self.overflow_variance *= f2;
    }

    /// Merge `factor` adjacent bins into one. The bin count must be a
    /// multiple of `factor`.
    pub fn rebin(&mut self, factor: usize) -> Result<()> {
        if factor <= 1 {
            return Ok(());
        }
        let n = self.n_bins();
        if n % factor != 0 {
            return Err(Error::Computation(format!(
                "cannot rebin {} bins by a factor of {}",
                n, factor
            )));
        }
        let m = n / factor;
        let mut edges = Vec::with_capacity(m + 1);
        let mut content = Vec::with_capacity(m);
        let mut variance = Vec::with_capacity(m);
        for j in 0..m {
            edges.push(self.bin_edges[j * factor]);
            content.push(self.content[j * factor..(j + 1) * factor].iter().sum());
            variance.push(self.variance[j * factor..(j + 1) * factor].iter().sum());
        }
        edges.push(self.bin_edges[n]);
        self.bin_edges = edges;
        self.content = content;
        self.variance = variance;
        Ok(())
    }

    /// Sum of bin contents, excluding under/overflow.
    pub fn integral(&self) -> f64 {
        self.content.iter().sum()
    }

    /// Integral together with its statistical uncertainty
    /// (square root of the summed variance).
    pub fn integral_and_error(&self) -> (f64, f64) {
        let integral = self.integral();
        let var: f64 = self.variance.iter().sum();
        (integral, var.max(0.0).sqrt())
    }

    /// Statistical error of bin `i` (square root of the variance).
    pub fn bin_error(&self, i: usize) -> f64 {
        self.variance[i].max(0.0).sqrt()
    }

    /// Largest bin content.
    pub fn max_content(&self) -> f64 {
        self.content.iter().copied().fold(f64::MIN, f64::max)
    }

    /// Smallest bin content (can be negative).
    pub fn min_content(&self) -> f64 {
        self.content.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Smallest strictly positive bin content, or +inf if none.
    pub fn min_positive_content(&self) -> f64 {
        self.content
            .iter()
            .copied()
            .filter(|c| *c > 0.0)
            .fold(f64::INFINITY, f64::min)
    }
}
