//! Fixed-width histogram of phase-field values.

use crate::error::AggregationError;

/// Default number of bins.
pub const PDF_BINS: usize = 1000;

/// Default value range `[lo, hi]`.
pub const PDF_RANGE: (f64, f64) = (-0.1, 1.1);

/// Fixed-width histogram with `u64` counts.
///
/// Bins are half-open except the last, which also takes the right edge.
/// Values outside the range (and NaN) are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseHistogram {
    lo: f64,
    hi: f64,
    counts: Vec<u64>,
}

impl PhaseHistogram {
    /// Histogram with the default 1000 bins over `[-0.1, 1.1]`.
    pub fn new() -> Self {
        Self::zeroed(PDF_BINS, PDF_RANGE.0, PDF_RANGE.1)
    }

    /// Histogram with a custom layout.
    ///
    /// Fails with `InvalidHistogram` when `bins` is zero or `[lo, hi]` is not a
    /// finite, non-empty range.
    pub fn with_layout(bins: usize, lo: f64, hi: f64) -> Result<Self, AggregationError> {
        if bins == 0 {
            return Err(AggregationError::InvalidHistogram(
                "at least one bin is required".to_string(),
            ));
        }
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(AggregationError::InvalidHistogram(format!(
                "range [{lo}, {hi}] is empty or not finite"
            )));
        }
        Ok(Self::zeroed(bins, lo, hi))
    }

    fn zeroed(bins: usize, lo: f64, hi: f64) -> Self {
        Self {
            lo,
            hi,
            counts: vec![0; bins],
        }
    }

    /// Zeroed histogram with the same layout.
    pub fn empty_like(&self) -> Self {
        Self::zeroed(self.counts.len(), self.lo, self.hi)
    }

    /// Bin receiving `value`, if it falls in range.
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        if !(value >= self.lo && value <= self.hi) {
            return None;
        }
        let bins = self.counts.len();
        let scaled = (value - self.lo) / (self.hi - self.lo) * bins as f64;
        Some((scaled as usize).min(bins - 1))
    }

    /// Count every value of `values`.
    pub fn add_values(&mut self, values: &[f64]) {
        for &v in values {
            if let Some(bin) = self.bin_of(v) {
                self.counts[bin] += 1;
            }
        }
    }

    /// Add another histogram's counts into this one.
    pub fn merge(&mut self, other: &PhaseHistogram) -> Result<(), AggregationError> {
        if self.counts.len() != other.counts.len() || self.lo != other.lo || self.hi != other.hi {
            return Err(AggregationError::HistogramMismatch);
        }
        for (c, o) in self.counts.iter_mut().zip(&other.counts) {
            *c += o;
        }
        Ok(())
    }

    /// Raw bin counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of counted values.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `bins + 1` bin edges.
    pub fn edges(&self) -> Vec<f64> {
        let bins = self.counts.len();
        let width = (self.hi - self.lo) / bins as f64;
        (0..=bins).map(|b| self.lo + width * b as f64).collect()
    }

    /// Counts divided by the total (all zeros for an empty histogram).
    pub fn normalized(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }

    /// Normalized cumulative distribution.
    pub fn cumulative(&self) -> Vec<f64> {
        let mut running = 0.0;
        self.normalized()
            .into_iter()
            .map(|p| {
                running += p;
                running
            })
            .collect()
    }
}

impl Default for PhaseHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let h = PhaseHistogram::new();
        assert_eq!(h.counts().len(), PDF_BINS);
        let edges = h.edges();
        assert_eq!(edges.len(), PDF_BINS + 1);
        assert!((edges[0] + 0.1).abs() < 1e-12);
        assert!((edges[PDF_BINS] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn bins_interior_and_edges() {
        let h = PhaseHistogram::new();
        assert_eq!(h.bin_of(-0.1), Some(0));
        assert_eq!(h.bin_of(0.3), Some(333));
        assert_eq!(h.bin_of(1.1), Some(PDF_BINS - 1));
        assert_eq!(h.bin_of(1.2), None);
        assert_eq!(h.bin_of(-0.2), None);
        assert_eq!(h.bin_of(f64::NAN), None);
    }

    #[test]
    fn add_and_merge() {
        let mut a = PhaseHistogram::with_layout(4, 0.0, 1.0).unwrap();
        a.add_values(&[0.1, 0.3, 0.3, 2.0]);
        let mut b = a.empty_like();
        b.add_values(&[0.9, 1.0]);

        a.merge(&b).unwrap();
        assert_eq!(a.counts(), &[1, 2, 0, 2]);
        assert_eq!(a.total(), 5);
    }

    #[test]
    fn merge_rejects_other_layout() {
        let mut a = PhaseHistogram::new();
        let b = PhaseHistogram::with_layout(10, -0.1, 1.1).unwrap();
        assert_eq!(a.merge(&b), Err(AggregationError::HistogramMismatch));
    }

    #[test]
    fn invalid_layouts_rejected() {
        for (bins, lo, hi) in [
            (0, 0.0, 1.0),
            (4, 1.0, 1.0),
            (4, 1.0, 0.0),
            (4, f64::NAN, 1.0),
            (4, 0.0, f64::INFINITY),
        ] {
            assert!(matches!(
                PhaseHistogram::with_layout(bins, lo, hi),
                Err(AggregationError::InvalidHistogram(_))
            ));
        }
        let mut one = PhaseHistogram::with_layout(1, 0.0, 1.0).unwrap();
        one.add_values(&[0.0, 0.5, 1.0]);
        assert_eq!(one.counts(), &[3]);
    }

    #[test]
    fn cumulative_ends_at_one() {
        let mut h = PhaseHistogram::with_layout(3, 0.0, 3.0).unwrap();
        h.add_values(&[0.5, 1.5, 1.5, 2.5]);
        let cdf = h.cumulative();
        assert!((cdf[0] - 0.25).abs() < 1e-12);
        assert!((cdf[1] - 0.75).abs() < 1e-12);
        assert!((cdf[2] - 1.0).abs() < 1e-12);
        assert_eq!(PhaseHistogram::new().cumulative()[999], 0.0);
    }
}
