//! Error types for ingestion, merging and field analysis.

/// Contract violations raised by lattice construction, `add` and `combine`.
///
/// None of these are recoverable by retrying: the caller handed over data that does not
/// fit the target. They are always returned before any shared state is mutated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    /// Zero shape, inverted bounds or non-finite spacing.
    #[error("invalid lattice: {0}")]
    InvalidLattice(String),
    /// Element order of zero.
    #[error("element order must be at least 1, got {0}")]
    InvalidOrder(usize),
    /// A batch array does not have the length implied by the element count.
    #[error("{array} has {actual} entries, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending array
        array: &'static str,
        /// Length implied by the anchor count and order
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },
    /// Batch (or merged target) resampled with a different element order.
    #[error("element order {actual} does not match target order {expected}")]
    OrderMismatch {
        /// Order of the receiving target
        expected: usize,
        /// Order of the incoming data
        actual: usize,
    },
    /// Histogram layout without bins or with an empty value range.
    #[error("invalid histogram layout: {0}")]
    InvalidHistogram(String),
    /// Histograms with different bin layouts.
    #[error("histogram layouts differ")]
    HistogramMismatch,
    /// Targets built over different lattices.
    #[error("cannot combine targets over different lattices")]
    LatticeMismatch,
    /// Targets with different (or absent) probe sets.
    #[error("cannot combine targets with different probe sets")]
    ProbeMismatch,
    /// One target captures the full field and the other does not.
    #[error("cannot combine targets with different field-capture settings")]
    CaptureMismatch,
}

/// Errors from the covering-number analysis.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Value count does not match the declared field shape.
    #[error("field of shape {shape:?} needs {expected} values, got {actual}")]
    FieldShape {
        /// Declared shape
        shape: [usize; 3],
        /// Product of the shape
        expected: usize,
        /// Values supplied
        actual: usize,
    },
    /// A box edge of zero cells.
    #[error("box size must be at least 1")]
    InvalidBoxSize,
    /// Sample count or geometric base unusable.
    #[error("invalid fractal settings: {0}")]
    InvalidSettings(String),
    /// Not enough non-empty box sizes to fit a slope.
    #[error("need at least two non-empty box sizes to fit a dimension, got {0}")]
    TooFewSamples(usize),
}
