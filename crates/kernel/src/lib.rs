//! Streaming grid-aggregation kernel for Rayleigh-Taylor post-processing.
//!
//! Spectral-element output, already resampled to a uniform lattice, arrives in
//! batches of elements and is folded into an [`AggregationTarget`] that holds
//! the global statistics of one frame: mixing mass fraction, kinetic energy,
//! the field histogram, the vertical profile, diagnostic slices and, optionally,
//! nearest-interface distances and a full copy of the field.
//!
//! # Modules
//! - [`lattice`] -- Uniform target lattice geometry and root-index math.
//! - [`batch`] -- Struct-of-arrays element batches.
//! - [`histogram`] -- Fixed-width histogram of field values.
//! - [`slice`] -- Fixed y- and z-normal diagnostic planes.
//! - [`probe`] -- Random probes tracking the distance to the interface.
//! - [`target`] -- Thread-safe accumulation and sequential merging.
//! - [`covering`] -- Covering numbers and box-counting fractal dimension.
//! - [`error`] -- Error types.

#![warn(missing_docs)]

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod batch;
pub mod covering;
pub mod error;
pub mod histogram;
pub mod lattice;
pub mod probe;
pub mod slice;
pub mod target;

pub use batch::{node_index, ElementBatch};
pub use covering::{
    covering_number, fractal_dimension, linear_regression, FractalEstimate, FractalSettings,
    ScalarField,
};
pub use error::{AggregationError, AnalysisError};
pub use histogram::{PhaseHistogram, PDF_BINS, PDF_RANGE};
pub use lattice::UniformLattice;
pub use probe::{InterfaceDistance, InterfaceProbeSet, ProbeSettings};
pub use slice::{DiagnosticSlices, Plane};
pub use target::{AggregationTarget, Statistics, TargetSettings};

/// Lock a statistic, recovering the data from a poisoned mutex.
///
/// Every shared mutation is a sum or a min-reduction, so a panic in another
/// holder cannot leave the value half-updated in a way that matters.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
