//! Element sources: where resampled element data comes from.
//!
//! Decoding solver output and building the interpolation onto the lattice
//! happen behind [`ElementSource`]. The orchestrator only asks a source for
//! contiguous element ranges, already resampled, with the field still in raw
//! solver units (temperature).

use std::ops::Range;

use kernel::{AggregationError, ElementBatch};

/// Errors raised while reading from a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Requested elements past the end of the source
    #[error("elements {start}..{end} out of range for {len} elements")]
    OutOfRange {
        /// Start of the requested range
        start: usize,
        /// End of the requested range
        end: usize,
        /// Elements available
        len: usize,
    },
    /// The source produced a malformed batch
    #[error("malformed batch: {0}")]
    Batch(#[from] AggregationError),
    /// The underlying data could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),
}

/// One range of resampled elements read from a source
#[derive(Debug, Clone)]
pub struct SourceChunk {
    /// Resampled elements; `field` holds raw temperature
    pub batch: ElementBatch,
    /// Largest node spacing of the solver mesh in this range
    pub max_node_spacing: f64,
}

/// A file (or anything else) holding one frame's elements
pub trait ElementSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Simulation time of the frame
    fn time(&self) -> f64;

    /// Number of elements available
    fn element_count(&self) -> usize;

    /// Read and resample the elements in `range`
    fn read(&self, range: Range<usize>) -> Result<SourceChunk, SourceError>;
}

/// Source backed by an already resampled batch held in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    time: f64,
    batch: ElementBatch,
    max_node_spacing: f64,
}

impl InMemorySource {
    /// Wrap a batch; fails if the batch is malformed.
    pub fn new(
        name: impl Into<String>,
        time: f64,
        batch: ElementBatch,
        max_node_spacing: f64,
    ) -> Result<Self, SourceError> {
        batch.validate()?;
        Ok(Self {
            name: name.into(),
            time,
            batch,
            max_node_spacing,
        })
    }
}

impl ElementSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn element_count(&self) -> usize {
        self.batch.len()
    }

    fn read(&self, range: Range<usize>) -> Result<SourceChunk, SourceError> {
        let len = self.batch.len();
        if range.start > range.end || range.end > len {
            return Err(SourceError::OutOfRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
        Ok(SourceChunk {
            batch: self.batch.select(range),
            max_node_spacing: self.max_node_spacing,
        })
    }
}
