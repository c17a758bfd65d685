//! Orchestration Layer
//!
//! This crate drives the aggregation kernel over whole frames:
//! - JSON configuration of a post-processing run
//! - Element sources (the seam to solver-file decoding)
//! - Job construction, worker pool, map and reduce
//! - Per-frame diagnostics: mixing-zone widths, energy budget, cell numbers
//! - Slice spectra and turbulence microscales

#![warn(missing_docs)]

pub mod config;
pub mod diagnostics;
pub mod mapreduce;
pub mod pool;
pub mod source;
pub mod spectrum;

pub use config::PostConfig;
pub use diagnostics::{FrameSummary, MixingZone};
pub use mapreduce::BatchExtrema;
pub use source::{ElementSource, InMemorySource, SourceChunk, SourceError};

use std::sync::Arc;
use std::time::Instant;

use kernel::{AggregationError, AggregationTarget};

use crate::mapreduce::{build_jobs, MapContext};

/// Errors raised while analysing a frame
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Kernel contract violation while building, adding or combining targets
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    /// A source failed to deliver its elements
    #[error("source {name}: {error}")]
    Source {
        /// Name of the failing source
        name: String,
        /// What went wrong
        #[source]
        error: SourceError,
    },
    /// A worker thread panicked before finishing its jobs
    #[error("worker thread panicked")]
    WorkerPanicked,
    /// No sources were given for the frame
    #[error("no element sources given")]
    NoSources,
}

/// Aggregated data of one frame
#[derive(Debug)]
pub struct FrameResult {
    /// Simulation time of the frame
    pub time: f64,
    /// Raw-data extrema over all sources
    pub extrema: BatchExtrema,
    /// The fully reduced target
    pub target: AggregationTarget,
}

/// Aggregate every element of one frame.
///
/// This function performs the full map/reduce pipeline:
/// 1. Validate the configuration and build the target lattice
/// 2. Create the shared target, if configured
/// 3. Split the sources into jobs
/// 4. Run the jobs on the worker pool and reduce their results
///
/// # Arguments
/// * `config` - Post-processing configuration
/// * `sources` - One source per output file of the frame
pub fn analyze_frame(
    config: &PostConfig,
    sources: &[Arc<dyn ElementSource>],
) -> Result<FrameResult, FrameError> {
    config.validate().map_err(FrameError::Config)?;
    if sources.is_empty() {
        return Err(FrameError::NoSources);
    }
    let start = Instant::now();

    let lattice = config.lattice()?;
    let order = config.resampled_order();
    let settings = config.target_settings();
    tracing::info!(
        "Frame t={}: {} sources, lattice {:?} with order {}",
        sources[0].time(),
        sources.len(),
        lattice.shape(),
        order
    );

    let shared = if config.shared_target {
        Some(Arc::new(AggregationTarget::new(
            order,
            lattice.clone(),
            settings,
        )?))
    } else {
        None
    };

    let jobs = build_jobs(sources, config.threads, shared.clone());
    tracing::debug!("{} jobs on {} threads", jobs.len(), config.threads);

    let ctx = MapContext {
        lattice: lattice.clone(),
        order,
        settings,
        atwood: config.atwood,
    };
    let reduced = pool::run_jobs(jobs, sources, &ctx, config.threads)?;

    let target = match shared {
        Some(shared) => match Arc::try_unwrap(shared) {
            Ok(target) => target,
            Err(_) => return Err(FrameError::WorkerPanicked),
        },
        None => match reduced.target {
            Some(target) => target,
            None => AggregationTarget::new(order, lattice, settings)?,
        },
    };

    tracing::info!(
        "Frame t={} aggregated: {} nodes in {:.3}s",
        sources[0].time(),
        target.ingested_nodes(),
        start.elapsed().as_secs_f64()
    );

    Ok(FrameResult {
        time: sources[0].time(),
        extrema: reduced.extrema,
        target,
    })
}
