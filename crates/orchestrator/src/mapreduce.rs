//! Job construction, the per-job map step and the sequential reduce.
//!
//! A frame is split into jobs: contiguous element ranges of one source each.
//! Every job reads its range, records the raw extrema, rescales the field to
//! `[0, 1]` and adds the batch into either the frame's shared target or a
//! private target of its own. Partial results are then folded together one at
//! a time.

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use kernel::{AggregationError, AggregationTarget, ElementBatch, TargetSettings, UniformLattice};

use crate::source::{ElementSource, SourceChunk};
use crate::FrameError;

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Where a job puts its elements
#[derive(Debug, Clone)]
pub enum TargetSlot {
    /// Add into the frame-wide target
    Shared(Arc<AggregationTarget>),
    /// Build a private target to be combined later
    Private,
}

/// One unit of map work
#[derive(Debug, Clone)]
pub struct Job {
    /// Index into the frame's source list
    pub source: usize,
    /// Elements of that source to read
    pub elements: Range<usize>,
    /// Target the elements go into
    pub target: TargetSlot,
}

/// Split every source into roughly equal element ranges.
///
/// Each source gets `max(1 + (threads - 1) / sources, 1)` jobs of
/// `(elements - 1) / jobs + 1` elements; empty ranges are dropped.
pub fn build_jobs(
    sources: &[Arc<dyn ElementSource>],
    threads: usize,
    shared: Option<Arc<AggregationTarget>>,
) -> Vec<Job> {
    if sources.is_empty() {
        return Vec::new();
    }
    let jobs_per_source = (1 + threads.saturating_sub(1) / sources.len()).max(1);

    let mut jobs = Vec::new();
    for (s, source) in sources.iter().enumerate() {
        let nelm = source.element_count();
        if nelm == 0 {
            continue;
        }
        let per_job = (nelm - 1) / jobs_per_source + 1;
        for j in 0..jobs_per_source {
            let start = j * per_job;
            let end = ((j + 1) * per_job).min(nelm);
            if start >= end {
                continue;
            }
            let target = match &shared {
                Some(t) => TargetSlot::Shared(Arc::clone(t)),
                None => TargetSlot::Private,
            };
            jobs.push(Job {
                source: s,
                elements: start..end,
                target,
            });
        }
    }
    jobs
}

// ---------------------------------------------------------------------------
// Extrema
// ---------------------------------------------------------------------------

/// Raw-data extrema tracked alongside the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchExtrema {
    /// Largest raw temperature
    pub t_max: f64,
    /// Smallest raw temperature
    pub t_min: f64,
    /// Largest speed
    pub u_abs: f64,
    /// Largest solver node spacing
    pub dx_max: f64,
}

impl BatchExtrema {
    /// Neutral element of [`BatchExtrema::combine`].
    pub fn identity() -> Self {
        Self {
            t_max: f64::NEG_INFINITY,
            t_min: f64::INFINITY,
            u_abs: 0.0,
            dx_max: 0.0,
        }
    }

    /// Extrema of one chunk, before the field is rescaled.
    pub fn of_chunk(chunk: &SourceChunk) -> Self {
        let batch = &chunk.batch;
        let mut out = Self::identity();
        for &t in &batch.field {
            out.t_max = out.t_max.max(t);
            out.t_min = out.t_min.min(t);
        }
        for ((u, v), w) in batch.ux.iter().zip(&batch.uy).zip(&batch.uz) {
            out.u_abs = out.u_abs.max((u * u + v * v + w * w).sqrt());
        }
        out.dx_max = chunk.max_node_spacing;
        out
    }

    /// Pointwise max (min for `t_min`).
    pub fn combine(&mut self, other: &BatchExtrema) {
        self.t_max = self.t_max.max(other.t_max);
        self.t_min = self.t_min.min(other.t_min);
        self.u_abs = self.u_abs.max(other.u_abs);
        self.dx_max = self.dx_max.max(other.dx_max);
    }
}

/// Map raw temperature in `[-A/2, A/2]` onto the field range `[0, 1]`.
pub fn renormalize_temperature(field: &mut [f64], atwood: f64) {
    let low = -atwood / 2.0;
    for t in field.iter_mut() {
        *t = (*t - low) / atwood;
    }
}

// ---------------------------------------------------------------------------
// Map / reduce
// ---------------------------------------------------------------------------

/// Everything a job needs besides its own element range
#[derive(Debug, Clone)]
pub struct MapContext {
    /// Target lattice
    pub lattice: UniformLattice,
    /// Resampled element order
    pub order: usize,
    /// Settings for private targets
    pub settings: TargetSettings,
    /// Atwood number used to rescale temperature
    pub atwood: f64,
}

/// Output of one job, or of several jobs already reduced
#[derive(Debug)]
pub struct PartialResult {
    /// Raw-data extrema
    pub extrema: BatchExtrema,
    /// Private target; `None` when jobs add into a shared target
    pub target: Option<AggregationTarget>,
}

impl PartialResult {
    /// Result of no jobs at all.
    pub fn empty() -> Self {
        Self {
            extrema: BatchExtrema::identity(),
            target: None,
        }
    }
}

/// Read, rescale and ingest the elements of one job.
pub fn map_job(
    job: Job,
    sources: &[Arc<dyn ElementSource>],
    ctx: &MapContext,
) -> Result<PartialResult, FrameError> {
    let start = Instant::now();
    let source = sources
        .get(job.source)
        .ok_or_else(|| FrameError::Config(format!("job refers to missing source {}", job.source)))?;

    let chunk = source
        .read(job.elements.clone())
        .map_err(|error| FrameError::Source {
            name: source.name().to_string(),
            error,
        })?;
    let extrema = BatchExtrema::of_chunk(&chunk);

    let mut batch: ElementBatch = chunk.batch;
    renormalize_temperature(&mut batch.field, ctx.atwood);

    let target = match job.target {
        TargetSlot::Shared(shared) => {
            shared.add(&batch)?;
            None
        }
        TargetSlot::Private => {
            let private = AggregationTarget::new(ctx.order, ctx.lattice.clone(), ctx.settings)?;
            private.add(&batch)?;
            Some(private)
        }
    };

    tracing::debug!(
        "Job {}[{}..{}]: {} elements in {:.3}ms",
        source.name(),
        job.elements.start,
        job.elements.end,
        batch.len(),
        start.elapsed().as_secs_f64() * 1e3,
    );

    Ok(PartialResult { extrema, target })
}

/// Fold `part` into `whole`.
pub fn reduce(whole: &mut PartialResult, part: PartialResult) -> Result<(), AggregationError> {
    whole.extrema.combine(&part.extrema);
    if let Some(theirs) = part.target {
        match whole.target.as_mut() {
            Some(mine) => mine.combine(theirs)?,
            None => whole.target = Some(theirs),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;

    fn source(elements: usize) -> Arc<dyn ElementSource> {
        let mut batch = ElementBatch::new(1);
        for e in 0..elements {
            batch
                .push_element([e as f64, 0.0, 0.0], &[0.0], &[0.0], &[0.0], &[0.0])
                .unwrap();
        }
        Arc::new(InMemorySource::new(format!("src{elements}"), 1.0, batch, 0.1).unwrap())
    }

    fn ranges(jobs: &[Job]) -> Vec<(usize, Range<usize>)> {
        jobs.iter().map(|j| (j.source, j.elements.clone())).collect()
    }

    #[test]
    fn one_thread_one_job_per_source() {
        let sources = vec![source(10), source(7)];
        let jobs = build_jobs(&sources, 1, None);
        assert_eq!(ranges(&jobs), vec![(0, 0..10), (1, 0..7)]);
        assert!(jobs.iter().all(|j| matches!(j.target, TargetSlot::Private)));
    }

    #[test]
    fn threads_split_sources() {
        let sources = vec![source(10), source(7)];
        // 1 + (5 - 1) / 2 = 3 jobs per source.
        let jobs = build_jobs(&sources, 5, None);
        assert_eq!(
            ranges(&jobs),
            vec![(0, 0..4), (0, 4..8), (0, 8..10), (1, 0..3), (1, 3..6), (1, 6..7)]
        );
    }

    #[test]
    fn empty_ranges_dropped() {
        let sources = vec![source(2), source(0)];
        let jobs = build_jobs(&sources, 4, None);
        assert_eq!(ranges(&jobs), vec![(0, 0..1), (0, 1..2)]);
    }

    #[test]
    fn extrema_combine() {
        let mut a = BatchExtrema::identity();
        a.combine(&BatchExtrema {
            t_max: 0.2,
            t_min: -0.1,
            u_abs: 1.0,
            dx_max: 0.5,
        });
        a.combine(&BatchExtrema {
            t_max: 0.1,
            t_min: -0.3,
            u_abs: 2.0,
            dx_max: 0.25,
        });
        assert_eq!(
            a,
            BatchExtrema {
                t_max: 0.2,
                t_min: -0.3,
                u_abs: 2.0,
                dx_max: 0.5
            }
        );
    }

    #[test]
    fn renormalize_maps_to_unit_interval() {
        let mut field = vec![-0.05, 0.0, 0.05];
        renormalize_temperature(&mut field, 0.1);
        assert!((field[0] - 0.0).abs() < 1e-12);
        assert!((field[1] - 0.5).abs() < 1e-12);
        assert!((field[2] - 1.0).abs() < 1e-12);
    }
}
