//! Fixed-size worker pool running map jobs on OS threads.
//!
//! Workers pull jobs from a shared queue and store each result in the slot of
//! its job. Once every worker has been joined, results are reduced on the
//! calling thread in job order, so the reduction itself is sequential and
//! deterministic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::mapreduce::{map_job, reduce, Job, MapContext, PartialResult};
use crate::source::ElementSource;
use crate::FrameError;

type JobResult = Result<PartialResult, FrameError>;

/// Run `jobs` on up to `threads` workers and reduce their results.
///
/// The first error in job order is returned. A worker that panics is
/// reported as [`FrameError::WorkerPanicked`].
pub fn run_jobs(
    jobs: Vec<Job>,
    sources: &[Arc<dyn ElementSource>],
    ctx: &MapContext,
    threads: usize,
) -> Result<PartialResult, FrameError> {
    let n_jobs = jobs.len();
    if n_jobs == 0 {
        return Ok(PartialResult::empty());
    }
    let n_workers = threads.clamp(1, n_jobs);

    let queue: Arc<Mutex<VecDeque<(usize, Job)>>> =
        Arc::new(Mutex::new(jobs.into_iter().enumerate().collect()));
    let results: Arc<Mutex<Vec<Option<JobResult>>>> =
        Arc::new(Mutex::new((0..n_jobs).map(|_| None).collect()));
    let sources: Arc<[Arc<dyn ElementSource>]> = sources.into();
    let ctx = Arc::new(ctx.clone());

    let mut handles = Vec::with_capacity(n_workers);
    for worker in 0..n_workers {
        let queue = Arc::clone(&queue);
        let results = Arc::clone(&results);
        let sources = Arc::clone(&sources);
        let ctx = Arc::clone(&ctx);

        let handle = thread::spawn(move || {
            let mut done = 0usize;
            loop {
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some((index, job)) = next else {
                    break;
                };
                let result = map_job(job, &sources, &ctx);
                results.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(result);
                done += 1;
            }
            tracing::debug!("Worker {} finished {} jobs", worker, done);
        });
        handles.push(handle);
    }

    // Join every worker before looking at results, even after a panic.
    let mut panicked = false;
    for handle in handles {
        if handle.join().is_err() {
            panicked = true;
        }
    }
    if panicked {
        return Err(FrameError::WorkerPanicked);
    }

    let results = match Arc::try_unwrap(results) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
        Err(_) => return Err(FrameError::WorkerPanicked),
    };

    let mut whole = PartialResult::empty();
    for result in results {
        let part = result.ok_or(FrameError::WorkerPanicked)??;
        reduce(&mut whole, part)?;
    }
    Ok(whole)
}
