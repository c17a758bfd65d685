//! The aggregation target: global statistics accumulated over many batches.
//!
//! [`AggregationTarget::add`] takes `&self` and may be called from any number
//! of threads at once. Each independent statistic sits behind its own mutex and
//! every per-batch reduction is computed before the matching lock is taken, so
//! critical sections are a handful of additions. [`AggregationTarget::combine`]
//! folds a second target in sequentially through `&mut self` without locking.
//!
//! Sums, the histogram, the vertical profile and the probe minima do not depend
//! on the order batches arrive in (up to floating-point summation order). The
//! diagnostic slices and the captured field are last-write-wins.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::batch::{node_index, ElementBatch};
use crate::covering::ScalarField;
use crate::error::AggregationError;
use crate::histogram::PhaseHistogram;
use crate::lattice::UniformLattice;
use crate::lock;
use crate::probe::{InterfaceProbeSet, ProbeSettings};
use crate::slice::DiagnosticSlices;

/// Optional parts of a target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetSettings {
    /// Track nearest-interface distances from a random probe set.
    pub probes: Option<ProbeSettings>,
    /// Keep a full copy of the field on the lattice.
    pub capture_field: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    mass_fraction: f64,
    kinetic: f64,
    nodes: u64,
}

#[derive(Debug)]
struct FieldCapture {
    field: ScalarField,
    written: Vec<bool>,
}

impl FieldCapture {
    fn overlay(&mut self, other: &FieldCapture) {
        let shape = self.field.shape();
        for (idx, &w) in other.written.iter().enumerate() {
            if w {
                let i = idx % shape[0];
                let j = (idx / shape[0]) % shape[1];
                let k = idx / (shape[0] * shape[1]);
                self.field.set(i, j, k, other.field.values()[idx]);
                self.written[idx] = true;
            }
        }
    }
}

/// Owned snapshot of the order-invariant aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Σ `min(2f, 2(1 − f))` over ingested nodes.
    pub mass_fraction: f64,
    /// Σ `|u|²` over ingested nodes.
    pub kinetic_energy: f64,
    /// Number of ingested nodes.
    pub nodes: u64,
    /// Histogram of field values.
    pub pdf: PhaseHistogram,
    /// Field summed over each z-level.
    pub profile: Vec<f64>,
}

/// Global statistics for one lattice and one resampled element order.
#[derive(Debug)]
pub struct AggregationTarget {
    order: usize,
    lattice: UniformLattice,
    totals: Mutex<Totals>,
    pdf: Mutex<PhaseHistogram>,
    profile: Mutex<Vec<f64>>,
    slices: Mutex<DiagnosticSlices>,
    probes: Option<InterfaceProbeSet>,
    capture: Option<Mutex<FieldCapture>>,
}

impl AggregationTarget {
    /// Empty target for elements of `order` nodes per axis.
    pub fn new(
        order: usize,
        lattice: UniformLattice,
        settings: TargetSettings,
    ) -> Result<Self, AggregationError> {
        if order == 0 {
            return Err(AggregationError::InvalidOrder(order));
        }
        let shape = lattice.shape();
        let probes = settings
            .probes
            .map(|p| InterfaceProbeSet::new(&lattice, &p));
        let capture = settings.capture_field.then(|| {
            Mutex::new(FieldCapture {
                field: ScalarField::filled(shape, 0.0),
                written: vec![false; lattice.node_count()],
            })
        });

        tracing::debug!(
            order,
            shape = ?shape,
            probes = probes.as_ref().map_or(0, |p| p.len()),
            capture = settings.capture_field,
            "aggregation target created"
        );

        Ok(Self {
            order,
            totals: Mutex::new(Totals::default()),
            pdf: Mutex::new(PhaseHistogram::new()),
            profile: Mutex::new(vec![0.0; shape[2]]),
            slices: Mutex::new(DiagnosticSlices::new(&lattice)),
            probes,
            capture,
            lattice,
        })
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Fold one batch of resampled elements into the target.
    ///
    /// The batch is validated before any lock is taken; a rejected batch
    /// leaves the target untouched.
    pub fn add(&self, batch: &ElementBatch) -> Result<(), AggregationError> {
        batch.validate()?;
        if batch.order() != self.order {
            return Err(AggregationError::OrderMismatch {
                expected: self.order,
                actual: batch.order(),
            });
        }
        if batch.is_empty() {
            return Ok(());
        }

        // ---- Aggregates ----
        let t0 = Instant::now();
        let mut partial_pdf = PhaseHistogram::new();
        partial_pdf.add_values(&batch.field);
        lock(&self.pdf).merge(&partial_pdf)?;

        let mass_fraction: f64 = batch
            .field
            .iter()
            .map(|&f| (2.0 * f).min(2.0 * (1.0 - f)))
            .sum();
        let kinetic: f64 = batch
            .ux
            .iter()
            .zip(&batch.uy)
            .zip(&batch.uz)
            .map(|((u, v), w)| u * u + v * v + w * w)
            .sum();
        {
            let mut totals = lock(&self.totals);
            totals.mass_fraction += mass_fraction;
            totals.kinetic += kinetic;
            totals.nodes += batch.field.len() as u64;
        }
        let aggregate_time = t0.elapsed();

        // ---- Probes ----
        let t1 = Instant::now();
        if let Some(probes) = &self.probes {
            probes.search(batch, self.lattice.spacing())?;
        }
        let probe_time = t1.elapsed();

        // ---- Placement ----
        let t2 = Instant::now();
        self.place(batch);
        let place_time = t2.elapsed();

        tracing::trace!(
            elements = batch.len(),
            aggregate_us = aggregate_time.as_micros() as u64,
            probe_us = probe_time.as_micros() as u64,
            place_us = place_time.as_micros() as u64,
            "batch added"
        );
        Ok(())
    }

    /// Vertical profile, slices and captured field for a validated batch.
    fn place(&self, batch: &ElementBatch) {
        let order = self.order;
        let layer = order * order;
        let shape = self.lattice.shape();
        let nz = shape[2] as i64;

        let roots: Vec<[i64; 3]> = (0..batch.len())
            .map(|e| self.lattice.root_index(batch.anchor(e)))
            .collect();

        let mut profile = vec![0.0; shape[2]];
        let mut slice_hits = Vec::new();
        for (e, &root) in roots.iter().enumerate() {
            let field = batch.element_field(e);
            for k in 0..order {
                let z = root[2] + k as i64;
                if (0..nz).contains(&z) {
                    profile[z as usize] += field[k * layer..(k + 1) * layer].iter().sum::<f64>();
                }
            }
            if DiagnosticSlices::touches(&self.lattice, root, order) {
                slice_hits.push(e);
            }
        }

        {
            let mut target = lock(&self.profile);
            for (t, p) in target.iter_mut().zip(&profile) {
                *t += p;
            }
        }

        if !slice_hits.is_empty() {
            let spacing = self.lattice.spacing();
            let mut slices = lock(&self.slices);
            for &e in &slice_hits {
                slices.write_element(batch, e, roots[e], spacing);
            }
        }

        if let Some(capture) = &self.capture {
            let mut capture = lock(capture);
            for (e, &root) in roots.iter().enumerate() {
                let field = batch.element_field(e);
                for k in 0..order {
                    for j in 0..order {
                        for i in 0..order {
                            let p = [root[0] + i as i64, root[1] + j as i64, root[2] + k as i64];
                            if (0..3).any(|a| p[a] < 0 || p[a] >= shape[a] as i64) {
                                continue;
                            }
                            let (pi, pj, pk) = (p[0] as usize, p[1] as usize, p[2] as usize);
                            capture.field.set(pi, pj, pk, field[node_index(order, i, j, k)]);
                            capture.written[pi + shape[0] * (pj + shape[1] * pk)] = true;
                        }
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    /// Fold another target built over the same lattice and order into this one.
    ///
    /// Every compatibility check runs before anything is modified.
    pub fn combine(&mut self, part: AggregationTarget) -> Result<(), AggregationError> {
        if !self.lattice.same_geometry(&part.lattice) {
            return Err(AggregationError::LatticeMismatch);
        }
        if self.order != part.order {
            return Err(AggregationError::OrderMismatch {
                expected: self.order,
                actual: part.order,
            });
        }
        match (&self.probes, &part.probes) {
            (None, None) => {}
            (Some(mine), Some(theirs)) if mine.same_layout(theirs) => {}
            _ => return Err(AggregationError::ProbeMismatch),
        }
        if self.capture.is_some() != part.capture.is_some() {
            return Err(AggregationError::CaptureMismatch);
        }

        let AggregationTarget {
            totals,
            pdf,
            profile,
            slices,
            probes,
            capture,
            ..
        } = part;

        get_mut(&mut self.pdf).merge(&into_inner(pdf))?;
        if let (Some(mine), Some(theirs)) = (self.probes.as_mut(), probes) {
            mine.merge_from(theirs)?;
        }

        let theirs = into_inner(totals);
        let mine = get_mut(&mut self.totals);
        mine.mass_fraction += theirs.mass_fraction;
        mine.kinetic += theirs.kinetic;
        mine.nodes += theirs.nodes;

        for (t, p) in get_mut(&mut self.profile).iter_mut().zip(into_inner(profile)) {
            *t += p;
        }
        get_mut(&mut self.slices).overlay(&into_inner(slices));
        if let (Some(mine), Some(theirs)) = (self.capture.as_mut(), capture) {
            get_mut(mine).overlay(&into_inner(theirs));
        }

        tracing::debug!(nodes = get_mut(&mut self.totals).nodes, "targets combined");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// Resampled nodes per element per axis.
    pub fn order(&self) -> usize {
        self.order
    }

    /// The lattice this target places data on.
    pub fn lattice(&self) -> &UniformLattice {
        &self.lattice
    }

    /// Σ `min(2f, 2(1 − f))` over every ingested node.
    pub fn phase_mass_fraction(&self) -> f64 {
        lock(&self.totals).mass_fraction
    }

    /// Σ `ux² + uy² + uz²` over every ingested node.
    pub fn kinetic_energy_sum(&self) -> f64 {
        lock(&self.totals).kinetic
    }

    /// Number of ingested nodes.
    pub fn ingested_nodes(&self) -> u64 {
        lock(&self.totals).nodes
    }

    /// Copy of the field-value histogram.
    pub fn phase_pdf(&self) -> PhaseHistogram {
        lock(&self.pdf).clone()
    }

    /// Copy of the per-z-level field sums.
    pub fn vertical_profile(&self) -> Vec<f64> {
        lock(&self.profile).clone()
    }

    /// Copy of the diagnostic slices.
    pub fn slices(&self) -> DiagnosticSlices {
        lock(&self.slices).clone()
    }

    /// Probe set, when enabled.
    pub fn probes(&self) -> Option<&InterfaceProbeSet> {
        self.probes.as_ref()
    }

    /// Captured field shifted so the interface sits at zero.
    ///
    /// Points never written read as `-0.5`. `None` without field capture.
    pub fn interface_field(&self) -> Option<ScalarField> {
        self.capture
            .as_ref()
            .map(|c| lock(c).field.shifted(-0.5))
    }

    /// Number of lattice points written in the captured field.
    pub fn captured_points(&self) -> Option<usize> {
        self.capture
            .as_ref()
            .map(|c| lock(c).written.iter().filter(|&&w| w).count())
    }

    /// Snapshot of the aggregates that do not depend on batch order.
    pub fn statistics(&self) -> Statistics {
        let totals = *lock(&self.totals);
        Statistics {
            mass_fraction: totals.mass_fraction,
            kinetic_energy: totals.kinetic,
            nodes: totals.nodes,
            pdf: self.phase_pdf(),
            profile: self.vertical_profile(),
        }
    }
}

fn into_inner<T>(m: Mutex<T>) -> T {
    m.into_inner().unwrap_or_else(PoisonError::into_inner)
}

fn get_mut<T>(m: &mut Mutex<T>) -> &mut T {
    m.get_mut().unwrap_or_else(PoisonError::into_inner)
}
