//! Nearest-interface distance search from a fixed set of random probes.
//!
//! Each probe tracks the distance to the closest node seen so far on each side
//! of the interface (field above or below one half). For every incoming batch
//! the probe ranks elements by anchor distance, scans the nearest few first
//! and stops as soon as no remaining element can tighten either distance.

use std::cmp::Ordering;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::batch::{node_index, ElementBatch};
use crate::error::AggregationError;
use crate::lattice::UniformLattice;
use crate::lock;

fn default_count() -> usize {
    1000
}

fn default_candidates() -> usize {
    10
}

/// How the probe set is drawn and searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Number of probes.
    #[serde(default = "default_count")]
    pub count: usize,
    /// RNG seed for the probe positions.
    #[serde(default)]
    pub seed: u64,
    /// Nearest elements scanned before the remaining ones are sorted.
    #[serde(default = "default_candidates")]
    pub candidates: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            count: default_count(),
            seed: 0,
            candidates: default_candidates(),
        }
    }
}

/// Closest distances seen so far on each side of the interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterfaceDistance {
    /// Distance to the nearest node with `field > 0.5`.
    pub heavy: f64,
    /// Distance to the nearest node with `field < 0.5`.
    pub light: f64,
}

impl InterfaceDistance {
    /// Both sides at `d`.
    pub fn uniform(d: f64) -> Self {
        Self { heavy: d, light: d }
    }

    /// Conservative bound used for pruning.
    pub fn bound(&self) -> f64 {
        self.heavy.max(self.light)
    }

    /// Min-reduce with another pair of distances.
    pub fn tighten(&mut self, heavy: f64, light: f64) {
        self.heavy = self.heavy.min(heavy);
        self.light = self.light.min(light);
    }
}

/// Randomly placed probes with per-probe locked distances.
#[derive(Debug)]
pub struct InterfaceProbeSet {
    positions: Vec<[f64; 3]>,
    distances: Vec<Mutex<InterfaceDistance>>,
    candidates: usize,
    diagonal: f64,
}

impl InterfaceProbeSet {
    /// Draw `settings.count` probes inside the lattice domain.
    ///
    /// Each coordinate is `origin + extent·(z + 3)/6` with `z` standard normal,
    /// redrawn until it falls strictly inside the domain. The same seed always
    /// gives the same positions.
    pub fn new(lattice: &UniformLattice, settings: &ProbeSettings) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed);
        let origin = lattice.origin();
        let extent = lattice.extent();
        let diagonal = lattice.diagonal();

        let positions: Vec<[f64; 3]> = (0..settings.count)
            .map(|_| {
                let mut p = [0.0; 3];
                for axis in 0..3 {
                    p[axis] = origin[axis] + extent[axis] * interior_sample(&mut rng);
                }
                p
            })
            .collect();
        let distances = positions
            .iter()
            .map(|_| Mutex::new(InterfaceDistance::uniform(diagonal)))
            .collect();

        Self {
            positions,
            distances,
            candidates: settings.candidates,
            diagonal,
        }
    }

    /// Number of probes.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Return `true` if there are no probes.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Probe positions.
    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    /// Snapshot of the current distances.
    pub fn distances(&self) -> Vec<InterfaceDistance> {
        self.distances.iter().map(|d| *lock(d)).collect()
    }

    /// Whether both sets have the same probes at the same positions.
    pub fn same_layout(&self, other: &InterfaceProbeSet) -> bool {
        self.positions == other.positions
    }

    /// Tighten every probe against the nodes of `batch`.
    ///
    /// Nodes sit at `anchor + spacing·(i, j, k)`. Nodes with the field exactly
    /// at one half count for neither side. A malformed batch is rejected before
    /// any probe is touched.
    pub fn search(&self, batch: &ElementBatch, spacing: f64) -> Result<(), AggregationError> {
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }
        let pad = batch.order() as f64 * spacing * 3f64.sqrt();
        let mut ranked: Vec<(f64, usize)> = Vec::with_capacity(batch.len());

        for (p, probe) in self.positions.iter().enumerate() {
            ranked.clear();
            ranked.extend((0..batch.len()).map(|e| (distance(probe, &batch.anchor(e)), e)));

            let k = self.candidates.min(ranked.len());
            if k < ranked.len() {
                ranked.select_nth_unstable_by(k, by_distance);
            }
            ranked[..k].sort_unstable_by(by_distance);
            if self.scan(p, &ranked[..k], batch, spacing, pad) {
                continue;
            }
            ranked[k..].sort_unstable_by(by_distance);
            self.scan(p, &ranked[k..], batch, spacing, pad);
        }
        Ok(())
    }

    /// Scan ranked elements for probe `p`; returns `true` once pruned.
    fn scan(
        &self,
        p: usize,
        ranked: &[(f64, usize)],
        batch: &ElementBatch,
        spacing: f64,
        pad: f64,
    ) -> bool {
        let probe = &self.positions[p];
        let order = batch.order();

        for &(anchor_distance, e) in ranked {
            let bound = lock(&self.distances[p]).bound();
            if bound < anchor_distance - pad {
                return true;
            }

            let anchor = batch.anchor(e);
            let field = batch.element_field(e);
            let mut heavy = f64::INFINITY;
            let mut light = f64::INFINITY;
            for k in 0..order {
                for j in 0..order {
                    for i in 0..order {
                        let side = field[node_index(order, i, j, k)] - 0.5;
                        if side == 0.0 || side.is_nan() {
                            continue;
                        }
                        let node = [
                            anchor[0] + spacing * i as f64,
                            anchor[1] + spacing * j as f64,
                            anchor[2] + spacing * k as f64,
                        ];
                        let d = distance(probe, &node);
                        if side > 0.0 {
                            heavy = heavy.min(d);
                        } else {
                            light = light.min(d);
                        }
                    }
                }
            }
            lock(&self.distances[p]).tighten(heavy, light);
        }
        false
    }

    /// Min-reduce another probe set with identical positions into this one.
    pub fn merge_from(&mut self, other: InterfaceProbeSet) -> Result<(), AggregationError> {
        if !self.same_layout(&other) {
            return Err(AggregationError::ProbeMismatch);
        }
        for (mine, theirs) in self.distances.iter_mut().zip(other.distances) {
            let theirs = theirs.into_inner().unwrap_or_else(|e| e.into_inner());
            mine.get_mut()
                .unwrap_or_else(|e| e.into_inner())
                .tighten(theirs.heavy, theirs.light);
        }
        Ok(())
    }

    /// `max(heavy, light)` per probe, divided by the domain diagonal.
    pub fn separations(&self) -> Vec<f64> {
        self.distances
            .iter()
            .map(|d| lock(d).bound() / self.diagonal)
            .collect()
    }
}

/// One coordinate in `(0, 1)` from a normal centred on the domain middle.
fn interior_sample(rng: &mut StdRng) -> f64 {
    loop {
        let z: f64 = rng.sample(StandardNormal);
        let u = (z + 3.0) / 6.0;
        if u > 0.0 && u < 1.0 {
            return u;
        }
    }
}

#[inline]
fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

fn by_distance(a: &(f64, usize), b: &(f64, usize)) -> Ordering {
    a.0.total_cmp(&b.0)
}
