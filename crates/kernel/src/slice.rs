//! Fixed diagnostic planes cut through the lattice.
//!
//! Two cuts are kept: the y-normal plane at the lattice's middle y index (field
//! only) and the z-normal plane at its middle z index (field, the three
//! velocity components and a central-difference `∂uz/∂z`). Writes are
//! last-write-wins and every plane tracks which cells have been written.

use crate::batch::{node_index, ElementBatch};
use crate::lattice::UniformLattice;

// ---------------------------------------------------------------------------
// Plane
// ---------------------------------------------------------------------------

/// A 2-D array of `nx × ny` values (first index fastest) with a written mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    nx: usize,
    ny: usize,
    values: Vec<f64>,
    written: Vec<bool>,
}

impl Plane {
    /// Zeroed, unwritten plane.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            values: vec![0.0; nx * ny],
            written: vec![false; nx * ny],
        }
    }

    /// `(nx, ny)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Raw values, first index fastest.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(i, j)`; unwritten cells read as zero.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i + self.nx * j]
    }

    /// Overwrite cell `(i, j)`. Indices outside the plane are ignored.
    pub fn set_at(&mut self, i: i64, j: i64, value: f64) {
        if i < 0 || j < 0 || i as usize >= self.nx || j as usize >= self.ny {
            return;
        }
        let idx = i as usize + self.nx * j as usize;
        self.values[idx] = value;
        self.written[idx] = true;
    }

    /// Whether `(i, j)` has ever been written.
    pub fn is_written(&self, i: usize, j: usize) -> bool {
        self.written[i + self.nx * j]
    }

    /// Number of written cells.
    pub fn written_count(&self) -> usize {
        self.written.iter().filter(|&&w| w).count()
    }

    /// Copy every written cell of `other` into `self`.
    pub fn overlay(&mut self, other: &Plane) {
        debug_assert_eq!(self.dims(), other.dims());
        for (idx, &w) in other.written.iter().enumerate() {
            if w {
                self.values[idx] = other.values[idx];
                self.written[idx] = true;
            }
        }
    }

    /// Mean of the squared values over the whole plane.
    pub fn mean_square(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|v| v * v).sum::<f64>() / self.values.len() as f64
    }
}

// ---------------------------------------------------------------------------
// DiagnosticSlices
// ---------------------------------------------------------------------------

/// The fixed diagnostic cuts of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSlices {
    /// y index of the y-normal cut.
    pub y_index: usize,
    /// z index of the z-normal cuts.
    pub z_index: usize,
    /// Field on the y-normal cut, `shape.x × shape.z`.
    pub y_normal: Plane,
    /// Field on the z-normal cut, `shape.x × shape.y`.
    pub z_normal: Plane,
    /// Velocity components on the z-normal cut.
    pub z_velocity: [Plane; 3],
    /// Central-difference `∂uz/∂z` on the z-normal cut.
    pub z_dwdz: Plane,
}

impl DiagnosticSlices {
    /// Empty slices positioned at the lattice's middle indices.
    pub fn new(lattice: &UniformLattice) -> Self {
        let [nx, ny, nz] = lattice.shape();
        Self {
            y_index: lattice.mid_y_index(),
            z_index: lattice.mid_z_index(),
            y_normal: Plane::new(nx, nz),
            z_normal: Plane::new(nx, ny),
            z_velocity: [Plane::new(nx, ny), Plane::new(nx, ny), Plane::new(nx, ny)],
            z_dwdz: Plane::new(nx, ny),
        }
    }

    /// Whether an element rooted at `root` crosses either cut of `lattice`.
    pub fn touches(lattice: &UniformLattice, root: [i64; 3], order: usize) -> bool {
        offset_within(lattice.mid_y_index(), root[1], order).is_some()
            || offset_within(lattice.mid_z_index(), root[2], order).is_some()
    }

    /// Write the nodes of element `e` that lie on either cut.
    pub fn write_element(&mut self, batch: &ElementBatch, e: usize, root: [i64; 3], spacing: f64) {
        let order = batch.order();
        let field = batch.element_field(e);

        if let Some(yoff) = offset_within(self.y_index, root[1], order) {
            for k in 0..order {
                for i in 0..order {
                    self.y_normal.set_at(
                        root[0] + i as i64,
                        root[2] + k as i64,
                        field[node_index(order, i, yoff, k)],
                    );
                }
            }
        }

        if let Some(zoff) = offset_within(self.z_index, root[2], order) {
            let (ux, uy, uz) = batch.element_velocity(e);
            let has_neighbours = zoff >= 1 && zoff + 1 < order;
            for j in 0..order {
                for i in 0..order {
                    let n = node_index(order, i, j, zoff);
                    let (pi, pj) = (root[0] + i as i64, root[1] + j as i64);
                    self.z_normal.set_at(pi, pj, field[n]);
                    self.z_velocity[0].set_at(pi, pj, ux[n]);
                    self.z_velocity[1].set_at(pi, pj, uy[n]);
                    self.z_velocity[2].set_at(pi, pj, uz[n]);
                    if has_neighbours {
                        let above = uz[node_index(order, i, j, zoff + 1)];
                        let below = uz[node_index(order, i, j, zoff - 1)];
                        self.z_dwdz.set_at(pi, pj, (above - below) / (2.0 * spacing));
                    }
                }
            }
        }
    }

    /// Take every written cell of `other`.
    pub fn overlay(&mut self, other: &DiagnosticSlices) {
        self.y_normal.overlay(&other.y_normal);
        self.z_normal.overlay(&other.z_normal);
        for (mine, theirs) in self.z_velocity.iter_mut().zip(&other.z_velocity) {
            mine.overlay(theirs);
        }
        self.z_dwdz.overlay(&other.z_dwdz);
    }
}

/// Offset of the cut inside the element, if the element spans it.
fn offset_within(cut: usize, root: i64, order: usize) -> Option<usize> {
    let off = cut as i64 - root;
    (off >= 0 && (off as usize) < order).then_some(off as usize)
}
