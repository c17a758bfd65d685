//! Geometry of the uniform Cartesian target lattice.

use crate::error::AggregationError;

/// Uniform Cartesian lattice that resampled element data is placed on.
///
/// The spacing is isotropic and taken from the x extent; all root-index math
/// depends on it, so the lattice is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLattice {
    origin: [f64; 3],
    corner: [f64; 3],
    shape: [usize; 3],
    spacing: f64,
}

impl UniformLattice {
    /// Build a lattice spanning `[origin, corner)` with `shape` points per axis.
    pub fn new(
        origin: [f64; 3],
        corner: [f64; 3],
        shape: [usize; 3],
    ) -> Result<Self, AggregationError> {
        if shape.iter().any(|&n| n == 0) {
            return Err(AggregationError::InvalidLattice(format!(
                "shape {shape:?} has an empty axis"
            )));
        }
        for axis in 0..3 {
            if !(corner[axis] > origin[axis]) {
                return Err(AggregationError::InvalidLattice(format!(
                    "corner {corner:?} must exceed origin {origin:?} on every axis"
                )));
            }
        }
        let spacing = (corner[0] - origin[0]) / shape[0] as f64;
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(AggregationError::InvalidLattice(format!(
                "spacing {spacing} is not a positive finite number"
            )));
        }
        Ok(Self {
            origin,
            corner,
            shape,
            spacing,
        })
    }

    /// Lower corner of the domain.
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Upper corner of the domain.
    pub fn corner(&self) -> [f64; 3] {
        self.corner
    }

    /// Lattice points per axis.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Cell spacing (isotropic, from the x extent).
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Total number of lattice points.
    pub fn node_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Domain extent per axis.
    pub fn extent(&self) -> [f64; 3] {
        [
            self.corner[0] - self.origin[0],
            self.corner[1] - self.origin[1],
            self.corner[2] - self.origin[2],
        ]
    }

    /// Length of the domain diagonal; the initial probe distance.
    pub fn diagonal(&self) -> f64 {
        let e = self.extent();
        (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt()
    }

    /// Index of the fixed y-normal diagnostic slice.
    pub fn mid_y_index(&self) -> usize {
        (self.shape[1] as f64 / 2.0 + 0.5) as usize
    }

    /// Index of the fixed z-normal diagnostic slice.
    pub fn mid_z_index(&self) -> usize {
        (self.shape[2] as f64 / 2.0 + 0.5) as usize
    }

    /// Lattice index of an element anchor, rounded to the nearest point.
    ///
    /// May be negative or beyond the shape for anchors outside the domain;
    /// callers clip their writes.
    pub fn root_index(&self, anchor: [f64; 3]) -> [i64; 3] {
        let mut root = [0i64; 3];
        for axis in 0..3 {
            root[axis] = ((anchor[axis] - self.origin[axis]) / self.spacing + 0.5).floor() as i64;
        }
        root
    }

    /// Physical position of lattice point `index`.
    pub fn position(&self, index: [usize; 3]) -> [f64; 3] {
        [
            self.origin[0] + self.spacing * index[0] as f64,
            self.origin[1] + self.spacing * index[1] as f64,
            self.origin[2] + self.spacing * index[2] as f64,
        ]
    }

    /// Heights of the z-levels, evenly dividing `[origin.z, corner.z)`.
    pub fn z_levels(&self) -> Vec<f64> {
        let nz = self.shape[2];
        let lz = self.corner[2] - self.origin[2];
        (0..nz)
            .map(|k| self.origin[2] + lz * k as f64 / nz as f64)
            .collect()
    }

    /// Whether two lattices describe exactly the same grid.
    pub fn same_geometry(&self, other: &UniformLattice) -> bool {
        self.origin == other.origin && self.corner == other.corner && self.shape == other.shape
    }
}
