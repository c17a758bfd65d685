//! Element batches in struct-of-arrays layout.

use std::ops::Range;

use crate::error::AggregationError;

/// Flat index of node `(i, j, k)` inside one `order³` element block (x fastest).
#[inline]
pub fn node_index(order: usize, i: usize, j: usize, k: usize) -> usize {
    i + order * (j + order * k)
}

/// A batch of resampled spectral elements.
///
/// Anchor arrays hold one entry per element. The nodal arrays hold `order³`
/// entries per element, element blocks contiguous and laid out with
/// [`node_index`]. Node `(i, j, k)` of element `e` sits at
/// `anchor(e) + spacing * (i, j, k)`.
#[derive(Debug, Clone)]
pub struct ElementBatch {
    order: usize,

    // ---- Anchors ----
    /// Anchor x coordinates
    pub anchor_x: Vec<f64>,
    /// Anchor y coordinates
    pub anchor_y: Vec<f64>,
    /// Anchor z coordinates
    pub anchor_z: Vec<f64>,

    // ---- Nodal fields ----
    /// Scalar concentration field
    pub field: Vec<f64>,
    /// X velocity
    pub ux: Vec<f64>,
    /// Y velocity
    pub uy: Vec<f64>,
    /// Z velocity
    pub uz: Vec<f64>,
}

impl ElementBatch {
    /// Create an empty batch for elements with `order` nodes per axis.
    pub fn new(order: usize) -> Self {
        Self {
            order,
            anchor_x: Vec::new(),
            anchor_y: Vec::new(),
            anchor_z: Vec::new(),
            field: Vec::new(),
            ux: Vec::new(),
            uy: Vec::new(),
            uz: Vec::new(),
        }
    }

    /// Resampled nodes per element per axis.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Nodes in one element block.
    pub fn nodes_per_element(&self) -> usize {
        self.order * self.order * self.order
    }

    /// Number of elements (anchor count).
    pub fn len(&self) -> usize {
        self.anchor_x.len()
    }

    /// Return `true` if the batch holds no elements.
    pub fn is_empty(&self) -> bool {
        self.anchor_x.is_empty()
    }

    /// Check that every array matches the anchor count.
    pub fn validate(&self) -> Result<(), AggregationError> {
        if self.order == 0 {
            return Err(AggregationError::InvalidOrder(0));
        }
        let n = self.anchor_x.len();
        check_len("anchor_y", n, self.anchor_y.len())?;
        check_len("anchor_z", n, self.anchor_z.len())?;

        let nodes = n * self.nodes_per_element();
        check_len("field", nodes, self.field.len())?;
        check_len("ux", nodes, self.ux.len())?;
        check_len("uy", nodes, self.uy.len())?;
        check_len("uz", nodes, self.uz.len())?;
        Ok(())
    }

    /// Anchor of element `e`.
    #[inline]
    pub fn anchor(&self, e: usize) -> [f64; 3] {
        [self.anchor_x[e], self.anchor_y[e], self.anchor_z[e]]
    }

    /// Scalar field block of element `e`.
    pub fn element_field(&self, e: usize) -> &[f64] {
        &self.field[self.block(e)]
    }

    /// Velocity blocks `(ux, uy, uz)` of element `e`.
    pub fn element_velocity(&self, e: usize) -> (&[f64], &[f64], &[f64]) {
        let block = self.block(e);
        (
            &self.ux[block.clone()],
            &self.uy[block.clone()],
            &self.uz[block],
        )
    }

    fn block(&self, e: usize) -> Range<usize> {
        let m = self.nodes_per_element();
        e * m..(e + 1) * m
    }

    /// Append one element. Every nodal slice must hold exactly `order³` values.
    pub fn push_element(
        &mut self,
        anchor: [f64; 3],
        field: &[f64],
        ux: &[f64],
        uy: &[f64],
        uz: &[f64],
    ) -> Result<(), AggregationError> {
        let m = self.nodes_per_element();
        check_len("field", m, field.len())?;
        check_len("ux", m, ux.len())?;
        check_len("uy", m, uy.len())?;
        check_len("uz", m, uz.len())?;

        self.anchor_x.push(anchor[0]);
        self.anchor_y.push(anchor[1]);
        self.anchor_z.push(anchor[2]);
        self.field.extend_from_slice(field);
        self.ux.extend_from_slice(ux);
        self.uy.extend_from_slice(uy);
        self.uz.extend_from_slice(uz);
        Ok(())
    }

    /// Copy out the elements in `range`.
    ///
    /// The batch must be valid and `range` within `0..len()`.
    pub fn select(&self, range: Range<usize>) -> ElementBatch {
        let m = self.nodes_per_element();
        let nodes = range.start * m..range.end * m;
        ElementBatch {
            order: self.order,
            anchor_x: self.anchor_x[range.clone()].to_vec(),
            anchor_y: self.anchor_y[range.clone()].to_vec(),
            anchor_z: self.anchor_z[range].to_vec(),
            field: self.field[nodes.clone()].to_vec(),
            ux: self.ux[nodes.clone()].to_vec(),
            uy: self.uy[nodes.clone()].to_vec(),
            uz: self.uz[nodes].to_vec(),
        }
    }
}

fn check_len(array: &'static str, expected: usize, actual: usize) -> Result<(), AggregationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AggregationError::ShapeMismatch {
            array,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_element(order: usize, value: f64) -> Vec<f64> {
        vec![value; order * order * order]
    }

    #[test]
    fn empty_batch() {
        let batch = ElementBatch::new(3);
        assert_eq!(batch.len(), 0);
        assert!(batch.is_empty());
        assert!(batch.validate().is_ok());
        assert_eq!(batch.nodes_per_element(), 27);
    }

    #[test]
    fn push_and_view() {
        let mut batch = ElementBatch::new(2);
        let field: Vec<f64> = (0..8).map(|n| n as f64).collect();
        let zero = uniform_element(2, 0.0);
        batch
            .push_element([1.0, 2.0, 3.0], &field, &zero, &zero, &zero)
            .unwrap();
        batch
            .push_element([4.0, 5.0, 6.0], &uniform_element(2, 0.5), &zero, &zero, &zero)
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.anchor(1), [4.0, 5.0, 6.0]);
        assert_eq!(batch.element_field(0)[node_index(2, 1, 0, 1)], 5.0);
        assert_eq!(batch.element_field(1), &[0.5; 8]);
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn push_rejects_short_block() {
        let mut batch = ElementBatch::new(2);
        let zero = uniform_element(2, 0.0);
        let err = batch
            .push_element([0.0; 3], &[0.0; 7], &zero, &zero, &zero)
            .unwrap_err();
        assert_eq!(
            err,
            AggregationError::ShapeMismatch {
                array: "field",
                expected: 8,
                actual: 7
            }
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn validate_names_the_bad_array() {
        let mut batch = ElementBatch::new(2);
        let zero = uniform_element(2, 0.0);
        batch.push_element([0.0; 3], &zero, &zero, &zero, &zero).unwrap();
        batch.uy.extend_from_slice(&zero);

        let err = batch.validate().unwrap_err();
        assert_eq!(
            err,
            AggregationError::ShapeMismatch {
                array: "uy",
                expected: 8,
                actual: 16
            }
        );
    }

    #[test]
    fn select_copies_element_range() {
        let mut batch = ElementBatch::new(1);
        for e in 0..5 {
            let v = [e as f64];
            batch.push_element([e as f64, 0.0, 0.0], &v, &v, &v, &v).unwrap();
        }
        let part = batch.select(1..3);
        assert_eq!(part.len(), 2);
        assert_eq!(part.anchor_x, vec![1.0, 2.0]);
        assert_eq!(part.field, vec![1.0, 2.0]);
        assert!(part.validate().is_ok());
    }
}
