//! Synthetic frames: analytical fields sampled on resampled element nodes.
//!
//! Element `(ex, ey, ez)` is anchored at `root_mesh + e·order·dx` and holds
//! nodes `anchor + dx·(i, j, k)`, so every lattice point is covered exactly
//! once. The field is written as raw temperature `A·(f - 1/2)`, the same units
//! a solver file would carry.

use std::f64::consts::PI;
use std::sync::Arc;

use kernel::{node_index, ElementBatch};
use orchestrator::{ElementSource, InMemorySource, PostConfig};

use crate::analytical::PlanarInterface;

/// One frame of a planar mixing layer with a rotating horizontal shear.
///
/// The velocity is `u = U·(sin(2πx/Lx), 0, cos(2πx/Lx))`, so `|u| = U` at
/// every node.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    /// Configuration describing mesh, lattice and analysis options
    pub config: PostConfig,
    /// Interface the field is sampled from
    pub interface: PlanarInterface,
    /// Velocity magnitude U
    pub speed: f64,
    /// Number of sources the elements are split across
    pub files: usize,
    /// Simulation time reported by every source
    pub time: f64,
}

impl SyntheticFrame {
    /// Sample the frame into `files` in-memory sources of contiguous elements.
    pub fn sources(&self) -> Result<Vec<Arc<dyn ElementSource>>, String> {
        if self.files == 0 {
            return Err("a synthetic frame needs at least one file".to_string());
        }
        let lattice = self.config.lattice().map_err(|e| e.to_string())?;
        let order = self.config.resampled_order();
        let dx = lattice.spacing();
        let origin = lattice.origin();
        let length_x = lattice.extent()[0];
        let [mx, my, mz] = self.config.shape_mesh;
        let n_elements = mx * my * mz;
        let per_file = (n_elements - 1) / self.files + 1;
        let nodes = order * order * order;

        let mut sources: Vec<Arc<dyn ElementSource>> = Vec::with_capacity(self.files);
        let mut batch = ElementBatch::new(order);
        let mut field = vec![0.0; nodes];
        let mut ux = vec![0.0; nodes];
        let uy = vec![0.0; nodes];
        let mut uz = vec![0.0; nodes];

        for e in 0..n_elements {
            let (ex, ey, ez) = (e % mx, (e / mx) % my, e / (mx * my));
            let anchor = [
                origin[0] + (ex * order) as f64 * dx,
                origin[1] + (ey * order) as f64 * dx,
                origin[2] + (ez * order) as f64 * dx,
            ];

            for k in 0..order {
                for j in 0..order {
                    for i in 0..order {
                        let n = node_index(order, i, j, k);
                        let x = anchor[0] + i as f64 * dx;
                        let z = anchor[2] + k as f64 * dx;
                        let phase = 2.0 * PI * (x - origin[0]) / length_x;
                        field[n] = self.config.atwood * (self.interface.fraction_at(z) - 0.5);
                        ux[n] = self.speed * phase.sin();
                        uz[n] = self.speed * phase.cos();
                    }
                }
            }
            batch
                .push_element(anchor, &field, &ux, &uy, &uz)
                .map_err(|e| e.to_string())?;

            if batch.len() == per_file || e + 1 == n_elements {
                let name = format!("{}.f{:05}", self.config.name, sources.len());
                let full = std::mem::replace(&mut batch, ElementBatch::new(order));
                let source = InMemorySource::new(name, self.time, full, dx)
                    .map_err(|e| e.to_string())?;
                sources.push(Arc::new(source));
            }
        }

        tracing::debug!(
            "Synthetic frame {}: {} elements in {} sources",
            self.config.name,
            n_elements,
            sources.len()
        );
        Ok(sources)
    }

    /// Kinetic energy `Σ |u|²·dV / 2` over every lattice point.
    pub fn kinetic_energy(&self) -> Result<f64, String> {
        let lattice = self.config.lattice().map_err(|e| e.to_string())?;
        let dv = lattice.spacing().powi(3);
        Ok(self.speed * self.speed * lattice.node_count() as f64 * dv / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(files: usize) -> SyntheticFrame {
        let config = PostConfig::from_json(
            r#"{
                "name": "synthetic",
                "order": 2,
                "root_mesh": [0.0, 0.0, 0.0],
                "extent_mesh": [4.0, 4.0, 8.0],
                "shape_mesh": [2, 2, 4],
                "viscosity": 1.0e-3,
                "conductivity": 1.0e-3
            }"#,
        )
        .unwrap();
        SyntheticFrame {
            config,
            interface: PlanarInterface::new(3.5, 1.0),
            speed: 0.5,
            files,
            time: 2.0,
        }
    }

    #[test]
    fn test_elements_split_across_files() {
        let sources = frame(3).sources().unwrap();
        let counts: Vec<usize> = sources.iter().map(|s| s.element_count()).collect();
        assert_eq!(counts, vec![6, 6, 4]);
        assert!(sources.iter().all(|s| (s.time() - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_anchors_and_raw_field() {
        let f = frame(1);
        let sources = f.sources().unwrap();
        let chunk = sources[0].read(0..16).unwrap();
        let batch = &chunk.batch;

        // Element 5 is (1, 0, 1) in a 2 x 2 x 4 mesh.
        assert_eq!(batch.anchor(5), [2.0, 0.0, 2.0]);
        let z = 2.0 + 1.0;
        let expected = f.config.atwood * (f.interface.fraction_at(z) - 0.5);
        let top = node_index(2, 0, 0, 1);
        assert!((batch.element_field(5)[top] - expected).abs() < 1e-15);
        assert!((chunk.max_node_spacing - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_files_rejected() {
        assert!(frame(0).sources().is_err());
    }
}
