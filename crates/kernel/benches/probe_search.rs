//! Probe search throughput for growing batch sizes.
//!
//! Run with: cargo bench -p kernel --bench probe_search

use std::time::Instant;

use kernel::{AggregationTarget, ElementBatch, ProbeSettings, TargetSettings, UniformLattice};

/// Elements of order `order` tiling an `n³` block, field a tanh across the middle.
fn tiled_batch(n: usize, order: usize, spacing: f64) -> ElementBatch {
    let mut batch = ElementBatch::new(order);
    let mid = n as f64 * order as f64 * spacing / 2.0;
    let m = order * order * order;
    let zero = vec![0.0; m];
    for bz in 0..n {
        for by in 0..n {
            for bx in 0..n {
                let step = order as f64 * spacing;
                let anchor = [bx as f64 * step, by as f64 * step, bz as f64 * step];
                let mut field = Vec::with_capacity(m);
                for k in 0..order {
                    for _ in 0..order * order {
                        let z = anchor[2] + spacing * k as f64;
                        field.push(0.5 + 0.5 * ((z - mid) / spacing).tanh());
                    }
                }
                batch
                    .push_element(anchor, &field, &zero, &zero, &zero)
                    .expect("tiled element");
            }
        }
    }
    batch
}

fn main() {
    println!("=== Probe Search ===\n");
    println!(
        "{:>10} {:>10} {:>12} {:>12} {:>14}",
        "Elements", "Probes", "Cands", "Time (ms)", "us/probe"
    );

    let order = 4;
    for &(n, probes, candidates) in &[(8, 1000, 10), (16, 1000, 10), (16, 1000, 100), (24, 1000, 10)] {
        let spacing = 1.0 / (n * order) as f64;
        let lattice = match UniformLattice::new([0.0; 3], [1.0; 3], [n * order; 3]) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("lattice: {e}");
                return;
            }
        };
        let settings = TargetSettings {
            probes: Some(ProbeSettings {
                count: probes,
                seed: 0,
                candidates,
            }),
            capture_field: false,
        };
        let target = match AggregationTarget::new(order, lattice, settings) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("target: {e}");
                return;
            }
        };
        let batch = tiled_batch(n, order, spacing);

        let start = Instant::now();
        if let Some(p) = target.probes() {
            p.search(&batch, spacing).expect("tiled batch");
        }
        let elapsed = start.elapsed().as_secs_f64();
        println!(
            "{:>10} {:>10} {:>12} {:>12.2} {:>14.2}",
            batch.len(),
            probes,
            candidates,
            elapsed * 1e3,
            elapsed * 1e6 / probes as f64
        );
    }
}
