//! The pruned probe search must agree with an exhaustive scan.

use kernel::{
    AggregationTarget, ElementBatch, InterfaceDistance, ProbeSettings, TargetSettings,
    UniformLattice,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ORDER: usize = 3;
const SPACING: f64 = 0.5;

fn lattice() -> UniformLattice {
    UniformLattice::new([0.0; 3], [6.0; 3], [12, 12, 12]).unwrap()
}

fn probed(candidates: usize) -> AggregationTarget {
    let settings = TargetSettings {
        probes: Some(ProbeSettings {
            count: 40,
            seed: 17,
            candidates,
        }),
        capture_field: false,
    };
    AggregationTarget::new(ORDER, lattice(), settings).unwrap()
}

/// Tanh interface at z = 3 sampled on elements covering the lower-left block.
fn interface_batches(seed: u64) -> Vec<ElementBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut batches = Vec::new();
    for bz in 0..4 {
        let mut batch = ElementBatch::new(ORDER);
        for by in 0..4 {
            for bx in 0..4 {
                let anchor = [
                    bx as f64 * ORDER as f64 * SPACING,
                    by as f64 * ORDER as f64 * SPACING,
                    bz as f64 * ORDER as f64 * SPACING,
                ];
                let mut field = Vec::new();
                for k in 0..ORDER {
                    for _j in 0..ORDER {
                        for _i in 0..ORDER {
                            let z = anchor[2] + SPACING * k as f64;
                            let noise: f64 = rng.gen_range(-0.05..0.05);
                            field.push(0.5 + 0.5 * (z - 3.0 + noise).tanh());
                        }
                    }
                }
                let zero = vec![0.0; field.len()];
                batch.push_element(anchor, &field, &zero, &zero, &zero).unwrap();
            }
        }
        batches.push(batch);
    }
    batches
}

fn brute_force(probe: [f64; 3], batches: &[ElementBatch], diagonal: f64) -> InterfaceDistance {
    let mut best = InterfaceDistance::uniform(diagonal);
    for batch in batches {
        for e in 0..batch.len() {
            let a = batch.anchor(e);
            let field = batch.element_field(e);
            for k in 0..ORDER {
                for j in 0..ORDER {
                    for i in 0..ORDER {
                        let f = field[kernel::node_index(ORDER, i, j, k)];
                        let node = [
                            a[0] + SPACING * i as f64,
                            a[1] + SPACING * j as f64,
                            a[2] + SPACING * k as f64,
                        ];
                        let d = ((probe[0] - node[0]).powi(2)
                            + (probe[1] - node[1]).powi(2)
                            + (probe[2] - node[2]).powi(2))
                        .sqrt();
                        if f > 0.5 {
                            best.heavy = best.heavy.min(d);
                        } else if f < 0.5 {
                            best.light = best.light.min(d);
                        }
                    }
                }
            }
        }
    }
    best
}

#[test]
fn distances_never_increase() {
    let target = probed(10);
    let mut previous = target.probes().unwrap().distances();
    for batch in interface_batches(1) {
        target.add(&batch).unwrap();
        let current = target.probes().unwrap().distances();
        for (now, before) in current.iter().zip(&previous) {
            assert!(now.heavy <= before.heavy);
            assert!(now.light <= before.light);
        }
        previous = current;
    }
}

#[test]
fn pruned_search_matches_exhaustive_scan() {
    let batches = interface_batches(2);
    let diagonal = lattice().diagonal();

    for candidates in [1, 4, 10, 1000] {
        let target = probed(candidates);
        for b in &batches {
            target.add(b).unwrap();
        }
        let probes = target.probes().unwrap();
        for (pos, got) in probes.positions().iter().zip(probes.distances()) {
            let want = brute_force(*pos, &batches, diagonal);
            assert!((got.heavy - want.heavy).abs() < 1e-12, "heavy {got:?} vs {want:?}");
            assert!((got.light - want.light).abs() < 1e-12, "light {got:?} vs {want:?}");
        }
    }
}

#[test]
fn separations_are_normalised_by_diagonal() {
    let target = probed(10);
    for b in interface_batches(3) {
        target.add(&b).unwrap();
    }
    let probes = target.probes().unwrap();
    let diagonal = lattice().diagonal();
    for (s, d) in probes.separations().iter().zip(probes.distances()) {
        assert!((s - d.bound() / diagonal).abs() < 1e-12);
        assert!(*s <= 1.0);
    }
}
