//! Batch order, thread count and merge grouping must not change the
//! order-invariant statistics.

use std::thread;

use kernel::{
    AggregationTarget, ElementBatch, InterfaceDistance, ProbeSettings, Statistics,
    TargetSettings, UniformLattice,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const ORDER: usize = 2;

fn lattice() -> UniformLattice {
    UniformLattice::new([0.0; 3], [8.0; 3], [8, 8, 8]).unwrap()
}

fn settings() -> TargetSettings {
    TargetSettings {
        probes: Some(ProbeSettings {
            count: 64,
            seed: 42,
            candidates: 4,
        }),
        capture_field: false,
    }
}

/// Random single-element batches on the even sub-lattice.
fn random_elements(count: usize, seed: u64) -> Vec<ElementBatch> {
    let mut rng = StdRng::seed_from_u64(seed);
    let m = ORDER * ORDER * ORDER;
    (0..count)
        .map(|_| {
            let anchor = [
                2.0 * rng.gen_range(0..4) as f64,
                2.0 * rng.gen_range(0..4) as f64,
                2.0 * rng.gen_range(0..4) as f64,
            ];
            let field: Vec<f64> = (0..m).map(|_| rng.gen_range(0.0..1.0)).collect();
            let ux: Vec<f64> = (0..m).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let uy: Vec<f64> = (0..m).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let uz: Vec<f64> = (0..m).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let mut batch = ElementBatch::new(ORDER);
            batch.push_element(anchor, &field, &ux, &uy, &uz).unwrap();
            batch
        })
        .collect()
}

fn assert_statistics_close(a: &Statistics, b: &Statistics) {
    assert!((a.mass_fraction - b.mass_fraction).abs() < 1e-9);
    assert!((a.kinetic_energy - b.kinetic_energy).abs() < 1e-9);
    assert_eq!(a.nodes, b.nodes);
    assert_eq!(a.pdf, b.pdf);
    assert_eq!(a.profile.len(), b.profile.len());
    for (x, y) in a.profile.iter().zip(&b.profile) {
        assert!((x - y).abs() < 1e-9, "profile {x} vs {y}");
    }
}

fn probe_distances(target: &AggregationTarget) -> Vec<InterfaceDistance> {
    target.probes().unwrap().distances()
}

fn sequential(batches: &[ElementBatch]) -> AggregationTarget {
    let target = AggregationTarget::new(ORDER, lattice(), settings()).unwrap();
    for b in batches {
        target.add(b).unwrap();
    }
    target
}

#[test]
fn permutations_give_same_statistics() {
    let batches = random_elements(24, 3);
    let reference = sequential(&batches);

    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..4 {
        let mut shuffled = batches.clone();
        shuffled.shuffle(&mut rng);
        let target = sequential(&shuffled);
        assert_statistics_close(&reference.statistics(), &target.statistics());
        assert_eq!(probe_distances(&reference), probe_distances(&target));
    }
}

#[test]
fn thread_count_does_not_matter() {
    let batches = random_elements(32, 5);
    let reference = sequential(&batches);

    for threads in [2, 4, 8] {
        let target = AggregationTarget::new(ORDER, lattice(), settings()).unwrap();
        let chunk = batches.len().div_ceil(threads);
        thread::scope(|s| {
            for part in batches.chunks(chunk) {
                let target = &target;
                s.spawn(move || {
                    for b in part {
                        target.add(b).unwrap();
                    }
                });
            }
        });
        assert_statistics_close(&reference.statistics(), &target.statistics());
        assert_eq!(probe_distances(&reference), probe_distances(&target));
    }
}

#[test]
fn combine_is_associative() {
    let batches = random_elements(18, 8);
    let parts: Vec<&[ElementBatch]> = batches.chunks(6).collect();

    // (a + b) + c
    let mut left = sequential(parts[0]);
    left.combine(sequential(parts[1])).unwrap();
    left.combine(sequential(parts[2])).unwrap();

    // a + (b + c)
    let mut bc = sequential(parts[1]);
    bc.combine(sequential(parts[2])).unwrap();
    let mut right = sequential(parts[0]);
    right.combine(bc).unwrap();

    let whole = sequential(&batches);
    assert_statistics_close(&left.statistics(), &right.statistics());
    assert_statistics_close(&whole.statistics(), &left.statistics());
    assert_eq!(probe_distances(&left), probe_distances(&right));
    assert_eq!(probe_distances(&whole), probe_distances(&left));
}

#[test]
fn multi_element_batches_match_single_element_batches() {
    let singles = random_elements(12, 21);
    let mut merged = ElementBatch::new(ORDER);
    for b in &singles {
        let (ux, uy, uz) = b.element_velocity(0);
        merged
            .push_element(b.anchor(0), b.element_field(0), ux, uy, uz)
            .unwrap();
    }

    let one_batch = AggregationTarget::new(ORDER, lattice(), settings()).unwrap();
    one_batch.add(&merged).unwrap();
    let reference = sequential(&singles);

    assert_statistics_close(&reference.statistics(), &one_batch.statistics());
    assert_eq!(probe_distances(&reference), probe_distances(&one_batch));
}
