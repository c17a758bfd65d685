//! Hand-checked ingestion on a 4×4×4 lattice with order-2 elements.

use kernel::{AggregationError, AggregationTarget, ElementBatch, TargetSettings, UniformLattice};

fn target() -> AggregationTarget {
    let lattice = UniformLattice::new([0.0; 3], [4.0; 3], [4, 4, 4]).unwrap();
    AggregationTarget::new(2, lattice, TargetSettings::default()).unwrap()
}

fn constant_element(anchor: [f64; 3], value: f64) -> ElementBatch {
    let mut batch = ElementBatch::new(2);
    let zero = [0.0; 8];
    let uz: Vec<f64> = (0..8).map(|n| (n / 4) as f64).collect();
    batch
        .push_element(anchor, &[value; 8], &zero, &zero, &uz)
        .unwrap();
    batch
}

#[test]
fn corner_element() {
    let target = target();
    target.add(&constant_element([0.0; 3], 0.3)).unwrap();

    assert!((target.phase_mass_fraction() - 4.8).abs() < 1e-12);
    let pdf = target.phase_pdf();
    assert_eq!(pdf.counts()[333], 8);
    assert_eq!(pdf.total(), 8);

    let profile = target.vertical_profile();
    assert!((profile[0] - 1.2).abs() < 1e-12);
    assert!((profile[1] - 1.2).abs() < 1e-12);
    assert_eq!(profile[2], 0.0);
    assert_eq!(profile[3], 0.0);

    // The cuts sit at index 2; an element rooted at the origin misses both.
    let slices = target.slices();
    assert_eq!(slices.y_normal.written_count(), 0);
    assert_eq!(slices.z_normal.written_count(), 0);
}

#[test]
fn centre_element_hits_both_cuts() {
    let target = target();
    target.add(&constant_element([2.0, 2.0, 2.0], 0.7)).unwrap();

    let slices = target.slices();
    assert_eq!((slices.y_index, slices.z_index), (2, 2));
    assert_eq!(slices.y_normal.written_count(), 4);
    assert_eq!(slices.z_normal.written_count(), 4);
    assert!((slices.y_normal.get(3, 3) - 0.7).abs() < 1e-12);
    assert!((slices.z_normal.get(2, 3) - 0.7).abs() < 1e-12);
    assert_eq!(slices.z_velocity[2].get(2, 2), 0.0);
    // Order 2 leaves no interior layer for a centred difference.
    assert_eq!(slices.z_dwdz.written_count(), 0);
}

#[test]
fn later_write_wins_on_slices() {
    let target = target();
    target.add(&constant_element([2.0, 2.0, 2.0], 0.7)).unwrap();
    target.add(&constant_element([2.0, 2.0, 2.0], 0.2)).unwrap();
    let slices = target.slices();
    assert!((slices.z_normal.get(2, 2) - 0.2).abs() < 1e-12);
    assert_eq!(slices.z_normal.written_count(), 4);
}

#[test]
fn malformed_batch_changes_nothing() {
    let target = target();
    target.add(&constant_element([0.0; 3], 0.3)).unwrap();
    let before = target.statistics();
    let slices_before = target.slices();

    let mut bad = constant_element([2.0, 2.0, 2.0], 0.9);
    bad.field.pop();
    let err = target.add(&bad).unwrap_err();
    assert_eq!(
        err,
        AggregationError::ShapeMismatch {
            array: "field",
            expected: 8,
            actual: 7
        }
    );

    let mut short_anchor = constant_element([2.0, 2.0, 2.0], 0.9);
    short_anchor.anchor_z.clear();
    assert!(matches!(
        target.add(&short_anchor),
        Err(AggregationError::ShapeMismatch { array: "anchor_z", .. })
    ));

    assert_eq!(target.statistics(), before);
    assert_eq!(target.slices(), slices_before);
}

#[test]
fn anchors_outside_the_lattice_are_clipped() {
    let target = target();
    target.add(&constant_element([-1.0, -1.0, -1.0], 1.0)).unwrap();
    target.add(&constant_element([10.0, 10.0, 10.0], 1.0)).unwrap();

    assert_eq!(target.ingested_nodes(), 16);
    let profile = target.vertical_profile();
    assert!((profile[0] - 4.0).abs() < 1e-12);
    assert_eq!(profile.iter().sum::<f64>(), 4.0);
}
