//! Per-frame and per-series diagnostics computed from reduced targets.

use kernel::{fractal_dimension, AggregationTarget};

use crate::config::PostConfig;
use crate::mapreduce::BatchExtrema;
use crate::spectrum::{microscales, Microscales};
use crate::FrameResult;

/// First `x` at which the piecewise-linear `ys(xs)` crosses `y0`.
///
/// Scans consecutive pairs and interpolates inside the first one that
/// brackets `y0`. `None` when there is no crossing.
pub fn find_root(xs: &[f64], ys: &[f64], y0: f64) -> Option<f64> {
    for i in 0..xs.len().min(ys.len()).saturating_sub(1) {
        let (a, b) = (ys[i] - y0, ys[i + 1] - y0);
        if a == 0.0 {
            return Some(xs[i]);
        }
        if a * b < 0.0 || b == 0.0 {
            return Some(xs[i] + (xs[i + 1] - xs[i]) * a / (a - b));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Mixing zone
// ---------------------------------------------------------------------------

/// Mixing-zone measures of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixingZone {
    /// Integral width `L/nz · Σ 2·min(f̄, 1 − f̄)`
    pub h_cabot: f64,
    /// Half the distance between the `threshold` and `1 − threshold` crossings
    pub h_visual: Option<f64>,
    /// Molecular mixing fraction
    pub xi: Option<f64>,
}

/// Mixing-zone widths from the horizontally averaged profile.
pub fn mixing_zone(target: &AggregationTarget, threshold: f64) -> MixingZone {
    let lattice = target.lattice();
    let [nx, ny, nz] = lattice.shape();
    let plane = (nx * ny) as f64;
    let mean: Vec<f64> = target.vertical_profile().iter().map(|f| f / plane).collect();

    let h: f64 = mean.iter().map(|&f| 2.0 * f.min(1.0 - f)).sum();
    let height = lattice.corner()[2] - lattice.origin()[2];
    let h_cabot = h * height / nz as f64;

    let zs = lattice.z_levels();
    let h_visual = match (
        find_root(&zs, &mean, threshold),
        find_root(&zs, &mean, 1.0 - threshold),
    ) {
        (Some(low), Some(high)) => Some((low - high).abs() / 2.0),
        _ => None,
    };

    let xi = (h > 0.0).then(|| target.phase_mass_fraction() / (h * plane));

    MixingZone {
        h_cabot,
        h_visual,
        xi,
    }
}

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

/// Potential and kinetic energy of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyBudget {
    /// Potential energy released relative to the unmixed state
    pub potential: f64,
    /// Kinetic energy
    pub kinetic: f64,
}

/// Energy budget from the vertical profile and kinetic sum.
pub fn energy_budget(target: &AggregationTarget, atwood: f64, gravity: f64) -> EnergyBudget {
    let lattice = target.lattice();
    let dx = lattice.spacing();
    let dv = dx * dx * dx;
    let zs = lattice.z_levels();

    let u: f64 = -target
        .vertical_profile()
        .iter()
        .zip(&zs)
        .map(|(f, z)| f * z * dv)
        .sum::<f64>();
    let nz = lattice.shape()[2];
    let reference_z = zs[((nz as f64 * 3.0 / 4.0) as usize).min(nz - 1)];
    let u0 = lattice.node_count() as f64 / 2.0 * dv * reference_z;

    EnergyBudget {
        potential: atwood * gravity * (u0 - u),
        kinetic: target.kinetic_energy_sum() * dv / 2.0,
    }
}

// ---------------------------------------------------------------------------
// Stability
// ---------------------------------------------------------------------------

/// Cell-scale stability numbers of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellNumbers {
    /// Largest temperature magnitude
    pub t_abs: f64,
    /// Cell Péclet number
    pub peclet: f64,
    /// Cell Reynolds number
    pub reynolds: f64,
}

/// Cell Péclet and Reynolds numbers from the raw extrema.
pub fn cell_numbers(extrema: &BatchExtrema, viscosity: f64, conductivity: f64) -> CellNumbers {
    let cell = extrema.u_abs * extrema.dx_max;
    CellNumbers {
        t_abs: extrema.t_max.max(-extrema.t_min),
        peclet: cell / conductivity,
        reynolds: cell / viscosity,
    }
}

/// Where a series first overshoots its initial temperature bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instability {
    /// Time of the first overshooting frame
    pub time: f64,
    /// Mean cell Péclet number of that frame and the one before
    pub peclet: f64,
    /// Half the Péclet change between the two frames
    pub peclet_spread: f64,
}

/// First frame whose `t_abs` exceeds that of the earliest frame.
pub fn detect_instability(series: &[FrameSummary]) -> Option<Instability> {
    let mut ordered: Vec<&FrameSummary> = series.iter().collect();
    ordered.sort_by(|a, b| a.time.total_cmp(&b.time));
    let first = ordered.first()?;

    ordered.windows(2).find_map(|w| {
        (w[1].cells.t_abs > first.cells.t_abs).then(|| Instability {
            time: w[1].time,
            peclet: (w[1].cells.peclet + w[0].cells.peclet) / 2.0,
            peclet_spread: (w[1].cells.peclet - w[0].cells.peclet) / 2.0,
        })
    })
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Everything reported for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    /// Simulation time
    pub time: f64,
    /// Raw-data extrema
    pub extrema: BatchExtrema,
    /// Stability numbers
    pub cells: CellNumbers,
    /// Mixing-zone widths
    pub mixing: MixingZone,
    /// Energy budget
    pub energy: EnergyBudget,
    /// Turbulence scales on the z slice
    pub microscales: Option<Microscales>,
    /// Box-counting dimension of the interface, with field capture
    pub fractal_dimension: Option<f64>,
    /// Mean normalised probe separation, with probes
    pub mean_probe_separation: Option<f64>,
}

/// Compute every diagnostic the configuration asks for.
pub fn summarize(frame: &FrameResult, config: &PostConfig) -> FrameSummary {
    let target = &frame.target;
    let cells = cell_numbers(&frame.extrema, config.viscosity, config.conductivity);
    let mixing = mixing_zone(target, config.mixing_threshold);
    let energy = energy_budget(target, config.atwood, config.gravity);
    let scales = microscales(
        &target.slices(),
        target.lattice().spacing(),
        config.viscosity,
    );

    let fractal = match (&config.fractal, target.interface_field()) {
        (Some(settings), Some(field)) => match fractal_dimension(&field, settings) {
            Ok(estimate) => Some(estimate.dimension),
            Err(e) => {
                tracing::warn!("Frame t={}: no fractal dimension: {}", frame.time, e);
                None
            }
        },
        _ => None,
    };

    let separation = target.probes().and_then(|p| {
        let s = p.separations();
        (!s.is_empty()).then(|| s.iter().sum::<f64>() / s.len() as f64)
    });

    tracing::info!(
        "Frame t={}: h_cabot={:.4e}, Pe_cell={:.3}, Re_cell={:.3}",
        frame.time,
        mixing.h_cabot,
        cells.peclet,
        cells.reynolds
    );

    FrameSummary {
        time: frame.time,
        extrema: frame.extrema,
        cells,
        mixing,
        energy,
        microscales: scales,
        fractal_dimension: fractal,
        mean_probe_separation: separation,
    }
}
