//! Spectra and turbulence microscales on the z-normal diagnostic slice.

use kernel::{DiagnosticSlices, Plane};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Energy spectra of the z-normal slice.
///
/// Entries are laid out over `(kx, ky)` with `ky` fastest; `kx` follows the
/// full-FFT frequency order and `ky` the half-spectrum order of a real input.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSpectrum {
    /// Mode magnitude `sqrt(kx² + ky²)` (cycles per unit length)
    pub modes: Vec<f64>,
    /// Potential energy `A·g/4 · |F(f)/N|²`
    pub potential: Vec<f64>,
    /// Kinetic energy `(|F(ux)|² + |F(uy)|² + |F(uz)|²) / (2N²)`
    pub kinetic: Vec<f64>,
    /// Vertical part of the kinetic energy
    pub kinetic_vertical: Vec<f64>,
    /// Horizontal part of the kinetic energy
    pub kinetic_horizontal: Vec<f64>,
}

/// Taylor and Kolmogorov microscales per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Microscales {
    /// Taylor microscale in x, y, z
    pub taylor: [f64; 3],
    /// Kolmogorov scale in x, y, z
    pub kolmogorov: [f64; 3],
}

/// Sample frequencies of a length-`n` FFT with sample spacing `d`.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    (0..n)
        .map(|i| {
            if i < (n + 1) / 2 {
                i as f64 * scale
            } else {
                (i as f64 - n as f64) * scale
            }
        })
        .collect()
}

/// Non-negative sample frequencies of a length-`n` real FFT.
pub fn rfftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    (0..n / 2 + 1).map(|i| i as f64 * scale).collect()
}

/// `|F|² / N²` of the 2-D real FFT of `plane`, half spectrum in the second axis.
fn power_spectrum(plane: &Plane, planner: &mut FftPlanner<f64>) -> Vec<f64> {
    let (nx, ny) = plane.dims();
    let nyr = ny / 2 + 1;
    let fft_y = planner.plan_fft_forward(ny);
    let fft_x = planner.plan_fft_forward(nx);

    let mut half = vec![Complex::new(0.0, 0.0); nx * nyr];
    let mut row = vec![Complex::new(0.0, 0.0); ny];
    for i in 0..nx {
        for (j, c) in row.iter_mut().enumerate() {
            *c = Complex::new(plane.get(i, j), 0.0);
        }
        fft_y.process(&mut row);
        half[i * nyr..(i + 1) * nyr].copy_from_slice(&row[..nyr]);
    }

    let mut col = vec![Complex::new(0.0, 0.0); nx];
    for j in 0..nyr {
        for (i, c) in col.iter_mut().enumerate() {
            *c = half[i * nyr + j];
        }
        fft_x.process(&mut col);
        for (i, c) in col.iter().enumerate() {
            half[i * nyr + j] = *c;
        }
    }

    let n = (nx * ny) as f64;
    half.iter().map(|c| (c.norm() / n).powi(2)).collect()
}

/// Potential and kinetic energy spectra of the z-normal slice.
pub fn slice_spectrum(
    slices: &DiagnosticSlices,
    spacing: f64,
    atwood: f64,
    gravity: f64,
) -> SliceSpectrum {
    let (nx, ny) = slices.z_normal.dims();
    let fx = fftfreq(nx, spacing);
    let fy = rfftfreq(ny, spacing);
    let modes: Vec<f64> = fx
        .iter()
        .flat_map(|kx| fy.iter().map(move |ky| (kx * kx + ky * ky).sqrt()))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let potential: Vec<f64> = power_spectrum(&slices.z_normal, &mut planner)
        .into_iter()
        .map(|p| 0.25 * atwood * gravity * p)
        .collect();
    let ux = power_spectrum(&slices.z_velocity[0], &mut planner);
    let uy = power_spectrum(&slices.z_velocity[1], &mut planner);
    let uz = power_spectrum(&slices.z_velocity[2], &mut planner);

    let kinetic_vertical: Vec<f64> = uz.iter().map(|p| 0.5 * p).collect();
    let kinetic_horizontal: Vec<f64> = ux.iter().zip(&uy).map(|(a, b)| 0.5 * (a + b)).collect();
    let kinetic = kinetic_vertical
        .iter()
        .zip(&kinetic_horizontal)
        .map(|(v, h)| v + h)
        .collect();

    SliceSpectrum {
        modes,
        potential,
        kinetic,
        kinetic_vertical,
        kinetic_horizontal,
    }
}

/// Taylor and Kolmogorov scales from the slice velocities.
///
/// In-plane gradients are central differences over interior cells; the
/// vertical gradient comes from the stored `∂uz/∂z` slice. Returns `None` when
/// the slice is too small or any gradient variance vanishes.
pub fn microscales(
    slices: &DiagnosticSlices,
    spacing: f64,
    viscosity: f64,
) -> Option<Microscales> {
    let (nx, ny) = slices.z_normal.dims();
    if nx < 3 || ny < 3 {
        return None;
    }
    let [ux, uy, uz] = &slices.z_velocity;

    let mut sum_u = [0.0; 2];
    let mut sum_du = [0.0; 2];
    let mut count = [0usize; 2];
    for j in 0..ny {
        for i in 1..nx - 1 {
            let d = (ux.get(i + 1, j) - ux.get(i - 1, j)) / (2.0 * spacing);
            sum_u[0] += ux.get(i, j).powi(2);
            sum_du[0] += d * d;
            count[0] += 1;
        }
    }
    for j in 1..ny - 1 {
        for i in 0..nx {
            let d = (uy.get(i, j + 1) - uy.get(i, j - 1)) / (2.0 * spacing);
            sum_u[1] += uy.get(i, j).powi(2);
            sum_du[1] += d * d;
            count[1] += 1;
        }
    }

    let gradient_var = [
        sum_du[0] / count[0] as f64,
        sum_du[1] / count[1] as f64,
        slices.z_dwdz.mean_square(),
    ];
    let velocity_var = [
        sum_u[0] / count[0] as f64,
        sum_u[1] / count[1] as f64,
        uz.mean_square(),
    ];
    if gradient_var.iter().any(|&g| !(g > 0.0)) {
        return None;
    }

    let mut taylor = [0.0; 3];
    let mut kolmogorov = [0.0; 3];
    for axis in 0..3 {
        taylor[axis] = (velocity_var[axis] / gradient_var[axis]).sqrt();
        kolmogorov[axis] = (viscosity * viscosity / (15.0 * gradient_var[axis])).powf(0.25);
    }
    Some(Microscales { taylor, kolmogorov })
}
