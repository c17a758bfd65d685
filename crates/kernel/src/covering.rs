//! Box-counting estimate of the fractal dimension of the zero level set.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// ScalarField
// ---------------------------------------------------------------------------

/// Dense 3-D scalar field on lattice points, x fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    shape: [usize; 3],
    values: Vec<f64>,
}

impl ScalarField {
    /// Wrap `values`; the length must equal the product of `shape`.
    pub fn new(shape: [usize; 3], values: Vec<f64>) -> Result<Self, AnalysisError> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(AnalysisError::FieldShape {
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    /// Field with every point set to `value`.
    pub fn filled(shape: [usize; 3], value: f64) -> Self {
        Self {
            shape,
            values: vec![value; shape.iter().product()],
        }
    }

    /// Field sampled from `f(i, j, k)`.
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(shape.iter().product());
        for k in 0..shape[2] {
            for j in 0..shape[1] {
                for i in 0..shape[0] {
                    values.push(f(i, j, k));
                }
            }
        }
        Self { shape, values }
    }

    /// Points per axis.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Raw values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.shape[0] * (j + self.shape[1] * k)
    }

    /// Value at `(i, j, k)`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.index(i, j, k)]
    }

    /// Set the value at `(i, j, k)`.
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let idx = self.index(i, j, k);
        self.values[idx] = value;
    }

    /// Copy with `delta` added to every value.
    pub fn shifted(&self, delta: f64) -> Self {
        Self {
            shape: self.shape,
            values: self.values.iter().map(|v| v + delta).collect(),
        }
    }

    fn straddles_zero(&self, lo: [usize; 3], hi: [usize; 3]) -> bool {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for k in lo[2]..hi[2] {
            for j in lo[1]..hi[1] {
                let row = self.index(lo[0], j, k);
                for &v in &self.values[row..row + (hi[0] - lo[0])] {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
        }
        min <= 0.0 && 0.0 <= max
    }
}

// ---------------------------------------------------------------------------
// Covering number
// ---------------------------------------------------------------------------

/// Fewest boxes of edge `box_size` cells that cover the zero level set.
///
/// A box starting at lattice point `p` spans points `p ..= p + box_size`
/// (clipped at the lattice end) and counts when its values bracket zero.
/// Box grids are tried at offsets `0, s, 2s, …` below `box_size` in every
/// axis, with `s = box_size / 2 + 1`, and the smallest count is returned.
pub fn covering_number(field: &ScalarField, box_size: usize) -> Result<usize, AnalysisError> {
    if box_size == 0 {
        return Err(AnalysisError::InvalidBoxSize);
    }
    let shape = field.shape();
    let min_dim = shape.iter().copied().min().unwrap_or(0);
    let stride = box_size / 2 + 1;
    let offsets: Vec<usize> = (0..box_size.min(min_dim)).step_by(stride).collect();

    let mut best = field.values().len();
    for &oz in &offsets {
        for &oy in &offsets {
            for &ox in &offsets {
                let mut count = 0;
                for k in (oz..shape[2]).step_by(box_size) {
                    for j in (oy..shape[1]).step_by(box_size) {
                        for i in (ox..shape[0]).step_by(box_size) {
                            let lo = [i, j, k];
                            let hi = [
                                (i + box_size + 1).min(shape[0]),
                                (j + box_size + 1).min(shape[1]),
                                (k + box_size + 1).min(shape[2]),
                            ];
                            if field.straddles_zero(lo, hi) {
                                count += 1;
                            }
                        }
                    }
                }
                best = best.min(count);
            }
        }
    }
    Ok(best)
}

// ---------------------------------------------------------------------------
// Fractal dimension
// ---------------------------------------------------------------------------

fn default_samples() -> usize {
    25
}

fn default_base() -> f64 {
    1.2
}

/// Geometric ladder of box sizes used for the dimension fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalSettings {
    /// Box sizes are `base^i` for `i` in `1..samples`.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Ratio between successive box sizes.
    #[serde(default = "default_base")]
    pub base: f64,
}

impl Default for FractalSettings {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            base: default_base(),
        }
    }
}

/// Fitted dimension together with the samples it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FractalEstimate {
    /// Negated slope of `ln(count)` against `ln(box_size)`.
    pub dimension: f64,
    /// Box sizes used in the fit.
    pub box_sizes: Vec<usize>,
    /// Covering number for each box size.
    pub counts: Vec<usize>,
}

/// Estimate the box-counting dimension of the zero level set of `field`.
///
/// Box sizes above half the smallest lattice dimension are not used, nor are
/// sizes whose covering number is zero.
pub fn fractal_dimension(
    field: &ScalarField,
    settings: &FractalSettings,
) -> Result<FractalEstimate, AnalysisError> {
    if settings.samples < 2 {
        return Err(AnalysisError::InvalidSettings(format!(
            "samples must be at least 2, got {}",
            settings.samples
        )));
    }
    if !settings.base.is_finite() || settings.base <= 1.0 {
        return Err(AnalysisError::InvalidSettings(format!(
            "base must be a finite number above 1, got {}",
            settings.base
        )));
    }

    let min_dim = field.shape().iter().copied().min().unwrap_or(0);
    let limit = (min_dim / 2).max(1);

    let mut box_sizes = Vec::new();
    let mut counts = Vec::new();
    let mut last = 0;
    for i in 1..settings.samples {
        let size = settings.base.powi(i as i32) as usize;
        if size == last {
            continue;
        }
        last = size;
        if size > limit {
            break;
        }
        let count = covering_number(field, size)?;
        tracing::trace!(size, count, "covering number");
        if count > 0 {
            box_sizes.push(size);
            counts.push(count);
        }
    }

    if box_sizes.len() < 2 {
        return Err(AnalysisError::TooFewSamples(box_sizes.len()));
    }
    let xs: Vec<f64> = box_sizes.iter().map(|&s| (s as f64).ln()).collect();
    let ys: Vec<f64> = counts.iter().map(|&c| (c as f64).ln()).collect();
    let (slope, _) = linear_regression(&xs, &ys).ok_or(AnalysisError::TooFewSamples(xs.len()))?;

    Ok(FractalEstimate {
        dimension: -slope,
        box_sizes,
        counts,
    })
}

/// Ordinary least-squares fit `y = slope·x + intercept`.
///
/// Returns `None` for mismatched lengths, fewer than two points or constant `xs`.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn plane(n: usize) -> ScalarField {
        ScalarField::from_fn([n, n, n], |_, _, k| if k < n / 2 { -1.0 } else { 1.0 })
    }

    #[test]
    fn new_checks_length() {
        let err = ScalarField::new([2, 2, 2], vec![0.0; 7]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::FieldShape {
                shape: [2, 2, 2],
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn from_fn_is_x_fastest() {
        let f = ScalarField::from_fn([3, 2, 2], |i, j, k| (100 * k + 10 * j + i) as f64);
        assert_eq!(f.values()[1], 1.0);
        assert_eq!(f.values()[3], 10.0);
        assert_eq!(f.get(2, 1, 1), 112.0);
        assert_eq!(f.shifted(-0.5).get(0, 0, 1), 99.5);
    }

    #[test]
    fn zero_box_size_rejected() {
        assert_eq!(
            covering_number(&plane(4), 0),
            Err(AnalysisError::InvalidBoxSize)
        );
    }

    #[test]
    fn unit_boxes_match_brute_force() {
        let shape = [5, 4, 6];
        let mut rng = StdRng::seed_from_u64(11);
        let field = ScalarField::from_fn(shape, |_, _, _| rng.gen_range(-1.0..1.0));

        let mut expected = 0;
        for k in 0..shape[2] {
            for j in 0..shape[1] {
                for i in 0..shape[0] {
                    let mut min = f64::INFINITY;
                    let mut max = f64::NEG_INFINITY;
                    for c in 0..8 {
                        let (a, b, d) = (i + (c & 1), j + ((c >> 1) & 1), k + ((c >> 2) & 1));
                        if a < shape[0] && b < shape[1] && d < shape[2] {
                            let v = field.get(a, b, d);
                            min = min.min(v);
                            max = max.max(v);
                        }
                    }
                    if min <= 0.0 && max >= 0.0 {
                        expected += 1;
                    }
                }
            }
        }
        assert_eq!(covering_number(&field, 1).unwrap(), expected);
    }

    #[test]
    fn no_interface_no_boxes() {
        let field = ScalarField::filled([6, 6, 6], 0.3);
        assert_eq!(covering_number(&field, 2).unwrap(), 0);
        assert_eq!(
            fractal_dimension(&field, &FractalSettings::default()),
            Err(AnalysisError::TooFewSamples(0))
        );
    }

    #[test]
    fn flat_interface_is_two_dimensional() {
        let estimate = fractal_dimension(&plane(24), &FractalSettings::default()).unwrap();
        assert!(
            (estimate.dimension - 2.0).abs() < 0.15,
            "dimension {} for a plane",
            estimate.dimension
        );
        assert!(estimate.box_sizes.iter().all(|&s| s <= 12));
        assert!(estimate.box_sizes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rejects_bad_settings() {
        let field = plane(8);
        let bad_base = FractalSettings {
            samples: 25,
            base: 1.0,
        };
        assert!(matches!(
            fractal_dimension(&field, &bad_base),
            Err(AnalysisError::InvalidSettings(_))
        ));
        let bad_samples = FractalSettings {
            samples: 1,
            base: 1.2,
        };
        assert!(matches!(
            fractal_dimension(&field, &bad_samples),
            Err(AnalysisError::InvalidSettings(_))
        ));
    }

    #[test]
    fn regression_recovers_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 - 2.0 * x).collect();
        let (slope, intercept) = linear_regression(&xs, &ys).unwrap();
        assert!((slope + 2.0).abs() < 1e-12);
        assert!((intercept - 3.0).abs() < 1e-12);
        assert!(linear_regression(&[1.0, 1.0], &[0.0, 1.0]).is_none());
    }
}
