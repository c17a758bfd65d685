//! Closed-form mixing layers used as references for the frame diagnostics.
//!
//! A horizontally uniform diffuse interface has a mixing profile whose
//! integral and threshold crossings are known exactly, so the widths reported
//! by the pipeline can be checked against them.

/// Planar diffuse interface between the light (below) and heavy (above) fluid.
///
/// The heavy-fluid fraction follows
///
/// ```text
/// f(z) = 1/2 + 1/2 * tanh((z - z0) / delta)
/// ```
///
/// where:
/// - `z0` is the interface height
/// - `delta` is the interface thickness
#[derive(Debug, Clone, Copy)]
pub struct PlanarInterface {
    /// Interface height z0
    pub height: f64,
    /// Interface thickness delta
    pub thickness: f64,
}

impl PlanarInterface {
    /// Create a new planar interface.
    ///
    /// # Arguments
    /// * `height` - Height z0 of the f = 1/2 surface
    /// * `thickness` - Thickness delta of the tanh profile
    pub fn new(height: f64, thickness: f64) -> Self {
        Self { height, thickness }
    }

    /// Heavy-fluid fraction at height `z`.
    pub fn fraction_at(&self, z: f64) -> f64 {
        0.5 + 0.5 * ((z - self.height) / self.thickness).tanh()
    }

    /// Signed distance from the f = 1/2 surface; positive on the heavy side.
    pub fn signed_distance(&self, z: f64) -> f64 {
        z - self.height
    }

    /// Integral width `∫ 2 min(f, 1 - f) dz` over an unbounded column.
    ///
    /// Each half contributes `delta * ln 2`, so
    ///
    /// ```text
    /// h_cabot = 2 * delta * ln 2
    /// ```
    pub fn integral_width(&self) -> f64 {
        2.0 * self.thickness * std::f64::consts::LN_2
    }

    /// Half the distance between the `f = threshold` and `f = 1 - threshold` heights.
    ///
    /// ```text
    /// h_visual = delta * atanh(1 - 2 * threshold)
    /// ```
    pub fn visual_width(&self, threshold: f64) -> f64 {
        self.thickness * (1.0 - 2.0 * threshold).atanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_limits() {
        let interface = PlanarInterface::new(1.0, 0.1);
        assert!((interface.fraction_at(1.0) - 0.5).abs() < 1e-12);
        assert!(interface.fraction_at(3.0) > 1.0 - 1e-12);
        assert!(interface.fraction_at(-1.0) < 1e-12);
    }

    #[test]
    fn test_visual_width_hits_threshold() {
        let interface = PlanarInterface::new(0.5, 0.2);
        let threshold = 0.05;
        let h = interface.visual_width(threshold);
        let low = interface.fraction_at(interface.height - h);
        let high = interface.fraction_at(interface.height + h);
        assert!((low - threshold).abs() < 1e-12);
        assert!((high - (1.0 - threshold)).abs() < 1e-12);
    }

    #[test]
    fn test_integral_width_quadrature() {
        let interface = PlanarInterface::new(0.0, 0.3);
        let dz = 1e-4;
        let n = 200_000;
        let integral: f64 = (0..n)
            .map(|i| {
                let z = -10.0 + (i as f64 + 0.5) * dz;
                let f = interface.fraction_at(z);
                2.0 * f.min(1.0 - f) * dz
            })
            .sum();
        assert!((integral - interface.integral_width()).abs() < 1e-6);
    }

    #[test]
    fn test_signed_distance() {
        let interface = PlanarInterface::new(2.0, 1.0);
        assert!((interface.signed_distance(2.5) - 0.5).abs() < 1e-12);
        assert!((interface.signed_distance(1.0) + 1.0).abs() < 1e-12);
    }
}
