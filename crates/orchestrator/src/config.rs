//! Configuration parsing and validation for frame post-processing

use kernel::{AggregationError, FractalSettings, ProbeSettings, TargetSettings, UniformLattice};
use serde::{Deserialize, Serialize};
use std::fs;

/// Post-processing configuration for one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostConfig {
    /// Human-readable run name
    pub name: String,
    /// Solver nodes per element per axis
    pub order: usize,
    /// Resampling factor applied to `order`
    #[serde(default = "default_interpolation_factor")]
    pub interpolation_factor: f64,
    /// Lower corner of the element mesh [x, y, z]
    pub root_mesh: [f64; 3],
    /// Upper corner of the element mesh [x, y, z]
    pub extent_mesh: [f64; 3],
    /// Elements per axis
    pub shape_mesh: [usize; 3],
    /// Atwood number of the density contrast
    #[serde(default = "default_atwood")]
    pub atwood: f64,
    /// Gravitational acceleration magnitude (m/s^2)
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// Kinematic viscosity (m^2/s)
    pub viscosity: f64,
    /// Scalar diffusivity (m^2/s)
    pub conductivity: f64,
    /// Worker threads per frame
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// All jobs add into one shared target instead of private ones
    #[serde(default)]
    pub shared_target: bool,
    /// Nearest-interface probes, off when absent
    #[serde(default)]
    pub probes: Option<ProbeSettings>,
    /// Keep a full copy of the field for the fractal analysis
    #[serde(default)]
    pub capture_field: bool,
    /// Field threshold defining the visual mixing-zone edges
    #[serde(default = "default_mixing_threshold")]
    pub mixing_threshold: f64,
    /// Box-counting settings, off when absent
    #[serde(default)]
    pub fractal: Option<FractalSettings>,
}

// Default values
fn default_interpolation_factor() -> f64 {
    1.0
}

fn default_atwood() -> f64 {
    1.0e-3
}

fn default_gravity() -> f64 {
    9.8
}

fn default_threads() -> usize {
    1
}

fn default_mixing_threshold() -> f64 {
    0.01
}

impl PostConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: PostConfig = serde_json::from_str(contents)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.order == 0 {
            return Err("order must be at least 1".to_string());
        }
        if !(self.interpolation_factor > 0.0) || self.resampled_order() == 0 {
            return Err(format!(
                "interpolation_factor {} leaves no resampled nodes for order {}",
                self.interpolation_factor, self.order
            ));
        }

        for axis in 0..3 {
            if self.shape_mesh[axis] == 0 {
                return Err("shape_mesh must have at least one element per axis".to_string());
            }
            if self.root_mesh[axis] >= self.extent_mesh[axis] {
                return Err(format!(
                    "root_mesh must be below extent_mesh on axis {}",
                    axis
                ));
            }
        }

        if self.atwood <= 0.0 {
            return Err("Atwood number must be positive".to_string());
        }
        if self.viscosity <= 0.0 {
            return Err("Viscosity must be positive".to_string());
        }
        if self.conductivity <= 0.0 {
            return Err("Conductivity must be positive".to_string());
        }
        if self.threads == 0 {
            return Err("threads must be at least 1".to_string());
        }
        if !(self.mixing_threshold > 0.0 && self.mixing_threshold < 0.5) {
            return Err("mixing_threshold must be in range (0, 0.5)".to_string());
        }

        if let Some(probes) = &self.probes {
            if probes.count == 0 || probes.candidates == 0 {
                return Err("probes need a positive count and candidate number".to_string());
            }
        }

        if let Some(fractal) = &self.fractal {
            if !self.capture_field {
                return Err("fractal analysis requires capture_field".to_string());
            }
            if fractal.samples < 2 || !(fractal.base > 1.0) {
                return Err("fractal needs samples >= 2 and base > 1".to_string());
            }
        }

        Ok(())
    }

    /// Nodes per element per axis after resampling
    pub fn resampled_order(&self) -> usize {
        (self.interpolation_factor * self.order as f64) as usize
    }

    /// Target lattice: one point per resampled node
    pub fn lattice(&self) -> Result<UniformLattice, AggregationError> {
        let n = self.resampled_order();
        UniformLattice::new(
            self.root_mesh,
            self.extent_mesh,
            [
                self.shape_mesh[0] * n,
                self.shape_mesh[1] * n,
                self.shape_mesh[2] * n,
            ],
        )
    }

    /// Optional target parts requested by this configuration
    pub fn target_settings(&self) -> TargetSettings {
        TargetSettings {
            probes: self.probes,
            capture_field: self.capture_field,
        }
    }
}
