//! Reference test framework for frame post-processing validation
//!
//! This crate runs synthetic frames with known analytical answers through the
//! full aggregation pipeline and checks the reported diagnostics against them.

#![warn(missing_docs)]

pub mod analytical;
pub mod synthetic;


use std::time::Instant;

use kernel::{FractalSettings, ProbeSettings, Statistics};
use orchestrator::diagnostics::{summarize, FrameSummary};
use orchestrator::{analyze_frame, FrameResult, PostConfig};

pub use analytical::PlanarInterface;
pub use synthetic::SyntheticFrame;

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Integral and visual widths against the analytical interface
    pub mixing_width: Option<MixingWidthCheck>,
    /// Mixing parameter of a horizontally uniform layer
    pub mixing_parameter: Option<MixingParameterCheck>,
    /// Kinetic energy against the prescribed velocity field
    pub kinetic_energy: Option<KineticEnergyCheck>,
    /// Box-counting dimension of the interface
    pub fractal: Option<FractalCheck>,
    /// Probe distances against the distance to the interface plane
    pub probe_distance: Option<ProbeDistanceCheck>,
    /// Same statistics whatever the thread count or target sharing
    pub thread_consistency: Option<ThreadConsistencyCheck>,
}

/// Check the mixing-zone widths
#[derive(Debug, Clone)]
pub struct MixingWidthCheck {
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f64,
}

/// Check the mixing parameter xi
#[derive(Debug, Clone)]
pub struct MixingParameterCheck {
    /// Expected xi
    pub expected: f64,
    /// Absolute tolerance
    pub tolerance: f64,
}

/// Check the kinetic energy
#[derive(Debug, Clone)]
pub struct KineticEnergyCheck {
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f64,
}

/// Check the fractal dimension of the zero level set
#[derive(Debug, Clone)]
pub struct FractalCheck {
    /// Expected dimension
    pub expected: f64,
    /// Absolute tolerance
    pub tolerance: f64,
}

/// Check every probe's distance bound
#[derive(Debug, Clone)]
pub struct ProbeDistanceCheck {
    /// Largest allowed gap to the plane distance, in lattice cells
    pub max_error_cells: f64,
}

/// Rerun the frame with other thread counts and both target modes
#[derive(Debug, Clone)]
pub struct ThreadConsistencyCheck {
    /// Thread counts to compare against the configured run
    pub threads: Vec<usize>,
    /// Relative tolerance for floating-point sums
    pub tolerance: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Diagnostics of the configured run
    pub summary: FrameSummary,
    /// Lattice points ingested
    pub nodes: u64,
    /// Wall time of the configured run (seconds)
    pub elapsed: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Error message if failed
    pub message: Option<String>,
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Frame to aggregate
    pub frame: SyntheticFrame,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, String> {
        tracing::info!("Running reference test: {}", self.name);

        let config = &self.frame.config;
        config.validate()?;
        let sources = self.frame.sources()?;

        let start = Instant::now();
        let result = analyze_frame(config, &sources).map_err(|e| e.to_string())?;
        let elapsed = start.elapsed().as_secs_f64();
        let summary = summarize(&result, config);

        tracing::info!(
            "Aggregated {} nodes from {} sources in {:.3}s",
            result.target.ingested_nodes(),
            sources.len(),
            elapsed
        );

        let mut checks = Vec::new();
        let mut all_passed = true;

        if let Some(ref check) = self.expected.mixing_width {
            let check = validate_mixing_width(&self.frame, &summary, check);
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref check) = self.expected.mixing_parameter {
            let check = validate_mixing_parameter(&summary, check);
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref check) = self.expected.kinetic_energy {
            let check = validate_kinetic_energy(&self.frame, &summary, check)?;
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref check) = self.expected.fractal {
            let check = validate_fractal(&summary, check);
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref check) = self.expected.probe_distance {
            let check = validate_probe_distance(&self.frame, &result, check);
            all_passed &= check.passed;
            checks.push(check);
        }

        if let Some(ref check) = self.expected.thread_consistency {
            let check = validate_thread_consistency(&self.frame, &result, check)?;
            all_passed &= check.passed;
            checks.push(check);
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: all_passed,
            checks,
            summary,
            nodes: result.target.ingested_nodes(),
            elapsed,
        })
    }
}

fn relative_error(got: f64, expected: f64) -> f64 {
    (got - expected).abs() / expected.abs().max(f64::MIN_POSITIVE)
}

/// Validate the integral and visual mixing widths
fn validate_mixing_width(
    frame: &SyntheticFrame,
    summary: &FrameSummary,
    check: &MixingWidthCheck,
) -> CheckResult {
    let expected_cabot = frame.interface.integral_width();
    let expected_visual = frame.interface.visual_width(frame.config.mixing_threshold);
    let got_cabot = summary.mixing.h_cabot;

    let Some(got_visual) = summary.mixing.h_visual else {
        return CheckResult {
            name: "Mixing Width".to_string(),
            passed: false,
            message: Some("Profile never crosses the visual thresholds".to_string()),
        };
    };

    let cabot_error = relative_error(got_cabot, expected_cabot);
    let visual_error = relative_error(got_visual, expected_visual);
    let passed = cabot_error <= check.tolerance && visual_error <= check.tolerance;

    CheckResult {
        name: "Mixing Width".to_string(),
        passed,
        message: Some(format!(
            "h_cabot {:.4e} vs {:.4e} ({:.2}%), h_visual {:.4e} vs {:.4e} ({:.2}%){}",
            got_cabot,
            expected_cabot,
            cabot_error * 100.0,
            got_visual,
            expected_visual,
            visual_error * 100.0,
            if passed {
                String::new()
            } else {
                format!(", tolerance: {:.1}%", check.tolerance * 100.0)
            }
        )),
    }
}

/// Validate the mixing parameter
fn validate_mixing_parameter(summary: &FrameSummary, check: &MixingParameterCheck) -> CheckResult {
    match summary.mixing.xi {
        Some(xi) if (xi - check.expected).abs() <= check.tolerance => CheckResult {
            name: "Mixing Parameter".to_string(),
            passed: true,
            message: Some(format!("xi = {:.6}", xi)),
        },
        Some(xi) => CheckResult {
            name: "Mixing Parameter".to_string(),
            passed: false,
            message: Some(format!(
                "Expected: {:.6}, Got: {:.6} (tolerance: {:.1e})",
                check.expected, xi, check.tolerance
            )),
        },
        None => CheckResult {
            name: "Mixing Parameter".to_string(),
            passed: false,
            message: Some("No mixing layer, xi undefined".to_string()),
        },
    }
}

/// Validate the kinetic energy
fn validate_kinetic_energy(
    frame: &SyntheticFrame,
    summary: &FrameSummary,
    check: &KineticEnergyCheck,
) -> Result<CheckResult, String> {
    let expected = frame.kinetic_energy()?;
    let got = summary.energy.kinetic;
    let error = relative_error(got, expected);

    Ok(CheckResult {
        name: "Kinetic Energy".to_string(),
        passed: error <= check.tolerance,
        message: Some(format!(
            "Expected: {:.6e}, Got: {:.6e} (error: {:.2e})",
            expected, got, error
        )),
    })
}

/// Validate the box-counting dimension
fn validate_fractal(summary: &FrameSummary, check: &FractalCheck) -> CheckResult {
    match summary.fractal_dimension {
        Some(d) => {
            let passed = (d - check.expected).abs() <= check.tolerance;
            CheckResult {
                name: "Fractal Dimension".to_string(),
                passed,
                message: Some(format!(
                    "Expected: {:.2} ± {:.2}, Got: {:.4}",
                    check.expected, check.tolerance, d
                )),
            }
        }
        None => CheckResult {
            name: "Fractal Dimension".to_string(),
            passed: false,
            message: Some("No dimension estimate".to_string()),
        },
    }
}

/// Validate probe distances against the plane distance
fn validate_probe_distance(
    frame: &SyntheticFrame,
    result: &FrameResult,
    check: &ProbeDistanceCheck,
) -> CheckResult {
    let Some(probes) = result.target.probes() else {
        return CheckResult {
            name: "Probe Distance".to_string(),
            passed: false,
            message: Some("Probes not enabled".to_string()),
        };
    };

    let spacing = result.target.lattice().spacing();
    let mut max_error = 0.0_f64;
    let mut violations = 0;
    for (p, d) in probes.positions().iter().zip(probes.distances()) {
        let plane = frame.interface.signed_distance(p[2]).abs();
        let error = (d.bound() - plane).abs() / spacing;
        max_error = max_error.max(error);
        if error > check.max_error_cells {
            violations += 1;
        }
    }

    CheckResult {
        name: "Probe Distance".to_string(),
        passed: violations == 0 && !probes.is_empty(),
        message: Some(format!(
            "{} probes, max error {:.3} cells ({} over {:.1})",
            probes.len(),
            max_error,
            violations,
            check.max_error_cells
        )),
    }
}

/// Compare order-invariant statistics of two runs
fn statistics_match(a: &Statistics, b: &Statistics, tolerance: f64) -> Result<(), String> {
    if a.nodes != b.nodes {
        return Err(format!("node count {} vs {}", a.nodes, b.nodes));
    }
    if a.pdf.counts() != b.pdf.counts() {
        return Err("phase pdf differs".to_string());
    }
    let close = |x: f64, y: f64| (x - y).abs() <= tolerance * x.abs().max(y.abs()).max(1.0);
    if !close(a.mass_fraction, b.mass_fraction) {
        return Err(format!(
            "mass fraction {} vs {}",
            a.mass_fraction, b.mass_fraction
        ));
    }
    if !close(a.kinetic_energy, b.kinetic_energy) {
        return Err(format!(
            "kinetic energy {} vs {}",
            a.kinetic_energy, b.kinetic_energy
        ));
    }
    if a.profile.len() != b.profile.len()
        || a.profile.iter().zip(&b.profile).any(|(x, y)| !close(*x, *y))
    {
        return Err("vertical profile differs".to_string());
    }
    Ok(())
}

/// Validate that thread count and target sharing leave the statistics unchanged
fn validate_thread_consistency(
    frame: &SyntheticFrame,
    result: &FrameResult,
    check: &ThreadConsistencyCheck,
) -> Result<CheckResult, String> {
    let reference = result.target.statistics();
    let sources = frame.sources()?;
    let mut failures = Vec::new();
    let mut runs = 0;

    for &threads in &check.threads {
        for shared in [false, true] {
            let mut config = frame.config.clone();
            config.threads = threads;
            config.shared_target = shared;
            let other = analyze_frame(&config, &sources).map_err(|e| e.to_string())?;
            runs += 1;
            let stats = other.target.statistics();
            if let Err(e) = statistics_match(&reference, &stats, check.tolerance) {
                failures.push(format!("threads={} shared={}: {}", threads, shared, e));
            }
        }
    }

    Ok(if failures.is_empty() {
        CheckResult {
            name: "Thread Consistency".to_string(),
            passed: true,
            message: Some(format!("{} runs agree", runs)),
        }
    } else {
        CheckResult {
            name: "Thread Consistency".to_string(),
            passed: false,
            message: Some(failures.join("; ")),
        }
    })
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Frame time: {:.6}", self.summary.time);
        println!("Nodes: {} in {:.3} s", self.nodes, self.elapsed);
        println!("\nDiagnostics:");
        println!("  h_cabot: {:.4e}", self.summary.mixing.h_cabot);
        if let Some(h) = self.summary.mixing.h_visual {
            println!("  h_visual: {:.4e}", h);
        }
        println!("  Potential energy: {:.4e}", self.summary.energy.potential);
        println!("  Kinetic energy: {:.4e}", self.summary.energy.kinetic);
        println!(
            "  Cell Peclet / Reynolds: {:.3} / {:.3}",
            self.summary.cells.peclet, self.summary.cells.reynolds
        );
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}

// ---------------------------------------------------------------------------
// Reference cases
// ---------------------------------------------------------------------------

/// Unit-width mesh of cubic cells centred on z = 0.
fn mesh_config(
    name: &str,
    order: usize,
    factor: f64,
    shape_mesh: [usize; 3],
) -> Result<PostConfig, String> {
    let m = (factor * order as f64) as usize;
    let dx = 1.0 / (shape_mesh[0] * m) as f64;
    let extent = [
        1.0,
        (shape_mesh[1] * m) as f64 * dx,
        (shape_mesh[2] * m) as f64 * dx,
    ];
    let json = format!(
        r#"{{
            "name": "{name}",
            "order": {order},
            "interpolation_factor": {factor:?},
            "root_mesh": [0.0, 0.0, {z0:?}],
            "extent_mesh": [{x:?}, {y:?}, {z:?}],
            "shape_mesh": [{mx}, {my}, {mz}],
            "atwood": 1.0e-3,
            "viscosity": 8.9e-7,
            "conductivity": 1.43e-7
        }}"#,
        z0 = -extent[2] / 2.0,
        x = extent[0],
        y = extent[1],
        z = extent[2] / 2.0,
        mx = shape_mesh[0],
        my = shape_mesh[1],
        mz = shape_mesh[2],
    );
    PostConfig::from_json(&json)
}

/// Diffuse planar layer four cells thick on a 16 x 16 x 64 lattice.
///
/// The f = 1/2 surface sits halfway between two z-levels, so no node lies on it.
pub fn planar_layer_test() -> Result<ReferenceTest, String> {
    let mut config = mesh_config("planar-layer", 4, 1.0, [4, 4, 16])?;
    config.threads = 4;
    let dx = config.lattice().map_err(|e| e.to_string())?.spacing();

    Ok(ReferenceTest {
        name: "Planar Mixing Layer".to_string(),
        frame: SyntheticFrame {
            config,
            interface: PlanarInterface::new(-0.5 * dx, 4.0 * dx),
            speed: 1.0e-3,
            files: 3,
            time: 1.0,
        },
        expected: ExpectedResult {
            mixing_width: Some(MixingWidthCheck { tolerance: 0.02 }),
            mixing_parameter: Some(MixingParameterCheck {
                expected: 1.0,
                tolerance: 1e-9,
            }),
            kinetic_energy: Some(KineticEnergyCheck { tolerance: 1e-9 }),
            thread_consistency: Some(ThreadConsistencyCheck {
                threads: vec![1, 2, 8],
                tolerance: 1e-9,
            }),
            ..Default::default()
        },
    })
}

/// Order-3 elements resampled to six nodes per axis.
pub fn resampled_layer_test() -> Result<ReferenceTest, String> {
    let mut config = mesh_config("resampled-layer", 3, 2.0, [2, 2, 8])?;
    config.threads = 3;
    config.shared_target = true;
    let dx = config.lattice().map_err(|e| e.to_string())?.spacing();

    Ok(ReferenceTest {
        name: "Resampled Mixing Layer".to_string(),
        frame: SyntheticFrame {
            config,
            interface: PlanarInterface::new(-0.5 * dx, 4.0 * dx),
            speed: 2.0e-3,
            files: 2,
            time: 2.5,
        },
        expected: ExpectedResult {
            mixing_width: Some(MixingWidthCheck { tolerance: 0.02 }),
            kinetic_energy: Some(KineticEnergyCheck { tolerance: 1e-9 }),
            ..Default::default()
        },
    })
}

/// Flat interface on a 32³ lattice with probes and a captured field.
pub fn flat_interface_test() -> Result<ReferenceTest, String> {
    let mut config = mesh_config("flat-interface", 4, 1.0, [8, 8, 8])?;
    config.threads = 4;
    config.capture_field = true;
    config.fractal = Some(FractalSettings::default());
    config.probes = Some(ProbeSettings {
        count: 200,
        seed: 7,
        candidates: 10,
    });
    config.validate()?;
    let dx = config.lattice().map_err(|e| e.to_string())?.spacing();

    Ok(ReferenceTest {
        name: "Flat Interface".to_string(),
        frame: SyntheticFrame {
            config,
            interface: PlanarInterface::new(-0.5 * dx, 2.0 * dx),
            speed: 1.0e-3,
            files: 4,
            time: 4.0,
        },
        expected: ExpectedResult {
            fractal: Some(FractalCheck {
                expected: 2.0,
                tolerance: 0.1,
            }),
            probe_distance: Some(ProbeDistanceCheck {
                max_error_cells: 2.5,
            }),
            ..Default::default()
        },
    })
}

/// Every reference test case
pub fn all_tests() -> Result<Vec<ReferenceTest>, String> {
    Ok(vec![
        planar_layer_test()?,
        resampled_layer_test()?,
        flat_interface_test()?,
    ])
}
