//! Reference test framework for SPH fluid scenes
//!
//! This crate runs whole scenes loaded from JSON configuration through the
//! orchestrator and validates the final fluid state against scene-level
//! criteria: containment, density floor, finiteness, settling and obstacle
//! clearance.


use anyhow::{Context, Result};
use kernel::{FluidMetrics, FluidParams, ParticleSet};
use orchestrator::SimulationConfig;

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Particles stay inside the world box
    pub containment: Option<ContainmentCheck>,
    /// No density drops below the configured floor
    pub density_floor: bool,
    /// Fluid has come to rest near the floor
    pub settling: Option<SettlingCheck>,
    /// No particle is buried inside an obstacle
    pub obstacle_clearance: Option<ObstacleClearanceCheck>,
    /// Upper bound on the final particle speed (m/s)
    pub max_speed: Option<f32>,
}

/// Check that particles remain inside the world box
#[derive(Debug, Clone)]
pub struct ContainmentCheck {
    /// Distance a particle may sit outside a wall before failing
    pub margin: f32,
}

/// Check that the fluid has settled on the floor
#[derive(Debug, Clone)]
pub struct SettlingCheck {
    /// Maximum mean particle height above the world floor (m)
    pub max_mean_height: f32,
    /// Maximum final kinetic energy as a fraction of the run's peak
    pub max_energy_fraction: f64,
}

/// Check that particles are not inside any obstacle
#[derive(Debug, Clone)]
pub struct ObstacleClearanceCheck {
    /// Depth inside a box face that still counts as on the surface
    pub margin: f32,
}

/// Result of a single validation check
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Optional message with details
    pub message: Option<String>,
}

/// Result of running a reference test
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether all checks passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Fluid statistics after the final frame
    pub metrics: FluidMetrics,
    /// Highest kinetic energy seen during the run
    pub peak_kinetic_energy: f64,
    /// Number of frames executed
    pub frames: u64,
    /// Total simulated time (seconds)
    pub sim_time: f64,
}

/// A reference test case
#[derive(Debug, Clone)]
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to the scene configuration file
    pub config_path: String,
    /// Frames to run; `None` runs to the scene's `max_timesteps`
    pub frames: Option<u64>,
    /// Expected results
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult> {
        tracing::info!("Running reference test: {}", self.name);

        let config = SimulationConfig::load(&self.config_path)
            .with_context(|| format!("loading scene for '{}'", self.name))?;
        let params = config.to_params();
        let frames = self
            .frames
            .or(config.max_timesteps)
            .with_context(|| {
                format!("'{}' has no frame count and the scene has no max_timesteps", self.name)
            })?;

        let mut runner = orchestrator::runner_for(&config)?;

        let mut peak_kinetic_energy = 0.0_f64;
        let mut metrics =
            FluidMetrics::compute(runner.particles(), params.particle_mass, params.rest_density);
        for _ in 0..frames {
            let Some(stats) = runner.run_frame() else {
                break;
            };
            metrics = stats.metrics;
            peak_kinetic_energy = peak_kinetic_energy.max(metrics.kinetic_energy);
            if stats.frame % 100 == 0 {
                tracing::info!(
                    frame = stats.frame,
                    max_speed = metrics.max_speed,
                    kinetic_energy = metrics.kinetic_energy,
                    "progress"
                );
            }
        }

        let particles = runner.particles();
        let mut checks = vec![validate_finite(particles)];

        if let Some(check) = &self.expected.containment {
            checks.push(validate_containment(particles, &params, check));
        }

        if self.expected.density_floor {
            checks.push(validate_density_floor(&metrics, &params));
        }

        if let Some(check) = &self.expected.settling {
            checks.push(validate_settling(particles, &params, &metrics, peak_kinetic_energy, check));
        }

        if let Some(check) = &self.expected.obstacle_clearance {
            checks.push(validate_obstacle_clearance(particles, &params, check));
        }

        if let Some(limit) = self.expected.max_speed {
            checks.push(validate_max_speed(&metrics, limit));
        }

        let passed = checks.iter().all(|c| c.passed);

        Ok(TestResult {
            name: self.name.clone(),
            passed,
            checks,
            metrics,
            peak_kinetic_energy,
            frames: runner.frame_count(),
            sim_time: runner.sim_time(),
        })
    }
}

/// Validate that every position and velocity is finite
fn validate_finite(particles: &ParticleSet) -> CheckResult {
    let bad = (0..particles.len())
        .filter(|&i| !(particles.position(i).is_finite() && particles.velocity(i).is_finite()))
        .count();

    CheckResult {
        name: "Finite State".to_string(),
        passed: bad == 0,
        message: Some(if bad == 0 {
            format!("All {} particles finite", particles.len())
        } else {
            format!("{} / {} particles have non-finite state", bad, particles.len())
        }),
    }
}

/// Validate that particles are within the world box
fn validate_containment(particles: &ParticleSet, params: &FluidParams, check: &ContainmentCheck) -> CheckResult {
    let min = params.world.min() - glam::Vec3::splat(check.margin);
    let max = params.world.max() + glam::Vec3::splat(check.margin);

    let mut violations = 0;
    let mut first = None;
    for (i, &p) in particles.positions().iter().enumerate() {
        if p.cmplt(min).any() || p.cmpgt(max).any() {
            violations += 1;
            first.get_or_insert((i, p));
        }
    }

    match first {
        None => CheckResult {
            name: "Containment".to_string(),
            passed: true,
            message: Some(format!("All {} particles inside the world", particles.len())),
        },
        Some((i, p)) => CheckResult {
            name: "Containment".to_string(),
            passed: false,
            message: Some(format!(
                "{} particles outside the world (first: #{} at {})",
                violations, i, p
            )),
        },
    }
}

/// Validate that no density fell below the floor
fn validate_density_floor(metrics: &FluidMetrics, params: &FluidParams) -> CheckResult {
    let floor = params.density_floor();
    let passed = metrics.min_density >= floor;
    CheckResult {
        name: "Density Floor".to_string(),
        passed,
        message: Some(format!(
            "min density {:.4} (floor: {:.4}), max deviation {:.1}%",
            metrics.min_density,
            floor,
            metrics.max_density_deviation * 100.0
        )),
    }
}

/// Validate that the fluid has settled near the floor
fn validate_settling(
    particles: &ParticleSet,
    params: &FluidParams,
    metrics: &FluidMetrics,
    peak_kinetic_energy: f64,
    check: &SettlingCheck,
) -> CheckResult {
    let floor_y = params.world.min().y;
    let mean_height = if particles.is_empty() {
        0.0
    } else {
        particles.positions().iter().map(|p| p.y - floor_y).sum::<f32>() / particles.len() as f32
    };
    let energy_fraction = if peak_kinetic_energy > 0.0 {
        metrics.kinetic_energy / peak_kinetic_energy
    } else {
        0.0
    };

    let height_ok = mean_height <= check.max_mean_height;
    let energy_ok = energy_fraction <= check.max_energy_fraction;

    if height_ok && energy_ok {
        CheckResult {
            name: "Settling".to_string(),
            passed: true,
            message: Some(format!(
                "Mean height {:.3} m, energy {:.1}% of peak",
                mean_height,
                energy_fraction * 100.0
            )),
        }
    } else {
        let mut issues = Vec::new();
        if !height_ok {
            issues.push(format!(
                "Mean height: {:.3} m (limit: {:.3} m)",
                mean_height, check.max_mean_height
            ));
        }
        if !energy_ok {
            issues.push(format!(
                "Energy: {:.1}% of peak (limit: {:.1}%)",
                energy_fraction * 100.0,
                check.max_energy_fraction * 100.0
            ));
        }
        CheckResult {
            name: "Settling".to_string(),
            passed: false,
            message: Some(issues.join(", ")),
        }
    }
}

/// Validate that no particle is buried inside a box obstacle
fn validate_obstacle_clearance(
    particles: &ParticleSet,
    params: &FluidParams,
    check: &ObstacleClearanceCheck,
) -> CheckResult {
    let mut buried = 0;
    for &p in particles.positions() {
        let inside = params.obstacles.iter().any(|obstacle| {
            let local = obstacle.world_to_local(p).abs();
            local
                .cmplt(obstacle.half_extents - glam::Vec3::splat(check.margin))
                .all()
        });
        if inside {
            buried += 1;
        }
    }

    CheckResult {
        name: "Obstacle Clearance".to_string(),
        passed: buried == 0,
        message: Some(format!(
            "{} particles inside {} obstacles",
            buried,
            params.obstacles.len()
        )),
    }
}

/// Validate the final maximum speed
fn validate_max_speed(metrics: &FluidMetrics, limit: f32) -> CheckResult {
    CheckResult {
        name: "Max Speed".to_string(),
        passed: metrics.max_speed <= limit,
        message: Some(format!("{:.3} m/s (limit: {:.3} m/s)", metrics.max_speed, limit)),
    }
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Frames: {}", self.frames);
        println!("Simulated time: {:.3} s", self.sim_time);
        println!("\nFluid Metrics:");
        println!(
            "  Density: min {:.3}, mean {:.3}, max {:.3}",
            self.metrics.min_density, self.metrics.mean_density, self.metrics.max_density
        );
        println!("  Max density deviation: {:.1}%", self.metrics.max_density_deviation * 100.0);
        println!("  Max speed: {:.3} m/s", self.metrics.max_speed);
        println!(
            "  Kinetic energy: {:.4} (peak {:.4})",
            self.metrics.kinetic_energy, self.peak_kinetic_energy
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
