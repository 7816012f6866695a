//! SPH Fluid Simulation Kernel
//!
//! The pure numerical core of a smoothed-particle-hydrodynamics fluid solver.
//! It knows nothing about meshes, colors or files: a host seeds particles,
//! calls [`SimulationKernel::step`] once per frame and reads positions and
//! speeds back for drawing.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle storage and lattice seeding.
//! - [`sph`] -- Poly6 / spiky / viscosity kernels, density/pressure pass, force pass.
//! - [`neighbor`] -- Spatial hash grid for 27-cell neighbor queries.
//! - [`eos`] -- Stiff Tait-like equation of state and density floor.
//! - [`integrate`] -- Semi-implicit Euler integration.
//! - [`boundary`] -- World box clamping and obstacle push-out.
//! - [`obstacle`] -- Box and generic obstacles, queryable obstacle sets.
//! - [`params`] -- Simulation parameters and validation.
//!
//! # Step pipeline
//!
//! Each substep runs, strictly in order and each over all particles:
//!
//! 1. Grid rebuild from current positions
//! 2. Density and pressure
//! 3. Forces (pressure, viscosity, gravity) and velocity damping
//! 4. Integration and boundary resolution, per particle

#![warn(missing_docs)]

pub mod boundary;
pub mod eos;
pub mod integrate;
pub mod neighbor;
pub mod obstacle;
pub mod params;
pub mod particle;
pub mod sph;

use glam::Vec3;
use tracing::{debug, info};

pub use boundary::WorldBounds;
pub use eos::tait_eos;
pub use neighbor::SpatialHash;
pub use obstacle::{Aabb, BoxObstacle, GenericObstacle, Obstacle, ObstacleQuery, ObstacleSet};
pub use params::{FluidParams, ParamsError};
pub use particle::{Particle, ParticleSet};
pub use sph::{density_kernel, pressure_gradient_kernel, viscosity_laplacian, SmoothingKernels};

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Aggregate statistics over a particle snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FluidMetrics {
    /// Lowest particle density.
    pub min_density: f32,
    /// Mean particle density.
    pub mean_density: f32,
    /// Highest particle density.
    pub max_density: f32,
    /// Maximum of `|rho - rho0| / rho0` across all particles.
    pub max_density_deviation: f32,
    /// Highest particle speed.
    pub max_speed: f32,
    /// Total kinetic energy, `sum 0.5 * m * |v|^2`.
    pub kinetic_energy: f64,
}

impl FluidMetrics {
    /// Compute metrics for `particles` with per-particle `mass`.
    ///
    /// An empty set yields all zeros.
    pub fn compute(particles: &ParticleSet, mass: f32, rest_density: f32) -> Self {
        if particles.is_empty() {
            return Self::default();
        }

        let mut min_density = f32::MAX;
        let mut max_density = f32::MIN;
        let mut density_sum = 0.0_f64;
        let mut max_deviation = 0.0_f32;
        for &rho in &particles.density {
            min_density = min_density.min(rho);
            max_density = max_density.max(rho);
            density_sum += rho as f64;
            max_deviation = max_deviation.max((rho - rest_density).abs() / rest_density);
        }

        let mut max_speed = 0.0_f32;
        let mut kinetic_energy = 0.0_f64;
        for v in &particles.velocity {
            let speed_sq = v.length_squared();
            max_speed = max_speed.max(speed_sq.sqrt());
            kinetic_energy += 0.5 * mass as f64 * speed_sq as f64;
        }

        Self {
            min_density,
            mean_density: (density_sum / particles.len() as f64) as f32,
            max_density,
            max_density_deviation: max_deviation,
            max_speed,
            kinetic_energy,
        }
    }
}

/// A steppable fluid simulation back-end.
///
/// A `SimulationKernel` owns particle data and advances it through distinct
/// phases each substep:
///
/// 1. Neighbor grid rebuild
/// 2. Density summation and equation of state
/// 3. Force computation (pressure + viscosity + gravity)
/// 4. Time integration (semi-implicit Euler) and boundary resolution
pub trait SimulationKernel {
    /// Advance by `dt` seconds split into `substeps` equal substeps.
    ///
    /// `dt` is clamped to the configured maximum. A `substeps` of 0 is
    /// treated as 1.
    fn step(&mut self, dt: f32, substeps: u32);

    /// Read back current particle state.
    fn particles(&self) -> &ParticleSet;

    /// Aggregate statistics for the current state.
    fn metrics(&self) -> FluidMetrics;

    /// Number of particles in the simulation.
    fn particle_count(&self) -> usize {
        self.particles().len()
    }
}

// ---------------------------------------------------------------------------
// CpuSolver -- reference CPU implementation of SimulationKernel
// ---------------------------------------------------------------------------

/// Reference CPU implementation of the SPH solver.
///
/// Uses semi-implicit Euler integration with:
/// - Poly6 density kernel with self contribution and a density floor
/// - Tait-like EOS (gamma = 7)
/// - Spiky-gradient symmetric pressure force
/// - Viscosity-Laplacian viscous force and velocity damping
/// - World box clamping and box/generic obstacle push-out
pub struct CpuSolver {
    /// Particle data.
    particles: ParticleSet,
    /// Validated parameters, fixed for the lifetime of the solver.
    params: FluidParams,
    /// Neighbor grid, rebuilt every substep. Kept only to reuse its storage.
    grid: SpatialHash,
    /// Boxes from `params` followed by host-registered obstacles.
    obstacles: ObstacleSet,
}

impl CpuSolver {
    /// Create a solver over existing particles.
    ///
    /// Fails if `params` does not validate.
    pub fn new(particles: ParticleSet, params: FluidParams) -> Result<Self, ParamsError> {
        params.validate()?;
        let grid = SpatialHash::with_capacity(params.smoothing_radius, particles.len());
        let obstacles = params.obstacles.iter().cloned().collect();
        Ok(Self {
            particles,
            params,
            grid,
            obstacles,
        })
    }

    /// Seed `count` particles on a jittered lattice and create a solver.
    ///
    /// See [`ParticleSet::seed_lattice`] for the layout.
    pub fn initialize(count: usize, params: FluidParams, seed: u64) -> Result<Self, ParamsError> {
        params.validate()?;
        let particles = ParticleSet::seed_lattice(count, &params, seed);
        info!(
            particles = count,
            smoothing_radius = params.smoothing_radius,
            spacing = params.lattice_spacing(),
            obstacles = params.obstacles.len(),
            "fluid solver initialized"
        );
        Self::new(particles, params)
    }

    /// Simulation parameters.
    pub fn params(&self) -> &FluidParams {
        &self.params
    }

    /// Obstacles resolved by [`SimulationKernel::step`].
    pub fn obstacles(&self) -> &ObstacleSet {
        &self.obstacles
    }

    /// Register an additional obstacle, resolved after the configured boxes.
    pub fn add_obstacle(&mut self, obstacle: impl Into<Obstacle>) {
        self.obstacles.push(obstacle);
    }

    /// Advance like [`SimulationKernel::step`], resolving against a
    /// host-supplied obstacle query instead of the solver's own set.
    pub fn step_with_obstacles(&mut self, dt: f32, substeps: u32, obstacles: &dyn ObstacleQuery) {
        advance(
            &mut self.particles,
            &mut self.grid,
            &self.params,
            obstacles,
            dt,
            substeps,
        );
    }
}

impl SimulationKernel for CpuSolver {
    fn step(&mut self, dt: f32, substeps: u32) {
        advance(
            &mut self.particles,
            &mut self.grid,
            &self.params,
            &self.obstacles,
            dt,
            substeps,
        );
    }

    fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    fn metrics(&self) -> FluidMetrics {
        FluidMetrics::compute(&self.particles, self.params.particle_mass, self.params.rest_density)
    }
}

/// Clamp `dt`, split it into substeps and run the full pipeline for each.
///
/// A clamped `dt` of zero leaves the state untouched.
fn advance(
    particles: &mut ParticleSet,
    grid: &mut SpatialHash,
    params: &FluidParams,
    obstacles: &dyn ObstacleQuery,
    dt: f32,
    substeps: u32,
) {
    let dt = integrate::clamp_timestep(dt, params.max_dt);
    if dt == 0.0 {
        debug!("zero time delta, step skipped");
        return;
    }
    let substeps = substeps.max(1);
    let sub_dt = dt / substeps as f32;
    debug!(dt, substeps, "step");

    for _ in 0..substeps {
        substep(particles, grid, params, obstacles, sub_dt);
    }
}

/// One rebuild -> density -> force -> integrate cycle.
fn substep(
    particles: &mut ParticleSet,
    grid: &mut SpatialHash,
    params: &FluidParams,
    obstacles: &dyn ObstacleQuery,
    dt: f32,
) {
    grid.rebuild(&particles.position);
    sph::compute_density_pressure(particles, grid, params);
    sph::compute_forces(particles, grid, params);
    integrate::advance_particles(particles, params, obstacles, dt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_params_rejected() {
        let params = FluidParams {
            particle_mass: 0.0,
            ..FluidParams::default()
        };
        assert!(CpuSolver::initialize(10, params, 0).is_err());
    }

    #[test]
    fn initialize_seeds_requested_count() {
        let solver = CpuSolver::initialize(100, FluidParams::default(), 7).unwrap();
        assert_eq!(solver.particle_count(), 100);
        assert_eq!(solver.particles().len(), 100);
    }

    #[test]
    fn params_obstacles_are_registered() {
        let params = FluidParams {
            obstacles: vec![BoxObstacle::new(Vec3::ZERO, Vec3::ONE)],
            ..FluidParams::default()
        };
        let mut solver = CpuSolver::initialize(1, params, 0).unwrap();
        assert_eq!(solver.obstacles().len(), 1);
        solver.add_obstacle(GenericObstacle::sphere(Vec3::splat(3.0), 0.5));
        assert_eq!(solver.obstacles().len(), 2);
    }

    #[test]
    fn free_fall_single_particle() {
        let params = FluidParams::default();
        let mut solver = CpuSolver::initialize(1, params, 0).unwrap();
        let y0 = solver.particles().position(0).y;
        solver.step(0.01, 1);
        let p = solver.particles();
        // Damping runs before integration, on a particle still at rest.
        assert!((p.position(0).y - (y0 - 9.81 * 0.01 * 0.01)).abs() < 1.0e-5);
        assert!((p.velocity(0).y + 9.81 * 0.01).abs() < 1.0e-4);
    }

    #[test]
    fn large_dt_is_clamped() {
        let mut a = CpuSolver::initialize(1, FluidParams::default(), 0).unwrap();
        let mut b = CpuSolver::initialize(1, FluidParams::default(), 0).unwrap();
        a.step(1.0, 1);
        b.step(0.016, 1);
        assert_eq!(a.particles().position(0), b.particles().position(0));
    }

    #[test]
    fn zero_substeps_behaves_like_one() {
        let mut a = CpuSolver::initialize(8, FluidParams::default(), 3).unwrap();
        let mut b = CpuSolver::initialize(8, FluidParams::default(), 3).unwrap();
        a.step(0.01, 0);
        b.step(0.01, 1);
        assert_eq!(a.particles().position, b.particles().position);
    }

    #[test]
    fn metrics_of_resting_set() {
        let params = FluidParams::default();
        let particles = ParticleSet::from_state(
            &[Vec3::ZERO, Vec3::ONE],
            &[Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0)],
            params.rest_density,
        );
        let m = FluidMetrics::compute(&particles, params.particle_mass, params.rest_density);
        assert_eq!(m.min_density, 10.0);
        assert_eq!(m.max_density, 10.0);
        assert_eq!(m.max_density_deviation, 0.0);
        assert_eq!(m.max_speed, 2.0);
        assert!((m.kinetic_energy - 0.5 * 0.02 * 4.0).abs() < 1.0e-7);
    }

    #[test]
    fn metrics_of_empty_set() {
        let m = FluidMetrics::compute(&ParticleSet::new(), 0.02, 10.0);
        assert_eq!(m, FluidMetrics::default());
    }
}
