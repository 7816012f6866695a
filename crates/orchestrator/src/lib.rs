//! Orchestration Layer
//!
//! This crate is the host side of the fluid solver:
//! - JSON scene configuration loading and validation
//! - Solver construction from a scene
//! - A frame runner that feeds host frame deltas into the solver

#![warn(missing_docs)]

pub mod config;
pub mod runner;

pub use config::{ConfigError, SimulationConfig};
pub use runner::{FrameStats, RunnerState, SimulationRunner};

use std::path::Path;

use kernel::CpuSolver;

/// Create a complete simulation from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Seed the particles and create the CPU solver
/// 3. Wrap it in a SimulationRunner
///
/// # Arguments
/// * `config_path` - Path to the JSON configuration file
///
/// # Returns
/// A `SimulationRunner` ready to run frames, or an error if setup fails
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let mut runner = create_simulation("configs/dam-break.json")?;
/// while let Some(stats) = runner.run_frame() {
///     println!("frame {} max speed {:.2}", stats.frame, stats.metrics.max_speed);
/// }
/// # Ok::<(), orchestrator::ConfigError>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<SimulationRunner, ConfigError> {
    let config_path = config_path.as_ref();
    tracing::info!("Creating simulation from config: {}", config_path.display());

    let config = SimulationConfig::load(config_path)?;
    runner_for(&config)
}

/// Seed particles and build the CPU solver for a validated configuration
pub fn create_solver(config: &SimulationConfig) -> Result<CpuSolver, ConfigError> {
    let solver = CpuSolver::initialize(config.particle_count, config.to_params(), config.seed)?;
    Ok(solver)
}

/// Build a runner for a configuration, using its substeps, frame delta and
/// frame limit
pub fn runner_for(config: &SimulationConfig) -> Result<SimulationRunner, ConfigError> {
    let solver = create_solver(config)?;
    tracing::info!(
        name = %config.name,
        particles = config.particle_count,
        "simulation ready"
    );
    Ok(SimulationRunner::new(
        Box::new(solver),
        config.fluid.substeps,
        config.fluid.max_dt,
        config.frame_dt,
        config.max_timesteps,
    ))
}
