//! Frame runner with lifecycle tracking
//!
//! This module provides the `SimulationRunner`, which sits between a host's
//! frame loop and a `SimulationKernel`. Each frame it clamps the host delta,
//! advances the kernel with the configured substeps, keeps simulated time
//! and frame count, and reports statistics for the frame.

use kernel::integrate::clamp_timestep;
use kernel::{FluidMetrics, ParticleSet, SimulationKernel};

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No frame has been run yet
    Created,
    /// At least one frame has run and the stopping condition is not reached
    Running,
    /// Simulation finished (reached `max_timesteps`)
    Finished,
}

/// Statistics for one completed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Index of this frame, starting at 1
    pub frame: u64,
    /// Time delta actually simulated, after clamping (seconds)
    pub dt: f32,
    /// Simulated time at the end of this frame (seconds)
    pub sim_time: f64,
    /// Fluid statistics after the frame
    pub metrics: FluidMetrics,
}

/// Drives a simulation kernel one host frame at a time
pub struct SimulationRunner {
    /// The kernel being driven
    kernel: Box<dyn SimulationKernel + Send>,
    /// Substeps per frame
    substeps: u32,
    /// Upper bound on a frame's time delta
    max_dt: f32,
    /// Frame delta used by [`SimulationRunner::run_frame`]
    frame_dt: f32,
    /// Optional maximum number of frames
    max_timesteps: Option<u64>,
    /// Current runner state
    state: RunnerState,
    /// Current simulation time (seconds)
    sim_time: f64,
    /// Number of frames executed
    frame_count: u64,
}

impl SimulationRunner {
    /// Create a new runner around `kernel`
    ///
    /// # Arguments
    /// * `kernel` - The simulation kernel to drive
    /// * `substeps` - Substeps per frame (0 is treated as 1)
    /// * `max_dt` - Upper bound on a frame's time delta
    /// * `frame_dt` - Nominal frame delta for [`SimulationRunner::run_frame`]
    /// * `max_timesteps` - Optional maximum number of frames
    pub fn new(
        kernel: Box<dyn SimulationKernel + Send>,
        substeps: u32,
        max_dt: f32,
        frame_dt: f32,
        max_timesteps: Option<u64>,
    ) -> Self {
        Self {
            kernel,
            substeps: substeps.max(1),
            max_dt,
            frame_dt,
            max_timesteps,
            state: RunnerState::Created,
            sim_time: 0.0,
            frame_count: 0,
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Get current simulation time (seconds)
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Get number of frames executed
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether the stopping condition has been reached
    pub fn is_finished(&self) -> bool {
        self.state == RunnerState::Finished
    }

    /// The driven kernel
    pub fn kernel(&self) -> &dyn SimulationKernel {
        self.kernel.as_ref()
    }

    /// Current particle state, for rendering
    pub fn particles(&self) -> &ParticleSet {
        self.kernel.particles()
    }

    /// Advance one frame by the host delta `dt`
    ///
    /// Returns `None` without stepping once the runner has finished.
    pub fn advance(&mut self, dt: f32) -> Option<FrameStats> {
        if self.is_finished() {
            return None;
        }

        let dt = clamp_timestep(dt, self.max_dt);
        self.kernel.step(dt, self.substeps);
        self.sim_time += dt as f64;
        self.frame_count += 1;
        self.state = match self.max_timesteps {
            Some(max) if self.frame_count >= max => {
                tracing::info!(
                    frames = self.frame_count,
                    sim_time = self.sim_time,
                    "simulation finished"
                );
                RunnerState::Finished
            }
            _ => RunnerState::Running,
        };

        let stats = FrameStats {
            frame: self.frame_count,
            dt,
            sim_time: self.sim_time,
            metrics: self.kernel.metrics(),
        };
        tracing::debug!(
            frame = stats.frame,
            max_speed = stats.metrics.max_speed,
            max_density = stats.metrics.max_density,
            "frame done"
        );
        Some(stats)
    }

    /// Advance one frame by the configured frame delta
    pub fn run_frame(&mut self) -> Option<FrameStats> {
        self.advance(self.frame_dt)
    }

    /// Run up to `frames` frames, stopping early if the runner finishes
    pub fn run_frames(&mut self, frames: u64) -> Vec<FrameStats> {
        let mut stats = Vec::new();
        for _ in 0..frames {
            match self.run_frame() {
                Some(s) => stats.push(s),
                None => break,
            }
        }
        stats
    }

    /// Run until `max_timesteps` is reached and return the last frame's
    /// statistics
    ///
    /// Without a frame limit this would never return, so `None` is returned
    /// immediately in that case.
    pub fn run_to_completion(&mut self) -> Option<FrameStats> {
        self.max_timesteps?;
        let mut last = None;
        while let Some(stats) = self.run_frame() {
            last = Some(stats);
        }
        last
    }
}
