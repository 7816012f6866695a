//! Simulation parameters and their validation.
//!
//! Parameters are set once before stepping and treated as immutable for the
//! lifetime of a solver. Every check that could otherwise blow up mid-run
//! (zero smoothing radius, zero mass, an inverted world box) happens here.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::boundary::WorldBounds;
use crate::eos;
use crate::obstacle::BoxObstacle;

/// Parameters controlling the fluid simulation.
///
/// Defaults reproduce a small, fairly viscous pool of fluid dropped into a
/// 10 m cube. Every field may be omitted when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidParams {
    /// Rest density rho0.
    pub rest_density: f32,
    /// Gas constant k of the Tait equation of state.
    pub gas_constant: f32,
    /// Viscosity coefficient mu.
    pub viscosity: f32,
    /// Smoothing radius h. Also the spatial hash cell size.
    pub smoothing_radius: f32,
    /// Mass carried by every particle.
    pub particle_mass: f32,
    /// Physical/visual diameter of a particle, used for obstacle contact.
    pub particle_size: f32,
    /// Constant body acceleration.
    pub gravity: Vec3,
    /// Axis-aligned world box particles are clamped into.
    pub world: WorldBounds,
    /// Restitution applied to a velocity component clamped by the world box.
    pub bounce: f32,
    /// Restitution applied after an obstacle push-out.
    pub cube_bounce: f32,
    /// Multiplier applied to every velocity at the end of the force pass.
    ///
    /// Not a physical force: it bleeds off the energy the approximate kernel
    /// sums inject. Tune it, but keep it in (0, 1].
    pub velocity_damping: f32,
    /// Upper bound on the time delta of one step (seconds).
    pub max_dt: f32,
    /// Substeps per host step when the caller does not specify a count.
    pub substeps: u32,
    /// Height of the lowest lattice layer at initialization.
    pub spawn_height: f32,
    /// Lattice jitter radius as a fraction of the lattice spacing.
    pub jitter_fraction: f32,
    /// Lattice spacing as a fraction of the smoothing radius.
    pub lattice_spacing_factor: f32,
    /// Solid box obstacles.
    pub obstacles: Vec<BoxObstacle>,
}

impl Default for FluidParams {
    fn default() -> Self {
        Self {
            rest_density: 10.0,
            gas_constant: 50.0,
            viscosity: 0.5,
            smoothing_radius: 0.3,
            particle_mass: 0.02,
            particle_size: 0.1,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            world: WorldBounds::default(),
            bounce: 0.5,
            cube_bounce: 0.5,
            velocity_damping: 0.999,
            max_dt: 0.016,
            substeps: 1,
            spawn_height: 2.0,
            jitter_fraction: 0.1,
            lattice_spacing_factor: 0.5,
            obstacles: Vec::new(),
        }
    }
}

impl FluidParams {
    /// Validate the parameters.
    ///
    /// A failure here is fatal: the solver refuses to construct rather than
    /// discovering the problem mid-run.
    pub fn validate(&self) -> Result<(), ParamsError> {
        positive("smoothing_radius", self.smoothing_radius)?;
        positive("particle_mass", self.particle_mass)?;
        positive("rest_density", self.rest_density)?;
        positive("particle_size", self.particle_size)?;
        positive("max_dt", self.max_dt)?;
        positive("lattice_spacing_factor", self.lattice_spacing_factor)?;
        non_negative("gas_constant", self.gas_constant)?;
        non_negative("viscosity", self.viscosity)?;
        non_negative("bounce", self.bounce)?;
        non_negative("cube_bounce", self.cube_bounce)?;
        non_negative("jitter_fraction", self.jitter_fraction)?;

        if !self.spawn_height.is_finite() {
            return Err(ParamsError::NotFinite { field: "spawn_height" });
        }
        if !self.gravity.is_finite() {
            return Err(ParamsError::NotFinite { field: "gravity" });
        }
        if !(self.velocity_damping > 0.0 && self.velocity_damping <= 1.0) {
            return Err(ParamsError::InvalidDamping(self.velocity_damping));
        }
        if self.substeps == 0 {
            return Err(ParamsError::ZeroSubsteps);
        }
        if !self.world.center.is_finite()
            || !self.world.size.is_finite()
            || self.world.size.min_element() <= 0.0
        {
            return Err(ParamsError::DegenerateWorld(self.world.size));
        }
        for (index, obstacle) in self.obstacles.iter().enumerate() {
            if !obstacle.center.is_finite()
                || !obstacle.half_extents.is_finite()
                || obstacle.half_extents.min_element() <= 0.0
            {
                return Err(ParamsError::DegenerateObstacle {
                    index,
                    half_extents: obstacle.half_extents,
                });
            }
            if !obstacle.rotation.is_finite() {
                return Err(ParamsError::NotFinite { field: "obstacles.rotation" });
            }
            let length_sq = obstacle.rotation.length_squared();
            if (length_sq - 1.0).abs() > ROTATION_NORM_TOLERANCE {
                return Err(ParamsError::NonUnitRotation { index, length_sq });
            }
        }
        Ok(())
    }

    /// Squared smoothing radius.
    #[inline]
    pub fn smoothing_radius_sq(&self) -> f32 {
        self.smoothing_radius * self.smoothing_radius
    }

    /// Lowest density the density pass will report.
    #[inline]
    pub fn density_floor(&self) -> f32 {
        eos::density_floor(self.rest_density)
    }

    /// Distance between neighboring lattice sites at initialization.
    #[inline]
    pub fn lattice_spacing(&self) -> f32 {
        self.lattice_spacing_factor * self.smoothing_radius
    }

    /// Contact radius used for obstacle overlap and generic push-out.
    #[inline]
    pub fn particle_radius(&self) -> f32 {
        0.5 * self.particle_size
    }
}

/// Allowed deviation of an obstacle rotation's squared norm from 1.
const ROTATION_NORM_TOLERANCE: f32 = 1.0e-3;

fn positive(field: &'static str, value: f32) -> Result<(), ParamsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParamsError::NotPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ParamsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ParamsError::Negative { field, value })
    }
}

/// Invalid simulation configuration, reported before any step runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamsError {
    /// A field that must be strictly positive and finite is not.
    NotPositive {
        /// Parameter name.
        field: &'static str,
        /// Offending value.
        value: f32,
    },
    /// A field that must be non-negative and finite is not.
    Negative {
        /// Parameter name.
        field: &'static str,
        /// Offending value.
        value: f32,
    },
    /// A vector or scalar field contains NaN or infinity.
    NotFinite {
        /// Parameter name.
        field: &'static str,
    },
    /// Velocity damping outside (0, 1].
    InvalidDamping(f32),
    /// Substep count of zero.
    ZeroSubsteps,
    /// World box with a non-positive or non-finite extent.
    DegenerateWorld(Vec3),
    /// Obstacle with a non-positive or non-finite half-extent.
    DegenerateObstacle {
        /// Position in the obstacle list.
        index: usize,
        /// Offending half-extents.
        half_extents: Vec3,
    },
    /// Obstacle rotation that is not a unit quaternion, so its frame would
    /// scale as well as rotate.
    NonUnitRotation {
        /// Position in the obstacle list.
        index: usize,
        /// Squared norm of the quaternion.
        length_sq: f32,
    },
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            Self::Negative { field, value } => {
                write!(f, "{field} must be non-negative, got {value}")
            }
            Self::NotFinite { field } => write!(f, "{field} must be finite"),
            Self::InvalidDamping(value) => {
                write!(f, "velocity_damping must be in (0, 1], got {value}")
            }
            Self::ZeroSubsteps => write!(f, "substeps must be at least 1"),
            Self::DegenerateWorld(size) => {
                write!(f, "world size must be positive on every axis, got {size}")
            }
            Self::DegenerateObstacle { index, half_extents } => write!(
                f,
                "obstacle {index} must have positive half-extents, got {half_extents}"
            ),
            Self::NonUnitRotation { index, length_sq } => write!(
                f,
                "obstacle {index} rotation must be a unit quaternion, got squared norm {length_sq}"
            ),
        }
    }
}

impl std::error::Error for ParamsError {}
