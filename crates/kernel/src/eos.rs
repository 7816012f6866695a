//! Equation of state and density clamping for weakly-compressible SPH.
//!
//! Pressure is derived from the summed density with a stiff Tait-like power law,
//! so a small density excess produces a large restoring pressure without solving
//! a pressure Poisson equation.

/// Tait exponent (gamma). 7 is the standard weakly-compressible water value.
pub const TAIT_GAMMA: i32 = 7;

/// Fraction of the rest density below which summed densities are clamped.
pub const DENSITY_FLOOR_FRACTION: f32 = 0.5;

/// Tait equation of state.
///
/// ```text
/// P = k * ((rho / rho0)^7 - 1)
/// ```
///
/// # Arguments
/// * `density` - Current (already clamped) density.
/// * `rest_density` - Reference rest density rho0.
/// * `stiffness` - Gas constant k.
///
/// # Returns
/// Gauge pressure. Negative (expansive) when `density < rest_density`,
/// positive (compressive) above it, zero at rest.
pub fn tait_eos(density: f32, rest_density: f32, stiffness: f32) -> f32 {
    let ratio = density / rest_density;
    stiffness * (ratio.powi(TAIT_GAMMA) - 1.0)
}

/// Lowest density a particle is allowed to report for a given rest density.
#[inline]
pub fn density_floor(rest_density: f32) -> f32 {
    DENSITY_FLOOR_FRACTION * rest_density
}

/// Clamp a summed density to the floor so sparse regions cannot blow up the
/// `p / rho^2` terms of the pressure force.
#[inline]
pub fn clamp_density(density: f32, rest_density: f32) -> f32 {
    density.max(density_floor(rest_density))
}
