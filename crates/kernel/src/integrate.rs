//! Semi-implicit (symplectic) Euler time integration.

use glam::Vec3;
use tracing::warn;

use crate::boundary;
use crate::obstacle::ObstacleQuery;
use crate::params::FluidParams;
use crate::particle::ParticleSet;

/// Clamp a host-supplied time delta to `[0, max_dt]`.
///
/// Hosts feed wall-clock frame times, which spike. Capping the step bounds
/// per-step displacement. A NaN, infinite or negative delta is treated as 0.
pub fn clamp_timestep(dt: f32, max_dt: f32) -> f32 {
    if !dt.is_finite() || dt < 0.0 {
        warn!(dt, "invalid time delta, treating as 0");
        return 0.0;
    }
    dt.min(max_dt)
}

/// One semi-implicit Euler update.
///
/// ```text
/// v' = v + a * dt
/// x' = x + v' * dt
/// ```
///
/// Position is advanced with the already-updated velocity.
#[inline]
pub fn integrate_particle(position: Vec3, velocity: Vec3, acceleration: Vec3, dt: f32) -> (Vec3, Vec3) {
    let velocity = velocity + acceleration * dt;
    let position = position + velocity * dt;
    (position, velocity)
}

/// Integrate every particle, zero its acceleration, then resolve boundaries.
///
/// Each particle is finished (integrated and pushed back inside) before the
/// next one is touched; no particle reads another's state here.
pub fn advance_particles(
    particles: &mut ParticleSet,
    params: &FluidParams,
    obstacles: &dyn ObstacleQuery,
    dt: f32,
) {
    for i in 0..particles.len() {
        let (position, velocity) = integrate_particle(
            particles.position[i],
            particles.velocity[i],
            particles.acceleration[i],
            dt,
        );
        particles.acceleration[i] = Vec3::ZERO;

        let (position, velocity) = boundary::resolve_boundaries(position, velocity, params, obstacles);
        particles.position[i] = position;
        particles.velocity[i] = velocity;
    }
}
