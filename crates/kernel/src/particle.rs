//! Particle storage using a struct-of-arrays layout.
//!
//! Every pass touches one or two fields for every particle, so each field is
//! its own contiguous array. Index `i` in every array refers to the same
//! particle for the lifetime of the set; particles are never added or removed
//! once seeded.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::params::FluidParams;

/// Value snapshot of one particle, for hosts that prefer whole records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Position (m).
    pub position: Vec3,
    /// Velocity (m/s).
    pub velocity: Vec3,
    /// Acceleration accumulated by the last force pass (m/s^2).
    pub acceleration: Vec3,
    /// Clamped density from the last density pass.
    pub density: f32,
    /// Pressure from the last density pass.
    pub pressure: f32,
}

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel and always share the same length.
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    /// Positions (m).
    pub position: Vec<Vec3>,
    /// Velocities (m/s).
    pub velocity: Vec<Vec3>,
    /// Accelerations (m/s^2). Zeroed by the integrator after use.
    pub acceleration: Vec<Vec3>,
    /// Densities, never below the density floor after a density pass.
    pub density: Vec<f32>,
    /// Pressures. Negative when expanded, positive when compressed.
    pub pressure: Vec<f32>,
}

impl ParticleSet {
    /// Create an empty particle set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty particle set with room for `n` particles.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            position: Vec::with_capacity(n),
            velocity: Vec::with_capacity(n),
            acceleration: Vec::with_capacity(n),
            density: Vec::with_capacity(n),
            pressure: Vec::with_capacity(n),
        }
    }

    /// Number of particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// True when the set holds no particles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Append a particle at rest.
    ///
    /// Density starts at `rest_density` and pressure at zero, which is what
    /// the equation of state returns at rest.
    pub fn push(&mut self, position: Vec3, velocity: Vec3, rest_density: f32) {
        self.position.push(position);
        self.velocity.push(velocity);
        self.acceleration.push(Vec3::ZERO);
        self.density.push(rest_density);
        self.pressure.push(0.0);
    }

    /// Build a set from explicit positions and velocities.
    ///
    /// # Panics
    /// Panics if the two slices differ in length.
    pub fn from_state(positions: &[Vec3], velocities: &[Vec3], rest_density: f32) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "positions and velocities must have the same length"
        );
        let mut set = Self::with_capacity(positions.len());
        for (&p, &v) in positions.iter().zip(velocities) {
            set.push(p, v, rest_density);
        }
        set
    }

    /// Seed `count` particles on a jittered cubic lattice.
    ///
    /// The lattice has `n` sites per side, the smallest `n` with
    /// `n^3 >= count`, filled x-major then y then z until `count` sites are
    /// used. It is centered on the world center in x and z and its lowest
    /// layer sits at `spawn_height`. Each site is offset by a uniform sample
    /// inside a sphere of radius `jitter_fraction * spacing`, drawn from a
    /// generator seeded with `seed` so runs are reproducible.
    pub fn seed_lattice(count: usize, params: &FluidParams, seed: u64) -> Self {
        let mut set = Self::with_capacity(count);
        if count == 0 {
            return set;
        }

        let side = lattice_side(count);
        let spacing = params.lattice_spacing();
        let jitter = params.jitter_fraction * spacing;
        let half_span = 0.5 * (side - 1) as f32 * spacing;
        let origin = Vec3::new(
            params.world.center.x - half_span,
            params.spawn_height,
            params.world.center.z - half_span,
        );

        let mut rng = StdRng::seed_from_u64(seed);
        'fill: for x in 0..side {
            for y in 0..side {
                for z in 0..side {
                    if set.len() == count {
                        break 'fill;
                    }
                    let site = origin + Vec3::new(x as f32, y as f32, z as f32) * spacing;
                    let offset = if jitter > 0.0 {
                        random_in_sphere(&mut rng) * jitter
                    } else {
                        Vec3::ZERO
                    };
                    set.push(site + offset, Vec3::ZERO, params.rest_density);
                }
            }
        }
        set
    }

    /// Position of particle `i`.
    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        self.position[i]
    }

    /// Velocity of particle `i`.
    #[inline]
    pub fn velocity(&self, i: usize) -> Vec3 {
        self.velocity[i]
    }

    /// Speed (velocity magnitude) of particle `i`.
    #[inline]
    pub fn speed(&self, i: usize) -> f32 {
        self.velocity[i].length()
    }

    /// Speed of particle `i` divided by `max_speed`, clamped to [0, 1].
    ///
    /// This is the value a renderer maps to a color ramp. A non-positive
    /// `max_speed` yields 0.
    pub fn normalized_speed(&self, i: usize, max_speed: f32) -> f32 {
        if max_speed <= 0.0 {
            return 0.0;
        }
        (self.speed(i) / max_speed).clamp(0.0, 1.0)
    }

    /// Snapshot of particle `i`.
    pub fn particle(&self, i: usize) -> Particle {
        Particle {
            position: self.position[i],
            velocity: self.velocity[i],
            acceleration: self.acceleration[i],
            density: self.density[i],
            pressure: self.pressure[i],
        }
    }

    /// Iterate over snapshots of every particle.
    pub fn iter(&self) -> impl Iterator<Item = Particle> + '_ {
        (0..self.len()).map(|i| self.particle(i))
    }

    /// All positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.position
    }

    /// All velocities.
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocity
    }
}

/// Smallest `n` with `n^3 >= count`.
pub fn lattice_side(count: usize) -> usize {
    let mut n = (count as f64).cbrt().floor() as usize;
    while n.pow(3) < count {
        n += 1;
    }
    n
}

/// Uniform sample inside the unit sphere, by rejection.
fn random_in_sphere(rng: &mut StdRng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if v.length_squared() <= 1.0 {
            return v;
        }
    }
}
