//! SPH smoothing kernels and the two per-particle passes built on them.
//!
//! Three kernels from Mueller et al. (2003) are used, each for the quantity
//! it approximates best:
//!
//! - Poly6 for density. It is evaluated on the squared distance so the hot
//!   loop needs no square root.
//! - The gradient of the spiky kernel for pressure. It does not vanish at
//!   r -> 0, so close particles keep repelling.
//! - The Laplacian of the viscosity kernel for viscous diffusion. It is
//!   positive everywhere inside the support.
//!
//! All three have compact support of radius `h`.
//!
//! The passes read one snapshot of every particle and write only the
//! particle they are computing, so each can run per particle in parallel
//! (`parallel` feature).

use std::f32::consts::PI;

use glam::Vec3;

use crate::eos;
use crate::neighbor::SpatialHash;
use crate::params::FluidParams;
use crate::particle::ParticleSet;

/// Squared separation below which a neighbor pair is skipped in the force
/// pass. Both the gradient direction and the viscosity term degenerate there.
pub const MIN_SEPARATION_SQ: f32 = 1.0e-6;

/// Densities at or below this are not divided by in the pressure term, and a
/// particle this thin feels only gravity.
pub const DENSITY_EPSILON: f32 = 1.0e-3;

/// Smoothing kernels for one smoothing radius, with their normalization
/// constants computed once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingKernels {
    h: f32,
    h_sq: f32,
    poly6: f32,
    spiky_gradient: f32,
    viscosity_laplacian: f32,
}

impl SmoothingKernels {
    /// Precompute kernel coefficients for smoothing radius `h`.
    pub fn new(h: f32) -> Self {
        let h3 = h * h * h;
        let h6 = h3 * h3;
        let h9 = h6 * h3;
        Self {
            h,
            h_sq: h * h,
            poly6: 315.0 / (64.0 * PI * h9),
            spiky_gradient: -45.0 / (PI * h6),
            viscosity_laplacian: 45.0 / (PI * h6),
        }
    }

    /// Smoothing radius these kernels were built for.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.h
    }

    /// Poly6 density kernel on the squared distance.
    ///
    /// ```text
    /// W(r^2, h) = 315 / (64 pi h^9) * (h^2 - r^2)^3    for 0 <= r^2 <= h^2
    /// W(r^2, h) = 0                                     otherwise
    /// ```
    #[inline]
    pub fn density(&self, r_sq: f32) -> f32 {
        if !(0.0..=self.h_sq).contains(&r_sq) {
            return 0.0;
        }
        let d = self.h_sq - r_sq;
        self.poly6 * d * d * d
    }

    /// Spiky kernel gradient for the displacement `r`.
    ///
    /// ```text
    /// grad W(r, h) = -45 / (pi h^6) * (h - |r|)^2 * r / |r|    for 0 < |r| <= h
    /// grad W(r, h) = 0                                          otherwise
    /// ```
    ///
    /// The result points against `r`. With `r = x_i - x_j` it points from
    /// particle i toward j, which makes `-grad W` repulsive.
    #[inline]
    pub fn pressure_gradient(&self, r: Vec3) -> Vec3 {
        let len = r.length();
        if len <= 0.0 || len > self.h {
            return Vec3::ZERO;
        }
        let d = self.h - len;
        r * (self.spiky_gradient * d * d / len)
    }

    /// Viscosity kernel Laplacian.
    ///
    /// ```text
    /// lap W(r, h) = 45 / (pi h^6) * (h - r)    for 0 <= r <= h
    /// lap W(r, h) = 0                          otherwise
    /// ```
    #[inline]
    pub fn viscosity_laplacian(&self, r: f32) -> f32 {
        if !(0.0..=self.h).contains(&r) {
            return 0.0;
        }
        self.viscosity_laplacian * (self.h - r)
    }
}

/// Poly6 density kernel. See [`SmoothingKernels::density`].
pub fn density_kernel(r_sq: f32, h: f32) -> f32 {
    SmoothingKernels::new(h).density(r_sq)
}

/// Spiky pressure gradient. See [`SmoothingKernels::pressure_gradient`].
pub fn pressure_gradient_kernel(r: Vec3, h: f32) -> Vec3 {
    SmoothingKernels::new(h).pressure_gradient(r)
}

/// Viscosity Laplacian. See [`SmoothingKernels::viscosity_laplacian`].
pub fn viscosity_laplacian(r: f32, h: f32) -> f32 {
    SmoothingKernels::new(h).viscosity_laplacian(r)
}

/// Symmetric pressure term between particles i and j.
///
/// ```text
/// T_ij = -m * (P_i / rho_i^2 + P_j / rho_j^2) * grad W(r_ij, h)
/// ```
///
/// with `r_ij = x_i - x_j`. Swapping i and j negates `r_ij` and therefore
/// the term, so `T_ij = -T_ji`. The force pass scales it by `rho_j`.
pub fn symmetric_pressure_term(
    r_ij: Vec3,
    pressure_i: f32,
    density_i: f32,
    pressure_j: f32,
    density_j: f32,
    mass: f32,
    kernels: &SmoothingKernels,
) -> Vec3 {
    let p_over_rho2 =
        pressure_i / (density_i * density_i) + pressure_j / (density_j * density_j);
    -mass * p_over_rho2 * kernels.pressure_gradient(r_ij)
}

/// Density/pressure pass.
///
/// ```text
/// rho_i = max(sum_j m * W(|x_j - x_i|^2, h), rho0 / 2)
/// P_i   = k * ((rho_i / rho0)^7 - 1)
/// ```
///
/// The sum runs over every candidate of the 27-cell query, `i` included. The
/// self term `m * W(0, h)` keeps an isolated particle from reporting zero
/// density. It is a stabilization choice, not a derived quantity, as is the
/// floor at half the rest density.
///
/// `grid` must have been rebuilt from the current positions.
pub fn compute_density_pressure(particles: &mut ParticleSet, grid: &SpatialHash, params: &FluidParams) {
    let kernels = SmoothingKernels::new(params.smoothing_radius);
    let positions = &particles.position;
    fill_per_particle(&mut particles.density, |i| {
        particle_density(i, positions, grid, params, &kernels)
    });

    let densities = &particles.density;
    let rest_density = params.rest_density;
    let stiffness = params.gas_constant;
    fill_per_particle(&mut particles.pressure, |i| {
        eos::tait_eos(densities[i], rest_density, stiffness)
    });
}

/// Clamped density of particle `i`.
fn particle_density(
    i: usize,
    positions: &[Vec3],
    grid: &SpatialHash,
    params: &FluidParams,
    kernels: &SmoothingKernels,
) -> f32 {
    let pos_i = positions[i];
    let mut rho = 0.0;
    grid.for_each_candidate(pos_i, |j| {
        rho += params.particle_mass * kernels.density((positions[j] - pos_i).length_squared());
    });
    eos::clamp_density(rho, params.rest_density)
}

/// Force pass: pressure and viscosity from neighbors, plus gravity.
///
/// ```text
/// F_p  = sum_j rho_j * T_ij                                 (see symmetric_pressure_term)
/// F_v  = sum_j m * mu * (v_j - v_i) / rho_j * lap W(|r_ij|, h)
/// a_i  = (F_p + F_v) / rho_i + g
/// ```
///
/// Only neighbors with `MIN_SEPARATION_SQ < |r_ij|^2 < h^2` contribute. The
/// pressure term is skipped for pairs where either density is at or below
/// `DENSITY_EPSILON`; viscosity is not.
///
/// Once every acceleration is written, every velocity is multiplied by
/// `velocity_damping`. The damping is a numerical stabilizer that bleeds off
/// the energy injected by the approximate kernel sums; it is not a physical
/// force. Viscosity reads the undamped velocities of this step.
pub fn compute_forces(particles: &mut ParticleSet, grid: &SpatialHash, params: &FluidParams) {
    let snapshot = ForceSnapshot {
        positions: &particles.position,
        velocities: &particles.velocity,
        densities: &particles.density,
        pressures: &particles.pressure,
        grid,
        params,
        kernels: SmoothingKernels::new(params.smoothing_radius),
    };
    fill_per_particle(&mut particles.acceleration, |i| snapshot.acceleration(i));

    let damping = params.velocity_damping;
    if damping != 1.0 {
        for v in &mut particles.velocity {
            *v *= damping;
        }
    }
}

/// Read-only view of the state the force pass works from.
struct ForceSnapshot<'a> {
    positions: &'a [Vec3],
    velocities: &'a [Vec3],
    densities: &'a [f32],
    pressures: &'a [f32],
    grid: &'a SpatialHash,
    params: &'a FluidParams,
    kernels: SmoothingKernels,
}

impl ForceSnapshot<'_> {
    /// Acceleration of particle `i`.
    fn acceleration(&self, i: usize) -> Vec3 {
        let params = self.params;
        let pos_i = self.positions[i];
        let vel_i = self.velocities[i];
        let rho_i = self.densities[i];
        let p_i = self.pressures[i];

        let mut f_pressure = Vec3::ZERO;
        let mut f_viscosity = Vec3::ZERO;
        self.grid.for_each_candidate(pos_i, |j| {
            if j == i {
                return;
            }
            let r_ij = pos_i - self.positions[j];
            let r_sq = r_ij.length_squared();
            if r_sq >= self.kernels.h_sq || r_sq <= MIN_SEPARATION_SQ {
                return;
            }
            let rho_j = self.densities[j];
            if rho_i > DENSITY_EPSILON && rho_j > DENSITY_EPSILON {
                let term = symmetric_pressure_term(
                    r_ij,
                    p_i,
                    rho_i,
                    self.pressures[j],
                    rho_j,
                    params.particle_mass,
                    &self.kernels,
                );
                f_pressure += rho_j * term;
            }
            // rho_j is floored at half the rest density, so never zero here.
            f_viscosity += params.particle_mass * params.viscosity * (self.velocities[j] - vel_i)
                / rho_j
                * self.kernels.viscosity_laplacian(r_sq.sqrt());
        });

        if rho_i > DENSITY_EPSILON {
            (f_pressure + f_viscosity) / rho_i + params.gravity
        } else {
            params.gravity
        }
    }
}

/// Write `f(i)` into every slot `out[i]`.
#[cfg(feature = "parallel")]
fn fill_per_particle<T, F>(out: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    use rayon::prelude::*;
    out.par_iter_mut().enumerate().for_each(|(i, slot)| *slot = f(i));
}

/// Write `f(i)` into every slot `out[i]`.
#[cfg(not(feature = "parallel"))]
fn fill_per_particle<T, F>(out: &mut [T], f: F)
where
    F: Fn(usize) -> T,
{
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = f(i);
    }
}
