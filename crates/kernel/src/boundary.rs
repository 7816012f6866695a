//! Boundary resolution: world box clamping and obstacle push-out.
//!
//! Applied to one particle at a time, immediately after integration. Every
//! function here is pure: it takes a position/velocity pair and returns the
//! corrected pair, so no two particles can alias each other's state.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::obstacle::{BoxObstacle, GenericObstacle, Obstacle, ObstacleQuery};
use crate::params::FluidParams;

/// Distance to an obstacle's closest point below which a particle counts as
/// penetrating. Closest-point queries degenerate to the query point itself
/// once inside, so "inside" and "touching" share this threshold.
pub const PENETRATION_EPSILON: f32 = 0.001;

/// Shortest vector that is still normalized into a reflection normal.
const NORMAL_EPSILON: f32 = 1.0e-6;

/// Axis-aligned world box, stored as center and full size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Center of the box.
    pub center: Vec3,
    /// Full edge lengths.
    pub size: Vec3,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            size: Vec3::splat(10.0),
        }
    }
}

impl WorldBounds {
    /// Create a world box.
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }

    /// Minimum corner.
    #[inline]
    pub fn min(&self) -> Vec3 {
        self.center - 0.5 * self.size
    }

    /// Maximum corner.
    #[inline]
    pub fn max(&self) -> Vec3 {
        self.center + 0.5 * self.size
    }

    /// Whether `point` lies inside or on the box.
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min()).all() && point.cmple(self.max()).all()
    }
}

/// Clamp a particle into the world box.
///
/// Each axis is handled independently: a coordinate below the minimum (or
/// above the maximum) is set to that bound and the matching velocity
/// component is negated and scaled by `bounce`.
pub fn clamp_to_world(
    mut position: Vec3,
    mut velocity: Vec3,
    bounds: &WorldBounds,
    bounce: f32,
) -> (Vec3, Vec3) {
    let min = bounds.min();
    let max = bounds.max();
    for axis in 0..3 {
        if position[axis] < min[axis] {
            position[axis] = min[axis];
            velocity[axis] *= -bounce;
        } else if position[axis] > max[axis] {
            position[axis] = max[axis];
            velocity[axis] *= -bounce;
        }
    }
    (position, velocity)
}

/// Push a particle that sits inside a box obstacle back onto its surface.
///
/// The particle moves, in the box's local frame, to the face of the axis with
/// the smallest penetration depth `half_extent - |local|` (ties go to x, then
/// y, then z). Velocity is reflected about that face's normal and scaled by
/// `restitution`.
pub fn push_out_of_box(
    position: Vec3,
    velocity: Vec3,
    obstacle: &BoxObstacle,
    restitution: f32,
) -> (Vec3, Vec3) {
    let mut local = obstacle.world_to_local(position);
    let depth = obstacle.half_extents - local.abs();

    let axis = least_penetration_axis(depth);
    let side = if local[axis] < 0.0 { -1.0 } else { 1.0 };
    local[axis] = side * obstacle.half_extents[axis];

    let mut local_normal = Vec3::ZERO;
    local_normal[axis] = side;
    let normal = obstacle.rotation * local_normal;

    let surface = obstacle.local_to_world(local);
    (surface, reflect(velocity, normal) * restitution)
}

/// Mirror `v` about the plane with unit normal `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Index of the smallest component, preferring x, then y, then z on ties.
#[inline]
fn least_penetration_axis(depth: Vec3) -> usize {
    if depth.x <= depth.y && depth.x <= depth.z {
        0
    } else if depth.y <= depth.z {
        1
    } else {
        2
    }
}

/// Push a particle out of a generic obstacle.
///
/// The particle is moved to `closest + normal * radius`, where the normal
/// points from the closest point to the particle. When that direction is
/// degenerate (the particle is at or inside the surface) the direction from
/// the obstacle's bounds center is used instead; when both are degenerate the
/// particle is left alone.
pub fn push_out_of_generic(
    position: Vec3,
    velocity: Vec3,
    obstacle: &GenericObstacle,
    radius: f32,
    restitution: f32,
) -> (Vec3, Vec3) {
    let closest = obstacle.closest_point(position);
    let Some(normal) = (position - closest)
        .try_normalize()
        .filter(|_| position.distance_squared(closest) > NORMAL_EPSILON * NORMAL_EPSILON)
        .or_else(|| (position - obstacle.bounds().center()).try_normalize())
    else {
        return (position, velocity);
    };
    (closest + normal * radius, reflect(velocity, normal) * restitution)
}

/// Resolve a particle against every obstacle overlapping its contact sphere.
///
/// Obstacles are handled one after another in query order, each seeing the
/// position left by the previous one. There is no global solve, so deep
/// overlaps of several obstacles can be mis-resolved.
pub fn resolve_obstacles(
    position: Vec3,
    velocity: Vec3,
    radius: f32,
    restitution: f32,
    obstacles: &dyn ObstacleQuery,
) -> (Vec3, Vec3) {
    let mut state = (position, velocity);
    obstacles.for_each_overlapping(position, radius, &mut |obstacle| {
        let (pos, vel) = state;
        let closest = obstacle.closest_point(pos);
        if pos.distance(closest) >= PENETRATION_EPSILON {
            return;
        }
        state = match obstacle {
            Obstacle::Box(b) => push_out_of_box(pos, vel, b, restitution),
            Obstacle::Generic(g) => push_out_of_generic(pos, vel, g, radius, restitution),
        };
    });
    state
}

/// Full boundary stage for one particle: world clamp, then obstacles.
///
/// An obstacle poking through a wall can push a particle out of the world;
/// the position is clamped back inside once more, keeping the velocity the
/// obstacle left.
pub fn resolve_boundaries(
    position: Vec3,
    velocity: Vec3,
    params: &FluidParams,
    obstacles: &dyn ObstacleQuery,
) -> (Vec3, Vec3) {
    let (position, velocity) = clamp_to_world(position, velocity, &params.world, params.bounce);
    let (position, velocity) = resolve_obstacles(
        position,
        velocity,
        params.particle_radius(),
        params.cube_bounce,
        obstacles,
    );
    (position.clamp(params.world.min(), params.world.max()), velocity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacle::ObstacleSet;
    use glam::Quat;

    fn unit_world() -> WorldBounds {
        WorldBounds::new(Vec3::ZERO, Vec3::splat(2.0))
    }

    #[test]
    fn inside_world_is_untouched() {
        let p = Vec3::new(0.5, -0.5, 0.9);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(clamp_to_world(p, v, &unit_world(), 0.5), (p, v));
    }

    #[test]
    fn clamp_below_floor() {
        let (p, v) = clamp_to_world(
            Vec3::new(0.0, -1.5, 0.0),
            Vec3::new(0.3, -4.0, 0.0),
            &unit_world(),
            0.5,
        );
        assert_eq!(p, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(v, Vec3::new(0.3, 2.0, 0.0));
    }

    #[test]
    fn clamp_each_axis_independently() {
        let (p, v) = clamp_to_world(
            Vec3::new(3.0, 0.0, -7.0),
            Vec3::new(1.0, 1.0, -1.0),
            &unit_world(),
            0.25,
        );
        assert_eq!(p, Vec3::new(1.0, 0.0, -1.0));
        assert_eq!(v, Vec3::new(-0.25, 1.0, 0.25));
    }

    #[test]
    fn clamp_scales_velocity_regardless_of_direction() {
        // Already moving back inward: still negated and scaled.
        let (_, v) = clamp_to_world(Vec3::new(0.0, 1.2, 0.0), Vec3::new(0.0, -2.0, 0.0), &unit_world(), 0.5);
        assert_eq!(v.y, 1.0);
    }

    #[test]
    fn box_push_out_picks_least_penetration() {
        let b = BoxObstacle::new(Vec3::ZERO, Vec3::ONE);
        let (p, v) = push_out_of_box(
            Vec3::new(0.2, 0.9, 0.1),
            Vec3::new(0.5, -2.0, 0.0),
            &b,
            0.5,
        );
        assert!((p - Vec3::new(0.2, 1.0, 0.1)).length() < 1.0e-6, "p={p}");
        assert!((v - Vec3::new(0.25, 1.0, 0.0)).length() < 1.0e-6, "v={v}");
    }

    #[test]
    fn box_push_out_negative_side() {
        let b = BoxObstacle::new(Vec3::new(0.0, 5.0, 0.0), Vec3::ONE);
        let (p, _) = push_out_of_box(Vec3::new(-0.95, 5.1, 0.0), Vec3::ZERO, &b, 0.5);
        assert!((p - Vec3::new(-1.0, 5.1, 0.0)).length() < 1.0e-6, "p={p}");
    }

    #[test]
    fn box_push_out_ties_prefer_x() {
        let b = BoxObstacle::new(Vec3::ZERO, Vec3::ONE);
        let (p, _) = push_out_of_box(Vec3::new(0.5, 0.5, 0.5), Vec3::ZERO, &b, 1.0);
        assert!((p - Vec3::new(1.0, 0.5, 0.5)).length() < 1.0e-6, "p={p}");

        let (p, _) = push_out_of_box(Vec3::new(0.0, 0.5, 0.5), Vec3::ZERO, &b, 1.0);
        assert!((p - Vec3::new(0.0, 1.0, 0.5)).length() < 1.0e-6, "p={p}");
    }

    #[test]
    fn box_push_out_at_center_goes_positive_x() {
        let b = BoxObstacle::new(Vec3::ZERO, Vec3::ONE);
        let (p, _) = push_out_of_box(Vec3::ZERO, Vec3::ZERO, &b, 1.0);
        assert!((p - Vec3::X).length() < 1.0e-6, "p={p}");
    }

    #[test]
    fn rotated_box_pushes_along_local_axis() {
        let b = BoxObstacle::new(Vec3::ZERO, Vec3::new(1.0, 0.2, 1.0))
            .with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        // Local y maps to world -x; a point at world x = -0.15 is local y = 0.15.
        let (p, v) = push_out_of_box(Vec3::new(-0.15, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), &b, 1.0);
        assert!((p - Vec3::new(-0.2, 0.0, 0.0)).length() < 1.0e-5, "p={p}");
        assert!((v - Vec3::new(-1.0, 0.0, 0.0)).length() < 1.0e-5, "v={v}");
    }

    #[test]
    fn generic_push_out_offsets_by_radius() {
        let sphere = GenericObstacle::sphere(Vec3::ZERO, 1.0);
        // Just outside the surface, within the penetration threshold.
        let p = Vec3::new(0.0, 1.0005, 0.0);
        let (p, v) = push_out_of_generic(p, Vec3::new(0.0, -1.0, 0.0), &sphere, 0.05, 0.5);
        assert!((p - Vec3::new(0.0, 1.05, 0.0)).length() < 1.0e-5, "p={p}");
        assert!((v - Vec3::new(0.0, 0.5, 0.0)).length() < 1.0e-6, "v={v}");
    }

    #[test]
    fn generic_push_out_inside_uses_bounds_center() {
        let sphere = GenericObstacle::sphere(Vec3::ZERO, 1.0);
        let (p, _) = push_out_of_generic(Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO, &sphere, 0.05, 0.5);
        assert!((p - Vec3::new(0.55, 0.0, 0.0)).length() < 1.0e-6, "p={p}");
    }

    #[test]
    fn generic_push_out_degenerate_is_noop() {
        let sphere = GenericObstacle::sphere(Vec3::ZERO, 1.0);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(push_out_of_generic(Vec3::ZERO, v, &sphere, 0.05, 0.5), (Vec3::ZERO, v));
    }

    #[test]
    fn obstacles_far_away_do_nothing() {
        let set: ObstacleSet = [BoxObstacle::new(Vec3::new(3.0, 0.0, 0.0), Vec3::ONE)]
            .into_iter()
            .collect();
        let p = Vec3::new(0.0, 0.0, 0.0);
        let v = Vec3::new(0.0, -1.0, 0.0);
        assert_eq!(resolve_obstacles(p, v, 0.05, 0.5, &set), (p, v));
    }

    #[test]
    fn touching_but_outside_is_not_resolved() {
        let set: ObstacleSet = [BoxObstacle::new(Vec3::ZERO, Vec3::ONE)].into_iter().collect();
        // Overlaps the contact sphere but sits 0.03 above the top face.
        let p = Vec3::new(0.0, 1.03, 0.0);
        let v = Vec3::new(0.0, -1.0, 0.0);
        assert_eq!(resolve_obstacles(p, v, 0.05, 0.5, &set), (p, v));
    }

    #[test]
    fn resolve_boundaries_clamps_then_pushes() {
        let params = FluidParams {
            world: WorldBounds::new(Vec3::ZERO, Vec3::splat(4.0)),
            ..FluidParams::default()
        };
        let set: ObstacleSet = [BoxObstacle::new(Vec3::new(0.0, -1.5, 0.0), Vec3::new(1.0, 0.5, 1.0))]
            .into_iter()
            .collect();
        // Below the floor: the clamp lifts it to y = -2, which is the box's bottom
        // face, so the box then pushes it out through that face.
        let (p, v) = resolve_boundaries(
            Vec3::new(0.0, -2.5, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            &params,
            &set,
        );
        assert!((p - Vec3::new(0.0, -2.0, 0.0)).length() < 1.0e-6, "p={p}");
        // Clamp: -1 -> 0.5. Reflect about -y: -0.5, scaled by cube_bounce 0.5: -0.25.
        assert!((v - Vec3::new(0.0, -0.25, 0.0)).length() < 1.0e-6, "v={v}");
    }

    #[test]
    fn world_bounds_corners() {
        let w = WorldBounds::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(w.min(), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(w.max(), Vec3::new(2.0, 4.0, 6.0));
        assert!(w.contains(Vec3::new(2.0, 0.0, 3.0)));
        assert!(!w.contains(Vec3::new(2.01, 0.0, 3.0)));
    }

    #[test]
    fn obstacle_through_wall_cannot_push_particle_outside() {
        // Box straddles the +x wall; the particle sits past its center, so
        // least penetration points out of the world.
        let params = FluidParams {
            world: unit_world(),
            cube_bounce: 0.5,
            ..FluidParams::default()
        };
        let set: ObstacleSet =
            std::iter::once(BoxObstacle::new(Vec3::new(0.9, 0.0, 0.0), Vec3::new(0.3, 1.0, 1.0))).collect();
        let (p, v) = resolve_boundaries(Vec3::new(0.99, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0), &params, &set);
        assert!(unit_world().contains(p), "p={p}");
        assert_eq!(p, Vec3::new(1.0, 0.0, 0.0));
        assert!((v - Vec3::new(-0.25, 0.0, 0.0)).length() < 1.0e-6, "v={v}");
    }
}
