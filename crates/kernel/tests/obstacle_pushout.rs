//! Obstacle push-out: least-penetration axis, face placement and velocity
//! reflection for box obstacles, plus the generic fallback and stepping
//! against a host-owned obstacle query.

use std::cell::Cell;
use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use kernel::boundary::{push_out_of_box, resolve_boundaries, resolve_obstacles};
use kernel::{
    BoxObstacle, CpuSolver, FluidParams, GenericObstacle, Obstacle, ObstacleQuery, ObstacleSet,
    ParticleSet, SimulationKernel,
};

fn approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < 1.0e-5
}

#[test]
fn least_penetration_axis_is_chosen() {
    let unit_box = BoxObstacle::new(Vec3::ZERO, Vec3::ONE);
    let position = Vec3::new(0.2, 0.9, 0.1);
    let velocity = Vec3::new(0.5, -2.0, 0.3);

    let (p, v) = push_out_of_box(position, velocity, &unit_box, 1.0);
    assert!(approx(p, Vec3::new(0.2, 1.0, 0.1)), "p={p}");
    // Reflection about (0, 1, 0) flips only y.
    assert!(approx(v, Vec3::new(0.5, 2.0, 0.3)), "v={v}");
}

#[test]
fn negative_side_pushes_to_negative_face() {
    let unit_box = BoxObstacle::new(Vec3::ZERO, Vec3::ONE);
    let (p, v) = push_out_of_box(Vec3::new(0.1, 0.2, -0.95), Vec3::new(0.0, 0.0, 1.0), &unit_box, 0.5);
    assert!(approx(p, Vec3::new(0.1, 0.2, -1.0)), "p={p}");
    assert!(approx(v, Vec3::new(0.0, 0.0, -0.5)), "v={v}");
}

#[test]
fn centered_particle_breaks_ties_on_x() {
    let unit_box = BoxObstacle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE);
    let (p, _) = push_out_of_box(Vec3::new(2.0, 0.0, 0.0), Vec3::ZERO, &unit_box, 0.5);
    assert!(approx(p, Vec3::new(3.0, 0.0, 0.0)), "p={p}");
}

#[test]
fn rotated_box_pushes_along_local_axis() {
    // A quarter turn about z maps local x onto world y.
    let tall = BoxObstacle::new(Vec3::ZERO, Vec3::new(1.0, 3.0, 3.0))
        .with_rotation(Quat::from_rotation_z(FRAC_PI_2));
    let (p, v) = push_out_of_box(Vec3::new(0.0, 0.8, 0.0), Vec3::new(0.0, -1.0, 0.0), &tall, 1.0);
    assert!(approx(p, Vec3::new(0.0, 1.0, 0.0)), "p={p}");
    assert!(approx(v, Vec3::new(0.0, 1.0, 0.0)), "v={v}");
}

#[test]
fn particle_outside_obstacle_is_untouched() {
    let set: ObstacleSet = std::iter::once(BoxObstacle::new(Vec3::ZERO, Vec3::ONE)).collect();
    let position = Vec3::new(1.02, 0.0, 0.0);
    let velocity = Vec3::new(-1.0, 0.0, 0.0);
    let (p, v) = resolve_obstacles(position, velocity, 0.05, 0.5, &set);
    assert_eq!(p, position);
    assert_eq!(v, velocity);
}

#[test]
fn generic_obstacle_offsets_by_radius() {
    let sphere = GenericObstacle::sphere(Vec3::ZERO, 1.0);
    let set: ObstacleSet = std::iter::once(sphere).collect();

    // Within the penetration threshold of the surface.
    let (p, v) = resolve_obstacles(Vec3::new(0.0, 1.0005, 0.0), Vec3::new(0.0, -1.0, 0.0), 0.05, 0.5, &set);
    assert!(approx(p, Vec3::new(0.0, 1.05, 0.0)), "p={p}");
    assert!(approx(v, Vec3::new(0.0, 0.5, 0.0)), "v={v}");
}

#[test]
fn obstacles_resolve_in_order() {
    // Second box sits where the first one pushes the particle.
    let set: ObstacleSet = [
        BoxObstacle::new(Vec3::ZERO, Vec3::ONE),
        BoxObstacle::new(Vec3::new(0.0, 1.5, 0.0), Vec3::new(2.0, 0.6, 2.0)),
    ]
    .into_iter()
    .collect();
    let (p, _) = resolve_obstacles(Vec3::new(0.0, 0.95, 0.0), Vec3::ZERO, 0.05, 0.5, &set);
    // First push lands on y = 1, inside the second box, which pushes to its
    // nearest face at y = 0.9.
    assert!(approx(p, Vec3::new(0.0, 0.9, 0.0)), "p={p}");
}

#[test]
fn obstacle_bounce_uses_cube_bounce() {
    let params = FluidParams {
        bounce: 0.9,
        cube_bounce: 0.25,
        ..FluidParams::default()
    };
    let set: ObstacleSet = std::iter::once(BoxObstacle::new(Vec3::ZERO, Vec3::ONE)).collect();
    let (p, v) = resolve_boundaries(Vec3::new(0.0, 0.9, 0.0), Vec3::new(0.0, -4.0, 0.0), &params, &set);
    assert!(approx(p, Vec3::new(0.0, 1.0, 0.0)), "p={p}");
    assert!(approx(v, Vec3::new(0.0, 1.0, 0.0)), "v={v}");
}

/// Host-side obstacle list that reports overlaps in its own order and counts
/// how often the solver asks.
struct HostObstacles {
    obstacles: Vec<Obstacle>,
    queries: Cell<usize>,
}

impl HostObstacles {
    fn new(obstacles: Vec<Obstacle>) -> Self {
        Self {
            obstacles,
            queries: Cell::new(0),
        }
    }
}

impl ObstacleQuery for HostObstacles {
    fn for_each_overlapping(&self, center: Vec3, radius: f32, visit: &mut dyn FnMut(&Obstacle)) {
        self.queries.set(self.queries.get() + 1);
        for obstacle in &self.obstacles {
            if obstacle.overlaps_sphere(center, radius) {
                visit(obstacle);
            }
        }
    }
}

/// One motionless particle in a weightless world, with a thin solver-owned
/// box around it that would push it sideways to x = 0.2.
fn resting_particle_solver() -> CpuSolver {
    let params = FluidParams {
        gravity: Vec3::ZERO,
        obstacles: vec![BoxObstacle::new(Vec3::new(0.0, 0.95, 0.0), Vec3::new(0.2, 2.0, 2.0))],
        ..FluidParams::default()
    };
    let particles =
        ParticleSet::from_state(&[Vec3::new(0.0, 0.95, 0.0)], &[Vec3::ZERO], params.rest_density);
    CpuSolver::new(particles, params).unwrap()
}

fn unit_box() -> Obstacle {
    BoxObstacle::new(Vec3::ZERO, Vec3::ONE).into()
}

fn ball_above() -> Obstacle {
    GenericObstacle::sphere(Vec3::new(0.0, 1.5, 0.0), 0.6).into()
}

#[test]
fn solver_step_uses_its_own_obstacles() {
    let mut sim = resting_particle_solver();
    sim.step(0.01, 1);
    let p = sim.particles().position(0);
    assert!(approx(p, Vec3::new(0.2, 0.95, 0.0)), "p={p}");
}

#[test]
fn host_query_replaces_solver_obstacles() {
    let mut sim = resting_particle_solver();
    let host = HostObstacles::new(Vec::new());
    sim.step_with_obstacles(0.01, 1, &host);

    // The solver-owned box is never consulted.
    assert_eq!(sim.particles().position(0), Vec3::new(0.0, 0.95, 0.0));
    assert_eq!(sim.obstacles().len(), 1);
    assert_eq!(host.queries.get(), 1);
}

#[test]
fn host_query_order_is_respected() {
    // Box first: lifted onto y = 1, then the ball (whose surface holds the
    // particle) pushes it back down by the contact radius.
    let mut box_first = resting_particle_solver();
    let host = HostObstacles::new(vec![unit_box(), ball_above()]);
    box_first.step_with_obstacles(0.01, 2, &host);
    let p = box_first.particles().position(0);
    assert!(approx(p, Vec3::new(0.0, 0.95, 0.0)), "box then ball: p={p}");
    assert_eq!(host.queries.get(), 2, "one query per substep");

    // Ball first: pushed down to 0.9, then the box lifts it onto its top face.
    let mut ball_first = resting_particle_solver();
    let host = HostObstacles::new(vec![ball_above(), unit_box()]);
    ball_first.step_with_obstacles(0.01, 2, &host);
    let p = ball_first.particles().position(0);
    assert!(approx(p, Vec3::new(0.0, 1.0, 0.0)), "ball then box: p={p}");
}
