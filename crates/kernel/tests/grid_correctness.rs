//! Spatial hash correctness: every particle is found in its own bucket and
//! the 27-cell query never misses a neighbor within the cell size.

use glam::Vec3;
use kernel::{FluidParams, ParticleSet, SpatialHash};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_positions(n: usize, extent: f32, seed: u64) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            )
        })
        .collect()
}

#[test]
fn every_particle_is_in_its_cell_bucket() {
    let positions = random_positions(2_000, 3.0, 11);
    let mut grid = SpatialHash::new(0.3);
    grid.rebuild(&positions);

    for (i, &p) in positions.iter().enumerate() {
        let bucket = grid.bucket(grid.hash_position(p));
        assert!(bucket.contains(&i), "particle {i} at {p} missing from its bucket");
    }
}

#[test]
fn every_index_appears_exactly_once_in_its_bucket() {
    let positions = random_positions(500, 1.0, 5);
    let mut grid = SpatialHash::new(0.25);
    grid.rebuild(&positions);

    for (i, &p) in positions.iter().enumerate() {
        let count = grid
            .bucket(grid.hash_position(p))
            .iter()
            .filter(|&&j| j == i)
            .count();
        assert_eq!(count, 1, "particle {i} stored {count} times");
    }
}

#[test]
fn query_finds_all_neighbors_within_radius() {
    let h = 0.3;
    let positions = random_positions(800, 1.2, 99);
    let mut grid = SpatialHash::new(h);
    grid.rebuild(&positions);

    for (i, &p) in positions.iter().enumerate() {
        let candidates = grid.neighbor_candidates(p);
        for (j, &q) in positions.iter().enumerate() {
            if p.distance_squared(q) < h * h {
                assert!(candidates.contains(&j), "query for {i} missed neighbor {j}");
            }
        }
    }
}

#[test]
fn query_visits_each_particle_once() {
    let positions = random_positions(300, 0.5, 3);
    let mut grid = SpatialHash::new(0.3);
    grid.rebuild(&positions);

    for &p in &positions {
        let mut candidates = grid.neighbor_candidates(p);
        let n = candidates.len();
        candidates.sort_unstable();
        candidates.dedup();
        assert_eq!(candidates.len(), n, "duplicate candidates for query at {p}");
    }
}

#[test]
fn rebuild_tracks_moving_particles() {
    let params = FluidParams::default();
    let mut particles = ParticleSet::seed_lattice(125, &params, 1);
    let mut grid = SpatialHash::new(params.smoothing_radius);
    grid.rebuild(&particles.position);

    for p in &mut particles.position {
        *p += Vec3::new(1.7, -0.4, 0.9);
    }
    grid.rebuild(&particles.position);

    for (i, &p) in particles.positions().iter().enumerate() {
        assert!(grid.bucket(grid.hash_position(p)).contains(&i));
    }
}
