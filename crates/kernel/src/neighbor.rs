//! Spatial hash grid for approximate neighbor search.
//!
//! Space is cut into cubic cells of side `cell_size` (the smoothing radius).
//! Each occupied cell's integer coordinate is hashed into an `i32` bucket key,
//! so the grid is unbounded and needs no domain up front.
//!
//! The hash is not collision-free: two cells far apart may share a bucket, in
//! which case a query also returns particles from the other cell. Callers
//! filter by distance anyway, so a collision only costs time. Trading exact
//! 3D keys for a single integer key is deliberate.

use std::collections::HashMap;

use glam::{IVec3, Vec3};

/// Large primes mixed into the cell hash, one per axis.
pub const HASH_PRIMES: [i32; 3] = [73_856_093, 19_349_663, 83_492_791];

/// Initial capacity of a freshly created bucket.
const BUCKET_CAPACITY: usize = 32;

/// Number of cells in the 3x3x3 block visited by a query.
const NEIGHBOR_CELLS: usize = 27;

/// Hash-map backed uniform grid, rebuilt from scratch every step.
///
/// Invariant after [`SpatialHash::rebuild`]: every particle index appears in
/// exactly one bucket, the one keyed by the hash of the cell containing its
/// position. Indices within a bucket are in ascending (insertion) order.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f32,
    inv_cell_size: f32,
    buckets: HashMap<i32, Vec<usize>>,
}

impl SpatialHash {
    /// Create an empty grid.
    ///
    /// `cell_size` should equal the smoothing radius so that the 27 cells
    /// around a particle contain every neighbor within that radius.
    pub fn new(cell_size: f32) -> Self {
        Self::with_capacity(cell_size, 0)
    }

    /// Create an empty grid with room for `cells` buckets.
    pub fn with_capacity(cell_size: f32, cells: usize) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive, got {cell_size}"
        );
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            buckets: HashMap::with_capacity(cells),
        }
    }

    /// Edge length of a cell.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Integer coordinate of the cell containing `position`.
    #[inline]
    pub fn cell_of(&self, position: Vec3) -> IVec3 {
        (position * self.inv_cell_size).floor().as_ivec3()
    }

    /// Bucket key of a cell: `(x * P1) ^ (y * P2) ^ (z * P3)` with wrapping
    /// multiplication.
    #[inline]
    pub fn hash_cell(cell: IVec3) -> i32 {
        cell.x.wrapping_mul(HASH_PRIMES[0])
            ^ cell.y.wrapping_mul(HASH_PRIMES[1])
            ^ cell.z.wrapping_mul(HASH_PRIMES[2])
    }

    /// Bucket key of the cell containing `position`.
    #[inline]
    pub fn hash_position(&self, position: Vec3) -> i32 {
        Self::hash_cell(self.cell_of(position))
    }

    /// Rebuild the grid from current particle positions.
    ///
    /// Existing buckets are cleared rather than dropped so their storage is
    /// reused. Buckets of cells nobody occupies any more are only released
    /// once they outnumber the occupied ones.
    pub fn rebuild(&mut self, positions: &[Vec3]) {
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }

        for (i, &position) in positions.iter().enumerate() {
            let hash = self.hash_position(position);
            self.buckets
                .entry(hash)
                .or_insert_with(|| Vec::with_capacity(BUCKET_CAPACITY))
                .push(i);
        }

        let occupied = self.occupied_buckets();
        if self.buckets.len() > 2 * occupied.max(1) {
            self.buckets.retain(|_, bucket| !bucket.is_empty());
        }
    }

    /// Particle indices stored under `hash`. Empty when no bucket exists.
    pub fn bucket(&self, hash: i32) -> &[usize] {
        self.buckets.get(&hash).map_or(&[], Vec::as_slice)
    }

    /// Number of buckets currently holding at least one particle.
    pub fn occupied_buckets(&self) -> usize {
        self.buckets.values().filter(|b| !b.is_empty()).count()
    }

    /// Visit every particle stored in the 3x3x3 block of cells centered on
    /// the cell containing `position`.
    ///
    /// Candidates are not distance-filtered, and include the querying
    /// particle itself. A bucket shared by several of the 27 cells is visited
    /// once.
    pub fn for_each_candidate<F>(&self, position: Vec3, mut f: F)
    where
        F: FnMut(usize),
    {
        let center = self.cell_of(position);
        let mut visited = [0i32; NEIGHBOR_CELLS];
        let mut n_visited = 0;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let hash = Self::hash_cell(center + IVec3::new(dx, dy, dz));
                    if visited[..n_visited].contains(&hash) {
                        continue;
                    }
                    visited[n_visited] = hash;
                    n_visited += 1;

                    if let Some(bucket) = self.buckets.get(&hash) {
                        for &j in bucket {
                            f(j);
                        }
                    }
                }
            }
        }
    }

    /// Collect the candidates of [`SpatialHash::for_each_candidate`].
    pub fn neighbor_candidates(&self, position: Vec3) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_candidate(position, |j| out.push(j));
        out
    }
}
