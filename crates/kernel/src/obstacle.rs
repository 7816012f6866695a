//! Solid obstacles the fluid collides with.
//!
//! The solver never owns or mutates obstacle geometry; it only asks three
//! questions of it: which obstacles overlap a small sphere, what is the
//! closest point of an obstacle to a world position, and (for boxes) what a
//! position looks like in the box's local frame.
//!
//! Only two behaviors exist, so shapes are a closed enum rather than a trait
//! object hierarchy: [`Obstacle::Box`] resolves penetration along the axis of
//! least penetration, [`Obstacle::Generic`] falls back to pushing along the
//! closest-point direction.

use std::fmt;
use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box used for broad-phase overlap tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from its corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a bounding box from a center and half-extents.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Center of the box.
    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Whether the sphere `(center, radius)` touches this box.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }
}

/// An oriented solid box.
///
/// The transform is rigid: `local = rotation^-1 * (world - center)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxObstacle {
    /// World-space center.
    pub center: Vec3,
    /// World-space orientation. Identity when omitted.
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    /// Half of the box size along each local axis.
    pub half_extents: Vec3,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

impl BoxObstacle {
    /// Axis-aligned box.
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            rotation: Quat::IDENTITY,
            half_extents,
        }
    }

    /// Same box, rotated about its center.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation.normalize();
        self
    }

    /// Transform a world-space point into the box's local frame.
    #[inline]
    pub fn world_to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.center)
    }

    /// Transform a local-frame point back into world space.
    #[inline]
    pub fn local_to_world(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.center
    }

    /// Whether `point` lies inside or on the box.
    pub fn contains(&self, point: Vec3) -> bool {
        let local = self.world_to_local(point).abs();
        local.cmple(self.half_extents).all()
    }

    /// Closest point of the solid box to `point`.
    ///
    /// Returns `point` itself when it is inside, so a near-zero distance
    /// means "penetrating".
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let local = self.world_to_local(point);
        let clamped = local.clamp(-self.half_extents, self.half_extents);
        self.local_to_world(clamped)
    }

    /// World-space bounding box of the oriented box.
    pub fn bounds(&self) -> Aabb {
        let m = glam::Mat3::from_quat(self.rotation);
        // Extent of a rotated box along each world axis.
        let extent = m.x_axis.abs() * self.half_extents.x
            + m.y_axis.abs() * self.half_extents.y
            + m.z_axis.abs() * self.half_extents.z;
        Aabb::from_center_half_extents(self.center, extent)
    }
}

/// Closest-point query for an arbitrary solid.
pub type ClosestPointFn = dyn Fn(Vec3) -> Vec3 + Send + Sync;

/// Obstacle of any other shape, known only through its bounds and a
/// closest-point function.
///
/// The closest-point function follows the same convention as
/// [`BoxObstacle::closest_point`]: a point inside the solid maps to itself.
#[derive(Clone)]
pub struct GenericObstacle {
    bounds: Aabb,
    closest_point: Arc<ClosestPointFn>,
}

impl GenericObstacle {
    /// Wrap a closest-point function and the bounds it is valid within.
    pub fn new<F>(bounds: Aabb, closest_point: F) -> Self
    where
        F: Fn(Vec3) -> Vec3 + Send + Sync + 'static,
    {
        Self {
            bounds,
            closest_point: Arc::new(closest_point),
        }
    }

    /// Solid sphere.
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        let bounds = Aabb::from_center_half_extents(center, Vec3::splat(radius));
        Self::new(bounds, move |point| {
            let offset = point - center;
            if offset.length_squared() <= radius * radius {
                point
            } else {
                center + offset.normalize() * radius
            }
        })
    }

    /// Bounding box used for the overlap query.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Closest point of the solid to `point`.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        (self.closest_point)(point)
    }
}

impl fmt::Debug for GenericObstacle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericObstacle")
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// A solid the fluid collides with.
#[derive(Debug, Clone)]
pub enum Obstacle {
    /// Oriented box, resolved by least-penetration push-out.
    Box(BoxObstacle),
    /// Any other shape, resolved by closest-point push-out.
    Generic(GenericObstacle),
}

impl Obstacle {
    /// World-space bounding box.
    pub fn bounds(&self) -> Aabb {
        match self {
            Obstacle::Box(b) => b.bounds(),
            Obstacle::Generic(g) => g.bounds(),
        }
    }

    /// Closest point of the solid to `point` (the point itself when inside).
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        match self {
            Obstacle::Box(b) => b.closest_point(point),
            Obstacle::Generic(g) => g.closest_point(point),
        }
    }

    /// Whether a sphere touches this obstacle. Exact for boxes, bounds-based
    /// for generic shapes.
    pub fn overlaps_sphere(&self, center: Vec3, radius: f32) -> bool {
        match self {
            Obstacle::Box(b) => b.closest_point(center).distance_squared(center) <= radius * radius,
            Obstacle::Generic(g) => g.bounds().intersects_sphere(center, radius),
        }
    }
}

impl From<BoxObstacle> for Obstacle {
    fn from(b: BoxObstacle) -> Self {
        Obstacle::Box(b)
    }
}

impl From<GenericObstacle> for Obstacle {
    fn from(g: GenericObstacle) -> Self {
        Obstacle::Generic(g)
    }
}

/// A queryable collection of obstacles, supplied by the host.
pub trait ObstacleQuery {
    /// Call `visit` for every obstacle overlapping the sphere, in a stable
    /// order.
    fn for_each_overlapping(&self, center: Vec3, radius: f32, visit: &mut dyn FnMut(&Obstacle));
}

/// Flat list of obstacles with a linear overlap query.
///
/// Adequate for the handful of colliders a scene usually has.
#[derive(Debug, Clone, Default)]
pub struct ObstacleSet {
    obstacles: Vec<Obstacle>,
}

impl ObstacleSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an obstacle.
    pub fn push(&mut self, obstacle: impl Into<Obstacle>) {
        self.obstacles.push(obstacle.into());
    }

    /// Number of obstacles.
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Iterate over the obstacles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter()
    }
}

impl<O: Into<Obstacle>> FromIterator<O> for ObstacleSet {
    fn from_iter<I: IntoIterator<Item = O>>(iter: I) -> Self {
        Self {
            obstacles: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl ObstacleQuery for ObstacleSet {
    fn for_each_overlapping(&self, center: Vec3, radius: f32, visit: &mut dyn FnMut(&Obstacle)) {
        for obstacle in &self.obstacles {
            if obstacle.overlaps_sphere(center, radius) {
                visit(obstacle);
            }
        }
    }
}
