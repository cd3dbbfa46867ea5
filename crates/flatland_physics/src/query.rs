//! Query result records
//!
//! Every query mode writes plain value records into a fixed-capacity buffer.
//! Each record type has a `NONE` sentinel (`valid_result == false`) which is
//! also its default value.

use std::fmt;
use std::num::NonZeroU32;

use flatland_math::{Aabb2, Vec2};
use serde::{Serialize, Deserialize};

/// Upper bound on the number of results any single query reports
pub const MAX_RESULTS: usize = 256;

/// Identifier of an object registered in a level
///
/// Ids are small positive integers. An unregistered object has no id, which
/// is represented as `Option::<ObjectId>::None` rather than a zero value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(NonZeroU32);

impl ObjectId {
    /// Wrap a raw id, returning `None` for zero
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw integer value (always at least 1)
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Zero-based slot index for arena storage
    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of an ellipse-vs-geometry collision
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionQueryResult {
    /// Whether this record holds a collision
    pub valid_result: bool,
    /// Object whose geometry produced the collision
    pub object: Option<ObjectId>,
    /// Unit world-space direction that pushes the ellipse out of the geometry
    pub resolve_direction: Vec2,
    /// World-space distance to move along `resolve_direction`
    pub penetration: f32,
    /// World-space point of contact on the geometry
    pub contact_point: Vec2,
    /// World-space normal of the surface that was hit
    pub normal: Vec2,
    /// True for a collision against a segment end point rather than its face
    pub point_collision: bool,
}

impl CollisionQueryResult {
    /// The "no collision" sentinel
    pub const NONE: Self = Self {
        valid_result: false,
        object: None,
        resolve_direction: Vec2::ZERO,
        penetration: 0.0,
        contact_point: Vec2::ZERO,
        normal: Vec2::ZERO,
        point_collision: false,
    };

    /// Full resolve vector (`resolve_direction * penetration`)
    pub fn resolve_vector(&self) -> Vec2 {
        self.resolve_direction * self.penetration
    }

    /// Tag this result with the object that produced it
    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }
}

impl Default for CollisionQueryResult {
    fn default() -> Self {
        Self::NONE
    }
}

/// Result of a ray-vs-geometry intersection
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntersectQueryResult {
    /// Whether this record holds an intersection
    pub valid_result: bool,
    /// Object whose geometry was hit
    pub object: Option<ObjectId>,
    /// World-space intersection point
    pub point: Vec2,
    /// Normal of the surface that was hit
    pub normal: Vec2,
    /// Distance from the ray start to `point`
    pub point_distance: f32,
}

impl IntersectQueryResult {
    /// The "no intersection" sentinel
    pub const NONE: Self = Self {
        valid_result: false,
        object: None,
        point: Vec2::ZERO,
        normal: Vec2::ZERO,
        point_distance: 0.0,
    };

    /// Tag this result with the object that produced it
    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }
}

impl Default for IntersectQueryResult {
    fn default() -> Self {
        Self::NONE
    }
}

/// Result of a rectangle overlap test
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapQueryResult {
    /// Whether this record holds an overlap
    pub valid_result: bool,
    /// Object that overlapped the query rectangle
    pub object: Option<ObjectId>,
    /// Center of the overlapping region
    pub region_center: Vec2,
    /// Half-extents of the overlapping region
    pub region_half_extents: Vec2,
    /// Area of the overlapping region
    pub region_area: f32,
}

impl OverlapQueryResult {
    /// The "no overlap" sentinel
    pub const NONE: Self = Self {
        valid_result: false,
        object: None,
        region_center: Vec2::ZERO,
        region_half_extents: Vec2::ZERO,
        region_area: 0.0,
    };

    /// Build a valid result describing an overlap region
    pub fn from_region(region: Aabb2) -> Self {
        Self {
            valid_result: true,
            object: None,
            region_center: region.center(),
            region_half_extents: region.half_extents(),
            region_area: region.area(),
        }
    }

    /// Overlap between a query rectangle and an object's bounds
    pub fn between(query: &Aabb2, bounds: &Aabb2) -> Self {
        match query.overlap(bounds) {
            Some(region) => Self::from_region(region),
            None => Self::NONE,
        }
    }

    /// Tag this result with the object that produced it
    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }
}

impl Default for OverlapQueryResult {
    fn default() -> Self {
        Self::NONE
    }
}
