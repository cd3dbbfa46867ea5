//! Axis-aligned bounding boxes

use serde::{Serialize, Deserialize};

use crate::Vec2;

/// A 2D axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Aabb2 {
    /// Create a new AABB from min and max corners
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a position with given half-extents
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest box containing both points
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min_components(b),
            max: a.max_components(b),
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Get the half-extents (half the size in each dimension)
    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Get the full size in each dimension
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Area of the box
    pub fn area(&self) -> f32 {
        let size = self.size();
        size.x * size.y
    }

    /// Check if a point is inside or on the AABB
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Check whether two boxes touch or overlap
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// The overlapping region of two boxes, if they overlap with positive area
    pub fn overlap(&self, other: &Self) -> Option<Self> {
        let min = self.min.max_components(other.min);
        let max = self.max.min_components(other.max);
        if min.x < max.x && min.y < max.y {
            Some(Self { min, max })
        } else {
            None
        }
    }

    /// Grow the box to include a point
    pub fn expanded_to(&self, point: Vec2) -> Self {
        Self {
            min: self.min.min_components(point),
            max: self.max.max_components(point),
        }
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min_components(other.min),
            max: self.max.max_components(other.max),
        }
    }

    /// Translate the AABB by a delta
    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }
}
