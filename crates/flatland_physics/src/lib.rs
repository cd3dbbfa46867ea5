//! 2D collision primitives for Flatland
//!
//! This crate provides the geometry that level collision is built from:
//! - [`Line`] - one-sided segment with ellipse collision and line intersection
//! - Query results written by collision, ray and overlap queries
//! - Per-query caches holding the transforms shared by every line tested

pub mod cache;
pub mod line;
pub mod query;

// Re-export commonly used types
pub use cache::{EllipseCollisionCache, RayIntersectCache};
pub use line::{Line, MIN_PENETRATION, PARALLEL_EPSILON};
pub use query::{
    CollisionQueryResult, IntersectQueryResult, ObjectId, OverlapQueryResult, MAX_RESULTS,
};
