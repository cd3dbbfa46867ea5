//! 2D Mathematics Library
//!
//! This crate provides the planar vector, transform, and bounds types used by
//! the Flatland level engine.
//!
//! ## Core Types
//!
//! - [`Vec2`] - 2D vector with x, y components
//! - [`Mat3`] - 3x3 matrix for 2D affine transformations
//! - [`Aabb2`] - Axis-aligned bounding box

mod vec2;
pub mod mat3;
pub mod aabb;

pub use vec2::Vec2;
pub use mat3::Mat3;
pub use aabb::Aabb2;
