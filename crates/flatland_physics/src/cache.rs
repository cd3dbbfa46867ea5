//! Per-query scratch state
//!
//! A collision query tests one ellipse against every collideable line in the
//! level. The transform into the ellipse's local frame only depends on the
//! ellipse, so it is computed once when the query starts and then handed by
//! reference to [`Line::fast_collide`](crate::Line::fast_collide) for every
//! line. A cache belongs to exactly one query; concurrent queries each build
//! their own.

use flatland_math::{mat3, Aabb2, Mat3, Vec2};

use crate::Line;

/// Precomputed ellipse frame for one collision query
///
/// In the local frame the ellipse is a circle of radius `local_radius`
/// centered on the origin: world points are translated by `-center`, rotated
/// by `-rotation` and their Y scaled by `radii.x / radii.y`.
#[derive(Clone, Copy, Debug)]
pub struct EllipseCollisionCache {
    /// Ellipse center in world space
    pub center: Vec2,
    /// Ellipse radii along its own X and Y axes
    pub radii: Vec2,
    /// Ellipse rotation in radians (counter-clockwise)
    pub rotation: f32,
    /// Circle radius in the local frame (equal to `radii.x`)
    pub local_radius: f32,
    /// World space to ellipse-local space
    pub to_local: Mat3,
    /// Ellipse-local space back to world space
    pub to_world: Mat3,
    /// World-space bounding box of the rotated ellipse
    pub bounds: Aabb2,
}

impl EllipseCollisionCache {
    /// Build the cache for an ellipse
    ///
    /// Non-positive or non-finite radii produce a cache with a zero local
    /// radius, which never collides with anything.
    pub fn new(center: Vec2, radii: Vec2, rotation: f32) -> Self {
        let degenerate = !(radii.x > 0.0 && radii.y > 0.0 && radii.x.is_finite() && radii.y.is_finite());
        if degenerate {
            return Self {
                center,
                radii,
                rotation,
                local_radius: 0.0,
                to_local: mat3::IDENTITY,
                to_world: mat3::IDENTITY,
                bounds: Aabb2::from_center_half_extents(center, Vec2::ZERO),
            };
        }

        let y_scale = radii.x / radii.y;
        let to_local = mat3::mul(
            mat3::scale(1.0, y_scale),
            mat3::mul(mat3::rotation(-rotation), mat3::translation(-center)),
        );
        let to_world = mat3::mul(
            mat3::translation(center),
            mat3::mul(mat3::rotation(rotation), mat3::scale(1.0, 1.0 / y_scale)),
        );

        Self {
            center,
            radii,
            rotation,
            local_radius: radii.x,
            to_local,
            to_world,
            bounds: ellipse_bounds(center, radii, rotation),
        }
    }

    /// False when the ellipse is degenerate and can never collide
    pub fn is_valid(&self) -> bool {
        self.local_radius > 0.0
    }

    /// Map a world point into the ellipse frame
    #[inline]
    pub fn point_to_local(&self, p: Vec2) -> Vec2 {
        mat3::transform_point(self.to_local, p)
    }
}

/// Axis-aligned bounds of a rotated ellipse
pub fn ellipse_bounds(center: Vec2, radii: Vec2, rotation: f32) -> Aabb2 {
    let (sn, cs) = rotation.sin_cos();
    let half_width = ((radii.x * cs).powi(2) + (radii.y * sn).powi(2)).sqrt();
    let half_height = ((radii.x * sn).powi(2) + (radii.y * cs).powi(2)).sqrt();
    Aabb2::from_center_half_extents(center, Vec2::new(half_width, half_height))
}

/// Precomputed ray for one intersect query
#[derive(Clone, Copy, Debug)]
pub struct RayIntersectCache {
    /// The cast ray as a finite segment
    pub ray: Line,
    /// World-space bounding box of the ray
    pub bounds: Aabb2,
}

impl RayIntersectCache {
    /// Build the cache for a ray from `start` to `end`
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self {
            ray: Line::new(start, end),
            bounds: Aabb2::from_points(start, end),
        }
    }

    /// Ray start point
    pub fn start(&self) -> Vec2 {
        self.ray.start()
    }

    /// Ray end point
    pub fn end(&self) -> Vec2 {
        self.ray.end()
    }
}
