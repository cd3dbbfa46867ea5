//! One-sided line segments
//!
//! A [`Line`] is the building block of level geometry. Its normal is the
//! counter-clockwise perpendicular of its direction and marks the open front
//! face: movers collide only from the side the normal points to and are
//! pushed back along it. An ellipse whose center lies behind the line (on
//! the solid side) never collides with it.
//!
//! Ellipse collision is solved in the ellipse's local frame, where the
//! ellipse is a circle. Results are mapped back to world space.

use flatland_math::{mat3, Aabb2, Mat3, Vec2};

use crate::cache::{EllipseCollisionCache, RayIntersectCache};
use crate::query::{CollisionQueryResult, IntersectQueryResult};

/// Collisions with a smaller world-space penetration are discarded
pub const MIN_PENETRATION: f32 = 1e-4;

/// Direction determinants within this distance of zero count as parallel
pub const PARALLEL_EPSILON: f32 = 1e-8;

/// Slack allowed when checking that an intersection lies on a segment
const SEGMENT_EPSILON: f32 = 1e-5;

/// A 2D line segment with cached length, direction and normal
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    start: Vec2,
    end: Vec2,
    length: f32,
    direction: Vec2,
    normal: Vec2,
    /// Whether the start vertex can produce point collisions
    pub start_point_collideable: bool,
    /// Whether the end vertex can produce point collisions
    pub end_point_collideable: bool,
}

impl Default for Line {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::ZERO)
    }
}

impl Line {
    /// Create a line with both end points collideable
    pub fn new(start: Vec2, end: Vec2) -> Self {
        let mut line = Self {
            start,
            end,
            length: 0.0,
            direction: Vec2::ZERO,
            normal: Vec2::ZERO,
            start_point_collideable: true,
            end_point_collideable: true,
        };
        line.recompute();
        line
    }

    /// Set which end points can produce point collisions
    pub fn with_end_points(mut self, start_collideable: bool, end_collideable: bool) -> Self {
        self.start_point_collideable = start_collideable;
        self.end_point_collideable = end_collideable;
        self
    }

    fn recompute(&mut self) {
        let edge = self.end - self.start;
        self.length = edge.length();
        if self.length > 0.0 {
            self.direction = edge / self.length;
            self.normal = self.direction.perp();
        } else {
            self.direction = Vec2::ZERO;
            self.normal = Vec2::ZERO;
        }
    }

    #[inline]
    pub fn start(&self) -> Vec2 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Vec2 {
        self.end
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Unit direction from start to end (zero for an invalid line)
    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    /// Unit normal pointing out of the open front face (zero for an invalid line)
    #[inline]
    pub fn normal(&self) -> Vec2 {
        self.normal
    }

    /// A zero-length line is invalid and never collides or intersects
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.length > 0.0
    }

    pub fn set_start(&mut self, start: Vec2) {
        self.start = start;
        self.recompute();
    }

    pub fn set_end(&mut self, end: Vec2) {
        self.end = end;
        self.recompute();
    }

    pub fn set_points(&mut self, start: Vec2, end: Vec2) {
        self.start = start;
        self.end = end;
        self.recompute();
    }

    /// Bounding box of the segment
    pub fn bounds(&self) -> Aabb2 {
        Aabb2::from_points(self.start, self.end)
    }

    /// Signed distance from a point to the infinite line (positive in front of the line)
    pub fn signed_distance(&self, point: Vec2) -> f32 {
        (point - self.start).dot(self.normal)
    }

    /// Collide an ellipse against this line, computing the ellipse frame inline
    ///
    /// Prefer [`fast_collide`](Self::fast_collide) when testing one ellipse
    /// against many lines.
    pub fn collide(&self, center: Vec2, radii: Vec2, rotation: f32) -> CollisionQueryResult {
        if !self.is_valid() || !(radii.x > 0.0 && radii.y > 0.0) {
            return CollisionQueryResult::NONE;
        }

        let y_scale = radii.x / radii.y;
        let (sn, cs) = (-rotation).sin_cos();
        let to_local = |p: Vec2| {
            let d = p - center;
            Vec2::new(d.x * cs - d.y * sn, (d.x * sn + d.y * cs) * y_scale)
        };
        let to_world = mat3::mul(
            mat3::translation(center),
            mat3::mul(mat3::rotation(rotation), mat3::scale(1.0, 1.0 / y_scale)),
        );

        self.collide_local(to_local(self.start), to_local(self.end), radii.x, to_world)
    }

    /// Collide the ellipse described by a query cache against this line
    pub fn fast_collide(&self, cache: &EllipseCollisionCache) -> CollisionQueryResult {
        if !self.is_valid() || !cache.is_valid() || !self.bounds().intersects(&cache.bounds) {
            return CollisionQueryResult::NONE;
        }

        self.collide_local(
            cache.point_to_local(self.start),
            cache.point_to_local(self.end),
            cache.local_radius,
            cache.to_world,
        )
    }

    /// Circle-vs-segment test in the ellipse frame (ellipse center at the origin)
    fn collide_local(&self, start: Vec2, end: Vec2, radius: f32, to_world: Mat3) -> CollisionQueryResult {
        let edge = end - start;
        let local_length = edge.length();
        if local_length <= 0.0 {
            return CollisionQueryResult::NONE;
        }
        let direction = edge / local_length;
        let normal = direction.perp();

        let to_center = -start;
        let v = to_center.dot(normal);
        if v < 0.0 || v >= radius {
            return CollisionQueryResult::NONE;
        }

        let h = to_center.dot(direction);
        let (resolve, contact, point_collision) = if h < 0.0 {
            if !self.start_point_collideable {
                return CollisionQueryResult::NONE;
            }
            match push_from_point(to_center, radius) {
                Some(resolve) => (resolve, start, true),
                None => return CollisionQueryResult::NONE,
            }
        } else if h > local_length {
            if !self.end_point_collideable {
                return CollisionQueryResult::NONE;
            }
            match push_from_point(-end, radius) {
                Some(resolve) => (resolve, end, true),
                None => return CollisionQueryResult::NONE,
            }
        } else {
            (normal * (radius - v), start + direction * h, false)
        };

        let world_resolve = mat3::transform_vector(to_world, resolve);
        let penetration = world_resolve.length();
        if penetration < MIN_PENETRATION {
            return CollisionQueryResult::NONE;
        }

        CollisionQueryResult {
            valid_result: true,
            object: None,
            resolve_direction: world_resolve / penetration,
            penetration,
            contact_point: mat3::transform_point(to_world, contact),
            normal: self.normal,
            point_collision,
        }
    }

    /// Intersection point of the infinite lines through both segments
    fn line_intersection(&self, other: &Line) -> Option<Vec2> {
        if !self.is_valid() || !other.is_valid() {
            return None;
        }
        let det = self.direction.cross(other.direction);
        if det.abs() <= PARALLEL_EPSILON {
            return None;
        }
        let t = (other.start - self.start).cross(other.direction) / det;
        Some(self.start + self.direction * t)
    }

    /// Whether `point` projects inside this segment
    fn projects_onto(&self, point: Vec2) -> bool {
        let t = (point - self.start).dot(self.direction);
        t >= -SEGMENT_EPSILON && t <= self.length + SEGMENT_EPSILON
    }

    /// Intersection of two finite segments
    pub fn intersect(&self, other: &Line) -> Option<Vec2> {
        let point = self.line_intersection(other)?;
        if self.projects_onto(point) && other.projects_onto(point) {
            Some(point)
        } else {
            None
        }
    }

    /// Intersection treating this line as infinite and `other` as a segment
    pub fn intersect_infinite(&self, other: &Line) -> Option<Vec2> {
        let point = self.line_intersection(other)?;
        if other.projects_onto(point) {
            Some(point)
        } else {
            None
        }
    }

    /// Intersect the ray described by a query cache with this line
    ///
    /// Rays hit either face of the line.
    pub fn fast_intersect(&self, cache: &RayIntersectCache) -> IntersectQueryResult {
        if !self.is_valid() || !self.bounds().intersects(&cache.bounds) {
            return IntersectQueryResult::NONE;
        }
        match cache.ray.intersect(self) {
            Some(point) => IntersectQueryResult {
                valid_result: true,
                object: None,
                point,
                normal: self.normal,
                point_distance: point.distance(cache.ray.start),
            },
            None => IntersectQueryResult::NONE,
        }
    }
}

/// Resolve vector pushing a circle at the origin away from `offset`'s vertex
///
/// `offset` is the vector from the vertex to the circle center.
fn push_from_point(offset: Vec2, radius: f32) -> Option<Vec2> {
    let dist = offset.length();
    if dist >= radius || dist <= 0.0 {
        return None;
    }
    Some(offset / dist * (radius - dist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_1_SQRT_2};

    const EPSILON: f32 = 0.0001;

    fn floor() -> Line {
        Line::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0))
    }

    #[test]
    fn test_derived_values() {
        let line = Line::new(Vec2::new(1.0, 1.0), Vec2::new(4.0, 5.0));
        assert_eq!(line.length(), 5.0);
        assert!(line.direction().abs_diff_eq(Vec2::new(0.6, 0.8), EPSILON));
        assert!(line.normal().abs_diff_eq(Vec2::new(-0.8, 0.6), EPSILON));
        assert!(line.start_point_collideable);
        assert!(line.end_point_collideable);
    }

    #[test]
    fn test_setters_recompute() {
        let mut line = floor();
        line.set_end(Vec2::new(-5.0, 3.0));
        assert_eq!(line.length(), 3.0);
        assert!(line.direction().abs_diff_eq(Vec2::Y, EPSILON));
        assert!(line.normal().abs_diff_eq(-Vec2::X, EPSILON));

        line.set_points(Vec2::ZERO, Vec2::new(0.0, -2.0));
        assert_eq!(line.start(), Vec2::ZERO);
        assert!(line.normal().abs_diff_eq(Vec2::X, EPSILON));
    }

    #[test]
    fn test_degenerate_line() {
        let p = Vec2::new(2.0, 2.0);
        let line = Line::new(p, p);
        assert!(!line.is_valid());
        assert_eq!(line.length(), 0.0);
        assert_eq!(line.direction(), Vec2::ZERO);
        assert_eq!(line.normal(), Vec2::ZERO);

        assert!(!line.collide(p, Vec2::ONE, 0.0).valid_result);
        let cache = EllipseCollisionCache::new(p, Vec2::ONE, 0.0);
        assert!(!line.fast_collide(&cache).valid_result);
        assert!(line.intersect(&Line::new(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0))).is_none());
        assert!(Line::new(Vec2::new(0.0, 2.0), Vec2::new(4.0, 2.0)).intersect(&line).is_none());
        assert!(!line.fast_intersect(&RayIntersectCache::new(Vec2::ZERO, Vec2::new(4.0, 4.0))).valid_result);
    }

    #[test]
    fn test_planar_collision_circle() {
        let result = floor().collide(Vec2::new(0.0, 0.5), Vec2::ONE, 0.0);
        assert!(result.valid_result);
        assert!(!result.point_collision);
        assert!((result.penetration - 0.5).abs() < EPSILON);
        assert!(result.resolve_direction.abs_diff_eq(Vec2::Y, EPSILON));
        assert!(result.contact_point.abs_diff_eq(Vec2::ZERO, EPSILON));
        assert_eq!(result.normal, floor().normal());
    }

    #[test]
    fn test_planar_collision_wide_ellipse() {
        // Half-height is 1.0, so the bottom sits at -0.5
        let result = floor().collide(Vec2::new(0.0, 0.5), Vec2::new(2.0, 1.0), 0.0);
        assert!(result.valid_result);
        assert!((result.penetration - 0.5).abs() < EPSILON, "got {}", result.penetration);
        assert!(result.resolve_direction.abs_diff_eq(Vec2::Y, EPSILON));
    }

    #[test]
    fn test_planar_collision_rotated_ellipse() {
        // Rotated a quarter turn the long axis is vertical: bottom at 1.5 - 2.0
        let result = floor().collide(Vec2::new(0.0, 1.5), Vec2::new(2.0, 1.0), FRAC_PI_2);
        assert!(result.valid_result);
        assert!((result.penetration - 0.5).abs() < EPSILON, "got {}", result.penetration);
        assert!(result.resolve_direction.abs_diff_eq(Vec2::Y, EPSILON));
    }

    #[test]
    fn test_back_face_is_ignored() {
        let result = floor().collide(Vec2::new(0.0, -0.5), Vec2::ONE, 0.0);
        assert!(!result.valid_result);
    }

    #[test]
    fn test_too_far_is_ignored() {
        assert!(!floor().collide(Vec2::new(0.0, 1.5), Vec2::ONE, 0.0).valid_result);
        // Exactly touching does not count
        assert!(!floor().collide(Vec2::new(0.0, 1.0), Vec2::ONE, 0.0).valid_result);
    }

    #[test]
    fn test_negligible_penetration_rejected() {
        let result = floor().collide(Vec2::new(0.0, 1.0 - MIN_PENETRATION * 0.1), Vec2::ONE, 0.0);
        assert!(!result.valid_result);
    }

    #[test]
    fn test_end_point_collision() {
        let line = Line::new(Vec2::new(-5.0, 0.0), Vec2::ZERO);
        let result = line.collide(Vec2::new(0.5, 0.5), Vec2::ONE, 0.0);
        assert!(result.valid_result);
        assert!(result.point_collision);
        assert!((result.penetration - (1.0 - FRAC_1_SQRT_2)).abs() < EPSILON);
        assert!(result
            .resolve_direction
            .abs_diff_eq(Vec2::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2), EPSILON));
        assert!(result.contact_point.abs_diff_eq(Vec2::ZERO, EPSILON));
        // Point collisions still report the line's own normal
        assert_eq!(result.normal, line.normal());
    }

    #[test]
    fn test_end_point_collision_suppressed() {
        let line = Line::new(Vec2::new(-5.0, 0.0), Vec2::ZERO).with_end_points(true, false);
        assert!(!line.collide(Vec2::new(0.5, 0.5), Vec2::ONE, 0.0).valid_result);
    }

    #[test]
    fn test_start_point_collision() {
        let line = Line::new(Vec2::ZERO, Vec2::new(5.0, 0.0));
        let result = line.collide(Vec2::new(-0.5, 0.5), Vec2::ONE, 0.0);
        assert!(result.valid_result);
        assert!(result.point_collision);
        assert!(result
            .resolve_direction
            .abs_diff_eq(Vec2::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2), EPSILON));

        let suppressed = line.with_end_points(false, true);
        assert!(!suppressed.collide(Vec2::new(-0.5, 0.5), Vec2::ONE, 0.0).valid_result);
    }

    #[test]
    fn test_point_beyond_radius_misses() {
        let line = Line::new(Vec2::new(-5.0, 0.0), Vec2::ZERO);
        assert!(!line.collide(Vec2::new(0.9, 0.5), Vec2::ONE, 0.0).valid_result);
    }

    #[test]
    fn test_fast_collide_matches_collide() {
        let center = Vec2::new(0.3, -0.2);
        let radii = Vec2::new(1.5, 0.8);
        let rotation = 0.6;
        let cache = EllipseCollisionCache::new(center, radii, rotation);

        let mut lines = Vec::new();
        for i in 0..9 {
            let y = -2.1 + i as f32 * 0.55;
            lines.push(Line::new(Vec2::new(-3.0, y), Vec2::new(3.0, y)));
            lines.push(Line::new(Vec2::new(3.0, y), Vec2::new(-3.0, y)));
            lines.push(Line::new(Vec2::new(-3.0, y), Vec2::new(0.1, y + 0.3)));
            lines.push(Line::new(Vec2::new(y, -3.0), Vec2::new(y + 0.2, 3.0)));
        }
        lines.push(Line::new(Vec2::new(0.9, 0.4), Vec2::new(0.9, 0.4)));

        let mut hits = 0;
        for line in &lines {
            let slow = line.collide(center, radii, rotation);
            let fast = line.fast_collide(&cache);
            assert_eq!(slow.valid_result, fast.valid_result, "line {:?}", line);
            assert!((slow.penetration - fast.penetration).abs() < EPSILON, "line {:?}", line);
            assert!(slow.normal.abs_diff_eq(fast.normal, EPSILON), "line {:?}", line);
            if slow.valid_result {
                hits += 1;
                assert!(slow.resolve_direction.abs_diff_eq(fast.resolve_direction, 0.001));
            }
        }
        assert!(hits > 0, "the batch should contain some collisions");
        assert!(hits < lines.len(), "the batch should contain some misses");
    }

    #[test]
    fn test_intersect_crossing_segments() {
        let a = Line::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let b = Line::new(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0));
        let p = a.intersect(&b).expect("should intersect");
        assert!(p.abs_diff_eq(Vec2::ZERO, EPSILON));
    }

    #[test]
    fn test_intersect_outside_segment() {
        let a = Line::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let b = Line::new(Vec2::new(3.0, -1.0), Vec2::new(3.0, 1.0));
        assert!(a.intersect(&b).is_none());
        // Treating `b` as infinite does not help since `a`'s bounds are checked
        assert!(b.intersect_infinite(&a).is_none());
        // Treating `a` as infinite finds the crossing on `b`
        let p = a.intersect_infinite(&b).expect("infinite line hits the segment");
        assert!(p.abs_diff_eq(Vec2::new(3.0, 0.0), EPSILON));
    }

    #[test]
    fn test_parallel_and_collinear_rejected() {
        let a = Line::new(Vec2::ZERO, Vec2::new(4.0, 0.0));
        let parallel = Line::new(Vec2::new(0.0, 1.0), Vec2::new(4.0, 1.0));
        let collinear = Line::new(Vec2::new(2.0, 0.0), Vec2::new(6.0, 0.0));
        assert!(a.intersect(&parallel).is_none());
        assert!(a.intersect(&collinear).is_none());
        assert!(a.intersect_infinite(&parallel).is_none());
        assert!(a.intersect_infinite(&collinear).is_none());
    }

    #[test]
    fn test_fast_intersect_reports_distance() {
        let wall = Line::new(Vec2::new(2.0, -1.0), Vec2::new(2.0, 1.0));
        let cache = RayIntersectCache::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        let result = wall.fast_intersect(&cache);
        assert!(result.valid_result);
        assert!(result.point.abs_diff_eq(Vec2::new(2.0, 0.0), EPSILON));
        assert!((result.point_distance - 2.0).abs() < EPSILON);
        assert_eq!(result.normal, wall.normal());

        // Short ray stops before the wall
        let short = RayIntersectCache::new(Vec2::ZERO, Vec2::new(1.0, 0.0));
        assert!(!wall.fast_intersect(&short).valid_result);
    }

    #[test]
    fn test_signed_distance() {
        assert_eq!(floor().signed_distance(Vec2::new(1.0, 2.0)), 2.0);
        assert_eq!(floor().signed_distance(Vec2::new(1.0, -2.0)), -2.0);
    }
}
