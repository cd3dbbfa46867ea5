//! Level-wide geometric queries
//!
//! [`LevelCollisionQuery`] runs three kinds of queries over a [`LevelData`]:
//! ellipse collision and ray intersection against every collideable object,
//! and rectangle overlap against every overlapable object. Each mode writes
//! into its own fixed buffer of [`MAX_RESULTS`] records. The buffers are
//! reused between calls, so only the prefix reported by the count is valid.
//!
//! Queries are brute force: every candidate object is asked in ascending id
//! order. Results past the buffer capacity are dropped.

use flatland_math::{Aabb2, Vec2};
use flatland_physics::{
    CollisionQueryResult, EllipseCollisionCache, IntersectQueryResult, ObjectId,
    OverlapQueryResult, RayIntersectCache, MAX_RESULTS,
};

use crate::level_data::LevelData;
use crate::object::Capabilities;

/// Running totals over the lifetime of a query engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub collide_queries: u64,
    pub intersect_queries: u64,
    pub overlap_queries: u64,
    /// Queries that filled their buffer; anything past the cap was dropped
    pub saturated_queries: u64,
}

/// Ellipse, ray and rectangle queries over a level
pub struct LevelCollisionQuery {
    collision_results: Box<[CollisionQueryResult]>,
    collision_count: usize,
    intersect_results: Box<[IntersectQueryResult]>,
    intersect_count: usize,
    overlap_results: Box<[OverlapQueryResult]>,
    overlap_count: usize,
    stats: QueryStats,
}

impl Default for LevelCollisionQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelCollisionQuery {
    pub fn new() -> Self {
        Self {
            collision_results: vec![CollisionQueryResult::NONE; MAX_RESULTS].into_boxed_slice(),
            collision_count: 0,
            intersect_results: vec![IntersectQueryResult::NONE; MAX_RESULTS].into_boxed_slice(),
            intersect_count: 0,
            overlap_results: vec![OverlapQueryResult::NONE; MAX_RESULTS].into_boxed_slice(),
            overlap_count: 0,
            stats: QueryStats::default(),
        }
    }

    /// Collide an ellipse against every collideable object
    ///
    /// The ellipse frame is computed once and shared by every object asked.
    /// Objects that are checked out of `data` are not asked.
    pub fn collide(
        &mut self,
        data: &LevelData,
        center: Vec2,
        radii: Vec2,
        rotation: f32,
        excluded: Option<ObjectId>,
    ) -> &[CollisionQueryResult] {
        let cache = EllipseCollisionCache::new(center, radii, rotation);
        self.stats.collide_queries += 1;
        self.collision_count = 0;

        for (id, object) in data.objects_with(Capabilities::COLLIDEABLE) {
            if Some(id) == excluded {
                continue;
            }
            let tail = &mut self.collision_results[self.collision_count..];
            let written = object.on_collision_query(&cache, tail).min(tail.len());
            for result in &mut tail[..written] {
                result.object = Some(id);
            }
            self.collision_count += written;
            if self.collision_count == MAX_RESULTS {
                self.note_saturated("collide");
                break;
            }
        }

        self.collision_results()
    }

    /// Intersect a ray from `start` to `end` with every collideable object
    pub fn intersect(
        &mut self,
        data: &LevelData,
        start: Vec2,
        end: Vec2,
        excluded: Option<ObjectId>,
    ) -> &[IntersectQueryResult] {
        let cache = RayIntersectCache::new(start, end);
        self.stats.intersect_queries += 1;
        self.intersect_count = 0;

        for (id, object) in data.objects_with(Capabilities::COLLIDEABLE) {
            if Some(id) == excluded {
                continue;
            }
            let tail = &mut self.intersect_results[self.intersect_count..];
            let written = object.on_intersect_query(&cache, tail).min(tail.len());
            for result in &mut tail[..written] {
                result.object = Some(id);
            }
            self.intersect_count += written;
            if self.intersect_count == MAX_RESULTS {
                self.note_saturated("intersect");
                break;
            }
        }

        self.intersect_results()
    }

    /// Overlap an axis-aligned rectangle with every overlapable object
    ///
    /// Only objects reporting a valid overlap are recorded.
    pub fn overlap(
        &mut self,
        data: &LevelData,
        center: Vec2,
        half_extents: Vec2,
        excluded: Option<ObjectId>,
    ) -> &[OverlapQueryResult] {
        let query = Aabb2::from_center_half_extents(center, half_extents);
        self.stats.overlap_queries += 1;
        self.overlap_count = 0;

        for (id, object) in data.objects_with(Capabilities::OVERLAPABLE) {
            if Some(id) == excluded {
                continue;
            }
            let result = object.on_overlap_query(&query);
            if !result.valid_result {
                continue;
            }
            self.overlap_results[self.overlap_count] = result.with_object(id);
            self.overlap_count += 1;
            if self.overlap_count == MAX_RESULTS {
                self.note_saturated("overlap");
                break;
            }
        }

        self.overlap_results()
    }

    /// Nearest valid hit of the last intersect query
    ///
    /// Returns [`IntersectQueryResult::NONE`] when nothing was hit. On equal
    /// distances the earlier result wins.
    pub fn closest_intersect(&self) -> IntersectQueryResult {
        let mut closest = IntersectQueryResult::NONE;
        for result in self.intersect_results() {
            if result.valid_result
                && (!closest.valid_result || result.point_distance < closest.point_distance)
            {
                closest = *result;
            }
        }
        closest
    }

    /// Results of the last collide query
    pub fn collision_results(&self) -> &[CollisionQueryResult] {
        &self.collision_results[..self.collision_count]
    }

    /// Results of the last intersect query
    pub fn intersect_results(&self) -> &[IntersectQueryResult] {
        &self.intersect_results[..self.intersect_count]
    }

    /// Results of the last overlap query
    pub fn overlap_results(&self) -> &[OverlapQueryResult] {
        &self.overlap_results[..self.overlap_count]
    }

    #[inline]
    pub fn last_collision_count(&self) -> usize {
        self.collision_count
    }

    #[inline]
    pub fn last_intersect_count(&self) -> usize {
        self.intersect_count
    }

    #[inline]
    pub fn last_overlap_count(&self) -> usize {
        self.overlap_count
    }

    pub fn stats(&self) -> QueryStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = QueryStats::default();
    }

    fn note_saturated(&mut self, mode: &str) {
        self.stats.saturated_queries += 1;
        log::debug!("{} query filled all {} result slots, dropping the rest", mode, MAX_RESULTS);
    }
}
