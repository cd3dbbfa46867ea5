//! Static level geometry

use flatland_math::{Aabb2, Vec2};
use flatland_physics::{
    CollisionQueryResult, EllipseCollisionCache, IntersectQueryResult, Line, RayIntersectCache,
};

use crate::class_cache::ClassCacheStore;
use crate::level_data::LevelData;
use crate::level_file::{ObjectTemplate, TemplateError};
use crate::object::{Capabilities, GameObject, ObjectCore};
use crate::render::{DrawCommand, DrawList};

/// A polyline of one-sided lines
///
/// Each line's solid side is to its right when walking from start to end,
/// so a counter-clockwise loop encloses open space and a clockwise loop is a
/// solid block.
pub struct Wall {
    core: ObjectCore,
    points: Vec<Vec2>,
    closed: bool,
    lines: Vec<Line>,
    bounds: Aabb2,
}

impl Wall {
    pub const TYPE_NAME: &'static str = "Wall";

    pub fn new(name: impl Into<String>, points: &[Vec2], closed: bool) -> Self {
        let points = dedup_points(points, closed);
        let lines = build_lines(&points, closed);
        let bounds = lines
            .iter()
            .map(Line::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();

        Self {
            core: ObjectCore::new(name, Capabilities::RENDERABLE | Capabilities::COLLIDEABLE),
            points,
            closed,
            lines,
            bounds,
        }
    }

    /// Build from a template with a `points` list and optional `closed` flag
    pub fn from_template(template: &ObjectTemplate) -> Result<Box<dyn GameObject>, TemplateError> {
        let points = template.points("points")?;
        let closed = template.flag_or("closed", false)?;
        let mut wall = Wall::new(template.name.clone(), &points, closed);
        if wall.lines.is_empty() {
            return Err(template.invalid_property("points", "needs two distinct points"));
        }
        wall.core.depth = template.depth;
        Ok(Box::new(wall))
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn bounds(&self) -> Aabb2 {
        self.bounds
    }
}

/// Drop consecutive repeated points (and a repeated closing point)
fn dedup_points(points: &[Vec2], closed: bool) -> Vec<Vec2> {
    let mut unique: Vec<Vec2> = Vec::with_capacity(points.len());
    for point in points {
        if unique.last() != Some(point) {
            unique.push(*point);
        }
    }
    if closed && unique.len() > 1 && unique.first() == unique.last() {
        unique.pop();
    }
    unique
}

fn build_lines(points: &[Vec2], closed: bool) -> Vec<Line> {
    if points.len() < 2 {
        return Vec::new();
    }
    let mut lines: Vec<Line> = points.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    // A closed loop of two points would be the same segment twice
    let closed = closed && points.len() > 2;
    if closed {
        lines.push(Line::new(points[points.len() - 1], points[0]));
    }

    let joints = if closed { lines.len() } else { lines.len() - 1 };
    for i in 0..joints {
        let next = (i + 1) % lines.len();
        let turn = lines[i].direction().cross(lines[next].direction());
        // Right turns stick out into open space and keep one corner point;
        // left turns and straight joints are seams the lines already cover
        lines[i].end_point_collideable = turn < 0.0;
        lines[next].start_point_collideable = false;
    }
    lines
}

impl GameObject for Wall {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn draw(&self, out: &mut DrawList) {
        for line in &self.lines {
            out.push(DrawCommand::Line {
                object: self.core.id(),
                depth: self.core.depth,
                start: line.start(),
                end: line.end(),
            });
        }
    }

    fn on_collision_query(
        &self,
        cache: &EllipseCollisionCache,
        results: &mut [CollisionQueryResult],
    ) -> usize {
        if !self.bounds.intersects(&cache.bounds) {
            return 0;
        }
        let mut count = 0;
        for line in &self.lines {
            if count == results.len() {
                break;
            }
            let result = line.fast_collide(cache);
            if result.valid_result {
                results[count] = result;
                count += 1;
            }
        }
        count
    }

    fn on_intersect_query(
        &self,
        cache: &RayIntersectCache,
        results: &mut [IntersectQueryResult],
    ) -> usize {
        if !self.bounds.intersects(&cache.bounds) {
            return 0;
        }
        let mut count = 0;
        for line in &self.lines {
            if count == results.len() {
                break;
            }
            let result = line.fast_intersect(cache);
            if result.valid_result {
                results[count] = result;
                count += 1;
            }
        }
        count
    }

    fn to_template(&self) -> Option<ObjectTemplate> {
        Some(
            ObjectTemplate::new(Self::TYPE_NAME, self.core.name())
                .with_depth(self.core.depth)
                .with_property("points", self.points.as_slice())
                .with_property("closed", self.closed),
        )
    }
}

/// Combined extent of all wall geometry in the loaded level
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WallGeometry {
    pub bounds: Option<Aabb2>,
    pub walls: usize,
    pub lines: usize,
}

pub(crate) fn build_wall_geometry(data: &LevelData, store: &mut ClassCacheStore) {
    let mut geometry = WallGeometry::default();
    for (_, wall) in data.objects_of::<Wall>() {
        geometry.walls += 1;
        geometry.lines += wall.lines.len();
        geometry.bounds = Some(match geometry.bounds {
            Some(bounds) => bounds.union(&wall.bounds),
            None => wall.bounds,
        });
    }
    store.insert(geometry);
}

pub(crate) fn clear_wall_geometry(store: &mut ClassCacheStore) {
    store.remove::<WallGeometry>();
}
