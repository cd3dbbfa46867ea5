//! Rectangular sensor regions

use flatland_math::{Aabb2, Vec2};
use flatland_physics::{ObjectId, OverlapQueryResult};

use crate::level::LevelContext;
use crate::level_file::{ObjectTemplate, TemplateError};
use crate::object::{Capabilities, GameObject, ObjectCore, ObjectError};
use crate::render::{DrawCommand, DrawList};

/// A region that tracks what overlaps it
///
/// When `opens` names a group of objects, the first time anything enters
/// the region every object registered under that name is removed.
pub struct Trigger {
    core: ObjectCore,
    region: Aabb2,
    opens: Option<String>,
    fired: bool,
    occupants: Vec<ObjectId>,
}

impl Trigger {
    pub const TYPE_NAME: &'static str = "Trigger";

    pub fn new(name: impl Into<String>, region: Aabb2) -> Self {
        Self {
            core: ObjectCore::new(
                name,
                Capabilities::RENDERABLE | Capabilities::UPDATEABLE | Capabilities::OVERLAPABLE,
            ),
            region,
            opens: None,
            fired: false,
            occupants: Vec::new(),
        }
    }

    /// Remove objects named `target` when first entered
    pub fn opening(mut self, target: impl Into<String>) -> Self {
        self.opens = Some(target.into());
        self
    }

    pub fn from_template(template: &ObjectTemplate) -> Result<Box<dyn GameObject>, TemplateError> {
        let min = template.point("min")?;
        let max = template.point("max")?;
        if min.x > max.x || min.y > max.y {
            return Err(template.invalid_property("max", "region corners are inverted"));
        }

        let mut trigger = Trigger::new(template.name.clone(), Aabb2::new(min, max));
        let opens = template.text_or("opens", "")?;
        if !opens.is_empty() {
            trigger.opens = Some(opens.to_string());
        }
        trigger.core.depth = template.depth;
        Ok(Box::new(trigger))
    }

    pub fn region(&self) -> Aabb2 {
        self.region
    }

    /// Objects overlapping the region at the last update
    pub fn occupants(&self) -> &[ObjectId] {
        &self.occupants
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl GameObject for Trigger {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn on_level_loaded(&mut self, ctx: &mut LevelContext<'_>) -> Result<(), ObjectError> {
        match &self.opens {
            Some(target) if ctx.data().first_named(target).is_none() => Err(ObjectError::new(
                format!("trigger opens '{}' but nothing has that name", target),
            )),
            _ => Ok(()),
        }
    }

    fn update(&mut self, ctx: &mut LevelContext<'_>) {
        let center: Vec2 = self.region.center();
        let half_extents = self.region.half_extents();
        let entered: Vec<ObjectId> = ctx
            .overlap(center, half_extents)
            .iter()
            .filter_map(|result| result.object)
            .collect();

        for id in &entered {
            if !self.occupants.contains(id) {
                log::debug!("{} entered trigger '{}'", id, self.core.name());
            }
        }
        self.occupants = entered;

        if self.fired || self.occupants.is_empty() {
            return;
        }
        self.fired = true;
        if let Some(target) = &self.opens {
            let targets: Vec<ObjectId> = ctx.data().objects_named(target).collect();
            for id in targets {
                ctx.remove(id);
            }
        }
    }

    fn draw(&self, out: &mut DrawList) {
        out.push(DrawCommand::Rect {
            object: self.core.id(),
            depth: self.core.depth,
            bounds: self.region,
        });
    }

    fn on_overlap_query(&self, query: &Aabb2) -> OverlapQueryResult {
        OverlapQueryResult::between(query, &self.region)
    }

    fn to_template(&self) -> Option<ObjectTemplate> {
        let mut template = ObjectTemplate::new(Self::TYPE_NAME, self.core.name())
            .with_depth(self.core.depth)
            .with_property("min", self.region.min)
            .with_property("max", self.region.max);
        if let Some(opens) = &self.opens {
            template = template.with_property("opens", opens.as_str());
        }
        Some(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_cache::ClassCacheStore;
    use crate::collision_query::LevelCollisionQuery;
    use crate::level_data::LevelData;
    use crate::objects::{Actor, Wall};

    fn run<R>(
        data: &mut LevelData,
        id: ObjectId,
        f: impl FnOnce(&mut Trigger, &mut LevelContext<'_>) -> R,
    ) -> R {
        let mut query = LevelCollisionQuery::new();
        let caches = ClassCacheStore::new();
        data.lock();
        let result = data
            .with_checked_out(id, |object, data| {
                let mut ctx = LevelContext::new(data, &mut query, &caches, id, 0.1);
                let trigger = object.downcast_mut::<Trigger>().unwrap();
                f(trigger, &mut ctx)
            })
            .unwrap();
        data.unlock();
        result
    }

    fn region() -> Aabb2 {
        Aabb2::new(Vec2::ZERO, Vec2::new(4.0, 4.0))
    }

    #[test]
    fn test_tracks_occupants() {
        let mut data = LevelData::new();
        let trigger = data.add(Box::new(Trigger::new("zone", region()))).id().unwrap();
        let inside = data
            .add(Box::new(Actor::new("in", Vec2::new(1.0, 1.0), Vec2::splat(0.5))))
            .id()
            .unwrap();
        data.add(Box::new(Actor::new("out", Vec2::new(9.0, 9.0), Vec2::splat(0.5))));

        let occupants = run(&mut data, trigger, |t, ctx| {
            t.update(ctx);
            t.occupants().to_vec()
        });
        assert_eq!(occupants, vec![inside]);
    }

    #[test]
    fn test_opens_named_objects_once() {
        let mut data = LevelData::new();
        let door = [Vec2::new(5.0, 0.0), Vec2::new(5.0, 4.0)];
        let first = data.add(Box::new(Wall::new("door", &door, false))).id().unwrap();
        let second = data.add(Box::new(Wall::new("Door", &door, false))).id().unwrap();
        let trigger = data
            .add(Box::new(Trigger::new("switch", region()).opening("door")))
            .id()
            .unwrap();
        data.add(Box::new(Actor::new("hero", Vec2::new(2.0, 2.0), Vec2::splat(0.5))));

        let fired = run(&mut data, trigger, |t, ctx| {
            t.update(ctx);
            // Removal is deferred until the pass ends
            assert!(ctx.data().contains(first));
            t.has_fired()
        });
        assert!(fired);
        assert!(!data.contains(first));
        assert!(!data.contains(second));
    }

    #[test]
    fn test_post_load_reports_missing_target() {
        let mut data = LevelData::new();
        let trigger = data
            .add(Box::new(Trigger::new("switch", region()).opening("gate")))
            .id()
            .unwrap();
        let result = run(&mut data, trigger, |t, ctx| t.on_level_loaded(ctx));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_template() {
        let template = ObjectTemplate::new("Trigger", "goal")
            .with_property("min", Vec2::new(1.0, 1.0))
            .with_property("max", Vec2::new(2.0, 3.0))
            .with_property("opens", "exit");
        let object = Trigger::from_template(&template).unwrap();
        let trigger = object.downcast_ref::<Trigger>().unwrap();
        assert_eq!(trigger.region(), Aabb2::new(Vec2::new(1.0, 1.0), Vec2::new(2.0, 3.0)));
        assert_eq!(object.to_template(), Some(template));

        let inverted = ObjectTemplate::new("Trigger", "bad")
            .with_property("min", Vec2::new(3.0, 3.0))
            .with_property("max", Vec2::ZERO);
        assert!(Trigger::from_template(&inverted).is_err());
    }
}
