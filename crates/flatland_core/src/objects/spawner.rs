//! Periodic projectile emitters

use flatland_math::Vec2;

use crate::level::LevelContext;
use crate::level_file::{ObjectTemplate, TemplateError};
use crate::object::{Capabilities, GameObject, ObjectCore};
use crate::objects::Actor;

/// Fires a projectile every `interval` seconds
///
/// A spawner whose interval is not a positive finite number never fires.
pub struct Spawner {
    core: ObjectCore,
    position: Vec2,
    interval: f32,
    shot_velocity: Vec2,
    shot_radius: f32,
    shot_lifetime: f32,
    /// Stop after this many shots
    limit: Option<u32>,
    timer: f32,
    fired: u32,
}

impl Spawner {
    pub const TYPE_NAME: &'static str = "Spawner";

    pub fn new(name: impl Into<String>, position: Vec2, interval: f32, shot_velocity: Vec2) -> Self {
        let name = name.into();
        if !Self::valid_interval(interval) {
            log::warn!("Spawner '{}' has invalid interval {}, it will never fire", name, interval);
        }
        Self {
            core: ObjectCore::new(name, Capabilities::UPDATEABLE),
            position,
            interval,
            shot_velocity,
            shot_radius: 0.25,
            shot_lifetime: 5.0,
            limit: None,
            timer: 0.0,
            fired: 0,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_shot_lifetime(mut self, seconds: f32) -> Self {
        self.shot_lifetime = seconds;
        self
    }

    pub fn from_template(template: &ObjectTemplate) -> Result<Box<dyn GameObject>, TemplateError> {
        let interval = template.number("interval")?;
        if !Self::valid_interval(interval) {
            return Err(template.invalid_property("interval", "must be positive"));
        }
        let mut spawner = Spawner::new(
            template.name.clone(),
            template.point("position")?,
            interval,
            template.point_or("velocity", Vec2::ZERO)?,
        );
        spawner.shot_radius = template.number_or("radius", spawner.shot_radius)?;
        if !(spawner.shot_radius > 0.0 && spawner.shot_radius.is_finite()) {
            return Err(template.invalid_property("radius", "must be positive"));
        }
        spawner.shot_lifetime = template.number_or("lifetime", spawner.shot_lifetime)?;
        if template.properties.contains_key("limit") {
            let limit = template.number("limit")?;
            if !(limit >= 0.0 && limit < u32::MAX as f32) || limit.fract() != 0.0 {
                return Err(template.invalid_property("limit", "must be a whole number of shots"));
            }
            spawner.limit = Some(limit as u32);
        }
        Ok(Box::new(spawner))
    }

    /// Shots fired so far
    pub fn fired(&self) -> u32 {
        self.fired
    }

    fn valid_interval(interval: f32) -> bool {
        interval > 0.0 && interval.is_finite()
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.fired >= limit)
    }
}

impl GameObject for Spawner {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn update(&mut self, ctx: &mut LevelContext<'_>) {
        if !Self::valid_interval(self.interval) {
            return;
        }
        self.timer += ctx.dt();
        while self.timer >= self.interval && !self.exhausted() {
            self.timer -= self.interval;
            self.fired += 1;
            let shot = Actor::projectile(
                format!("{}_shot", self.core.name()),
                self.position,
                Vec2::splat(self.shot_radius),
                self.shot_velocity,
            )
            .with_lifetime(self.shot_lifetime);
            ctx.add(Box::new(shot));
        }
    }

    fn to_template(&self) -> Option<ObjectTemplate> {
        let mut template = ObjectTemplate::new(Self::TYPE_NAME, self.core.name())
            .with_depth(self.core.depth)
            .with_property("position", self.position)
            .with_property("interval", self.interval)
            .with_property("velocity", self.shot_velocity)
            .with_property("radius", self.shot_radius)
            .with_property("lifetime", self.shot_lifetime);
        if let Some(limit) = self.limit {
            template = template.with_property("limit", limit.saturating_sub(self.fired) as f32);
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
    use flatland_physics::ObjectId;

    fn step(data: &mut LevelData, id: ObjectId, dt: f32) {
        let mut query = LevelCollisionQuery::new();
        let caches = ClassCacheStore::new();
        data.lock();
        data.with_checked_out(id, |object, data| {
            let mut ctx = LevelContext::new(data, &mut query, &caches, id, dt);
            object.update(&mut ctx);
        });
        data.unlock();
    }

    #[test]
    fn test_fires_on_interval() {
        let mut data = LevelData::new();
        let id = data
            .add(Box::new(Spawner::new("gun", Vec2::ZERO, 0.5, Vec2::X)))
            .id()
            .unwrap();

        step(&mut data, id, 0.4);
        assert_eq!(data.objects_of_type("Projectile").count(), 0);
        step(&mut data, id, 0.2);
        assert_eq!(data.objects_of_type("Projectile").count(), 1);
        step(&mut data, id, 1.0);
        assert_eq!(data.objects_of_type("Projectile").count(), 3);
        assert_eq!(data.objects_named("gun_shot").count(), 3);
    }

    #[test]
    fn test_limit_stops_firing() {
        let mut data = LevelData::new();
        let id = data
            .add(Box::new(Spawner::new("gun", Vec2::ZERO, 0.1, Vec2::X).with_limit(2)))
            .id()
            .unwrap();

        step(&mut data, id, 1.0);
        assert_eq!(data.objects_of_type("Projectile").count(), 2);
        let spawner = data.get(id).unwrap().downcast_ref::<Spawner>().unwrap();
        assert_eq!(spawner.fired(), 2);
    }

    #[test]
    fn test_invalid_interval_never_fires() {
        let mut data = LevelData::new();
        let zero = data
            .add(Box::new(Spawner::new("zero", Vec2::ZERO, 0.0, Vec2::X)))
            .id()
            .unwrap();
        let negative = data
            .add(Box::new(Spawner::new("negative", Vec2::ZERO, -1.0, Vec2::X)))
            .id()
            .unwrap();

        step(&mut data, zero, 1.0);
        step(&mut data, negative, 1.0);
        assert_eq!(data.objects_of_type("Projectile").count(), 0);
        let spawner = data.get(zero).unwrap().downcast_ref::<Spawner>().unwrap();
        assert_eq!(spawner.fired(), 0);
    }

    #[test]
    fn test_template_validation() {
        let template = ObjectTemplate::new("Spawner", "gun")
            .with_property("position", Vec2::ZERO)
            .with_property("interval", 0.0f32);
        assert!(Spawner::from_template(&template).is_err());

        let base = ObjectTemplate::new("Spawner", "gun")
            .with_property("position", Vec2::ZERO)
            .with_property("interval", 1.0f32);
        for bad_radius in [0.0f32, -0.5, f32::NAN] {
            let template = base.clone().with_property("radius", bad_radius);
            assert!(Spawner::from_template(&template).is_err(), "radius {}", bad_radius);
        }
        for bad_limit in [-1.0f32, 2.5, f32::INFINITY, 5.0e9] {
            let template = base.clone().with_property("limit", bad_limit);
            assert!(Spawner::from_template(&template).is_err(), "limit {}", bad_limit);
        }

        let template = base.with_property("limit", 3.0f32);
        let object = Spawner::from_template(&template).unwrap();
        assert_eq!(object.to_template().unwrap().number("limit"), Ok(3.0));
    }
}
