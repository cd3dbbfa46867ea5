//! Built-in object kinds
//!
//! - [`Wall`] - static one-sided polyline geometry
//! - [`Actor`] - ellipse mover, also used for projectiles
//! - [`Trigger`] - rectangular sensor that can open named objects
//! - [`Spawner`] - fires projectiles on an interval

mod actor;
mod spawner;
mod trigger;
mod wall;

pub use actor::{Actor, ActorCensus, ActorKind, ProjectileCensus};
pub use spawner::Spawner;
pub use trigger::Trigger;
pub use wall::{Wall, WallGeometry};

use crate::class_cache::ClassCacheRegistration;
use crate::level_file::ObjectFactory;

/// Register a constructor for every built-in kind
pub fn register_builtin(factory: &mut ObjectFactory) {
    factory.register(Wall::TYPE_NAME, Wall::from_template);
    factory.register(Actor::TYPE_NAME, Actor::actor_from_template);
    factory.register(Actor::PROJECTILE_TYPE_NAME, Actor::projectile_from_template);
    factory.register(Trigger::TYPE_NAME, Trigger::from_template);
    factory.register(Spawner::TYPE_NAME, Spawner::from_template);
}

/// Class cache table for the built-in kinds
pub fn builtin_class_caches() -> Vec<ClassCacheRegistration> {
    vec![
        ClassCacheRegistration::new(
            Wall::TYPE_NAME,
            wall::build_wall_geometry,
            wall::clear_wall_geometry,
        ),
        ClassCacheRegistration::new(
            Actor::PROJECTILE_TYPE_NAME,
            actor::build_projectile_census,
            actor::clear_projectile_census,
        )
        .with_base(Actor::TYPE_NAME),
        ClassCacheRegistration::new(
            Actor::TYPE_NAME,
            actor::build_actor_census,
            actor::clear_actor_census,
        ),
    ]
}
