//! Moving ellipse bodies

use flatland_math::{Aabb2, Vec2};
use flatland_physics::{cache::ellipse_bounds, ObjectId, OverlapQueryResult};

use crate::class_cache::ClassCacheStore;
use crate::level::LevelContext;
use crate::level_data::LevelData;
use crate::level_file::{ObjectTemplate, TemplateError};
use crate::object::{Capabilities, GameObject, ObjectCore};
use crate::render::{DrawCommand, DrawList};

/// Collision passes per update; each pass resolves the deepest contact
const RESOLVE_ITERATIONS: usize = 4;

/// Contacts whose normal is at least this steep count as ground
const GROUND_NORMAL_Y: f32 = 0.7;

/// The two flavours of mover
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorKind {
    /// Slides along geometry
    Actor,
    /// Removed on its first contact
    Projectile,
}

impl ActorKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ActorKind::Actor => Actor::TYPE_NAME,
            ActorKind::Projectile => Actor::PROJECTILE_TYPE_NAME,
        }
    }
}

/// An ellipse that integrates velocity and is pushed out of walls
pub struct Actor {
    core: ObjectCore,
    kind: ActorKind,
    pub position: Vec2,
    pub radii: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    /// Acceleration applied every update
    pub gravity: Vec2,
    /// Seconds until the actor removes itself
    pub lifetime: Option<f32>,
    age: f32,
    grounded: bool,
    contacts: u32,
}

impl Actor {
    pub const TYPE_NAME: &'static str = "Actor";
    pub const PROJECTILE_TYPE_NAME: &'static str = "Projectile";

    pub fn new(name: impl Into<String>, position: Vec2, radii: Vec2) -> Self {
        Self::with_kind(ActorKind::Actor, name, position, radii)
    }

    pub fn projectile(name: impl Into<String>, position: Vec2, radii: Vec2, velocity: Vec2) -> Self {
        let mut projectile = Self::with_kind(ActorKind::Projectile, name, position, radii);
        projectile.velocity = velocity;
        projectile
    }

    fn with_kind(kind: ActorKind, name: impl Into<String>, position: Vec2, radii: Vec2) -> Self {
        Self {
            core: ObjectCore::new(
                name,
                Capabilities::RENDERABLE | Capabilities::UPDATEABLE | Capabilities::OVERLAPABLE,
            ),
            kind,
            position,
            radii,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            gravity: Vec2::ZERO,
            lifetime: None,
            age: 0.0,
            grounded: false,
            contacts: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_lifetime(mut self, seconds: f32) -> Self {
        self.lifetime = Some(seconds);
        self
    }

    pub fn actor_from_template(template: &ObjectTemplate) -> Result<Box<dyn GameObject>, TemplateError> {
        Self::from_template(ActorKind::Actor, template)
    }

    pub fn projectile_from_template(
        template: &ObjectTemplate,
    ) -> Result<Box<dyn GameObject>, TemplateError> {
        Self::from_template(ActorKind::Projectile, template)
    }

    fn from_template(
        kind: ActorKind,
        template: &ObjectTemplate,
    ) -> Result<Box<dyn GameObject>, TemplateError> {
        let position = template.point("position")?;
        let radii = template.point_or("radii", Vec2::new(0.5, 0.5))?;
        if !(radii.x > 0.0 && radii.y > 0.0) {
            return Err(template.invalid_property("radii", "radii must be positive"));
        }

        let mut actor = Self::with_kind(kind, template.name.clone(), position, radii);
        actor.rotation = template.number_or("rotation", 0.0)?;
        actor.velocity = template.point_or("velocity", Vec2::ZERO)?;
        actor.gravity = template.point_or("gravity", Vec2::ZERO)?;
        if template.properties.contains_key("lifetime") {
            actor.lifetime = Some(template.number("lifetime")?);
        }
        actor.core.depth = template.depth;
        Ok(Box::new(actor))
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    /// Seconds since the actor was created
    pub fn age(&self) -> f32 {
        self.age
    }

    /// Whether the last update ended standing on something
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Contacts resolved during the last update
    pub fn contacts(&self) -> u32 {
        self.contacts
    }

    pub fn bounds(&self) -> Aabb2 {
        ellipse_bounds(self.position, self.radii, self.rotation)
    }

    /// Push out of overlapping geometry, deepest contact first
    fn resolve_collisions(&mut self, ctx: &mut LevelContext<'_>) {
        for _ in 0..RESOLVE_ITERATIONS {
            let deepest = ctx
                .collide(self.position, self.radii, self.rotation)
                .iter()
                .copied()
                .filter(|r| r.valid_result)
                .reduce(|a, b| if b.penetration > a.penetration { b } else { a });
            let Some(contact) = deepest else {
                break;
            };

            self.contacts += 1;
            self.position += contact.resolve_vector();

            // Remove the velocity component driving into the surface
            let normal = contact.resolve_direction;
            let into = self.velocity.dot(normal);
            if into < 0.0 {
                self.velocity -= normal * into;
            }
            if normal.y >= GROUND_NORMAL_Y {
                self.grounded = true;
            }
        }
    }
}

impl GameObject for Actor {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    fn update(&mut self, ctx: &mut LevelContext<'_>) {
        let dt = ctx.dt();
        self.age += dt;
        if let Some(lifetime) = self.lifetime {
            if self.age >= lifetime {
                ctx.remove_self();
                return;
            }
        }

        self.velocity += self.gravity * dt;
        self.position += self.velocity * dt;
        self.grounded = false;
        self.contacts = 0;
        self.resolve_collisions(ctx);

        if self.kind == ActorKind::Projectile && self.contacts > 0 {
            log::trace!("{} hit level geometry at {:?}", ctx.id(), self.position);
            ctx.remove_self();
        }
    }

    fn draw(&self, out: &mut DrawList) {
        out.push(DrawCommand::Ellipse {
            object: self.core.id(),
            depth: self.core.depth,
            center: self.position,
            radii: self.radii,
            rotation: self.rotation,
        });
    }

    fn on_overlap_query(&self, query: &Aabb2) -> OverlapQueryResult {
        OverlapQueryResult::between(query, &self.bounds())
    }

    fn to_template(&self) -> Option<ObjectTemplate> {
        let mut template = ObjectTemplate::new(self.kind.type_name(), self.core.name())
            .with_depth(self.core.depth)
            .with_property("position", self.position)
            .with_property("radii", self.radii)
            .with_property("rotation", self.rotation)
            .with_property("velocity", self.velocity)
            .with_property("gravity", self.gravity);
        if let Some(lifetime) = self.lifetime {
            template = template.with_property("lifetime", (lifetime - self.age).max(0.0));
        }
        Some(template)
    }
}

/// Ids of every plain actor in the loaded level
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActorCensus {
    pub actors: Vec<ObjectId>,
}

/// Projectiles in the loaded level and the actors they could hit
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectileCensus {
    pub projectiles: Vec<ObjectId>,
    /// Copied from [`ActorCensus`], which is always built first
    pub targets: usize,
}

pub(crate) fn build_actor_census(data: &LevelData, store: &mut ClassCacheStore) {
    let actors = data.objects_of_type(Actor::TYPE_NAME).collect();
    store.insert(ActorCensus { actors });
}

pub(crate) fn clear_actor_census(store: &mut ClassCacheStore) {
    store.remove::<ActorCensus>();
}

pub(crate) fn build_projectile_census(data: &LevelData, store: &mut ClassCacheStore) {
    let targets = store.get::<ActorCensus>().map_or(0, |census| census.actors.len());
    let projectiles = data.objects_of_type(Actor::PROJECTILE_TYPE_NAME).collect();
    store.insert(ProjectileCensus {
        projectiles,
        targets,
    });
}

pub(crate) fn clear_projectile_census(store: &mut ClassCacheStore) {
    store.remove::<ProjectileCensus>();
}
