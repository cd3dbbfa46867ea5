//! The game object contract
//!
//! Every object a level owns implements [`GameObject`]. The registry only
//! touches an object through its [`ObjectCore`] header and the query and
//! lifecycle hooks below; everything else is private to the object kind.

use std::any::Any;
use std::fmt;

use bitflags::bitflags;
use flatland_math::Aabb2;
use flatland_physics::{
    CollisionQueryResult, EllipseCollisionCache, IntersectQueryResult, ObjectId,
    OverlapQueryResult, RayIntersectCache,
};

use crate::level::LevelContext;
use crate::level_data::{LevelData, RegistryId};
use crate::level_file::ObjectTemplate;
use crate::render::DrawList;

bitflags! {
    /// Which level subsystems consider an object
    ///
    /// Each flag has a matching index in [`LevelData`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Drawn by the renderer
        const RENDERABLE = 1 << 0;
        /// Receives per-frame `update` calls
        const UPDATEABLE = 1 << 1;
        /// Answers ellipse collision and ray intersect queries
        const COLLIDEABLE = 1 << 2;
        /// Answers rectangle overlap queries
        const OVERLAPABLE = 1 << 3;
    }
}

/// Registry-facing header shared by every object
///
/// The id and owner are written by [`LevelData`] only. Name and capabilities
/// are indexed when the object is added, so they can only be changed while
/// the object is detached.
#[derive(Clone, Debug, Default)]
pub struct ObjectCore {
    id: Option<ObjectId>,
    owner: Option<RegistryId>,
    name: String,
    capabilities: Capabilities,
    /// Draw order, lower depths are drawn first
    pub depth: i32,
}

impl ObjectCore {
    /// Create a detached header
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            id: None,
            owner: None,
            name: name.into(),
            capabilities,
            depth: 0,
        }
    }

    /// Set the draw depth
    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    /// Id assigned by the owning registry (`None` while detached)
    #[inline]
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    /// Registry that currently owns this object
    #[inline]
    pub fn owner(&self) -> Option<RegistryId> {
        self.owner
    }

    /// True while some registry owns this object
    #[inline]
    pub fn is_registered(&self) -> bool {
        self.id.is_some() || self.owner.is_some()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Rename a detached object. Returns false if the object is registered;
    /// use [`LevelData::register_name`] for registered objects.
    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        if self.is_registered() {
            return false;
        }
        self.name = name.into();
        true
    }

    /// Change the capabilities of a detached object. Returns false if the
    /// object is registered.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) -> bool {
        if self.is_registered() {
            return false;
        }
        self.capabilities = capabilities;
        true
    }

    pub(crate) fn attach(&mut self, id: ObjectId, owner: RegistryId) {
        self.id = Some(id);
        self.owner = Some(owner);
    }

    pub(crate) fn detach(&mut self) {
        self.id = None;
        self.owner = None;
    }
}

/// Upcast helper so trait objects can be downcast to their concrete kind
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An object that can live in a level
///
/// Only `core`, `core_mut` and `type_name` are required. The query hooks
/// default to "no results", so an object only overrides the ones matching
/// the capabilities it declares.
pub trait GameObject: AsAny + 'static {
    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Exact runtime type name, used by the type index and class caches
    fn type_name(&self) -> &'static str;

    /// Called just before the object is removed from its registry
    ///
    /// Changes made to `data` here are deferred if a drain is in progress.
    fn on_delete(&mut self, _data: &mut LevelData) {}

    /// Called once after every object in a freshly loaded level was added
    fn on_level_loaded(&mut self, _ctx: &mut LevelContext<'_>) -> Result<(), ObjectError> {
        Ok(())
    }

    /// Per-frame update for `UPDATEABLE` objects
    fn update(&mut self, _ctx: &mut LevelContext<'_>) {}

    /// Emit draw commands for `RENDERABLE` objects
    fn draw(&self, _out: &mut DrawList) {}

    /// Write collisions with the query ellipse into `results`, returning how
    /// many were written. `results` is the unused tail of the query buffer.
    fn on_collision_query(
        &self,
        _cache: &EllipseCollisionCache,
        _results: &mut [CollisionQueryResult],
    ) -> usize {
        0
    }

    /// Write intersections with the query ray into `results`, returning how
    /// many were written
    fn on_intersect_query(
        &self,
        _cache: &RayIntersectCache,
        _results: &mut [IntersectQueryResult],
    ) -> usize {
        0
    }

    /// Overlap between the query rectangle and this object
    fn on_overlap_query(&self, _query: &Aabb2) -> OverlapQueryResult {
        OverlapQueryResult::NONE
    }

    /// Serializable form of this object, if it can be saved
    fn to_template(&self) -> Option<ObjectTemplate> {
        None
    }
}

impl dyn GameObject {
    /// Registry id shortcut
    pub fn id(&self) -> Option<ObjectId> {
        self.core().id()
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.core().capabilities()
    }

    pub fn downcast_ref<T: GameObject>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    pub fn downcast_mut<T: GameObject>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut::<T>()
    }
}

impl fmt::Debug for dyn GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.type_name())
            .field("id", &self.core().id())
            .field("name", &self.core().name())
            .field("capabilities", &self.core().capabilities())
            .finish()
    }
}

/// Failure reported by an object's post-load hook
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectError {
    message: String,
}

impl ObjectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object error: {}", self.message)
    }
}

impl std::error::Error for ObjectError {}
