//! Level runtime for Flatland
//!
//! This crate provides everything a 2D level needs at runtime:
//!
//! - [`GameObject`] - The contract every level object implements
//! - [`LevelData`] - Object registry with capability, name and type indices
//!   and deferred mutation while locked
//! - [`LevelCollisionQuery`] - Ellipse, ray and rectangle queries over a level
//! - [`ClassCacheCoordinator`] - Builds and clears per-type caches in
//!   hierarchy order
//! - [`Level`] - Drives loading, updating and drawing
//! - [`LevelFile`] - Serializable level description loaded from RON files
//! - [`objects`] - Built-in object kinds (walls, actors, triggers, spawners)

mod object;
mod level_data;
mod collision_query;
mod class_cache;
mod level_file;
mod render;
mod level;
pub mod objects;

pub use object::{AsAny, Capabilities, GameObject, ObjectCore, ObjectError};
pub use level_data::{AddOutcome, ChangeOutcome, LevelData, RegistryId, RemoveOutcome};
pub use collision_query::{LevelCollisionQuery, QueryStats};
pub use class_cache::{
    BuildHook, ClassCacheCoordinator, ClassCacheRegistration, ClassCacheStore, ClearHook,
};
pub use level_file::{
    LevelFile, LevelLoadError, LevelSaveError, ObjectFactory, ObjectTemplate, Property,
    TemplateError,
};
pub use render::{DepthSortedRenderer, DrawCommand, DrawList, Renderer};
pub use level::{Level, LevelContext, LoadSummary};

// Re-export the geometry types objects are built from
pub use flatland_math::{Aabb2, Vec2};
pub use flatland_physics::{
    CollisionQueryResult, EllipseCollisionCache, IntersectQueryResult, Line, ObjectId,
    OverlapQueryResult, RayIntersectCache, MAX_RESULTS,
};
