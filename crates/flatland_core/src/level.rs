//! Level driver
//!
//! [`Level`] owns one registry, one query engine, the class caches and a
//! renderer, and runs the load / update / draw cycle over them. Objects see
//! the level through a [`LevelContext`] while they are being updated.

use std::path::Path;

use flatland_math::Vec2;
use flatland_physics::{CollisionQueryResult, IntersectQueryResult, ObjectId, OverlapQueryResult};

use crate::class_cache::{ClassCacheCoordinator, ClassCacheRegistration, ClassCacheStore};
use crate::collision_query::LevelCollisionQuery;
use crate::level_data::{AddOutcome, ChangeOutcome, LevelData, RemoveOutcome};
use crate::level_file::{LevelFile, LevelLoadError, LevelSaveError, ObjectFactory};
use crate::object::GameObject;
use crate::render::{DepthSortedRenderer, DrawList, Renderer};

/// The level as seen by one object during a callback
///
/// The registry is locked for the lifetime of a context, so every mutation
/// made through it is applied after the current pass finishes. Queries
/// always exclude the object the context was made for.
pub struct LevelContext<'a> {
    data: &'a mut LevelData,
    query: &'a mut LevelCollisionQuery,
    caches: &'a ClassCacheStore,
    current: ObjectId,
    dt: f32,
}

impl<'a> LevelContext<'a> {
    pub fn new(
        data: &'a mut LevelData,
        query: &'a mut LevelCollisionQuery,
        caches: &'a ClassCacheStore,
        current: ObjectId,
        dt: f32,
    ) -> Self {
        Self {
            data,
            query,
            caches,
            current,
            dt,
        }
    }

    /// Id of the object being called
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.current
    }

    /// Seconds since the previous update (zero during load callbacks)
    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn data(&self) -> &LevelData {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut LevelData {
        &mut *self.data
    }

    pub fn caches(&self) -> &ClassCacheStore {
        self.caches
    }

    pub fn add(&mut self, object: Box<dyn GameObject>) -> AddOutcome {
        self.data.add(object)
    }

    pub fn remove(&mut self, id: ObjectId) -> RemoveOutcome {
        self.data.remove(id)
    }

    /// Queue removal of the object being called
    pub fn remove_self(&mut self) -> RemoveOutcome {
        self.data.remove(self.current)
    }

    pub fn register_name(&mut self, id: ObjectId, name: &str) -> ChangeOutcome {
        self.data.register_name(id, name)
    }

    pub fn unregister_name(&mut self, id: ObjectId, name: &str) -> ChangeOutcome {
        self.data.unregister_name(id, name)
    }

    /// Collide an ellipse against everything but the current object
    pub fn collide(&mut self, center: Vec2, radii: Vec2, rotation: f32) -> &[CollisionQueryResult] {
        self.query
            .collide(self.data, center, radii, rotation, Some(self.current))
    }

    /// Cast a ray against everything but the current object
    pub fn intersect(&mut self, start: Vec2, end: Vec2) -> &[IntersectQueryResult] {
        self.query.intersect(self.data, start, end, Some(self.current))
    }

    /// Nearest hit of the last [`intersect`](Self::intersect)
    pub fn closest_intersect(&self) -> IntersectQueryResult {
        self.query.closest_intersect()
    }

    /// Overlap a rectangle with everything but the current object
    pub fn overlap(&mut self, center: Vec2, half_extents: Vec2) -> &[OverlapQueryResult] {
        self.query
            .overlap(self.data, center, half_extents, Some(self.current))
    }
}

/// What a level load did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub name: String,
    /// Objects added to the registry
    pub added: usize,
    /// Templates that could not be turned into objects
    pub skipped: usize,
    /// Objects whose post-load callback failed
    pub failed_callbacks: usize,
}

/// A running level
pub struct Level {
    name: String,
    data: LevelData,
    query: LevelCollisionQuery,
    class_caches: ClassCacheCoordinator,
    cache_store: ClassCacheStore,
    factory: ObjectFactory,
    renderer: Box<dyn Renderer>,
    draw_list: DrawList,
    frame: u64,
}

impl Default for Level {
    fn default() -> Self {
        Self::new()
    }
}

impl Level {
    /// An empty level knowing the built-in object kinds
    pub fn new() -> Self {
        Self {
            name: String::new(),
            data: LevelData::new(),
            query: LevelCollisionQuery::new(),
            class_caches: ClassCacheCoordinator::new(crate::objects::builtin_class_caches()),
            cache_store: ClassCacheStore::new(),
            factory: ObjectFactory::with_builtin(),
            renderer: Box::new(DepthSortedRenderer::new()),
            draw_list: DrawList::new(),
            frame: 0,
        }
    }

    /// Replace the object factory
    pub fn with_factory(mut self, factory: ObjectFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Replace the class cache table
    pub fn with_class_caches(mut self, registrations: Vec<ClassCacheRegistration>) -> Self {
        self.class_caches = ClassCacheCoordinator::new(registrations);
        self
    }

    /// Replace the renderer
    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Load a level file, replacing the current level
    ///
    /// If the file cannot be read or parsed the current level is kept.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadSummary, LevelLoadError> {
        let path = path.as_ref();
        let file = LevelFile::load(path)?;
        log::info!("Loading level '{}' from {}", file.name, path.display());
        Ok(self.load_file(&file))
    }

    /// Replace the current level with an already parsed level file
    ///
    /// Templates that fail to build and objects whose post-load callback
    /// fails are logged and counted, never fatal.
    pub fn load_file(&mut self, file: &LevelFile) -> LoadSummary {
        self.class_caches.clear_all(&mut self.cache_store);
        self.reset_objects();
        self.name = file.name.clone();

        let mut summary = LoadSummary {
            name: file.name.clone(),
            ..LoadSummary::default()
        };

        for template in &file.objects {
            let object = match self.factory.create(template) {
                Ok(object) => object,
                Err(e) => {
                    log::warn!("Skipping object '{}': {}", template.name, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            match self.data.add(object) {
                AddOutcome::Added(_) => summary.added += 1,
                other => {
                    log::warn!("Skipping object '{}': not added ({:?})", template.name, other);
                    summary.skipped += 1;
                }
            }
        }

        self.data.lock();
        let ids: Vec<ObjectId> = self.data.ids().collect();
        for id in ids {
            let query = &mut self.query;
            let caches = &self.cache_store;
            let outcome = self.data.with_checked_out(id, |object, data| {
                let mut ctx = LevelContext::new(data, query, caches, id, 0.0);
                object
                    .on_level_loaded(&mut ctx)
                    .map_err(|e| (object.name().to_string(), e))
            });
            if let Some(Err((name, e))) = outcome {
                log::warn!("Post-load callback of {} '{}' failed: {}", id, name, e);
                summary.failed_callbacks += 1;
            }
        }
        self.data.unlock();
        self.data.drain_released();

        self.class_caches.build_all(&self.data, &mut self.cache_store);

        log::info!(
            "Loaded level '{}': {} objects, {} skipped",
            summary.name,
            summary.added,
            summary.skipped
        );
        summary
    }

    /// Save every object that has a serializable form
    ///
    /// Returns the number of objects written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<usize, LevelSaveError> {
        let file = self.to_level_file();
        file.save(path.as_ref())?;
        log::info!(
            "Saved level '{}' ({} objects) to {}",
            file.name,
            file.objects.len(),
            path.as_ref().display()
        );
        Ok(file.objects.len())
    }

    /// Snapshot the current level as a level file
    pub fn to_level_file(&self) -> LevelFile {
        let mut file = LevelFile::new(self.name.clone());
        for (id, object) in self.data.objects() {
            match object.to_template() {
                Some(template) => file.add_object(template),
                None => log::debug!("{} '{}' has no saved form", id, object.name()),
            }
        }
        file
    }

    /// Advance every updateable object by `dt` seconds
    ///
    /// Objects added during the pass are first updated next frame.
    pub fn update(&mut self, dt: f32) {
        self.data.lock();
        let ids: Vec<ObjectId> = self.data.updateable_ids().collect();
        for id in ids {
            let query = &mut self.query;
            let caches = &self.cache_store;
            self.data.with_checked_out(id, |object, data| {
                let mut ctx = LevelContext::new(data, query, caches, id, dt);
                object.update(&mut ctx);
            });
        }
        self.data.unlock();

        let released = self.data.drain_released();
        if !released.is_empty() {
            log::trace!("Frame {}: released {} objects", self.frame, released.len());
        }
        self.frame += 1;
    }

    /// Record draw commands for every renderable object
    pub fn draw(&mut self) -> &DrawList {
        self.draw_list.clear();
        self.renderer.draw(&mut self.data, &mut self.draw_list);
        &self.draw_list
    }

    /// Drop every object and class cache
    pub fn clear(&mut self) {
        self.class_caches.clear_all(&mut self.cache_store);
        self.reset_objects();
        self.name.clear();
    }

    fn reset_objects(&mut self) {
        let removed = self.data.clear();
        if !removed.is_empty() {
            log::debug!("Dropped {} objects from level '{}'", removed.len(), self.name);
        }
        self.frame = 0;
    }

    /// Collide an ellipse against the level
    pub fn collide(
        &mut self,
        center: Vec2,
        radii: Vec2,
        rotation: f32,
        excluded: Option<ObjectId>,
    ) -> &[CollisionQueryResult] {
        self.query.collide(&self.data, center, radii, rotation, excluded)
    }

    /// Cast a ray against the level
    pub fn intersect(
        &mut self,
        start: Vec2,
        end: Vec2,
        excluded: Option<ObjectId>,
    ) -> &[IntersectQueryResult] {
        self.query.intersect(&self.data, start, end, excluded)
    }

    /// Overlap a rectangle with the level
    pub fn overlap(
        &mut self,
        center: Vec2,
        half_extents: Vec2,
        excluded: Option<ObjectId>,
    ) -> &[OverlapQueryResult] {
        self.query.overlap(&self.data, center, half_extents, excluded)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frames updated since the level was loaded
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn data(&self) -> &LevelData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut LevelData {
        &mut self.data
    }

    pub fn query(&self) -> &LevelCollisionQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut LevelCollisionQuery {
        &mut self.query
    }

    pub fn caches(&self) -> &ClassCacheStore {
        &self.cache_store
    }
}
