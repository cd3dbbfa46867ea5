//! Per-type caches rebuilt on every level load
//!
//! Object kinds can share derived data between all their instances, such as
//! precomputed geometry or a census of live objects. Each kind registers a
//! [`ClassCacheRegistration`] with a build hook and a clear hook that read
//! and write a [`ClassCacheStore`].
//!
//! Kinds may declare a base kind. The coordinator runs build hooks
//! base-first so a derived cache can read its base's cache, and clear hooks
//! in the reverse order.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = ClassCacheCoordinator::new(vec![
//!     ClassCacheRegistration::new("Actor", build_actor, clear_actor),
//!     ClassCacheRegistration::new("Projectile", build_projectile, clear_projectile)
//!         .with_base("Actor"),
//! ]);
//! coordinator.clear_all(&mut store);
//! // ... load objects ...
//! coordinator.build_all(&data, &mut store);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::level_data::LevelData;

/// Builds a kind's cache from the freshly loaded level
pub type BuildHook = fn(&LevelData, &mut ClassCacheStore);

/// Drops a kind's cache before the next level loads
pub type ClearHook = fn(&mut ClassCacheStore);

/// Type-keyed storage for class caches
///
/// Holds at most one value per Rust type.
#[derive(Default)]
pub struct ClassCacheStore {
    entries: HashMap<TypeId, Box<dyn Any>>,
}

impl ClassCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cache value, replacing any previous value of the same type
    pub fn insert<T: Any>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.entries.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.entries.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }

    /// Get the cache of type `T`, creating it first if needed
    pub fn get_or_insert_with<T: Any>(&mut self, make: impl FnOnce() -> T) -> &mut T {
        if !self.contains::<T>() {
            self.insert(make());
        }
        match self.get_mut::<T>() {
            Some(value) => value,
            None => unreachable!("class cache entry keyed by a foreign type"),
        }
    }

    /// Remove and return the cache of type `T`
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        let boxed = self.entries.remove(&TypeId::of::<T>())?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Cache hooks and base kind for one object kind
#[derive(Clone, Debug)]
pub struct ClassCacheRegistration {
    /// The kind's `GameObject::type_name`
    pub type_name: &'static str,
    /// Kind this one derives from, if any
    pub base: Option<&'static str>,
    pub build: Option<BuildHook>,
    pub clear: Option<ClearHook>,
}

impl ClassCacheRegistration {
    /// A kind with both hooks
    pub fn new(type_name: &'static str, build: BuildHook, clear: ClearHook) -> Self {
        Self {
            type_name,
            base: None,
            build: Some(build),
            clear: Some(clear),
        }
    }

    /// A kind with no cache of its own, present only to link a hierarchy
    pub fn hierarchy_only(type_name: &'static str) -> Self {
        Self {
            type_name,
            base: None,
            build: None,
            clear: None,
        }
    }

    pub fn with_base(mut self, base: &'static str) -> Self {
        self.base = Some(base);
        self
    }
}

/// Runs class cache hooks in hierarchy order
#[derive(Clone, Debug, Default)]
pub struct ClassCacheCoordinator {
    /// Base-first
    build_order: Vec<(&'static str, BuildHook)>,
    /// Derived-first
    clear_order: Vec<(&'static str, ClearHook)>,
}

impl ClassCacheCoordinator {
    /// Resolve the hook order for a registration table
    ///
    /// Kinds registering only one of the two hooks keep their place in the
    /// hierarchy but have both hooks skipped. Duplicate registrations of a
    /// kind are ignored after the first.
    pub fn new(registrations: Vec<ClassCacheRegistration>) -> Self {
        let mut table: Vec<ClassCacheRegistration> = Vec::with_capacity(registrations.len());
        for registration in registrations {
            if table.iter().any(|r| r.type_name == registration.type_name) {
                log::warn!(
                    "Ignoring duplicate class cache registration for {}",
                    registration.type_name
                );
                continue;
            }
            table.push(registration);
        }

        let bases: HashMap<&'static str, Option<&'static str>> =
            table.iter().map(|r| (r.type_name, r.base)).collect();

        // Depth in the declared hierarchy; a stable sort keeps
        // registration order among kinds of equal depth
        let mut ordered: Vec<(usize, &ClassCacheRegistration)> = table
            .iter()
            .map(|r| (hierarchy_depth(r.type_name, &bases), r))
            .collect();
        ordered.sort_by_key(|(depth, _)| *depth);

        let mut build_order = Vec::new();
        let mut clear_order = Vec::new();
        for (_, registration) in ordered {
            match (registration.build, registration.clear) {
                (Some(build), Some(clear)) => {
                    build_order.push((registration.type_name, build));
                    clear_order.push((registration.type_name, clear));
                }
                (None, None) => {}
                _ => log::warn!(
                    "{} registers only one class cache hook, skipping its cache",
                    registration.type_name
                ),
            }
        }
        clear_order.reverse();

        log::debug!("Resolved {} class caches", build_order.len());
        Self {
            build_order,
            clear_order,
        }
    }

    /// Build every cache, bases before derived kinds
    pub fn build_all(&self, data: &LevelData, store: &mut ClassCacheStore) {
        for (type_name, build) in &self.build_order {
            log::trace!("Building class cache for {}", type_name);
            build(data, store);
        }
    }

    /// Clear every cache, derived kinds before their bases
    pub fn clear_all(&self, store: &mut ClassCacheStore) {
        for (type_name, clear) in &self.clear_order {
            log::trace!("Clearing class cache for {}", type_name);
            clear(store);
        }
    }

    /// Kinds in build order
    pub fn build_order(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.build_order.iter().map(|(name, _)| *name)
    }

    /// Kinds in clear order
    pub fn clear_order(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.clear_order.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.build_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.build_order.is_empty()
    }
}

/// Number of registered ancestors above `type_name`
fn hierarchy_depth(
    type_name: &'static str,
    bases: &HashMap<&'static str, Option<&'static str>>,
) -> usize {
    let mut depth = 0;
    let mut current = type_name;
    while let Some(Some(base)) = bases.get(current) {
        if !bases.contains_key(base) {
            break;
        }
        depth += 1;
        if depth > bases.len() {
            log::warn!("Class cache hierarchy of {} contains a cycle", type_name);
            return 0;
        }
        current = base;
    }
    depth
}
