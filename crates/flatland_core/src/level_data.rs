//! Object registry for a level
//!
//! [`LevelData`] owns every object in a level and keeps several indices over
//! them: by id, by capability, by (case-insensitive) name and by type name.
//!
//! Code that walks an index while objects react to what they see (updates,
//! drawing, load callbacks) brackets the walk with [`LevelData::lock`] and
//! [`LevelData::unlock`]. While locked, every mutating call is appended to a
//! FIFO change queue instead of touching the indices. The outermost unlock
//! drains the queue; changes triggered while draining are appended to the
//! same queue and applied before `unlock` returns.
//!
//! Misuse (unknown ids, empty names, adding an object that is already owned)
//! is ignored rather than reported.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use flatland_physics::ObjectId;

use crate::object::{Capabilities, GameObject};

/// Identity of one registry instance, stored in the objects it owns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegistryId(u32);

impl RegistryId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The capability flags in index order
const INDEXED_CAPABILITIES: [Capabilities; 4] = [
    Capabilities::RENDERABLE,
    Capabilities::UPDATEABLE,
    Capabilities::COLLIDEABLE,
    Capabilities::OVERLAPABLE,
];

fn capability_slot(capability: Capabilities) -> Option<usize> {
    INDEXED_CAPABILITIES.iter().position(|c| *c == capability)
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Outcome of [`LevelData::add`]
pub enum AddOutcome {
    /// The object was registered under this id
    Added(ObjectId),
    /// The registry is locked; the add is queued
    Deferred,
    /// The object is already owned; ownership is handed back
    Rejected(Box<dyn GameObject>),
}

impl AddOutcome {
    /// Id assigned by an immediate add
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            AddOutcome::Added(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, AddOutcome::Deferred)
    }
}

impl fmt::Debug for AddOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddOutcome::Added(id) => write!(f, "Added({})", id),
            AddOutcome::Deferred => write!(f, "Deferred"),
            AddOutcome::Rejected(object) => write!(f, "Rejected({:?})", object),
        }
    }
}

/// Outcome of [`LevelData::remove`]
pub enum RemoveOutcome {
    /// The object was removed; ownership is handed back detached
    Removed(Box<dyn GameObject>),
    /// The registry is locked; the removal is queued
    Deferred,
    /// No such object
    Ignored,
}

impl RemoveOutcome {
    /// Take the removed object, if any
    pub fn into_object(self) -> Option<Box<dyn GameObject>> {
        match self {
            RemoveOutcome::Removed(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, RemoveOutcome::Removed(_))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, RemoveOutcome::Deferred)
    }
}

impl fmt::Debug for RemoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoveOutcome::Removed(object) => write!(f, "Removed({:?})", object),
            RemoveOutcome::Deferred => write!(f, "Deferred"),
            RemoveOutcome::Ignored => write!(f, "Ignored"),
        }
    }
}

/// Outcome of a name registration change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied,
    Deferred,
    Ignored,
}

/// A registry mutation postponed while locked
///
/// Operations on existing objects remember the slot generation they were
/// issued against, so a queued change never hits an object that later
/// reused the same id.
enum Change {
    Add(Box<dyn GameObject>),
    Remove { id: ObjectId, generation: u32 },
    RegisterName { id: ObjectId, generation: u32, name: String },
    UnregisterName { id: ObjectId, generation: u32, name: String },
}

enum Slot {
    Vacant,
    Occupied(Box<dyn GameObject>),
    /// Temporarily lent out; still indexed but not reachable through lookups
    CheckedOut,
}

struct Entry {
    slot: Slot,
    generation: u32,
    /// Every name this object is registered under, as given
    names: Vec<String>,
}

impl Entry {
    fn is_present(&self) -> bool {
        !matches!(self.slot, Slot::Vacant)
    }
}

/// Container for every object in a level
pub struct LevelData {
    registry_id: RegistryId,
    entries: Vec<Entry>,
    free_ids: Vec<ObjectId>,
    len: usize,
    /// One index per entry of `INDEXED_CAPABILITIES`
    capability_indices: [BTreeSet<ObjectId>; 4],
    names: HashMap<String, BTreeSet<ObjectId>>,
    types: HashMap<&'static str, BTreeSet<ObjectId>>,
    lock_count: u32,
    draining: bool,
    pending: VecDeque<Change>,
    /// Objects removed by deferred changes, waiting for their owner
    released: Vec<Box<dyn GameObject>>,
}

impl Default for LevelData {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelData {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            registry_id: RegistryId::next(),
            entries: Vec::new(),
            free_ids: Vec::new(),
            len: 0,
            capability_indices: Default::default(),
            names: HashMap::new(),
            types: HashMap::new(),
            lock_count: 0,
            draining: false,
            pending: VecDeque::new(),
            released: Vec::new(),
        }
    }

    pub fn registry_id(&self) -> RegistryId {
        self.registry_id
    }

    // --- Mutation ---

    /// Register an object
    ///
    /// Objects that already belong to a registry are handed back untouched.
    pub fn add(&mut self, object: Box<dyn GameObject>) -> AddOutcome {
        if object.core().is_registered() {
            log::debug!("Rejected add of already registered {:?}", object);
            return AddOutcome::Rejected(object);
        }
        if self.is_deferring() {
            self.pending.push_back(Change::Add(object));
            return AddOutcome::Deferred;
        }
        self.apply_add(object)
    }

    /// Remove an object by id
    pub fn remove(&mut self, id: ObjectId) -> RemoveOutcome {
        let Some(generation) = self.present_generation(id) else {
            return RemoveOutcome::Ignored;
        };
        if self.is_deferring() {
            self.pending.push_back(Change::Remove { id, generation });
            return RemoveOutcome::Deferred;
        }
        self.apply_remove(id)
    }

    /// Make an object findable under an additional name
    pub fn register_name(&mut self, id: ObjectId, name: &str) -> ChangeOutcome {
        if name.is_empty() {
            return ChangeOutcome::Ignored;
        }
        let Some(generation) = self.present_generation(id) else {
            return ChangeOutcome::Ignored;
        };
        if self.is_deferring() {
            self.pending.push_back(Change::RegisterName {
                id,
                generation,
                name: name.to_string(),
            });
            return ChangeOutcome::Deferred;
        }
        self.apply_register_name(id, name)
    }

    /// Stop an object being findable under `name`
    pub fn unregister_name(&mut self, id: ObjectId, name: &str) -> ChangeOutcome {
        if name.is_empty() {
            return ChangeOutcome::Ignored;
        }
        let Some(generation) = self.present_generation(id) else {
            return ChangeOutcome::Ignored;
        };
        if self.is_deferring() {
            self.pending.push_back(Change::UnregisterName {
                id,
                generation,
                name: name.to_string(),
            });
            return ChangeOutcome::Deferred;
        }
        self.apply_unregister_name(id, name)
    }

    /// Remove every object and reset id allocation
    ///
    /// Returns the removed objects. Ignored while locked.
    pub fn clear(&mut self) -> Vec<Box<dyn GameObject>> {
        if self.is_deferring() {
            log::warn!("Ignoring clear of a locked level registry");
            return Vec::new();
        }
        let ids: Vec<ObjectId> = self.ids().collect();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let RemoveOutcome::Removed(object) = self.remove(id) {
                removed.push(object);
            }
        }
        removed.append(&mut self.released);

        self.entries.clear();
        self.free_ids.clear();
        self.len = 0;
        for index in &mut self.capability_indices {
            index.clear();
        }
        self.names.clear();
        self.types.clear();
        self.pending.clear();
        removed
    }

    /// Hand over objects removed by deferred changes
    pub fn drain_released(&mut self) -> Vec<Box<dyn GameObject>> {
        std::mem::take(&mut self.released)
    }

    // --- Locking ---

    /// Start deferring mutations (reentrant)
    pub fn lock(&mut self) {
        self.lock_count += 1;
    }

    /// Release one lock level; the outermost release applies queued changes
    pub fn unlock(&mut self) {
        if self.lock_count == 0 {
            log::warn!("Unbalanced unlock of level registry");
            return;
        }
        self.lock_count -= 1;
        if self.lock_count == 0 {
            self.drain_pending();
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }

    #[inline]
    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    /// Number of queued changes
    pub fn pending_changes(&self) -> usize {
        self.pending.len()
    }

    /// Lend an object out of the registry while running `f`
    ///
    /// The registry stays locked for the duration, so `f` may freely queue
    /// changes through `data`, including removing the lent object. While lent
    /// the object keeps its id and index entries but `get` does not see it.
    pub fn with_checked_out<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut dyn GameObject, &mut LevelData) -> R,
    ) -> Option<R> {
        let mut object = self.check_out(id)?;
        self.lock();
        let result = f(object.as_mut(), self);
        self.check_in(id, object);
        self.unlock();
        Some(result)
    }

    // --- Lookup ---

    /// Number of registered objects
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `id` is registered (including while checked out)
    pub fn contains(&self, id: ObjectId) -> bool {
        self.present_generation(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&dyn GameObject> {
        match &self.entries.get(id.index())?.slot {
            Slot::Occupied(object) => Some(object.as_ref()),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut dyn GameObject> {
        match &mut self.entries.get_mut(id.index())?.slot {
            Slot::Occupied(object) => Some(object.as_mut()),
            _ => None,
        }
    }

    /// All registered ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_present())
            .filter_map(|(index, _)| ObjectId::new(index as u32 + 1))
    }

    /// All reachable objects in ascending id order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &dyn GameObject)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match &entry.slot {
                Slot::Occupied(object) => {
                    ObjectId::new(index as u32 + 1).map(|id| (id, object.as_ref()))
                }
                _ => None,
            })
    }

    /// Ids carrying a single capability flag, in ascending order
    pub fn ids_with(&self, capability: Capabilities) -> impl Iterator<Item = ObjectId> + '_ {
        capability_slot(capability)
            .map(|slot| &self.capability_indices[slot])
            .into_iter()
            .flatten()
            .copied()
    }

    /// Reachable objects carrying a single capability flag
    pub fn objects_with(
        &self,
        capability: Capabilities,
    ) -> impl Iterator<Item = (ObjectId, &dyn GameObject)> + '_ {
        self.ids_with(capability)
            .filter_map(move |id| self.get(id).map(|object| (id, object)))
    }

    pub fn renderable_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids_with(Capabilities::RENDERABLE)
    }

    pub fn updateable_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids_with(Capabilities::UPDATEABLE)
    }

    pub fn collideable_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids_with(Capabilities::COLLIDEABLE)
    }

    pub fn overlapable_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids_with(Capabilities::OVERLAPABLE)
    }

    /// Ids registered under `name` (case-insensitive)
    pub fn objects_named(&self, name: &str) -> impl Iterator<Item = ObjectId> + '_ {
        self.names.get(&name_key(name)).into_iter().flatten().copied()
    }

    /// Lowest id registered under `name`
    pub fn first_named(&self, name: &str) -> Option<ObjectId> {
        self.objects_named(name).next()
    }

    /// Names an object is registered under
    pub fn names_of(&self, id: ObjectId) -> &[String] {
        match self.entries.get(id.index()) {
            Some(entry) if entry.is_present() => &entry.names,
            _ => &[],
        }
    }

    /// Ids whose exact runtime type is `type_name`
    pub fn objects_of_type(&self, type_name: &str) -> impl Iterator<Item = ObjectId> + '_ {
        self.types.get(type_name).into_iter().flatten().copied()
    }

    /// Reachable objects of a concrete kind
    pub fn objects_of<T: GameObject>(&self) -> impl Iterator<Item = (ObjectId, &T)> + '_ {
        self.objects()
            .filter_map(|(id, object)| object.downcast_ref::<T>().map(|typed| (id, typed)))
    }

    // --- Internals ---

    fn is_deferring(&self) -> bool {
        self.lock_count > 0 || self.draining
    }

    fn present_generation(&self, id: ObjectId) -> Option<u32> {
        self.entries
            .get(id.index())
            .filter(|entry| entry.is_present())
            .map(|entry| entry.generation)
    }

    fn generation_matches(&self, id: ObjectId, generation: u32) -> bool {
        self.present_generation(id) == Some(generation)
    }

    fn allocate_id(&mut self) -> Option<ObjectId> {
        if let Some(id) = self.free_ids.pop() {
            return Some(id);
        }
        let id = ObjectId::new(u32::try_from(self.entries.len() + 1).ok()?)?;
        self.entries.push(Entry {
            slot: Slot::Vacant,
            generation: 0,
            names: Vec::new(),
        });
        Some(id)
    }

    fn drain_pending(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        let mut applied = 0usize;
        while self.lock_count == 0 {
            let Some(change) = self.pending.pop_front() else {
                break;
            };
            self.apply_change(change);
            applied += 1;
        }
        self.draining = false;
        if applied > 0 {
            log::trace!("Applied {} deferred level changes", applied);
        }
    }

    fn apply_change(&mut self, change: Change) {
        match change {
            Change::Add(object) => {
                if let AddOutcome::Rejected(object) = self.apply_add(object) {
                    self.released.push(object);
                }
            }
            Change::Remove { id, generation } => {
                if self.generation_matches(id, generation) {
                    if let RemoveOutcome::Removed(object) = self.apply_remove(id) {
                        self.released.push(object);
                    }
                }
            }
            Change::RegisterName { id, generation, name } => {
                if self.generation_matches(id, generation) {
                    self.apply_register_name(id, &name);
                }
            }
            Change::UnregisterName { id, generation, name } => {
                if self.generation_matches(id, generation) {
                    self.apply_unregister_name(id, &name);
                }
            }
        }
    }

    fn apply_add(&mut self, mut object: Box<dyn GameObject>) -> AddOutcome {
        if object.core().is_registered() {
            return AddOutcome::Rejected(object);
        }
        let Some(id) = self.allocate_id() else {
            log::warn!("Level registry is out of ids, rejecting {:?}", object);
            return AddOutcome::Rejected(object);
        };

        object.core_mut().attach(id, self.registry_id);
        let capabilities = object.core().capabilities();
        let type_name = object.type_name();
        let name = object.core().name().to_string();

        self.entries[id.index()].slot = Slot::Occupied(object);
        for (slot, capability) in INDEXED_CAPABILITIES.iter().enumerate() {
            if capabilities.contains(*capability) {
                self.capability_indices[slot].insert(id);
            }
        }
        self.types.entry(type_name).or_default().insert(id);
        self.len += 1;

        self.apply_register_name(id, &name);
        AddOutcome::Added(id)
    }

    fn apply_remove(&mut self, id: ObjectId) -> RemoveOutcome {
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return RemoveOutcome::Ignored;
        };
        let mut object = match std::mem::replace(&mut entry.slot, Slot::CheckedOut) {
            Slot::Occupied(object) => object,
            other => {
                // Vacant, or lent out / already being deleted
                entry.slot = other;
                return RemoveOutcome::Ignored;
            }
        };

        object.on_delete(self);

        let entry = &mut self.entries[id.index()];
        let names = std::mem::take(&mut entry.names);
        entry.slot = Slot::Vacant;
        entry.generation = entry.generation.wrapping_add(1);

        for name in &names {
            self.unindex_name(id, name);
        }
        let type_name = object.type_name();
        if let Some(ids) = self.types.get_mut(type_name) {
            ids.remove(&id);
            if ids.is_empty() {
                self.types.remove(type_name);
            }
        }
        for index in &mut self.capability_indices {
            index.remove(&id);
        }
        self.free_ids.push(id);
        self.len -= 1;

        object.core_mut().detach();
        RemoveOutcome::Removed(object)
    }

    fn apply_register_name(&mut self, id: ObjectId, name: &str) -> ChangeOutcome {
        if name.is_empty() {
            return ChangeOutcome::Ignored;
        }
        let Some(entry) = self.entries.get_mut(id.index()).filter(|e| e.is_present()) else {
            return ChangeOutcome::Ignored;
        };
        let key = name_key(name);
        if !entry.names.iter().any(|n| name_key(n) == key) {
            entry.names.push(name.to_string());
        }
        self.names.entry(key).or_default().insert(id);
        ChangeOutcome::Applied
    }

    fn apply_unregister_name(&mut self, id: ObjectId, name: &str) -> ChangeOutcome {
        let Some(entry) = self.entries.get_mut(id.index()).filter(|e| e.is_present()) else {
            return ChangeOutcome::Ignored;
        };
        let key = name_key(name);
        let before = entry.names.len();
        entry.names.retain(|n| name_key(n) != key);
        if entry.names.len() == before {
            return ChangeOutcome::Ignored;
        }
        self.unindex_name(id, name);
        ChangeOutcome::Applied
    }

    fn unindex_name(&mut self, id: ObjectId, name: &str) {
        let key = name_key(name);
        if let Some(ids) = self.names.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.names.remove(&key);
            }
        }
    }

    fn check_out(&mut self, id: ObjectId) -> Option<Box<dyn GameObject>> {
        let entry = self.entries.get_mut(id.index())?;
        match std::mem::replace(&mut entry.slot, Slot::CheckedOut) {
            Slot::Occupied(object) => Some(object),
            other => {
                entry.slot = other;
                None
            }
        }
    }

    fn check_in(&mut self, id: ObjectId, object: Box<dyn GameObject>) {
        if let Some(entry) = self.entries.get_mut(id.index()) {
            if matches!(entry.slot, Slot::CheckedOut) {
                entry.slot = Slot::Occupied(object);
                return;
            }
        }
        log::warn!("Lost slot for checked out object {}", id);
        self.released.push(object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectCore;

    struct Stub {
        core: ObjectCore,
        /// Objects to remove when this one is deleted
        cascade: Vec<ObjectId>,
        /// Name of an object to add when this one is deleted
        spawn_on_delete: Option<String>,
    }

    impl Stub {
        fn new(name: &str, capabilities: Capabilities) -> Box<Self> {
            Box::new(Self {
                core: ObjectCore::new(name, capabilities),
                cascade: Vec::new(),
                spawn_on_delete: None,
            })
        }
    }

    impl GameObject for Stub {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ObjectCore {
            &mut self.core
        }

        fn type_name(&self) -> &'static str {
            "Stub"
        }

        fn on_delete(&mut self, data: &mut LevelData) {
            for id in self.cascade.drain(..) {
                data.remove(id);
            }
            if let Some(name) = self.spawn_on_delete.take() {
                data.add(Stub::new(&name, Capabilities::empty()));
            }
        }
    }

    struct Other {
        core: ObjectCore,
    }

    impl GameObject for Other {
        fn core(&self) -> &ObjectCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ObjectCore {
            &mut self.core
        }

        fn type_name(&self) -> &'static str {
            "Other"
        }
    }

    fn id(raw: u32) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn added(outcome: AddOutcome) -> ObjectId {
        outcome.id().expect("object should be added immediately")
    }

    /// Every index entry matches the object's flags and vice versa
    fn assert_indices_consistent(data: &LevelData) {
        for capability in INDEXED_CAPABILITIES {
            for id in data.ids_with(capability) {
                assert!(data.contains(id), "{} indexed but not registered", id);
            }
        }
        for (id, object) in data.objects() {
            for capability in INDEXED_CAPABILITIES {
                let indexed = data.ids_with(capability).any(|i| i == id);
                assert_eq!(
                    indexed,
                    object.capabilities().contains(capability),
                    "{} index mismatch for {:?}",
                    id,
                    capability
                );
            }
            assert!(data.objects_of_type(object.type_name()).any(|i| i == id));
        }
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::RENDERABLE)));
        let b = added(data.add(Stub::new("b", Capabilities::UPDATEABLE)));
        let c = added(data.add(Stub::new("c", Capabilities::COLLIDEABLE)));

        assert_eq!((a.get(), b.get(), c.get()), (1, 2, 3));
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(b).unwrap().name(), "b");
        assert_eq!(data.get(b).unwrap().id(), Some(b));
        assert_eq!(data.get(b).unwrap().core().owner(), Some(data.registry_id()));
        assert_indices_consistent(&data);
    }

    #[test]
    fn test_add_rejects_registered_object() {
        let mut first = LevelData::new();
        let mut second = LevelData::new();
        let mut stub = Stub::new("p", Capabilities::empty());
        stub.core.attach(id(9), first.registry_id());

        match second.add(stub) {
            AddOutcome::Rejected(object) => assert_eq!(object.id(), Some(id(9))),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(second.is_empty());

        // Rejected even while locked, without queueing
        let mut stub = Stub::new("p", Capabilities::empty());
        stub.core.attach(id(1), first.registry_id());
        first.lock();
        assert!(matches!(first.add(stub), AddOutcome::Rejected(_)));
        assert_eq!(first.pending_changes(), 0);
        first.unlock();
    }

    #[test]
    fn test_remove_detaches_and_hands_back() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::all())));

        let object = data.remove(a).into_object().expect("removed");
        assert_eq!(object.id(), None);
        assert_eq!(object.core().owner(), None);
        assert!(data.is_empty());
        assert!(data.get(a).is_none());
        assert_eq!(data.collideable_ids().count(), 0);
        assert_eq!(data.objects_named("a").count(), 0);
        assert_eq!(data.objects_of_type("Stub").count(), 0);

        // A detached object can be added again
        assert!(data.add(object).is_added());
    }

    #[test]
    fn test_remove_unknown_is_ignored() {
        let mut data = LevelData::new();
        assert!(matches!(data.remove(id(4)), RemoveOutcome::Ignored));
        let a = added(data.add(Stub::new("a", Capabilities::empty())));
        data.remove(a);
        assert!(matches!(data.remove(a), RemoveOutcome::Ignored));
    }

    #[test]
    fn test_id_reuse() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::empty())));
        data.remove(a);
        let b = added(data.add(Stub::new("b", Capabilities::empty())));
        assert_eq!(a, b);
    }

    #[test]
    fn test_end_to_end_ids_and_indices() {
        let mut data = LevelData::new();
        let one = added(data.add(Stub::new("one", Capabilities::COLLIDEABLE)));
        let two = added(data.add(Stub::new("two", Capabilities::RENDERABLE)));
        let three = added(data.add(Stub::new("three", Capabilities::COLLIDEABLE)));
        assert_eq!((one.get(), two.get(), three.get()), (1, 2, 3));

        data.remove(two);
        let four = added(data.add(Stub::new("four", Capabilities::RENDERABLE)));
        assert_eq!(four.get(), 2);
        assert_eq!(data.len(), 3);

        let collideable: Vec<ObjectId> = data.collideable_ids().collect();
        assert_eq!(collideable, vec![one, three]);
        assert_indices_consistent(&data);
    }

    #[test]
    fn test_lock_defers_until_unlock() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::UPDATEABLE)));

        data.lock();
        assert!(data.add(Stub::new("b", Capabilities::UPDATEABLE)).is_deferred());
        assert!(data.add(Stub::new("c", Capabilities::RENDERABLE)).is_deferred());
        assert!(data.remove(a).is_deferred());
        assert_eq!(data.register_name(a, "alias"), ChangeOutcome::Deferred);

        assert_eq!(data.len(), 1);
        assert!(data.get(a).is_some());
        assert_eq!(data.pending_changes(), 4);
        assert_indices_consistent(&data);

        data.unlock();
        assert_eq!(data.pending_changes(), 0);
        assert_eq!(data.len(), 2);
        // b took id 2, c took id 3, then a was removed
        assert_eq!(data.get(id(2)).unwrap().name(), "b");
        assert_eq!(data.get(id(3)).unwrap().name(), "c");
        assert!(data.get(a).is_none());
        // The alias targeted a generation that no longer exists
        assert_eq!(data.objects_named("alias").count(), 0);
        assert_indices_consistent(&data);

        let released = data.drain_released();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].name(), "a");
        assert_eq!(released[0].id(), None);
    }

    #[test]
    fn test_nested_locks_drain_on_outermost_unlock() {
        let mut data = LevelData::new();
        data.lock();
        data.lock();
        data.add(Stub::new("a", Capabilities::empty()));
        data.unlock();
        assert!(data.is_locked());
        assert!(data.is_empty());
        data.unlock();
        assert!(!data.is_locked());
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn test_unbalanced_unlock_is_ignored() {
        let mut data = LevelData::new();
        data.unlock();
        assert_eq!(data.lock_count(), 0);
        assert!(data.add(Stub::new("a", Capabilities::empty())).is_added());
    }

    #[test]
    fn test_queued_remove_does_not_hit_reused_id() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::empty())));

        data.lock();
        data.remove(a);
        data.add(Stub::new("b", Capabilities::empty()));
        data.remove(a);
        data.unlock();

        // b reused a's id and survived the second queued removal
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(a).unwrap().name(), "b");
    }

    #[test]
    fn test_names_are_case_insensitive_and_shared() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("Door", Capabilities::empty())));
        let b = added(data.add(Stub::new("DOOR", Capabilities::empty())));
        let c = added(data.add(Stub::new("", Capabilities::empty())));

        let doors: Vec<ObjectId> = data.objects_named("door").collect();
        assert_eq!(doors, vec![a, b]);
        assert_eq!(data.first_named("dOoR"), Some(a));
        assert!(data.names_of(c).is_empty());

        assert_eq!(data.register_name(c, "Exit"), ChangeOutcome::Applied);
        assert_eq!(data.register_name(c, ""), ChangeOutcome::Ignored);
        assert_eq!(data.first_named("exit"), Some(c));

        assert_eq!(data.unregister_name(a, "door"), ChangeOutcome::Applied);
        assert_eq!(data.objects_named("door").collect::<Vec<_>>(), vec![b]);
        assert_eq!(data.unregister_name(a, "door"), ChangeOutcome::Ignored);

        data.unregister_name(b, "Door");
        assert!(data.first_named("door").is_none());
        assert!(!data.names.contains_key("door"), "empty name sets are pruned");
    }

    #[test]
    fn test_remove_purges_all_names() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("crate", Capabilities::empty())));
        data.register_name(a, "loot");
        assert_eq!(data.names_of(a).len(), 2);

        data.remove(a);
        assert!(data.first_named("crate").is_none());
        assert!(data.first_named("loot").is_none());
    }

    #[test]
    fn test_name_ops_on_unknown_ids_are_ignored() {
        let mut data = LevelData::new();
        assert_eq!(data.register_name(id(3), "x"), ChangeOutcome::Ignored);
        assert_eq!(data.unregister_name(id(3), "x"), ChangeOutcome::Ignored);
    }

    #[test]
    fn test_type_index() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::empty())));
        let b = added(data.add(Box::new(Other {
            core: ObjectCore::new("b", Capabilities::empty()),
        })));

        assert_eq!(data.objects_of_type("Stub").collect::<Vec<_>>(), vec![a]);
        assert_eq!(data.objects_of_type("Other").collect::<Vec<_>>(), vec![b]);
        assert_eq!(data.objects_of::<Other>().count(), 1);

        data.remove(b);
        assert_eq!(data.objects_of_type("Other").count(), 0);
        assert!(!data.types.contains_key("Other"));
    }

    #[test]
    fn test_changes_during_drain_apply_in_same_unlock() {
        let mut data = LevelData::new();
        let victim = added(data.add(Stub::new("victim", Capabilities::empty())));
        let mut leader = Stub::new("leader", Capabilities::empty());
        leader.cascade.push(victim);
        leader.spawn_on_delete = Some("heir".to_string());
        let leader = added(data.add(leader));

        data.lock();
        data.remove(leader);
        data.unlock();

        assert_eq!(data.pending_changes(), 0);
        assert!(!data.contains(leader));
        assert!(data.first_named("victim").is_none());
        // Victim was released after leader, so its id is the first reused
        assert_eq!(data.first_named("heir"), Some(victim));
        assert_eq!(data.len(), 1);
        assert_eq!(data.drain_released().len(), 2);
        assert_indices_consistent(&data);
    }

    #[test]
    fn test_cascade_when_unlocked_is_immediate() {
        let mut data = LevelData::new();
        let victim = added(data.add(Stub::new("victim", Capabilities::empty())));
        let mut leader = Stub::new("leader", Capabilities::empty());
        leader.cascade.push(victim);
        let leader = added(data.add(leader));

        assert!(data.remove(leader).is_removed());
        assert!(data.is_empty());
    }

    #[test]
    fn test_checked_out_object_is_hidden() {
        let mut data = LevelData::new();
        let a = added(data.add(Stub::new("a", Capabilities::UPDATEABLE)));

        let seen = data.with_checked_out(a, |object, data| {
            assert_eq!(object.name(), "a");
            assert!(data.is_locked());
            assert!(data.get(a).is_none());
            assert!(data.contains(a));
            assert!(data.remove(a).is_deferred());
            7
        });

        assert_eq!(seen, Some(7));
        assert!(!data.is_locked());
        assert!(!data.contains(a), "queued self-removal applied on check in");
        assert_eq!(data.drain_released().len(), 1);
        assert!(data.with_checked_out(a, |_, _| ()).is_none());
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut data = LevelData::new();
        for name in ["a", "b", "c"] {
            data.add(Stub::new(name, Capabilities::all()));
        }
        let removed = data.clear();
        assert_eq!(removed.len(), 3);
        assert!(removed.iter().all(|o| o.id().is_none()));
        assert!(data.is_empty());
        assert_eq!(data.add(Stub::new("d", Capabilities::empty())).id(), Some(id(1)));
    }

    #[test]
    fn test_clear_ignored_while_locked() {
        let mut data = LevelData::new();
        data.add(Stub::new("a", Capabilities::empty()));
        data.lock();
        assert!(data.clear().is_empty());
        assert_eq!(data.len(), 1);
        data.unlock();
    }
}
