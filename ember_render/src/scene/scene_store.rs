/// SceneStore - minimal entity/component store consumed by the renderer
///
/// Entities are slot map keys; each component type gets its own
/// `FxHashMap<Entity, T>`. Construction observers are queued: attaching a
/// component pushes the entity into every observer of that type, and the
/// observer drains the queue when it is ready. Nothing runs inside
/// `attach()`, so bulk entity creation never re-enters the renderer.

use std::any::{Any, TypeId};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use crate::error::Result;
use crate::{engine_bail, engine_trace};

// ===== KEYS =====

new_key_type! {
    /// Stable entity handle.
    ///
    /// A key becomes invalid only when its own entity is destroyed.
    pub struct Entity;

    /// Handle returned by `observe_constructed`
    pub struct ObserverId;
}

// ===== TYPED STORAGE =====

trait ComponentStorage: Any {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Storage<T: 'static>(FxHashMap<Entity, T>);

impl<T: 'static> ComponentStorage for Storage<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.0.remove(&entity).is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct Observer {
    component: TypeId,
    queue: Vec<Entity>,
}

// ===== SCENE STORE =====

/// Entity/component store
pub struct SceneStore {
    entities: SlotMap<Entity, ()>,
    storages: FxHashMap<TypeId, Box<dyn ComponentStorage>>,
    observers: SlotMap<ObserverId, Observer>,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneStore {
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            storages: FxHashMap::default(),
            observers: SlotMap::with_key(),
        }
    }

    // ===== ENTITIES =====

    pub fn create(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and drop all its components
    ///
    /// Returns false if the entity was already gone.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
        for observer in self.observers.values_mut() {
            observer.queue.retain(|e| *e != entity);
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    // ===== COMPONENTS =====

    /// Attach (or replace) a component
    ///
    /// Observers of `T` are notified only when the component is new.
    pub fn attach<T: 'static>(&mut self, entity: Entity, component: T) -> Result<()> {
        if !self.is_alive(entity) {
            engine_bail!(InvalidResource, "ember::scene",
                "attach::<{}>() on a destroyed entity", std::any::type_name::<T>());
        }

        let replaced = self.storage_mut::<T>().insert(entity, component).is_some();
        if !replaced {
            let type_id = TypeId::of::<T>();
            for observer in self.observers.values_mut().filter(|o| o.component == type_id) {
                observer.queue.push(entity);
            }
        }
        Ok(())
    }

    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(&entity)
    }

    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Storage<T>>()?
            .0
            .get_mut(&entity)
    }

    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    pub fn remove<T: 'static>(&mut self, entity: Entity) -> Option<T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Storage<T>>()?
            .0
            .remove(&entity)
    }

    /// Iterate over every entity holding a `T`
    pub fn iter<T: 'static>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.storage::<T>()
            .into_iter()
            .flat_map(|map| map.iter().map(|(entity, component)| (*entity, component)))
    }

    /// Entities holding a `T`, collected (for loops that mutate the store)
    pub fn entities_with<T: 'static>(&self) -> Vec<Entity> {
        self.iter::<T>().map(|(entity, _)| entity).collect()
    }

    pub fn count<T: 'static>(&self) -> usize {
        self.storage::<T>().map_or(0, |map| map.len())
    }

    // ===== OBSERVERS =====

    /// Start queueing entities that receive a new `T`
    pub fn observe_constructed<T: 'static>(&mut self) -> ObserverId {
        let id = self.observers.insert(Observer { component: TypeId::of::<T>(), queue: Vec::new() });
        engine_trace!("ember::scene", "Observer registered for {}", std::any::type_name::<T>());
        id
    }

    /// Take the queued entities of an observer, oldest first
    pub fn drain_constructed(&mut self, id: ObserverId) -> Vec<Entity> {
        match self.observers.get_mut(id) {
            Some(observer) => std::mem::take(&mut observer.queue),
            None => Vec::new(),
        }
    }

    /// Stop an observer and drop its queue
    ///
    /// Returns false if the observer was already removed.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ===== INTERNAL =====

    fn storage<T: 'static>(&self) -> Option<&FxHashMap<Entity, T>> {
        self.storages
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<Storage<T>>()
            .map(|s| &s.0)
    }

    fn storage_mut<T: 'static>(&mut self) -> &mut FxHashMap<Entity, T> {
        let storage = self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>(FxHashMap::default())));
        match storage.as_any_mut().downcast_mut::<Storage<T>>() {
            Some(storage) => &mut storage.0,
            None => unreachable!("component storage registered under a foreign TypeId"),
        }
    }
}

#[cfg(test)]
#[path = "scene_store_tests.rs"]
mod tests;
