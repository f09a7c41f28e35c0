//! The [`World`] is the entity registry: it owns the entity allocator, the
//! component registry and one storage per registered component type.
//!
//! Reads (`get_component`, `query`, `entities_with`) take `&self` and are safe
//! to run from many threads at once. Every mutation takes `&mut self`; during a
//! tick those only happen while a
//! [`CommandBuffer`](crate::command::CommandBuffer) is being applied.

use std::fmt;

use serde_json::Value;

use crate::component::{Component, ComponentRegistry, ComponentTypeId, Template};
use crate::entity::{EntityAllocator, EntityId};
use crate::storage::{ErasedStorage, SparseSet};
use crate::EcsError;

/// The entity registry.
pub struct World {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    /// Indexed by `ComponentTypeId`.
    storages: Vec<Box<dyn ErasedStorage>>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entity_count())
            .field("component_types", &self.registry.len())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world. The built-in [`Template`] marker is registered.
    pub fn new() -> Self {
        let mut world = Self {
            allocator: EntityAllocator::new(),
            registry: ComponentRegistry::new(),
            storages: Vec::new(),
        };
        world.register_component::<Template>();
        world
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register `T` so it can be stored and addressed by name.
    pub fn register_component<T: Component>(&mut self) -> ComponentTypeId {
        let id = self.registry.register::<T>();
        if id.index() == self.storages.len() {
            self.storages.push(Box::new(SparseSet::<T>::new()));
        }
        id
    }

    // -- typed storage access -----------------------------------------------

    fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        let id = self.registry.lookup::<T>()?;
        self.storages[id.index()].as_any().downcast_ref()
    }

    fn storage_mut<T: Component>(&mut self) -> Result<&mut SparseSet<T>, EcsError> {
        let id = self
            .registry
            .lookup::<T>()
            .ok_or(EcsError::UnregisteredType {
                type_name: std::any::type_name::<T>(),
            })?;
        self.storages[id.index()]
            .as_any_mut()
            .downcast_mut()
            .ok_or(EcsError::UnregisteredType {
                type_name: std::any::type_name::<T>(),
            })
    }

    fn storage_by_name(&self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup_by_name(name)
            .ok_or_else(|| EcsError::UnknownComponent {
                name: name.to_owned(),
                registered: self.registry.registered_names().join(", "),
            })
    }

    fn ensure_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity { entity })
        }
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Spawn an entity with no components.
    pub fn spawn(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Spawn an entity with a single component.
    ///
    /// # Panics
    ///
    /// Panics if `T` has not been registered.
    pub fn spawn_with<T: Component>(&mut self, component: T) -> EntityId {
        let entity = self.spawn();
        if let Err(e) = self.insert_component(entity, component) {
            panic!("spawn_with failed: {e}");
        }
        entity
    }

    /// Destroy an entity and drop all of its components.
    pub fn despawn(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        for storage in &mut self.storages {
            storage.remove_entity(entity);
        }
        self.allocator.deallocate(entity);
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Create a new entity carrying a copy of every component on `template`,
    /// except the [`Template`] marker itself.
    pub fn instantiate(&mut self, template: EntityId) -> Result<EntityId, EcsError> {
        self.ensure_alive(template)?;
        let instance = self.allocator.allocate();
        for storage in &mut self.storages {
            storage.duplicate(template, instance);
        }
        if let Ok(markers) = self.storage_mut::<Template>() {
            markers.remove(instance);
        }
        Ok(instance)
    }

    // -- typed component access ---------------------------------------------

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.storage_mut::<T>().ok()?.get_mut(entity)
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.storage::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Insert or overwrite a component.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        self.storage_mut::<T>()?.insert(entity, value);
        Ok(())
    }

    /// Remove a component, returning it if it was present.
    pub fn remove_component<T: Component>(
        &mut self,
        entity: EntityId,
    ) -> Result<Option<T>, EcsError> {
        self.ensure_alive(entity)?;
        Ok(self.storage_mut::<T>()?.remove(entity))
    }

    /// Iterate every entity carrying `T`, in storage order.
    pub fn query<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.storage::<T>().into_iter().flat_map(|s| s.iter())
    }

    /// Snapshot of the entities carrying `T`, in storage order.
    ///
    /// Owned, so callers can filter it and hand slices to worker threads.
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        self.storage::<T>()
            .map(|s| s.entities().to_vec())
            .unwrap_or_default()
    }

    // -- name-based access (used by the command buffer) ---------------------

    /// Insert or overwrite the component registered as `name`, decoding it
    /// from JSON.
    pub fn set_component_by_name(
        &mut self,
        entity: EntityId,
        name: &str,
        value: &Value,
    ) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        let id = self.storage_by_name(name)?;
        self.storages[id.index()]
            .insert_json(entity, value)
            .map_err(|e| EcsError::ComponentDeserializationError {
                component: name.to_owned(),
                details: e.to_string(),
            })
    }

    pub fn has_component_by_name(&self, entity: EntityId, name: &str) -> Result<bool, EcsError> {
        self.ensure_alive(entity)?;
        let id = self.storage_by_name(name)?;
        Ok(self.storages[id.index()].contains(entity))
    }

    /// Remove the component registered as `name`. Removing an absent
    /// component is not an error.
    pub fn remove_component_by_name(&mut self, entity: EntityId, name: &str) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        let id = self.storage_by_name(name)?;
        self.storages[id.index()].remove_entity(entity);
        Ok(())
    }

    // -- state digest -------------------------------------------------------

    /// blake3 digest of every live entity and its components.
    ///
    /// Entities are hashed in id order and components in registration order,
    /// so two worlds built by the same mutations hash equal regardless of
    /// which thread recorded them.
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        let mut entities: Vec<EntityId> = self.allocator.iter_alive().collect();
        entities.sort_unstable();
        for entity in entities {
            hasher.update(&entity.to_raw().to_le_bytes());
            for (index, storage) in self.storages.iter().enumerate() {
                let Some(Ok(value)) = storage.to_json(entity) else {
                    continue;
                };
                hasher.update(&(index as u32).to_le_bytes());
                hasher.update(value.to_string().as_bytes());
            }
        }
        hasher.finalize()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
