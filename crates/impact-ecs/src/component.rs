//! Component trait and type registration.
//!
//! Components are plain serde-friendly values. Each type carries a stable
//! [`Component::NAME`]; the mutation buffer addresses components by that name
//! so recorded intents stay inspectable and serializable.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A typed data record that can be attached to an entity.
///
/// `Send + Sync` is required because passes read components from many worker
/// threads at once.
pub trait Component: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Registered name, unique per world.
    const NAME: &'static str;
}

/// Built-in marker for template (prefab) entities.
///
/// Template entities are the source of
/// [`World::instantiate`](crate::world::World::instantiate). The marker is not
/// copied onto the instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template;

impl Component for Template {
    const NAME: &'static str = "template";
}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Dense identifier assigned at registration; indexes the world's storages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub name: &'static str,
    pub type_id: TypeId,
    /// `std::any::type_name::<T>()`, for diagnostics only.
    pub type_name: &'static str,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Maps Rust types and registered names to [`ComponentTypeId`]s.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_name: HashMap<&'static str, ComponentTypeId>,
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `T::NAME`.
    ///
    /// Registering the same type twice returns the existing id.
    ///
    /// # Panics
    ///
    /// Panics if `T::NAME` is already bound to a different type.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return existing;
        }
        if let Some(other) = self.by_name.get(T::NAME) {
            panic!(
                "component name '{}' is already registered for {}",
                T::NAME,
                self.infos[other.index()].type_name
            );
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: T::NAME,
            type_id,
            type_name: std::any::type_name::<T>(),
        });
        self.by_type.insert(type_id, id);
        self.by_name.insert(T::NAME, id);
        id
    }

    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Resolve a registered name, as carried by buffered commands.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Registered names, sorted. Used in error messages.
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
