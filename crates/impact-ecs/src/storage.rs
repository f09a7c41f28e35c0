//! Per-type component storage.
//!
//! Each registered component type gets one [`SparseSet`]: values are packed
//! densely next to their owning [`EntityId`], and a sparse array indexed by
//! entity slot points into the dense arrays. Removal swaps the last element
//! into the hole, so iteration order depends only on the sequence of
//! mutations and is identical across runs.
//!
//! The world holds storages behind the object-safe [`ErasedStorage`] trait so
//! that name-based operations coming out of the mutation buffer can reach a
//! typed storage without knowing its type.

use std::any::Any;

use serde_json::Value;

use crate::component::Component;
use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// SparseSet
// ---------------------------------------------------------------------------

/// Dense storage for one component type.
#[derive(Debug)]
pub struct SparseSet<T> {
    sparse: Vec<Option<u32>>,
    entities: Vec<EntityId>,
    values: Vec<T>,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            entities: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> SparseSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn dense_index(&self, entity: EntityId) -> Option<usize> {
        let dense = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.entities[dense] == entity).then_some(dense)
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        if let Some(dense) = self.dense_index(entity) {
            return Some(std::mem::replace(&mut self.values[dense], value));
        }
        let slot = entity.index() as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, None);
        }
        self.sparse[slot] = Some(self.entities.len() as u32);
        self.entities.push(entity);
        self.values.push(value);
        None
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let dense = self.dense_index(entity)?;
        self.sparse[entity.index() as usize] = None;
        self.entities.swap_remove(dense);
        let value = self.values.swap_remove(dense);
        if let Some(&moved) = self.entities.get(dense) {
            self.sparse[moved.index() as usize] = Some(dense as u32);
        }
        Some(value)
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.dense_index(entity).map(|dense| &self.values[dense])
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.dense_index(entity).map(|dense| &mut self.values[dense])
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.dense_index(entity).is_some()
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.entities.iter().copied().zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ErasedStorage
// ---------------------------------------------------------------------------

/// Type-erased view of a [`SparseSet`], used by name-based world operations.
pub(crate) trait ErasedStorage: Send + Sync {
    fn contains(&self, entity: EntityId) -> bool;
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    /// Copy the component of `from` onto `to`. No-op if `from` has none.
    fn duplicate(&mut self, from: EntityId, to: EntityId);
    fn insert_json(&mut self, entity: EntityId, value: &Value) -> Result<(), serde_json::Error>;
    fn to_json(&self, entity: EntityId) -> Option<Result<Value, serde_json::Error>>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStorage for SparseSet<T> {
    fn contains(&self, entity: EntityId) -> bool {
        SparseSet::contains(self, entity)
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn duplicate(&mut self, from: EntityId, to: EntityId) {
        if let Some(value) = self.get(from).cloned() {
            self.insert(to, value);
        }
    }

    fn insert_json(&mut self, entity: EntityId, value: &Value) -> Result<(), serde_json::Error> {
        let typed = T::deserialize(value)?;
        self.insert(entity, typed);
        Ok(())
    }

    fn to_json(&self, entity: EntityId) -> Option<Result<Value, serde_json::Error>> {
        self.get(entity).map(serde_json::to_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut set = SparseSet::new();
        let e = EntityId::new(3, 0);
        assert_eq!(set.insert(e, 1u32), None);
        assert_eq!(set.insert(e, 2u32), Some(1));
        assert_eq!(set.get(e), Some(&2));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_keeps_moved_entry_addressable() {
        let mut set = SparseSet::new();
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        let c = EntityId::new(2, 0);
        set.insert(a, 'a');
        set.insert(b, 'b');
        set.insert(c, 'c');

        assert_eq!(set.remove(a), Some('a'));
        assert_eq!(set.get(c), Some(&'c'));
        assert_eq!(set.get(b), Some(&'b'));
        assert_eq!(set.entities(), &[c, b]);
    }

    #[test]
    fn stale_generation_does_not_resolve() {
        let mut set = SparseSet::new();
        let old = EntityId::new(5, 0);
        set.insert(old, 10i32);
        let recycled = EntityId::new(5, 1);
        assert!(!set.contains(recycled));
        assert_eq!(set.remove(recycled), None);
        assert!(set.contains(old));
    }
}
