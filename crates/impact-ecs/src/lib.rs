//! Impact ECS -- entity registry and deferred mutation buffer.
//!
//! Entities are generational handles; each component type lives in its own
//! sparse set. All reads take `&World` and can be shared across worker
//! threads. Writes made during a simulation pass are recorded into a
//! [`CommandBuffer`](command::CommandBuffer) and applied in recording order
//! once the pass has finished reading.
//!
//! # Quick Start
//!
//! ```
//! use impact_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Health(f32);
//!
//! impl Component for Health {
//!     const NAME: &'static str = "health";
//! }
//!
//! let mut world = World::new();
//! world.register_component::<Health>();
//! let entity = world.spawn_with(Health(30.0));
//!
//! let mut cmds = CommandBuffer::new();
//! cmds.set(
//!     entity,
//!     &Health(20.0),
//!     SystemId::ENGINE_INTERNAL,
//!     CausalReason::GameRule("damage_applied".to_owned()),
//! );
//! cmds.apply(&mut world);
//!
//! assert_eq!(world.get_component::<Health>(entity), Some(&Health(20.0)));
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod entity;
pub mod storage;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by registry and buffer operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component name was referenced that has not been registered.
    #[error("component '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// A Rust type was used as a component without being registered.
    #[error("component type {type_name} not registered")]
    UnregisteredType { type_name: &'static str },

    /// A set targeted a component the entity does not carry.
    #[error("entity {entity:?} has no '{component}' component to set")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// Decoding a component value failed.
    #[error("failed to deserialize component '{component}': {details}")]
    ComponentDeserializationError { component: String, details: String },

    /// A command targeted an instantiation that did not produce an entity.
    #[error("pending entity #{index} was never instantiated")]
    UnresolvedPendingEntity { index: u32 },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{
        ApplyReport, CausalReason, Command, CommandBuffer, CommandKind, CommandTarget,
        PendingEntity, SystemId,
    };
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId, Template};
    pub use crate::entity::EntityId;
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
