//! Impact Engine -- projectile damage pipeline on top of [`impact_ecs`].
//!
//! Each tick runs three passes back to back:
//!
//! 1. **collision** casts a ray in front of every live projectile and records
//!    damage, effect placement and projectile destruction;
//! 2. **health** instantiates a death effect for every entity whose health
//!    reached zero and marks it [`Deactivated`](components::Deactivated);
//! 3. **cascade** deactivates the children of deactivated parents.
//!
//! Passes never mutate the world. They record into a
//! [`CommandBuffer`](impact_ecs::command::CommandBuffer) which the
//! [`TickLoop`](tick::TickLoop) applies after each pass. Within a pass, large
//! populations are processed by rayon workers.
//!
//! # Quick Start
//!
//! ```
//! use impact_engine::prelude::*;
//!
//! let mut world = World::new();
//! register_components(&mut world);
//!
//! let target = world.spawn_with(Transform::from_position(Vec3::new(0.0, 0.0, 0.4)));
//! world.insert_component(target, Health(10.0)).unwrap();
//! world.insert_component(target, PhysicsBody::ball(0.2)).unwrap();
//!
//! let bullet = world.spawn_with(Transform::looking_to(Vec3::ZERO, Vec3::Z));
//! world.insert_component(bullet, Projectile::default()).unwrap();
//!
//! let mut tick_loop =
//!     TickLoop::damage_pipeline(world, PhysicsWorld::new(), TickConfig::default()).unwrap();
//! tick_loop.tick();
//!
//! assert!(!tick_loop.world().is_alive(bullet));
//! assert_eq!(tick_loop.world().get_component::<Health>(target), Some(&Health(0.0)));
//! ```

#![deny(unsafe_code)]

use std::path::PathBuf;

pub mod components;
pub mod config;
pub mod oracle;
pub mod passes;
pub mod physics;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use impact_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while setting up the engine.
///
/// Running a tick never fails: per-entity problems are logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to read configuration file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Ecs(#[from] impact_ecs::EcsError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use impact_ecs::prelude::*;

    pub use glam::{Quat, Vec3};

    pub use crate::components::{
        register_components, Deactivated, EffectSpawner, Health, Parent, Projectile, Transform,
    };
    pub use crate::config::{PipelineConfig, TickConfig};
    pub use crate::oracle::{CollisionFilter, RayCastOracle, RayHit};
    pub use crate::passes::collision::CastOutcome;
    pub use crate::passes::PassContext;
    pub use crate::physics::{ColliderShape, PhysicsBody, PhysicsWorld};
    pub use crate::tick::{PassDiagnostics, PassFn, TickDiagnostics, TickLoop};
    pub use crate::EngineError;
}
