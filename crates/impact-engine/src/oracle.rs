//! Ray-cast query interface consumed by the collision pass.
//!
//! The pipeline never talks to a physics engine directly: it is handed a
//! [`RayCastOracle`] and asks it one question per projectile. The rapier-backed
//! implementation lives in [`crate::physics`]; tests plug in scripted oracles.

use glam::Vec3;
use impact_ecs::entity::EntityId;
use impact_ecs::world::World;
use serde::{Deserialize, Serialize};

/// Layer bitmasks applied to a cast.
///
/// A collider is a candidate when its membership intersects `collides_with`
/// and its own filter intersects `belongs_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub belongs_to: u32,
    pub collides_with: u32,
}

impl CollisionFilter {
    /// Matches everything.
    pub const ALL: CollisionFilter = CollisionFilter {
        belongs_to: u32::MAX,
        collides_with: u32::MAX,
    };

    /// Whether a collider with the given groups passes this filter.
    pub fn accepts(&self, other: CollisionFilter) -> bool {
        self.collides_with & other.belongs_to != 0 && other.collides_with & self.belongs_to != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Nearest hit of a cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// World-space hit point.
    pub position: Vec3,
    /// Entity owning the struck body; `None` for colliders without a body.
    pub entity: Option<EntityId>,
}

/// Answers ray casts against the current scene.
///
/// `cast` is called concurrently from pass workers, hence `Send + Sync`.
pub trait RayCastOracle: Send + Sync {
    /// Cast the segment `origin .. origin + direction` and return the nearest
    /// hit accepted by `filter`.
    fn cast(&self, origin: Vec3, direction: Vec3, filter: CollisionFilter) -> Option<RayHit>;

    /// Cast on behalf of `caster`. The caster's own body is never reported.
    ///
    /// Oracles that do not mirror entity bodies can rely on the default.
    fn cast_from(
        &self,
        _caster: EntityId,
        origin: Vec3,
        direction: Vec3,
        filter: CollisionFilter,
    ) -> Option<RayHit> {
        self.cast(origin, direction, filter)
    }

    /// Bring the oracle up to date with `world` before a tick reads it.
    fn sync(&mut self, _world: &World) {}
}

impl<T: RayCastOracle + ?Sized> RayCastOracle for Box<T> {
    fn cast(&self, origin: Vec3, direction: Vec3, filter: CollisionFilter) -> Option<RayHit> {
        (**self).cast(origin, direction, filter)
    }

    fn cast_from(
        &self,
        caster: EntityId,
        origin: Vec3,
        direction: Vec3,
        filter: CollisionFilter,
    ) -> Option<RayHit> {
        (**self).cast_from(caster, origin, direction, filter)
    }

    fn sync(&mut self, world: &World) {
        (**self).sync(world);
    }
}
