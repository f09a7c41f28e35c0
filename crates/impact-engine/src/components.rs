//! Component types read and written by the damage pipeline.
//!
//! All of them are plain serde records; the mutation buffer carries them by
//! their registered [`Component::NAME`].

use glam::{Quat, Vec3};
use impact_ecs::component::Component;
use impact_ecs::entity::EntityId;
use impact_ecs::world::World;
use serde::{Deserialize, Serialize};

use crate::physics::PhysicsBody;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// World-space pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// A pose at `position` whose forward axis points along `direction`.
    ///
    /// A zero `direction` keeps the identity rotation.
    pub fn looking_to(position: Vec3, direction: Vec3) -> Self {
        let rotation = direction
            .try_normalize()
            .map(|dir| Quat::from_rotation_arc(Vec3::Z, dir))
            .unwrap_or(Quat::IDENTITY);
        Self { position, rotation }
    }

    /// Unit forward axis (+Z rotated by `rotation`).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

impl Component for Transform {
    const NAME: &'static str = "transform";
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// Collision state of a projectile.
///
/// Once `exploded` is set the projectile never casts again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// The projectile has resolved its collision.
    pub exploded: bool,
    /// The last cast found something.
    pub hit: bool,
    /// Distance from the projectile to the last hit point.
    pub cast_distance: f32,
    /// Layers this projectile interacts with.
    pub interaction_layer: u32,
    /// Layers this projectile belongs to.
    pub belonging_layer: u32,
    /// Fired by the player. Not consulted when matching hits yet.
    pub owned_by_player: bool,
}

impl Component for Projectile {
    const NAME: &'static str = "projectile";
}

// ---------------------------------------------------------------------------
// Damage, effects, hierarchy
// ---------------------------------------------------------------------------

/// Hit points of a damageable entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health(pub f32);

impl Component for Health {
    const NAME: &'static str = "health";
}

/// Which effect template to instantiate when the carrier dies, and where.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSpawner {
    pub template: EntityId,
    pub position: Vec3,
}

impl Component for EffectSpawner {
    const NAME: &'static str = "effect_spawner";
}

/// Logically removed from the simulation but not destroyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deactivated;

impl Component for Deactivated {
    const NAME: &'static str = "deactivated";
}

/// Reference from a child to its parent. Never owns the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent(pub EntityId);

impl Component for Parent {
    const NAME: &'static str = "parent";
}

/// Register every pipeline component with `world`.
pub fn register_components(world: &mut World) {
    world.register_component::<Transform>();
    world.register_component::<Projectile>();
    world.register_component::<Health>();
    world.register_component::<EffectSpawner>();
    world.register_component::<Deactivated>();
    world.register_component::<Parent>();
    world.register_component::<PhysicsBody>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_forward_is_plus_z() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.forward(), Vec3::Z);
    }

    #[test]
    fn looking_to_points_forward_along_direction() {
        let t = Transform::looking_to(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        assert!(t.forward().abs_diff_eq(Vec3::X, 1e-5));

        let degenerate = Transform::looking_to(Vec3::ONE, Vec3::ZERO);
        assert_eq!(degenerate.rotation, Quat::IDENTITY);
    }

    #[test]
    fn registration_is_idempotent() {
        let mut world = World::new();
        register_components(&mut world);
        let count = world.registry().len();
        register_components(&mut world);
        assert_eq!(world.registry().len(), count);
    }
}
