//! rapier3d-backed [`RayCastOracle`].
//!
//! The [`PhysicsWorld`] mirrors every active entity carrying a [`Transform`]
//! and a [`PhysicsBody`] as a fixed rapier body, and answers ray casts through
//! rapier's query pipeline. It does not step a simulation: movement belongs to
//! other systems, and the pipeline only needs to ask "what is in front of
//! this projectile".
//!
//! [`PhysicsWorld::sync_from_world`] runs at the start of each tick. It drops
//! bodies whose entity was destroyed, deactivated or stripped of its physics
//! components, registers new ones, and moves the rest to their current pose.
//!
//! Colliders added through [`PhysicsWorld::add_static_collider`] have no body
//! and therefore no owning entity. Casts that strike them report
//! `entity: None`.
//!
//! # Determinism
//!
//! rapier3d is compiled with `enhanced-determinism`, and bodies are synced in
//! entity-id order, so handle assignment does not depend on hash iteration.

use std::collections::{BTreeMap, HashMap};

use glam::{Quat, Vec3};
use impact_ecs::component::{Component, Template};
use impact_ecs::entity::EntityId;
use impact_ecs::world::World;
use rapier3d::na::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{Deactivated, Transform};
use crate::oracle::{CollisionFilter, RayCastOracle, RayHit};

/// Casts cover `origin .. origin + direction`.
const MAX_TOI: Real = 1.0;

// ---------------------------------------------------------------------------
// Physics component types (ECS-side)
// ---------------------------------------------------------------------------

/// Collider shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Ball { radius: f32 },
    Cuboid { half_extents: Vec3 },
}

impl ColliderShape {
    fn to_shared(self) -> SharedShape {
        match self {
            ColliderShape::Ball { radius } => SharedShape::ball(radius),
            ColliderShape::Cuboid { half_extents } => {
                SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
        }
    }
}

/// Attach to an entity (with a [`Transform`]) to make it hittable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    pub shape: ColliderShape,
    /// Layers the collider belongs to / collides with.
    pub groups: CollisionFilter,
}

impl PhysicsBody {
    pub fn ball(radius: f32) -> Self {
        Self {
            shape: ColliderShape::Ball { radius },
            groups: CollisionFilter::ALL,
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            shape: ColliderShape::Cuboid { half_extents },
            groups: CollisionFilter::ALL,
        }
    }

    pub fn with_groups(mut self, groups: CollisionFilter) -> Self {
        self.groups = groups;
        self
    }
}

impl Component for PhysicsBody {
    const NAME: &'static str = "physics_body";
}

fn interaction_groups(filter: CollisionFilter) -> InteractionGroups {
    InteractionGroups::new(
        Group::from_bits_truncate(filter.belongs_to),
        Group::from_bits_truncate(filter.collides_with),
    )
}

fn isometry(position: Vec3, rotation: Quat) -> Isometry3<Real> {
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w, rotation.x, rotation.y, rotation.z,
    ));
    Isometry3::from_parts(Translation3::new(position.x, position.y, position.z), rotation)
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Registered {
    handle: RigidBodyHandle,
    body: PhysicsBody,
}

/// Rapier scene mirrored from the registry.
///
/// Stored outside the [`World`] because rapier owns its own body and collider
/// storage.
pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    island_manager: IslandManager,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    query_pipeline: QueryPipeline,
    entity_to_body: BTreeMap<EntityId, Registered>,
    body_to_entity: HashMap<RigidBodyHandle, EntityId>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            island_manager: IslandManager::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            query_pipeline: QueryPipeline::new(),
            entity_to_body: BTreeMap::new(),
            body_to_entity: HashMap::new(),
        }
    }

    /// Mirror `entity` as a fixed body at `transform`. No-op if already
    /// registered.
    ///
    /// Call [`refresh`](Self::refresh) (or
    /// [`sync_from_world`](Self::sync_from_world)) before casting.
    pub fn register_entity(&mut self, entity: EntityId, transform: &Transform, body: &PhysicsBody) {
        if self.entity_to_body.contains_key(&entity) {
            return;
        }

        let rb = RigidBodyBuilder::fixed()
            .position(isometry(transform.position, transform.rotation))
            .build();
        let handle = self.rigid_body_set.insert(rb);

        let collider = ColliderBuilder::new(body.shape.to_shared())
            .collision_groups(interaction_groups(body.groups))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.entity_to_body.insert(entity, Registered { handle, body: *body });
        self.body_to_entity.insert(handle, entity);
    }

    /// Remove `entity`'s body and collider. No-op if not registered.
    pub fn unregister_entity(&mut self, entity: EntityId) {
        if let Some(registered) = self.entity_to_body.remove(&entity) {
            self.body_to_entity.remove(&registered.handle);
            self.rigid_body_set.remove(
                registered.handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
    }

    /// Add a collider with no rigid body and no owning entity (terrain,
    /// decoration).
    pub fn add_static_collider(
        &mut self,
        position: Vec3,
        shape: ColliderShape,
        groups: CollisionFilter,
    ) -> ColliderHandle {
        let collider = ColliderBuilder::new(shape.to_shared())
            .position(isometry(position, Quat::IDENTITY))
            .collision_groups(interaction_groups(groups))
            .build();
        self.collider_set.insert(collider)
    }

    /// Move a registered entity's body. No-op if not registered.
    pub fn set_pose(&mut self, entity: EntityId, transform: &Transform) {
        let Some(registered) = self.entity_to_body.get(&entity) else {
            return;
        };
        if let Some(rb) = self.rigid_body_set.get_mut(registered.handle) {
            rb.set_position(isometry(transform.position, transform.rotation), false);
        }
    }

    /// Make the query pipeline reflect the current bodies and colliders.
    pub fn refresh(&mut self) {
        self.rigid_body_set
            .propagate_modified_body_positions_to_colliders(&mut self.collider_set);
        self.query_pipeline.update(&self.collider_set);
    }

    /// Mirror the registry: every live, non-template, non-deactivated entity
    /// with a [`Transform`] and a [`PhysicsBody`] gets exactly one body at its
    /// current pose; everything else is removed.
    pub fn sync_from_world(&mut self, world: &World) {
        let mut wanted: Vec<(EntityId, PhysicsBody, Transform)> = world
            .query::<PhysicsBody>()
            .filter(|(entity, _)| {
                !world.has_component::<Template>(*entity)
                    && !world.has_component::<Deactivated>(*entity)
            })
            .filter_map(|(entity, body)| {
                world
                    .get_component::<Transform>(entity)
                    .map(|transform| (entity, *body, *transform))
            })
            .collect();
        wanted.sort_by_key(|(entity, _, _)| *entity);

        let stale: Vec<EntityId> = self
            .entity_to_body
            .iter()
            .filter(|(entity, registered)| {
                wanted
                    .binary_search_by_key(*entity, |(e, _, _)| *e)
                    .map_or(true, |i| wanted[i].1 != registered.body)
            })
            .map(|(entity, _)| *entity)
            .collect();
        for entity in &stale {
            self.unregister_entity(*entity);
        }

        let mut added = 0usize;
        for (entity, body, transform) in &wanted {
            if self.entity_to_body.contains_key(entity) {
                self.set_pose(*entity, transform);
            } else {
                self.register_entity(*entity, transform, body);
                added += 1;
            }
        }

        self.refresh();
        debug!(
            bodies = self.entity_to_body.len(),
            added,
            removed = stale.len(),
            "physics world synced"
        );
    }

    pub fn has_entity(&self, entity: EntityId) -> bool {
        self.entity_to_body.contains_key(&entity)
    }

    /// Number of mirrored entities.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Number of colliders, including body-less ones.
    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }
}

impl PhysicsWorld {
    fn cast_excluding(
        &self,
        origin: Vec3,
        direction: Vec3,
        filter: CollisionFilter,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<RayHit> {
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![direction.x, direction.y, direction.z],
        );
        let mut query_filter = QueryFilter::new().groups(interaction_groups(filter));
        if let Some(handle) = exclude {
            query_filter = query_filter.exclude_rigid_body(handle);
        }
        let (collider, toi) = self.query_pipeline.cast_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            MAX_TOI,
            true,
            query_filter,
        )?;

        let point = ray.point_at(toi);
        let entity = self
            .collider_set
            .get(collider)
            .and_then(|c| c.parent())
            .and_then(|body| self.body_to_entity.get(&body).copied());
        Some(RayHit {
            position: Vec3::new(point.x, point.y, point.z),
            entity,
        })
    }
}

impl RayCastOracle for PhysicsWorld {
    fn cast(&self, origin: Vec3, direction: Vec3, filter: CollisionFilter) -> Option<RayHit> {
        self.cast_excluding(origin, direction, filter, None)
    }

    /// A caster with a mirrored body starts inside its own collider; that
    /// body is excluded from the query.
    fn cast_from(
        &self,
        caster: EntityId,
        origin: Vec3,
        direction: Vec3,
        filter: CollisionFilter,
    ) -> Option<RayHit> {
        let own = self.entity_to_body.get(&caster).map(|r| r.handle);
        self.cast_excluding(origin, direction, filter, own)
    }

    fn sync(&mut self, world: &World) {
        self.sync_from_world(world);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::register_components;

    fn setup_world() -> World {
        let mut world = World::new();
        register_components(&mut world);
        world
    }

    fn spawn_target(world: &mut World, position: Vec3, radius: f32) -> EntityId {
        let e = world.spawn_with(Transform::from_position(position));
        world.insert_component(e, PhysicsBody::ball(radius)).unwrap();
        e
    }

    #[test]
    fn register_is_idempotent_and_unregister_removes() {
        let mut pw = PhysicsWorld::new();
        let e = EntityId::new(0, 0);
        let t = Transform::default();
        pw.register_entity(e, &t, &PhysicsBody::ball(0.5));
        pw.register_entity(e, &t, &PhysicsBody::ball(0.5));
        assert!(pw.has_entity(e));
        assert_eq!(pw.body_count(), 1);
        assert_eq!(pw.collider_count(), 1);

        pw.unregister_entity(e);
        pw.unregister_entity(e);
        assert!(!pw.has_entity(e));
        assert_eq!(pw.body_count(), 0);
        assert_eq!(pw.collider_count(), 0);
    }

    #[test]
    fn cast_reports_nearest_entity_and_point() {
        let mut world = setup_world();
        let near = spawn_target(&mut world, Vec3::new(0.0, 0.0, 0.8), 0.5);
        let _far = spawn_target(&mut world, Vec3::new(0.0, 0.0, 1.6), 0.5);

        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);

        let hit = pw
            .cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL)
            .expect("ray should hit");
        assert_eq!(hit.entity, Some(near));
        assert!(hit.position.abs_diff_eq(Vec3::new(0.0, 0.0, 0.3), 1e-4));
    }

    #[test]
    fn cast_is_limited_to_unit_direction() {
        let mut world = setup_world();
        spawn_target(&mut world, Vec3::new(0.0, 0.0, 2.0), 0.5);
        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);

        assert!(pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).is_none());
        assert!(pw.cast(Vec3::ZERO, Vec3::Z * 2.0, CollisionFilter::ALL).is_some());
    }

    #[test]
    fn static_collider_hit_has_no_entity() {
        let mut pw = PhysicsWorld::new();
        pw.add_static_collider(
            Vec3::new(0.0, 0.0, 0.5),
            ColliderShape::Cuboid {
                half_extents: Vec3::splat(0.25),
            },
            CollisionFilter::ALL,
        );
        pw.refresh();

        let hit = pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).unwrap();
        assert_eq!(hit.entity, None);
        assert!((hit.position.z - 0.25).abs() < 1e-4);
    }

    #[test]
    fn filter_excludes_other_layers() {
        let mut world = setup_world();
        let e = world.spawn_with(Transform::from_position(Vec3::new(0.0, 0.0, 0.7)));
        let groups = CollisionFilter {
            belongs_to: 0b10,
            collides_with: u32::MAX,
        };
        world
            .insert_component(e, PhysicsBody::ball(0.5).with_groups(groups))
            .unwrap();
        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);

        let only_first_layer = CollisionFilter {
            belongs_to: u32::MAX,
            collides_with: 0b01,
        };
        assert!(pw.cast(Vec3::ZERO, Vec3::Z, only_first_layer).is_none());
        assert!(pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).is_some());
    }

    #[test]
    fn sync_drops_destroyed_and_deactivated_and_templates() {
        let mut world = setup_world();
        let gone = spawn_target(&mut world, Vec3::X, 0.5);
        let off = spawn_target(&mut world, Vec3::Y, 0.5);
        let kept = spawn_target(&mut world, Vec3::Z * 3.0, 0.5);
        let template = spawn_target(&mut world, Vec3::NEG_X, 0.5);
        world.insert_component(template, Template).unwrap();

        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);
        assert_eq!(pw.body_count(), 3);
        assert!(!pw.has_entity(template));

        world.despawn(gone).unwrap();
        world.insert_component(off, Deactivated).unwrap();
        pw.sync_from_world(&world);

        assert!(!pw.has_entity(gone));
        assert!(!pw.has_entity(off));
        assert!(pw.has_entity(kept));
        assert_eq!(pw.body_count(), 1);
    }

    #[test]
    fn sync_moves_bodies_to_current_pose() {
        let mut world = setup_world();
        let e = spawn_target(&mut world, Vec3::new(0.0, 0.0, 5.0), 0.5);
        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);
        assert!(pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).is_none());

        world.get_component_mut::<Transform>(e).unwrap().position = Vec3::new(0.0, 0.0, 0.9);
        pw.sync_from_world(&world);
        let hit = pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).unwrap();
        assert_eq!(hit.entity, Some(e));
    }

    #[test]
    fn changed_shape_is_re_registered() {
        let mut world = setup_world();
        let e = spawn_target(&mut world, Vec3::new(0.0, 0.0, 1.5), 0.2);
        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);
        assert!(pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).is_none());

        world.insert_component(e, PhysicsBody::ball(0.8)).unwrap();
        pw.sync_from_world(&world);
        assert_eq!(pw.body_count(), 1);
        let hit = pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).unwrap();
        assert_eq!(hit.entity, Some(e));
    }

    #[test]
    fn cast_from_skips_the_casters_own_body() {
        let mut world = setup_world();
        let caster = spawn_target(&mut world, Vec3::ZERO, 0.05);
        let target = spawn_target(&mut world, Vec3::new(0.0, 0.0, 0.6), 0.3);
        let mut pw = PhysicsWorld::new();
        pw.sync_from_world(&world);

        let plain = pw.cast(Vec3::ZERO, Vec3::Z, CollisionFilter::ALL).unwrap();
        assert_eq!(plain.entity, Some(caster));

        let hit = pw
            .cast_from(caster, Vec3::ZERO, Vec3::Z, CollisionFilter::ALL)
            .unwrap();
        assert_eq!(hit.entity, Some(target));
        assert!(hit.position.abs_diff_eq(Vec3::new(0.0, 0.0, 0.3), 1e-4));
    }
}
