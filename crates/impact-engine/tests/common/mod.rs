//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use impact_engine::prelude::*;

/// Answers casts from a fixed table keyed by ray origin.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Vec<(Vec3, RayHit)>,
    casts: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Casts from `origin` report `hit`.
    pub fn on(mut self, origin: Vec3, position: Vec3, entity: Option<EntityId>) -> Self {
        self.script.push((origin, RayHit { position, entity }));
        self
    }

    /// Number of casts made so far.
    pub fn casts(&self) -> usize {
        self.casts.load(Ordering::SeqCst)
    }
}

impl RayCastOracle for ScriptedOracle {
    fn cast(&self, origin: Vec3, _direction: Vec3, _filter: CollisionFilter) -> Option<RayHit> {
        self.casts.fetch_add(1, Ordering::SeqCst);
        self.script
            .iter()
            .find(|(from, _)| from.abs_diff_eq(origin, 1e-5))
            .map(|(_, hit)| *hit)
    }
}

pub fn setup_world() -> World {
    let mut world = World::new();
    register_components(&mut world);
    world.register_component::<Effect>();
    world
}

/// Marker carried by effect templates and their instances.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Effect;

impl Component for Effect {
    const NAME: &'static str = "effect";
}

pub fn spawn_effect_template(world: &mut World) -> EntityId {
    let template = world.spawn_with(Template);
    world.insert_component(template, Effect).unwrap();
    world.insert_component(template, Transform::default()).unwrap();
    template
}

pub fn spawn_projectile(world: &mut World, position: Vec3, direction: Vec3) -> EntityId {
    let e = world.spawn_with(Transform::looking_to(position, direction));
    world.insert_component(e, Projectile::default()).unwrap();
    e
}

/// A damageable entity with an effect spawner pointing at `template`.
pub fn spawn_target(world: &mut World, position: Vec3, health: f32, template: EntityId) -> EntityId {
    let e = world.spawn_with(Transform::from_position(position));
    world.insert_component(e, Health(health)).unwrap();
    world
        .insert_component(
            e,
            EffectSpawner {
                template,
                position: Vec3::ZERO,
            },
        )
        .unwrap();
    e
}

/// Live effect instances (templates excluded).
pub fn effect_instances(world: &World) -> Vec<EntityId> {
    world
        .query::<Effect>()
        .map(|(e, _)| e)
        .filter(|&e| !world.has_component::<Template>(e))
        .collect()
}
