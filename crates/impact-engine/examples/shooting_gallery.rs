//! Headless shooting gallery: waves of projectiles against a ring of targets.
//!
//! Each target carries two armor plates (children) and each plate a bolt
//! (grandchild). Every tick a seeded wave of projectiles is placed in front of
//! random targets at random gaps; the damage pipeline does the rest.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example shooting_gallery -p impact-engine
//!
//! An optional first argument points at a JSON `TickConfig`.

use impact_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::info;

const TARGETS: usize = 24;
const RING_RADIUS: f32 = 10.0;
const TARGET_RADIUS: f32 = 0.5;
const WAVE_SIZE: usize = 40;
const TICKS: u64 = 12;

/// Marker carried by explosion effects.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
struct Explosion;

impl Component for Explosion {
    const NAME: &'static str = "explosion";
}

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

fn build_scene(world: &mut World) -> anyhow::Result<Vec<(EntityId, Vec3)>> {
    let explosion = world.spawn_with(Template);
    world.insert_component(explosion, Explosion)?;
    world.insert_component(explosion, Transform::default())?;

    let mut targets = Vec::with_capacity(TARGETS);
    for i in 0..TARGETS {
        let angle = i as f32 / TARGETS as f32 * std::f32::consts::TAU;
        let center = Vec3::new(angle.cos() * RING_RADIUS, 0.0, angle.sin() * RING_RADIUS);

        let target = world.spawn_with(Transform::from_position(center));
        world.insert_component(target, Health(30.0))?;
        world.insert_component(target, PhysicsBody::ball(TARGET_RADIUS))?;
        world.insert_component(
            target,
            EffectSpawner {
                template: explosion,
                position: center,
            },
        )?;

        for _ in 0..2 {
            let plate = world.spawn_with(Parent(target));
            let bolt = world.spawn_with(Parent(plate));
            world.insert_component(bolt, Transform::from_position(center))?;
        }
        targets.push((target, center));
    }
    Ok(targets)
}

/// Place a wave of projectiles in front of random targets.
fn fire_wave(world: &mut World, targets: &[(EntityId, Vec3)], rng: &mut Pcg64) -> anyhow::Result<()> {
    for _ in 0..WAVE_SIZE {
        let (_, center) = targets[rng.gen_range(0..targets.len())];
        let outward = center.normalize_or_zero();
        let gap: f32 = rng.gen_range(0.1..1.5);
        let origin = center - outward * (TARGET_RADIUS + gap);

        let bullet = world.spawn_with(Transform::looking_to(origin, outward));
        world.insert_component(
            bullet,
            Projectile {
                owned_by_player: true,
                ..Projectile::default()
            },
        )?;
    }
    Ok(())
}

fn count<T: Component>(world: &World) -> usize {
    world.query::<T>().count()
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TickConfig::from_path(path)?,
        None => TickConfig::default(),
    };

    let mut world = World::new();
    register_components(&mut world);
    world.register_component::<Explosion>();
    let targets = build_scene(&mut world)?;

    let mut physics = PhysicsWorld::new();
    // A body-less pillar: hits on it never count.
    physics.add_static_collider(
        Vec3::new(0.0, 0.0, RING_RADIUS - 2.0),
        ColliderShape::Cuboid {
            half_extents: Vec3::new(0.5, 2.0, 0.5),
        },
        CollisionFilter::ALL,
    );

    let mut tick_loop = TickLoop::damage_pipeline(world, physics, config)?;
    let mut rng = Pcg64::seed_from_u64(0x1337);

    for _ in 0..TICKS {
        fire_wave(tick_loop.world_mut(), &targets, &mut rng)?;
        let processed = tick_loop.tick();

        let world = tick_loop.world();
        let live_projectiles = world
            .query::<Projectile>()
            .filter(|(_, p)| !p.exploded)
            .count();
        info!(
            tick = tick_loop.tick_count(),
            commands = processed.len(),
            live_projectiles,
            inert_projectiles = count::<Projectile>(world) - live_projectiles,
            explosions = count::<Explosion>(world) - 1,
            deactivated = count::<Deactivated>(world),
            "tick"
        );
        for pass in &tick_loop.last_diagnostics().passes {
            info!(
                pass = %pass.name,
                commands = pass.commands,
                conflicts = pass.report.conflict_count,
                record_us = pass.record_time.as_micros() as u64,
                apply_us = pass.apply_time.as_micros() as u64,
                "pass"
            );
        }
    }

    let world = tick_loop.world();
    let dead = targets
        .iter()
        .filter(|(t, _)| world.has_component::<Deactivated>(*t))
        .count();
    info!(
        dead_targets = dead,
        total_targets = targets.len(),
        digest = %world.digest(),
        "gallery closed"
    );
    Ok(())
}
