//! The damage pipeline driven by the rapier-backed oracle.

mod common;

use common::*;
use impact_engine::prelude::*;

fn physical_target(world: &mut World, position: Vec3, radius: f32, health: f32) -> EntityId {
    let template = spawn_effect_template(world);
    let target = spawn_target(world, position, health, template);
    world
        .insert_component(target, PhysicsBody::ball(radius))
        .unwrap();
    target
}

fn pipeline(world: World) -> TickLoop<PhysicsWorld> {
    TickLoop::damage_pipeline(world, PhysicsWorld::new(), TickConfig::default()).unwrap()
}

#[test]
fn two_hits_kill_and_body_leaves_the_scene() {
    let mut world = setup_world();
    let target = physical_target(&mut world, Vec3::new(0.0, 0.0, 0.6), 0.3, 20.0);
    let mut tick_loop = pipeline(world);

    let first = spawn_projectile(tick_loop.world_mut(), Vec3::ZERO, Vec3::Z);
    tick_loop.tick();
    assert!(!tick_loop.world().is_alive(first));
    assert_eq!(
        tick_loop.world().get_component::<Health>(target),
        Some(&Health(10.0))
    );
    assert!(tick_loop.oracle().has_entity(target));

    spawn_projectile(tick_loop.world_mut(), Vec3::ZERO, Vec3::Z);
    tick_loop.tick();
    let world = tick_loop.world();
    assert!(world.has_component::<Deactivated>(target));
    let effects = effect_instances(world);
    assert_eq!(effects.len(), 1);
    assert_eq!(
        world.get_component::<Transform>(effects[0]).unwrap().position,
        Vec3::new(0.0, 0.0, 0.6)
    );

    // The corpse is dropped at the next sync, so this one flies on.
    let third = spawn_projectile(tick_loop.world_mut(), Vec3::ZERO, Vec3::Z);
    tick_loop.tick();
    assert!(!tick_loop.oracle().has_entity(target));
    let state = tick_loop.world().get_component::<Projectile>(third).unwrap();
    assert!(!state.exploded);
    assert_eq!(effect_instances(tick_loop.world()).len(), 1);
}

#[test]
fn projectile_with_its_own_body_hits_the_target_in_front() {
    let mut world = setup_world();
    let target = physical_target(&mut world, Vec3::new(0.0, 0.0, 0.6), 0.3, 10.0);
    let bullet = spawn_projectile(&mut world, Vec3::ZERO, Vec3::Z);
    world
        .insert_component(bullet, PhysicsBody::ball(0.05))
        .unwrap();
    let mut tick_loop = pipeline(world);

    tick_loop.tick();
    assert!(tick_loop.oracle().has_entity(target));
    let world = tick_loop.world();
    assert!(!world.is_alive(bullet));
    assert_eq!(world.get_component::<Health>(target), Some(&Health(0.0)));
    assert!(world.has_component::<Deactivated>(target));
    assert_eq!(effect_instances(world).len(), 1);
}

#[test]
fn distant_surface_explodes_projectile_without_damage() {
    let mut world = setup_world();
    // Surface at z = 0.8: inside the unit ray, outside the threshold.
    let target = physical_target(&mut world, Vec3::new(0.0, 0.0, 1.0), 0.2, 20.0);
    let bullet = spawn_projectile(&mut world, Vec3::ZERO, Vec3::Z);
    let mut tick_loop = pipeline(world);

    tick_loop.tick();
    let world = tick_loop.world();
    let state = world.get_component::<Projectile>(bullet).unwrap();
    assert!(state.exploded);
    assert!((state.cast_distance - 0.8).abs() < 1e-4);
    assert_eq!(world.get_component::<Health>(target), Some(&Health(20.0)));
}

#[test]
fn scenery_absorbs_projectile() {
    let mut world = setup_world();
    let bullet = spawn_projectile(&mut world, Vec3::ZERO, Vec3::Z);
    let mut physics = PhysicsWorld::new();
    physics.add_static_collider(
        Vec3::new(0.0, 0.0, 0.5),
        ColliderShape::Cuboid {
            half_extents: Vec3::new(1.0, 1.0, 0.25),
        },
        CollisionFilter::ALL,
    );
    let mut tick_loop =
        TickLoop::damage_pipeline(world, physics, TickConfig::default()).unwrap();

    tick_loop.tick();
    let world = tick_loop.world();
    assert!(world.is_alive(bullet));
    assert!(world.get_component::<Projectile>(bullet).unwrap().exploded);
}

#[test]
fn moved_target_is_hit_at_its_new_pose() {
    let mut world = setup_world();
    let target = physical_target(&mut world, Vec3::new(5.0, 0.0, 0.0), 0.3, 20.0);
    let mut tick_loop = pipeline(world);
    tick_loop.tick();

    tick_loop
        .world_mut()
        .insert_component(target, Transform::from_position(Vec3::new(0.0, 0.0, 0.6)))
        .unwrap();
    let bullet = spawn_projectile(tick_loop.world_mut(), Vec3::ZERO, Vec3::Z);
    tick_loop.tick();

    assert!(!tick_loop.world().is_alive(bullet));
    assert_eq!(
        tick_loop.world().get_component::<Health>(target),
        Some(&Health(10.0))
    );
}

#[test]
fn collision_filter_lets_projectiles_pass_foreign_layers() {
    let mut world = setup_world();
    let template = spawn_effect_template(&mut world);
    let target = spawn_target(&mut world, Vec3::new(0.0, 0.0, 0.6), 20.0, template);
    world
        .insert_component(
            target,
            PhysicsBody::ball(0.3).with_groups(CollisionFilter {
                belongs_to: 0b10,
                collides_with: u32::MAX,
            }),
        )
        .unwrap();
    let bullet = spawn_projectile(&mut world, Vec3::ZERO, Vec3::Z);
    let config = TickConfig {
        pipeline: PipelineConfig {
            collision_filter: CollisionFilter {
                belongs_to: u32::MAX,
                collides_with: 0b01,
            },
            ..PipelineConfig::default()
        },
        ..TickConfig::default()
    };
    let mut tick_loop = TickLoop::damage_pipeline(world, PhysicsWorld::new(), config).unwrap();

    tick_loop.tick();
    assert!(tick_loop.world().is_alive(bullet));
    assert!(!tick_loop
        .world()
        .get_component::<Projectile>(bullet)
        .unwrap()
        .exploded);
    assert_eq!(
        tick_loop.world().get_component::<Health>(target),
        Some(&Health(20.0))
    );
}
