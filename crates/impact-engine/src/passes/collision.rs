//! Collision resolution: one forward cast per live projectile.
//!
//! Outcomes per projectile:
//!
//! - no hit: nothing is recorded, the projectile stays live;
//! - any hit: the projectile is marked `exploded` (and never casts again);
//! - a hit on a damageable entity closer than `proximity_threshold`: the
//!   target loses `damage` health, its effect spawner is pointed at the
//!   target's current position, and the projectile is destroyed.
//!
//! Health is written as `health - damage` computed from the state the pass
//! reads. Several projectiles striking the same target in one tick therefore
//! resolve last-write-wins.

use glam::Vec3;
use impact_ecs::command::{CausalReason, CommandBuffer, SystemId};
use impact_ecs::entity::EntityId;
use impact_ecs::world::World;
use tracing::{debug, trace};

use super::{participants, record_parallel, PassContext};
use crate::components::{Deactivated, EffectSpawner, Health, Projectile, Transform};
use crate::config::PipelineConfig;
use crate::oracle::RayHit;

/// What a projectile's cast resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CastOutcome {
    /// Nothing in front of the projectile.
    Miss,
    /// Struck something at or beyond the proximity threshold.
    OutOfRange { distance: f32 },
    /// Struck something in range that cannot take damage: a collider with no
    /// owning entity, an entity without health, or a deactivated entity.
    Inert { distance: f32 },
    /// Struck a damageable entity in range.
    Damage {
        target: EntityId,
        distance: f32,
        health: f32,
    },
}

impl CastOutcome {
    /// Distance to the hit point, if anything was hit.
    pub fn distance(&self) -> Option<f32> {
        match *self {
            CastOutcome::Miss => None,
            CastOutcome::OutOfRange { distance }
            | CastOutcome::Inert { distance }
            | CastOutcome::Damage { distance, .. } => Some(distance),
        }
    }
}

/// Classify a cast made from `origin`.
pub fn classify(
    world: &World,
    config: &PipelineConfig,
    origin: Vec3,
    hit: Option<RayHit>,
) -> CastOutcome {
    let Some(hit) = hit else {
        return CastOutcome::Miss;
    };
    let distance = origin.distance(hit.position);
    if distance >= config.proximity_threshold {
        return CastOutcome::OutOfRange { distance };
    }

    let Some(target) = hit.entity else {
        return CastOutcome::Inert { distance };
    };
    if world.has_component::<Deactivated>(target) {
        return CastOutcome::Inert { distance };
    }
    match world.get_component::<Health>(target) {
        Some(health) => CastOutcome::Damage {
            target,
            distance,
            health: health.0,
        },
        None => CastOutcome::Inert { distance },
    }
}

/// Cast for one projectile and record the resulting intents.
pub fn resolve_projectile(ctx: &PassContext<'_>, projectile: EntityId, cmds: &mut CommandBuffer) {
    let world = ctx.world;
    let (Some(state), Some(transform)) = (
        world.get_component::<Projectile>(projectile),
        world.get_component::<Transform>(projectile),
    ) else {
        return;
    };
    if state.exploded {
        return;
    }

    let hit = ctx.oracle.cast_from(
        projectile,
        transform.position,
        transform.forward(),
        ctx.config.collision_filter,
    );
    let outcome = classify(world, ctx.config, transform.position, hit);
    trace!(entity = %projectile, ?outcome, "projectile cast");

    let Some(distance) = outcome.distance() else {
        return;
    };
    let reason = match outcome {
        CastOutcome::Damage { target, .. } => CausalReason::CollisionResponse(projectile, target),
        _ => CausalReason::GameRule("projectile_exploded".to_owned()),
    };

    cmds.set(
        projectile,
        &Projectile {
            exploded: true,
            hit: true,
            cast_distance: distance,
            ..*state
        },
        SystemId::COLLISION,
        reason.clone(),
    );

    let CastOutcome::Damage { target, health, .. } = outcome else {
        return;
    };
    cmds.set(
        target,
        &Health(health - ctx.config.damage),
        SystemId::COLLISION,
        reason.clone(),
    );
    if let Some(spawner) = world.get_component::<EffectSpawner>(target) {
        let position = world
            .get_component::<Transform>(target)
            .map_or(spawner.position, |t| t.position);
        cmds.set(
            target,
            &EffectSpawner {
                template: spawner.template,
                position,
            },
            SystemId::COLLISION,
            reason.clone(),
        );
    }
    cmds.destroy(projectile, SystemId::COLLISION, reason);
}

/// Record collision intents for every live projectile.
pub fn run(ctx: &PassContext<'_>, cmds: &mut CommandBuffer) {
    let projectiles = participants::<Projectile>(ctx.world);
    let before = cmds.len();
    record_parallel(ctx, &projectiles, cmds, resolve_projectile);
    debug!(
        projectiles = projectiles.len(),
        commands = cmds.len() - before,
        "collision pass recorded"
    );
}
