//! Health resolution: death detection for damageable entities.
//!
//! An entity with health at or below zero gets its death effect instantiated
//! and is marked [`Deactivated`]. It is not destroyed. Deactivated entities no
//! longer participate, so a corpse whose health stays non-positive does not
//! spawn its effect again on later ticks.

use impact_ecs::command::{CausalReason, CommandBuffer, SystemId};
use impact_ecs::entity::EntityId;
use tracing::{debug, trace};

use super::{participants, record_parallel, PassContext};
use crate::components::{Deactivated, EffectSpawner, Health, Transform};

/// Record death intents for one entity.
pub fn resolve_entity(ctx: &PassContext<'_>, entity: EntityId, cmds: &mut CommandBuffer) {
    let world = ctx.world;
    let (Some(health), Some(spawner)) = (
        world.get_component::<Health>(entity),
        world.get_component::<EffectSpawner>(entity),
    ) else {
        return;
    };
    if health.0 > 0.0 {
        return;
    }

    // Position at the moment of death, not when the killing blow was recorded.
    let position = world
        .get_component::<Transform>(entity)
        .map_or(spawner.position, |t| t.position);
    let rotation = world
        .get_component::<Transform>(spawner.template)
        .map(|t| t.rotation)
        .unwrap_or_default();
    trace!(entity = %entity, health = health.0, ?position, "entity died");

    let reason = CausalReason::GameRule("health_depleted".to_owned());
    let effect = cmds.instantiate(spawner.template, SystemId::HEALTH, reason.clone());
    cmds.add(
        effect,
        &Transform { position, rotation },
        SystemId::HEALTH,
        reason.clone(),
    );
    cmds.add(entity, &Deactivated, SystemId::HEALTH, reason);
}

/// Record death intents for every live entity with health and an effect
/// spawner.
pub fn run(ctx: &PassContext<'_>, cmds: &mut CommandBuffer) {
    let candidates: Vec<EntityId> = participants::<Health>(ctx.world)
        .into_iter()
        .filter(|&e| ctx.world.has_component::<EffectSpawner>(e))
        .collect();
    let before = cmds.len();
    record_parallel(ctx, &candidates, cmds, resolve_entity);
    debug!(
        candidates = candidates.len(),
        commands = cmds.len() - before,
        "health pass recorded"
    );
}
