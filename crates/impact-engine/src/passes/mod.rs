//! The three per-tick passes and the fork-join helper they share.
//!
//! A pass reads the registry through a [`PassContext`] and records intents
//! into a [`CommandBuffer`]; it never writes the world. Large populations are
//! split into fixed-size batches that rayon workers process in parallel, each
//! into a private buffer. The private buffers are appended in batch order, so
//! the recorded log is identical to a sequential run.

use impact_ecs::command::CommandBuffer;
use impact_ecs::component::{Component, Template};
use impact_ecs::entity::EntityId;
use impact_ecs::world::World;
use rayon::prelude::*;

use crate::components::Deactivated;
use crate::config::PipelineConfig;
use crate::oracle::RayCastOracle;

pub mod cascade;
pub mod collision;
pub mod health;

/// Read-only view handed to every pass.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub world: &'a World,
    pub oracle: &'a dyn RayCastOracle,
    pub config: &'a PipelineConfig,
}

impl<'a> PassContext<'a> {
    pub fn new(
        world: &'a World,
        oracle: &'a dyn RayCastOracle,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            world,
            oracle,
            config,
        }
    }
}

/// Entities carrying `T` that take part in passes, in storage order.
///
/// Templates and deactivated entities are skipped: the former are prefabs,
/// the latter are logically removed.
pub fn participants<T: Component>(world: &World) -> Vec<EntityId> {
    let mut entities = world.entities_with::<T>();
    entities.retain(|&entity| {
        !world.has_component::<Template>(entity) && !world.has_component::<Deactivated>(entity)
    });
    entities
}

/// Run `per_entity` over `entities`, recording into `cmds`.
///
/// Below `parallel_threshold` this runs on the calling thread. Above it the
/// entities are cut into `batch_size` chunks processed by rayon workers.
pub fn record_parallel<F>(
    ctx: &PassContext<'_>,
    entities: &[EntityId],
    cmds: &mut CommandBuffer,
    per_entity: F,
) where
    F: Fn(&PassContext<'_>, EntityId, &mut CommandBuffer) + Sync,
{
    if entities.len() < ctx.config.parallel_threshold {
        for &entity in entities {
            per_entity(ctx, entity, cmds);
        }
        return;
    }

    let batches: Vec<CommandBuffer> = entities
        .par_chunks(ctx.config.batch_size.max(1))
        .map(|batch| {
            let mut local = CommandBuffer::new();
            for &entity in batch {
                per_entity(ctx, entity, &mut local);
            }
            local
        })
        .collect();

    for local in batches {
        cmds.append(local);
    }
}
