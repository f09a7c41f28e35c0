//! Hierarchy cascade: children of deactivated parents are deactivated.
//!
//! Propagation is one level per tick. The pass reads the state committed by
//! the health pass and is not re-run to a fixed point, so a grandchild follows
//! its grandparent one tick after its parent does.

use impact_ecs::command::{CausalReason, CommandBuffer, SystemId};
use impact_ecs::entity::EntityId;
use tracing::{debug, trace};

use super::{participants, record_parallel, PassContext};
use crate::components::{Deactivated, Parent};

pub fn resolve_child(ctx: &PassContext<'_>, child: EntityId, cmds: &mut CommandBuffer) {
    let Some(&Parent(parent)) = ctx.world.get_component::<Parent>(child) else {
        return;
    };
    if ctx.world.has_component::<Deactivated>(parent) {
        trace!(child = %child, parent = %parent, "parent deactivated");
        cmds.add(
            child,
            &Deactivated,
            SystemId::CASCADE,
            CausalReason::ParentDeactivated(parent),
        );
    }
}

pub fn run(ctx: &PassContext<'_>, cmds: &mut CommandBuffer) {
    let children = participants::<Parent>(ctx.world);
    let before = cmds.len();
    record_parallel(ctx, &children, cmds, resolve_child);
    debug!(
        children = children.len(),
        commands = cmds.len() - before,
        "cascade pass recorded"
    );
}
