//! Deferred mutation buffer with causality metadata.
//!
//! Passes never write the [`World`] directly. They record intents into a
//! [`CommandBuffer`]; once every reader of the pass is done, the buffer is
//! applied in strict recording order and cleared. Nothing is validated at
//! record time: a command whose target vanished in the meantime fails at apply
//! time, is logged, and the rest of the buffer carries on.
//!
//! Each command records who issued it ([`SystemId`]) and why
//! ([`CausalReason`]), so the list returned by [`CommandBuffer::apply`]
//! explains every change a tick made.
//!
//! Component payloads are carried as [`serde_json::Value`] under the
//! component's registered name. The typed helpers [`CommandBuffer::set`] and
//! [`CommandBuffer::add`] do the encoding.
//!
//! # Example
//!
//! ```
//! use impact_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Glow(f32);
//!
//! impl Component for Glow {
//!     const NAME: &'static str = "glow";
//! }
//!
//! let mut world = World::new();
//! world.register_component::<Glow>();
//! let template = world.spawn_with(Template);
//! world.insert_component(template, Glow(0.0)).unwrap();
//!
//! let mut cmds = CommandBuffer::new();
//! let spark = cmds.instantiate(
//!     template,
//!     SystemId::ENGINE_INTERNAL,
//!     CausalReason::GameRule("spark".to_owned()),
//! );
//! // The pending instance can be targeted before it exists.
//! cmds.set(
//!     spark,
//!     &Glow(1.0),
//!     SystemId::ENGINE_INTERNAL,
//!     CausalReason::GameRule("spark".to_owned()),
//! );
//!
//! let applied = cmds.apply(&mut world);
//! let instance = applied[0].spawned_entity.unwrap();
//! assert_eq!(world.get_component::<Glow>(instance), Some(&Glow(1.0)));
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::component::Component;
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// SystemId
// ---------------------------------------------------------------------------

/// Numeric id of the pass or system that recorded a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl SystemId {
    /// Engine-internal operations (setup, tests).
    pub const ENGINE_INTERNAL: SystemId = SystemId(0);
    /// Projectile collision resolution.
    pub const COLLISION: SystemId = SystemId(10);
    /// Health / death resolution.
    pub const HEALTH: SystemId = SystemId(20);
    /// Parent-to-child deactivation cascade.
    pub const CASCADE: SystemId = SystemId(30);
}

// ---------------------------------------------------------------------------
// CausalReason
// ---------------------------------------------------------------------------

/// Why a command was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CausalReason {
    /// A projectile (first) struck a target (second).
    CollisionResponse(EntityId, EntityId),
    /// The given parent entity is deactivated.
    ParentDeactivated(EntityId),
    /// A named game rule, e.g. `"health_depleted"`.
    GameRule(String),
    /// Internal logic -- last resort.
    SystemInternal(String),
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Handle to an entity that an `Instantiate` command will create on apply.
///
/// Only meaningful within the buffer that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingEntity(u32);

impl PendingEntity {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// What a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandTarget {
    Entity(EntityId),
    Pending(PendingEntity),
}

impl From<EntityId> for CommandTarget {
    fn from(entity: EntityId) -> Self {
        CommandTarget::Entity(entity)
    }
}

impl From<PendingEntity> for CommandTarget {
    fn from(pending: PendingEntity) -> Self {
        CommandTarget::Pending(pending)
    }
}

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// The mutation to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandKind {
    /// Overwrite a component the target already carries. Fails if absent.
    SetComponent {
        component_name: String,
        value: Value,
    },
    /// Insert or overwrite a component. Adding a tag twice is fine.
    AddComponent {
        component_name: String,
        value: Value,
    },
    /// Remove a component. Removing an absent component is fine.
    RemoveComponent { component_name: String },
    /// Destroy the target entity.
    Destroy,
    /// Clone `template` into a new entity. The command's target is the
    /// [`PendingEntity`] that later commands use to address the instance.
    Instantiate { template: EntityId },
}

impl CommandKind {
    fn component_name(&self) -> Option<&str> {
        match self {
            CommandKind::SetComponent { component_name, .. }
            | CommandKind::AddComponent { component_name, .. }
            | CommandKind::RemoveComponent { component_name } => Some(component_name),
            CommandKind::Destroy | CommandKind::Instantiate { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A single recorded intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub target: CommandTarget,
    pub kind: CommandKind,
    pub issued_by: SystemId,
    pub reason: CausalReason,
    /// Position within the buffer at record time.
    pub command_index: u32,
    /// For `Instantiate`: the entity created on apply.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spawned_entity: Option<EntityId>,
    /// Set by [`CommandBuffer::apply`]. `false` if the command was skipped
    /// (stale target, missing component, ...).
    #[serde(default)]
    pub applied_successfully: bool,
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// Summary of the last [`CommandBuffer::apply`] call.
///
/// `conflict_count` is the number of (target, component) pairs written by
/// more than one command. Conflicts resolve last-write-wins and are reported,
/// not rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub conflict_count: usize,
    pub failed_count: usize,
    pub success_count: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Ordered log of intents, applied FIFO.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
    pending_count: u32,
    last_apply_report: ApplyReport,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // -- recording ------------------------------------------------------------

    /// Record an overwrite of an existing component, addressed by name.
    pub fn set_component(
        &mut self,
        target: impl Into<CommandTarget>,
        component_name: &str,
        value: Value,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        self.push(
            target.into(),
            CommandKind::SetComponent {
                component_name: component_name.to_owned(),
                value,
            },
            issued_by,
            reason,
        );
    }

    /// Record an insert-or-overwrite of a component, addressed by name.
    pub fn add_component(
        &mut self,
        target: impl Into<CommandTarget>,
        component_name: &str,
        value: Value,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        self.push(
            target.into(),
            CommandKind::AddComponent {
                component_name: component_name.to_owned(),
                value,
            },
            issued_by,
            reason,
        );
    }

    /// Typed form of [`set_component`](Self::set_component).
    pub fn set<T: Component>(
        &mut self,
        target: impl Into<CommandTarget>,
        value: &T,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        if let Some(value) = encode(value) {
            self.set_component(target, T::NAME, value, issued_by, reason);
        }
    }

    /// Typed form of [`add_component`](Self::add_component).
    pub fn add<T: Component>(
        &mut self,
        target: impl Into<CommandTarget>,
        value: &T,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        if let Some(value) = encode(value) {
            self.add_component(target, T::NAME, value, issued_by, reason);
        }
    }

    pub fn remove_component(
        &mut self,
        target: impl Into<CommandTarget>,
        component_name: &str,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        self.push(
            target.into(),
            CommandKind::RemoveComponent {
                component_name: component_name.to_owned(),
            },
            issued_by,
            reason,
        );
    }

    pub fn destroy(
        &mut self,
        target: impl Into<CommandTarget>,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        self.push(target.into(), CommandKind::Destroy, issued_by, reason);
    }

    /// Record an instantiation of `template`.
    ///
    /// The returned [`PendingEntity`] can be the target of commands recorded
    /// later in this buffer; they resolve to the new entity on apply.
    pub fn instantiate(
        &mut self,
        template: EntityId,
        issued_by: SystemId,
        reason: CausalReason,
    ) -> PendingEntity {
        let pending = PendingEntity(self.pending_count);
        self.pending_count += 1;
        self.push(
            CommandTarget::Pending(pending),
            CommandKind::Instantiate { template },
            issued_by,
            reason,
        );
        pending
    }

    /// Move every command of `other` to the end of this buffer.
    ///
    /// Pending entities of `other` are re-based so they stay distinct from
    /// the ones already recorded here. Workers record into private buffers
    /// and the pass appends them in batch order, which keeps the merged order
    /// independent of thread scheduling.
    pub fn append(&mut self, other: CommandBuffer) {
        let offset = self.pending_count;
        let other_pending = other.pending_count;
        for mut cmd in other.commands {
            if let CommandTarget::Pending(pending) = &mut cmd.target {
                pending.0 += offset;
            }
            cmd.command_index = self.next_index;
            self.next_index += 1;
            self.commands.push(cmd);
        }
        self.pending_count += other_pending;
    }

    // -- inspection -----------------------------------------------------------

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Report from the last [`apply`](Self::apply) call (all zero before the
    /// first one).
    pub fn last_apply_report(&self) -> &ApplyReport {
        &self.last_apply_report
    }

    /// Drop every recorded command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
        self.pending_count = 0;
    }

    // -- application ----------------------------------------------------------

    /// Apply every command to `world` in recording order, then clear.
    ///
    /// Returns all commands, successful or not; check
    /// [`Command::applied_successfully`]. Failures are logged and never stop
    /// the remaining commands.
    pub fn apply(&mut self, world: &mut World) -> Vec<Command> {
        let mut commands = std::mem::take(&mut self.commands);
        let mut resolved: Vec<Option<EntityId>> = vec![None; self.pending_count as usize];
        self.next_index = 0;
        self.pending_count = 0;

        let conflict_count = count_conflicts(&commands);

        let mut success_count = 0;
        let mut failed_count = 0;
        for cmd in &mut commands {
            match apply_one(world, cmd, &mut resolved) {
                Ok(()) => {
                    cmd.applied_successfully = true;
                    success_count += 1;
                }
                Err(e) => {
                    failed_count += 1;
                    warn!(
                        command_index = cmd.command_index,
                        target = ?cmd.target,
                        system_id = cmd.issued_by.0,
                        error = %e,
                        "command application failed"
                    );
                }
            }
        }

        self.last_apply_report = ApplyReport {
            conflict_count,
            failed_count,
            success_count,
        };
        commands
    }

    fn push(
        &mut self,
        target: CommandTarget,
        kind: CommandKind,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        let command_index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            kind,
            issued_by,
            reason,
            command_index,
            spawned_entity: None,
            applied_successfully: false,
        });
    }
}

fn encode<T: Component>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(component = T::NAME, error = %e, "component encoding failed, command dropped");
            None
        }
    }
}

fn count_conflicts(commands: &[Command]) -> usize {
    let mut seen: HashMap<(CommandTarget, &str), Vec<u32>> = HashMap::new();
    for cmd in commands {
        if let Some(name) = cmd.kind.component_name() {
            seen.entry((cmd.target, name))
                .or_default()
                .push(cmd.command_index);
        }
    }

    let mut conflicts = 0;
    for ((target, component), indices) in &seen {
        if indices.len() > 1 {
            conflicts += 1;
            warn!(
                target = ?target,
                component = %component,
                command_indices = ?indices,
                "conflict: {} commands write the same target+component (last-write-wins)",
                indices.len()
            );
        }
    }
    conflicts
}

fn resolve(target: CommandTarget, resolved: &[Option<EntityId>]) -> Result<EntityId, EcsError> {
    match target {
        CommandTarget::Entity(entity) => Ok(entity),
        CommandTarget::Pending(pending) => resolved
            .get(pending.0 as usize)
            .copied()
            .flatten()
            .ok_or(EcsError::UnresolvedPendingEntity { index: pending.0 }),
    }
}

fn apply_one(
    world: &mut World,
    cmd: &mut Command,
    resolved: &mut [Option<EntityId>],
) -> Result<(), EcsError> {
    match &cmd.kind {
        CommandKind::Instantiate { template } => {
            let instance = world.instantiate(*template)?;
            if let CommandTarget::Pending(pending) = cmd.target {
                if let Some(slot) = resolved.get_mut(pending.0 as usize) {
                    *slot = Some(instance);
                }
            }
            cmd.spawned_entity = Some(instance);
            Ok(())
        }
        CommandKind::SetComponent {
            component_name,
            value,
        } => {
            let target = resolve(cmd.target, resolved)?;
            if !world.has_component_by_name(target, component_name)? {
                return Err(EcsError::MissingComponent {
                    entity: target,
                    component: component_name.clone(),
                });
            }
            world.set_component_by_name(target, component_name, value)
        }
        CommandKind::AddComponent {
            component_name,
            value,
        } => {
            let target = resolve(cmd.target, resolved)?;
            world.set_component_by_name(target, component_name, value)
        }
        CommandKind::RemoveComponent { component_name } => {
            let target = resolve(cmd.target, resolved)?;
            world.remove_component_by_name(target, component_name)
        }
        CommandKind::Destroy => world.despawn(resolve(cmd.target, resolved)?),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
