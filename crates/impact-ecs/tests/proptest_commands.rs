//! Property tests for command buffer operations.
//!
//! These tests use `proptest` to generate random sequences of buffered
//! intents and verify that invariants hold after applying each sequence.

use impact_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Hp(u32);

impl Component for Hp {
    const NAME: &'static str = "hp";
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Burning;

impl Component for Burning {
    const NAME: &'static str = "burning";
}

#[derive(Debug, Clone)]
enum CmdOp {
    SetHp(usize, u32),
    AddBurning(usize),
    RemoveHp(usize),
    Destroy(usize),
    /// Instantiate the template and, optionally, set the instance's hp.
    Instantiate(Option<u32>),
}

fn cmd_op_strategy() -> impl Strategy<Value = CmdOp> {
    prop_oneof![
        (0..20usize, any::<u32>()).prop_map(|(i, v)| CmdOp::SetHp(i, v)),
        (0..20usize).prop_map(CmdOp::AddBurning),
        (0..20usize).prop_map(CmdOp::RemoveHp),
        (0..20usize).prop_map(CmdOp::Destroy),
        proptest::option::of(any::<u32>()).prop_map(CmdOp::Instantiate),
    ]
}

fn reason() -> CausalReason {
    CausalReason::SystemInternal("test".to_owned())
}

/// Record `ops` into a fresh buffer.
fn build_commands(ops: &[CmdOp], entities: &[EntityId], template: EntityId) -> CommandBuffer {
    let mut buf = CommandBuffer::new();
    for op in ops {
        match *op {
            CmdOp::SetHp(idx, val) => {
                buf.set(entities[idx % entities.len()], &Hp(val), SystemId(0), reason());
            }
            CmdOp::AddBurning(idx) => {
                buf.add(entities[idx % entities.len()], &Burning, SystemId(0), reason());
            }
            CmdOp::RemoveHp(idx) => {
                buf.remove_component(entities[idx % entities.len()], Hp::NAME, SystemId(0), reason());
            }
            CmdOp::Destroy(idx) => {
                buf.destroy(entities[idx % entities.len()], SystemId(0), reason());
            }
            CmdOp::Instantiate(hp) => {
                let pending = buf.instantiate(template, SystemId(0), reason());
                if let Some(hp) = hp {
                    buf.set(pending, &Hp(hp), SystemId(0), reason());
                }
            }
        }
    }
    buf
}

/// A world with Hp and Burning registered, a template, and 5 entities.
fn setup_world_and_entities() -> (World, Vec<EntityId>, EntityId) {
    let mut world = World::new();
    world.register_component::<Hp>();
    world.register_component::<Burning>();

    let template = world.spawn_with(Template);
    world.insert_component(template, Hp(1)).unwrap();

    let entities = (0..5u32).map(|i| world.spawn_with(Hp(100 + i))).collect();
    (world, entities, template)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    /// Invariants checked:
    /// - Command indices are sequential starting from 0.
    /// - Successful instantiations have `spawned_entity` set, and the
    ///   instance never carries the template marker.
    /// - ApplyReport counts match the actual success/failure counts.
    #[test]
    fn command_sequences_preserve_consistency(ops in prop::collection::vec(cmd_op_strategy(), 1..30)) {
        let (mut world, entities, template) = setup_world_and_entities();
        let mut buf = build_commands(&ops, &entities, template);

        let applied = buf.apply(&mut world);

        for (i, cmd) in applied.iter().enumerate() {
            prop_assert_eq!(cmd.command_index, i as u32);
        }

        for cmd in &applied {
            if matches!(cmd.kind, CommandKind::Instantiate { .. }) {
                prop_assert!(cmd.applied_successfully);
                let spawned = cmd.spawned_entity.unwrap();
                prop_assert!(world.is_alive(spawned));
                prop_assert!(!world.has_component::<Template>(spawned));
            }
        }

        let report = buf.last_apply_report();
        let actual_success = applied.iter().filter(|c| c.applied_successfully).count();
        prop_assert_eq!(report.success_count, actual_success);
        prop_assert_eq!(report.failed_count, applied.len() - actual_success);
        prop_assert!(buf.is_empty());
    }

    /// The same command sequence applied to two identical worlds produces
    /// identical results and identical world state.
    #[test]
    fn command_buffer_deterministic(ops in prop::collection::vec(cmd_op_strategy(), 1..20)) {
        fn run_once(ops: &[CmdOp]) -> (Vec<bool>, blake3::Hash) {
            let (mut world, entities, template) = setup_world_and_entities();
            let mut buf = build_commands(ops, &entities, template);
            let outcomes = buf.apply(&mut world)
                .iter()
                .map(|c| c.applied_successfully)
                .collect();
            (outcomes, world.digest())
        }

        prop_assert_eq!(run_once(&ops), run_once(&ops));
    }

    /// Recording into several buffers and appending them in order is
    /// indistinguishable from recording into one buffer.
    #[test]
    fn split_and_append_matches_single_buffer(
        ops in prop::collection::vec(cmd_op_strategy(), 1..30),
        chunk in 1..8usize,
    ) {
        let (mut single_world, entities, template) = setup_world_and_entities();
        build_commands(&ops, &entities, template).apply(&mut single_world);

        let (mut merged_world, entities, template) = setup_world_and_entities();
        let mut merged = CommandBuffer::new();
        for part in ops.chunks(chunk) {
            merged.append(build_commands(part, &entities, template));
        }
        prop_assert_eq!(merged.len(), build_commands(&ops, &entities, template).len());
        merged.apply(&mut merged_world);

        prop_assert_eq!(single_world.digest(), merged_world.digest());
    }

    /// Commands that target entities already destroyed in the same buffer
    /// fail (applied_successfully = false) rather than panicking.
    #[test]
    fn destroy_then_modify_is_graceful(hp_val in any::<u32>()) {
        let (mut world, entities, _) = setup_world_and_entities();
        let target = entities[0];

        let mut buf = CommandBuffer::new();
        buf.destroy(target, SystemId(0), reason());
        buf.set(target, &Hp(hp_val), SystemId(0), reason());
        buf.add(target, &Burning, SystemId(0), reason());

        let applied = buf.apply(&mut world);

        prop_assert!(applied[0].applied_successfully);
        prop_assert!(!applied[1].applied_successfully);
        prop_assert!(!applied[2].applied_successfully);
        prop_assert!(!world.is_alive(target));
    }

    /// The buffer is empty after apply, and command indices restart for the
    /// next batch.
    #[test]
    fn buffer_resets_after_apply(batch1 in 1..10usize, batch2 in 1..10usize) {
        let (mut world, entities, _) = setup_world_and_entities();

        let mut buf = CommandBuffer::new();
        for i in 0..batch1 {
            buf.set(entities[i % entities.len()], &Hp(i as u32), SystemId(0), reason());
        }
        prop_assert_eq!(buf.apply(&mut world).len(), batch1);
        prop_assert!(buf.is_empty());

        for i in 0..batch2 {
            buf.set(entities[i % entities.len()], &Hp(i as u32 + 100), SystemId(0), reason());
        }
        let applied = buf.apply(&mut world);
        prop_assert_eq!(applied.len(), batch2);
        for (i, cmd) in applied.iter().enumerate() {
            prop_assert_eq!(cmd.command_index, i as u32);
        }
    }
}
