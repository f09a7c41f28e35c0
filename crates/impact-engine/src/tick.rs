//! Fixed-timestep tick loop with a barrier after every pass.
//!
//! The [`TickLoop`] drives the pipeline forward. Each tick:
//!
//! 1. The oracle is synced with the registry.
//! 2. Each registered pass runs in registration order. A pass reads the
//!    [`World`] through a [`PassContext`] and records into the loop's
//!    [`CommandBuffer`].
//! 3. After every pass the buffer is applied (FIFO) and cleared, so the next
//!    pass reads committed state.
//! 4. The tick counter advances.
//!
//! # Example
//!
//! ```
//! use impact_engine::prelude::*;
//!
//! struct Blind;
//!
//! impl RayCastOracle for Blind {
//!     fn cast(&self, _: Vec3, _: Vec3, _: CollisionFilter) -> Option<RayHit> {
//!         None
//!     }
//! }
//!
//! let mut world = World::new();
//! register_components(&mut world);
//!
//! let mut tick_loop = TickLoop::damage_pipeline(world, Blind, TickConfig::default()).unwrap();
//! tick_loop.run_ticks(10);
//!
//! assert_eq!(tick_loop.tick_count(), 10);
//! assert_eq!(tick_loop.pass_names(), vec!["collision", "health", "cascade"]);
//! ```

use std::time::{Duration, Instant};

use impact_ecs::command::{ApplyReport, Command, CommandBuffer};
use impact_ecs::world::World;
use tracing::debug;

use crate::config::TickConfig;
use crate::oracle::RayCastOracle;
use crate::passes::{cascade, collision, health, PassContext};
use crate::EngineError;

pub const COLLISION_PASS: &str = "collision";
pub const HEALTH_PASS: &str = "health";
pub const CASCADE_PASS: &str = "cascade";

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Timing and outcome of one pass within a tick.
#[derive(Debug, Clone, Default)]
pub struct PassDiagnostics {
    pub name: String,
    /// Wall-clock time spent recording.
    pub record_time: Duration,
    /// Wall-clock time spent applying the buffer.
    pub apply_time: Duration,
    /// Commands recorded by the pass.
    pub commands: usize,
    pub report: ApplyReport,
}

/// Diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Per pass, in execution order.
    pub passes: Vec<PassDiagnostics>,
    /// Time spent syncing the oracle.
    pub sync_time: Duration,
    /// Total time for the tick.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// PassFn
// ---------------------------------------------------------------------------

/// A pass: reads through the context, writes only through the buffer.
pub type PassFn = fn(&PassContext<'_>, &mut CommandBuffer);

#[derive(Debug)]
struct RegisteredPass {
    name: String,
    func: PassFn,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The deterministic fixed-timestep tick loop.
///
/// Given the same initial world, the same passes and the same oracle answers,
/// every run produces the same world, whether or not the passes fan out to
/// worker threads.
pub struct TickLoop<O> {
    world: World,
    oracle: O,
    config: TickConfig,
    command_buffer: CommandBuffer,
    passes: Vec<RegisteredPass>,
    tick_counter: u64,
    last_diagnostics: TickDiagnostics,
}

impl<O: RayCastOracle> TickLoop<O> {
    /// Create a loop with no passes.
    pub fn new(world: World, oracle: O, config: TickConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            world,
            oracle,
            config,
            command_buffer: CommandBuffer::new(),
            passes: Vec::new(),
            tick_counter: 0,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    /// Create a loop running collision, health and cascade, in that order.
    pub fn damage_pipeline(world: World, oracle: O, config: TickConfig) -> Result<Self, EngineError> {
        let mut tick_loop = Self::new(world, oracle, config)?;
        tick_loop.add_pass(COLLISION_PASS, collision::run);
        tick_loop.add_pass(HEALTH_PASS, health::run);
        tick_loop.add_pass(CASCADE_PASS, cascade::run);
        Ok(tick_loop)
    }

    /// Register a pass to run after those already registered.
    ///
    /// # Panics
    ///
    /// Panics if a pass with the same name is already registered.
    pub fn add_pass(&mut self, name: &str, func: PassFn) {
        assert!(
            !self.passes.iter().any(|p| p.name == name),
            "duplicate pass name: {name:?}"
        );
        self.passes.push(RegisteredPass {
            name: name.to_owned(),
            func,
        });
    }

    /// Execute one tick.
    ///
    /// Returns every command processed this tick, in application order. Check
    /// [`Command::applied_successfully`] to tell real mutations from skipped
    /// ones.
    pub fn tick(&mut self) -> Vec<Command> {
        let tick_start = Instant::now();

        let sync_start = Instant::now();
        self.oracle.sync(&self.world);
        let sync_time = sync_start.elapsed();

        let mut processed = Vec::new();
        let mut pass_diagnostics = Vec::with_capacity(self.passes.len());

        for pass in &self.passes {
            let record_start = Instant::now();
            let ctx = PassContext::new(&self.world, &self.oracle, &self.config.pipeline);
            (pass.func)(&ctx, &mut self.command_buffer);
            let record_time = record_start.elapsed();
            let commands = self.command_buffer.len();

            // Barrier.
            let apply_start = Instant::now();
            let applied = self.command_buffer.apply(&mut self.world);
            let apply_time = apply_start.elapsed();

            let report = *self.command_buffer.last_apply_report();
            debug!(
                tick = self.tick_counter,
                pass = %pass.name,
                commands,
                failed = report.failed_count,
                conflicts = report.conflict_count,
                "pass applied"
            );
            pass_diagnostics.push(PassDiagnostics {
                name: pass.name.clone(),
                record_time,
                apply_time,
                commands,
                report,
            });
            processed.extend(applied);
        }

        self.tick_counter += 1;
        self.last_diagnostics = TickDiagnostics {
            passes: pass_diagnostics,
            sync_time,
            total_time: tick_start.elapsed(),
        };
        processed
    }

    /// Run `count` ticks. Returns the number of commands processed.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        let mut total_commands = 0u64;
        for _ in 0..count {
            total_commands += self.tick().len() as u64;
        }
        total_commands
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// `tick_count * fixed_dt`, computed rather than accumulated.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access, for setup and tests. Passes must go through the
    /// buffer.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
