//! Small particle world used to exercise the live console.
//!
//! [`Simulation`] owns a `bevy_ecs` world and a fixed schedule. The console
//! commands in [`commands`] inspect and mutate it through the console's
//! single consumer, so they never race the schedule.

pub mod commands;
mod components;
mod resources;
pub mod script;
mod systems;

use std::fmt;
use std::mem;

use bevy_ecs::prelude::*;
use console_core::{Callbacks, Console, ConsoleConfig, Inspect, RegistrationError};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use components::{Frozen, Mass, Position, Velocity};
pub use resources::{Tick, WorldBounds};
pub use script::TinyScript;

/// Most particles a single command may spawn.
pub const MAX_SPAWN_BATCH: usize = 100_000;
/// Most ticks a single command may advance.
pub const MAX_STEP_BATCH: u64 = 100_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("cannot spawn {requested} particles at once (limit {MAX_SPAWN_BATCH})")]
    SpawnLimit { requested: usize },
    #[error("cannot advance {requested} ticks at once (limit {MAX_STEP_BATCH})")]
    StepLimit { requested: u64 },
}

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub seed: u64,
    /// Particles spawned at construction.
    pub particles: usize,
    pub bounds: WorldBounds,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: 7,
            particles: 0,
            bounds: WorldBounds::default(),
        }
    }
}

pub struct Simulation {
    world: World,
    schedule: Schedule,
    rng: SmallRng,
    paused: bool,
    stopped: bool,
}

impl Simulation {
    pub fn new(settings: SimulationSettings) -> Self {
        let mut world = World::new();
        world.insert_resource(Tick::default());
        world.insert_resource(settings.bounds);

        let mut simulation = Self {
            world,
            schedule: build_schedule(),
            rng: SmallRng::seed_from_u64(settings.seed),
            paused: false,
            stopped: false,
        };
        for _ in 0..settings.particles {
            simulation.spawn_one(false);
        }
        simulation
    }

    /// Run the schedule once.
    pub fn step(&mut self) {
        self.schedule.run(&mut self.world);
    }

    /// Run the schedule `ticks` times. Returns the tick reached.
    pub fn advance(&mut self, ticks: u64) -> Result<u64, SimulationError> {
        if ticks > MAX_STEP_BATCH {
            return Err(SimulationError::StepLimit { requested: ticks });
        }
        for _ in 0..ticks {
            self.step();
        }
        Ok(self.tick())
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<Tick>().0
    }

    /// Spawn `count` particles at random positions. Frozen particles get no
    /// mass and never move.
    pub fn spawn_particles(
        &mut self,
        count: usize,
        frozen: bool,
    ) -> Result<Vec<Entity>, SimulationError> {
        if count > MAX_SPAWN_BATCH {
            return Err(SimulationError::SpawnLimit { requested: count });
        }
        Ok((0..count).map(|_| self.spawn_one(frozen)).collect())
    }

    fn spawn_one(&mut self, frozen: bool) -> Entity {
        let bounds = *self.world.resource::<WorldBounds>();
        let position = Position {
            x: self.rng.gen_range(0.0..bounds.width),
            y: self.rng.gen_range(0.0..bounds.height),
        };
        let velocity = Velocity {
            dx: self.rng.gen_range(-1.0..1.0),
            dy: self.rng.gen_range(-1.0..1.0),
        };
        if frozen {
            self.world.spawn((position, velocity, Frozen)).id()
        } else {
            let mass = Mass(self.rng.gen_range(0.5..2.0));
            self.world.spawn((position, velocity, mass)).id()
        }
    }

    /// Remove every particle. Returns how many were despawned.
    pub fn despawn_particles(&mut self) -> usize {
        let particles: Vec<Entity> = self
            .world
            .query_filtered::<Entity, With<Position>>()
            .iter(&self.world)
            .collect();
        for entity in &particles {
            self.world.despawn(*entity);
        }
        particles.len()
    }

    /// Bytes reserved by the world's table storage, live or not.
    pub fn table_memory(&self) -> usize {
        self.world
            .storages()
            .tables
            .iter()
            .map(|table| {
                let row: usize = table.iter().map(|column| column.item_layout().size()).sum();
                table.entity_capacity() * (row + mem::size_of::<Entity>())
            })
            .sum()
    }

    /// Rebuild the world so its storage holds only the live particles.
    /// Resources and particle order are kept; entity ids are reassigned.
    pub fn compact(&mut self) {
        let mut particles = self
            .world
            .query::<(Entity, &Position, &Velocity, Option<&Mass>, Has<Frozen>)>()
            .iter(&self.world)
            .map(|(entity, position, velocity, mass, frozen)| {
                (entity, *position, *velocity, mass.copied(), frozen)
            })
            .collect::<Vec<_>>();
        particles.sort_by_key(|(entity, ..)| entity.index());

        let mut world = World::new();
        world.insert_resource(*self.world.resource::<Tick>());
        world.insert_resource(*self.world.resource::<WorldBounds>());
        for (_, position, velocity, mass, frozen) in particles {
            match (mass, frozen) {
                (Some(mass), false) => world.spawn((position, velocity, mass)),
                (Some(mass), true) => world.spawn((position, velocity, mass, Frozen)),
                (None, true) => world.spawn((position, velocity, Frozen)),
                (None, false) => world.spawn((position, velocity)),
            };
        }

        // Systems are bound to the world they first ran on.
        self.world = world;
        self.schedule = build_schedule();
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((systems::move_particles, systems::advance_tick).chain());
    schedule
}

/// Reported by `stats` and `stats-json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStats {
    pub tick: u64,
    pub entities: u32,
    pub archetypes: usize,
    pub components: usize,
    pub resources: usize,
    pub paused: bool,
}

impl fmt::Display for WorldStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} entities={} archetypes={} components={} resources={} paused={}",
            self.tick, self.entities, self.archetypes, self.components, self.resources, self.paused
        )
    }
}

impl Inspect for Simulation {
    type Stats = WorldStats;

    fn stats(&self) -> WorldStats {
        let world = &self.world;
        WorldStats {
            tick: self.tick(),
            entities: world.entities().len(),
            archetypes: world.archetypes().len(),
            components: commands::component_infos(world).count(),
            resources: commands::present_resources(world).count(),
            paused: self.paused,
        }
    }
}

/// Host hooks wiring `pause`, `resume` and `stop` to the simulation flags.
pub fn callbacks() -> Callbacks<Simulation> {
    Callbacks::<Simulation>::new()
        .on_pause(|simulation, _| simulation.pause())
        .on_resume(|simulation, _| simulation.resume())
        .on_stop(|simulation, _| simulation.stop())
        .ticks(Simulation::tick)
}

/// A console with the world commands and the script handler installed.
pub fn build_console(config: ConsoleConfig) -> Result<Console<Simulation>, RegistrationError> {
    let mut console = Console::new(config, callbacks());
    commands::register(&mut console)?;
    console.set_script_handler(TinyScript);
    Ok(console)
}
