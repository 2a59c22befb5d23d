#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! In-process host API for one Immune Defence level.
//!
//! [`Simulation`] owns the world and every system and advances them in a
//! fixed order per tick:
//!
//! 1. clock, economy and spawning
//! 2. tower target evaluation
//! 3. enemy target selection
//! 4. steering and movement
//! 5. fire resolution
//! 6. projectile flight and hits, with the death cascade applied immediately
//! 7. final removal of entities whose destruction delay elapsed
//!
//! Every event the world emits is queued in order for the host to drain.

use std::time::Duration;

use immune_defence_core::{
    ActionError, Command, EnemyId, EnemyKind, EnemyTarget, EntityRef, Event, Health,
    PlacementError, ProgressStore, SimulationConfig, SpawnError, TowerId, TowerKind, WorldPoint,
};
use immune_defence_system_combat::Combat;
use immune_defence_system_enemy_targeting::EnemyTargeting;
use immune_defence_system_movement::Movement;
use immune_defence_system_spawning::{Config as SpawningConfig, Spawning};
use immune_defence_system_tower_targeting::TowerTargeting;
use immune_defence_world::{
    self as world,
    query::{self, InvariantViolation},
    ObstacleMask, World,
};

const SPAWNING_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// One running level: the world, its systems and the outbound event queue.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    spawning: Spawning,
    tower_targeting: TowerTargeting,
    enemy_targeting: EnemyTargeting,
    movement: Movement,
    combat: Combat,
    level_id: String,
    next_level: Option<String>,
    level_completed: bool,
    outbox: Vec<Event>,
    since_last_tick: Vec<Event>,
    carried: usize,
    tick_events: Vec<Event>,
    commands: Vec<Command>,
}

impl Simulation {
    /// Builds a level from `config`, an optional obstacle mask and a seed that
    /// drives every random draw.
    #[must_use]
    pub fn new(config: SimulationConfig, mask: Option<ObstacleMask>, seed: u64) -> Self {
        let arena_bounds = config.arena.bounds();
        let spawning = Spawning::new(SpawningConfig::new(
            &config.level,
            &config.arena,
            seed ^ SPAWNING_SEED_SALT,
        ));
        let tower_targeting = TowerTargeting::new(config.targeting.clone(), arena_bounds);
        let enemy_targeting = EnemyTargeting::new(config.targeting.clone());
        let movement = Movement::new(config.steering.clone(), config.arena.boundary_x());
        let combat = Combat::new(arena_bounds.expanded(config.combat.offscreen_margin));
        let level_id = config.level.id.clone();
        let next_level = config.level.next_level.clone();

        log::info!("starting level {level_id}");

        Self {
            world: World::new(config, mask, seed),
            spawning,
            tower_targeting,
            enemy_targeting,
            movement,
            combat,
            level_id,
            next_level,
            level_completed: false,
            outbox: Vec::new(),
            since_last_tick: Vec::new(),
            carried: 0,
            tick_events: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Read-only access to the world for queries.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Spawns an enemy near `anchor`, returning its id.
    pub fn spawn_enemy(
        &mut self,
        kind: EnemyKind,
        anchor: WorldPoint,
    ) -> Result<EnemyId, SpawnError> {
        let events = self.submit(Command::SpawnEnemy { kind, anchor });
        events
            .iter()
            .find_map(|event| match event {
                Event::EnemySpawned { enemy, .. } => Some(Ok(*enemy)),
                Event::EnemySpawnRejected { reason, .. } => Some(Err(*reason)),
                _ => None,
            })
            .unwrap_or(Err(SpawnError::NoValidPosition))
    }

    /// Places a tower deployment centred on `position`, returning every tower
    /// that was placed.
    pub fn place_tower(
        &mut self,
        kind: TowerKind,
        position: WorldPoint,
    ) -> Result<Vec<TowerId>, PlacementError> {
        let events = self.submit(Command::PlaceTower { kind, position });
        if let Some(reason) = events.iter().find_map(|event| match event {
            Event::TowerPlacementRejected { reason, .. } => Some(*reason),
            _ => None,
        }) {
            return Err(reason);
        }

        let towers: Vec<TowerId> = events
            .iter()
            .filter_map(|event| match event {
                Event::TowerPlaced { tower, .. } => Some(*tower),
                _ => None,
            })
            .collect();
        if towers.is_empty() {
            return Err(PlacementError::Blocked);
        }
        Ok(towers)
    }

    /// Upgrades the organ, returning its new level.
    pub fn upgrade_organ(&mut self) -> Result<u32, ActionError> {
        query::upgrade_readiness(&self.world)?;
        let _ = self.submit(Command::UpgradeOrgan);
        Ok(query::organ(&self.world).level)
    }

    /// Triggers the sneeze skill, returning how many enemies it struck.
    pub fn use_sneeze(&mut self) -> Result<usize, ActionError> {
        query::sneeze_readiness(&self.world)?;
        let events = self.submit(Command::UseSneeze);
        Ok(events
            .iter()
            .find_map(|event| match event {
                Event::SneezeUsed { enemies_hit } => Some(*enemies_hit),
                _ => None,
            })
            .unwrap_or(0))
    }

    /// Advances the whole level by one frame.
    pub fn tick(&mut self, now: Duration, dt: Duration) {
        // Host actions since the previous tick were already queued for the
        // host; systems still need to see them.
        self.tick_events.clear();
        self.carried = self.since_last_tick.len();
        self.tick_events.append(&mut self.since_last_tick);

        self.run(Command::Tick { now, dt });
        if query::is_game_over(&self.world) {
            self.flush();
            return;
        }

        self.commands.clear();
        self.spawning.handle(&self.tick_events, &mut self.commands);
        self.run_commands();

        self.tower_targeting.handle(
            now,
            &query::tower_view(&self.world),
            &query::enemy_view(&self.world),
            &mut self.commands,
        );
        self.run_commands();

        self.enemy_targeting.handle(
            now,
            &self.tick_events,
            &query::tower_view(&self.world),
            &query::enemy_view(&self.world),
            &query::organ(&self.world),
            &mut self.commands,
        );
        self.run_commands();

        self.movement.handle(
            query::walkability(&self.world),
            &query::enemy_view(&self.world),
            &query::tower_view(&self.world),
            &query::organ(&self.world),
            &mut self.commands,
        );
        self.run_commands();

        self.combat.handle(
            now,
            &query::tower_view(&self.world),
            &query::enemy_view(&self.world),
            &mut self.commands,
        );
        self.run_commands();

        self.run(Command::ResolveProjectiles);

        self.commands.extend(
            query::due_removals(&self.world)
                .into_iter()
                .map(|entity| Command::FinalizeRemoval { entity }),
        );
        self.run_commands();

        self.check_completion();
        self.flush();
    }

    /// Takes every event emitted since the previous drain, in order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    /// Reports whether the entity exists and has not entered destruction.
    #[must_use]
    pub fn is_alive(&self, entity: EntityRef) -> bool {
        query::is_alive(&self.world, entity)
    }

    /// Health of the entity, if it is still present.
    #[must_use]
    pub fn health(&self, entity: EntityRef) -> Option<Health> {
        query::health(&self.world, entity)
    }

    /// Enemy currently locked by the tower.
    #[must_use]
    pub fn tower_target(&self, tower: TowerId) -> Option<EnemyId> {
        query::tower_target(&self.world, tower)
    }

    /// Target currently claimed by the enemy.
    #[must_use]
    pub fn enemy_target(&self, enemy: EnemyId) -> Option<EnemyTarget> {
        query::enemy_target(&self.world, enemy)
    }

    /// Reports whether the level ended in defeat.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        query::is_game_over(&self.world)
    }

    /// Reports whether the level was won.
    #[must_use]
    pub fn is_level_completed(&self) -> bool {
        self.level_completed
    }

    /// Checks the structural invariants of the world.
    pub fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        query::verify_invariants(&self.world)
    }

    /// Records a completed level in `store`, returning whether progress
    /// changed.
    pub fn record_outcome<S: ProgressStore>(&self, store: &mut S) -> Result<bool, S::Error> {
        if !self.level_completed {
            return Ok(false);
        }

        let mut progress = store.load_progress()?;
        let changed = progress.record_completion(&self.level_id, self.next_level.as_deref());
        if changed {
            store.save_progress(&progress)?;
            log::info!("saved progress after completing {}", self.level_id);
        }
        Ok(changed)
    }

    fn submit(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        self.outbox.extend(events.iter().cloned());
        self.since_last_tick.extend(events.iter().cloned());
        events
    }

    fn run(&mut self, command: Command) {
        world::apply(&mut self.world, command, &mut self.tick_events);
    }

    fn run_commands(&mut self) {
        for command in self.commands.drain(..) {
            world::apply(&mut self.world, command, &mut self.tick_events);
        }
    }

    fn check_completion(&mut self) {
        if self.level_completed
            || query::is_game_over(&self.world)
            || !self.spawning.is_exhausted()
            || query::enemy_count(&self.world) > 0
        {
            return;
        }

        self.level_completed = true;
        log::info!("level {} completed", self.level_id);
        self.tick_events.push(Event::LevelCompleted);
    }

    fn flush(&mut self) {
        let fresh = self.carried.min(self.tick_events.len());
        self.outbox.extend(self.tick_events.drain(fresh..));
        self.tick_events.clear();
        self.carried = 0;
    }
}
