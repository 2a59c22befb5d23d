#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system responsible for emitting enemy spawn commands.
//!
//! The opening burst releases a fixed number of enemies at regular spacing.
//! Each wave behaves like a repeating timer started with the level: it fires
//! every interval and spawns only while the elapsed time lies inside the
//! wave's window.

use std::time::Duration;

use immune_defence_core::{
    ArenaConfig, Command, EnemyKind, Event, InitialEnemies, LevelConfig, WaveConfig, WorldPoint,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Debug)]
pub struct Config {
    initial: InitialEnemies,
    waves: Vec<WaveConfig>,
    spawn_x: f32,
    min_y: f32,
    max_y: f32,
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration from the level pacing and the arena's spawn edge.
    #[must_use]
    pub fn new(level: &LevelConfig, arena: &ArenaConfig, rng_seed: u64) -> Self {
        let min_y = arena.spawn_margin.min(arena.height);
        let max_y = (arena.height - arena.spawn_margin).max(min_y);
        Self {
            initial: level.initial_enemies.clone(),
            waves: level.waves.clone(),
            spawn_x: arena.spawn_x,
            min_y,
            max_y,
            rng_seed,
        }
    }
}

#[derive(Debug)]
struct WaveTimer {
    wave: WaveConfig,
    fired: u64,
}

impl WaveTimer {
    fn is_finished(&self) -> bool {
        self.wave.interval().is_zero() || self.next_fire_at() > self.wave.end()
    }

    fn next_fire_at(&self) -> Duration {
        self.wave.interval().saturating_mul((self.fired + 1) as u32)
    }
}

/// Pure system that deterministically emits spawn commands as time advances.
#[derive(Debug)]
pub struct Spawning {
    initial: InitialEnemies,
    initial_released: u32,
    waves: Vec<WaveTimer>,
    spawn_x: f32,
    min_y: f32,
    max_y: f32,
    rng: ChaCha8Rng,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            initial: config.initial,
            initial_released: 0,
            waves: config
                .waves
                .into_iter()
                .map(|wave| WaveTimer { wave, fired: 0 })
                .collect(),
            spawn_x: config.spawn_x,
            min_y: config.min_y,
            max_y: config.max_y,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Consumes events to emit spawn commands for every release that fell due.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        let Some(now) = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { now, .. } => Some(*now),
                _ => None,
            })
            .max()
        else {
            return;
        };

        if events
            .iter()
            .any(|event| matches!(event, Event::GameOver { .. }))
        {
            return;
        }

        self.release_initial(now, out);
        self.release_waves(now, out);
    }

    /// Reports whether no further spawn will ever be emitted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.initial_released >= self.initial.count
            && self.waves.iter().all(WaveTimer::is_finished)
    }

    fn release_initial(&mut self, now: Duration, out: &mut Vec<Command>) {
        while self.initial_released < self.initial.count {
            let due = self.initial.spacing().saturating_mul(self.initial_released);
            if due > now {
                break;
            }
            self.initial_released += 1;
            let command = self.spawn_command(self.initial.kind);
            out.push(command);
        }
    }

    fn release_waves(&mut self, now: Duration, out: &mut Vec<Command>) {
        let mut due = Vec::new();
        for timer in &mut self.waves {
            while !timer.is_finished() && timer.next_fire_at() <= now {
                let fire_at = timer.next_fire_at();
                timer.fired += 1;
                if fire_at >= timer.wave.start() {
                    due.push(timer.wave.kind);
                }
            }
        }

        for kind in due {
            let command = self.spawn_command(kind);
            out.push(command);
        }
    }

    fn spawn_command(&mut self, kind: EnemyKind) -> Command {
        let y = if self.max_y > self.min_y {
            self.rng.gen_range(self.min_y..=self.max_y)
        } else {
            self.min_y
        };
        Command::SpawnEnemy {
            kind,
            anchor: WorldPoint::new(self.spawn_x, y),
        }
    }
}
