#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs an Immune Defence level headlessly.

mod plan;
mod progress_file;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use immune_defence_core::{Event, GameOverReason};
use immune_defence_simulation::Simulation;
use immune_defence_world::{query, ObstacleMask};

use crate::{
    plan::{Scenario, TowerOrder},
    progress_file::TomlProgressFile,
};

/// Pixels of arena per obstacle-mask pixel for `--block` rectangles.
const MASK_SCALE: f32 = 10.0;

#[derive(Debug, Parser)]
#[command(name = "immune-defence", about = "Run an Immune Defence level headlessly")]
struct Args {
    /// Scenario TOML holding `[simulation]` overrides and `[[towers]]` orders.
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// Seed for every random draw in the level.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Longest stretch of simulated time to run, in seconds.
    #[arg(long, default_value_t = 180)]
    seconds: u64,
    /// Simulated milliseconds per tick.
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,
    /// Extra tower orders, `KIND@X,Y[@SECS]`.
    #[arg(long = "tower")]
    towers: Vec<TowerOrder>,
    /// Solid rectangles in arena units, `X0,Y0,X1,Y1`.
    #[arg(long = "block", value_parser = parse_rect)]
    blocks: Vec<[f32; 4]>,
    /// Upgrade the organ whenever it is affordable.
    #[arg(long)]
    auto_upgrade: bool,
    /// Sneeze whenever the skill is ready and enemies are on screen.
    #[arg(long)]
    auto_sneeze: bool,
    /// File recording completed and unlocked levels.
    #[arg(long, default_value = "progress.toml")]
    progress: PathBuf,
}

#[derive(Debug, Default)]
struct Tally {
    spawned: usize,
    defeated: usize,
    towers_placed: usize,
    towers_lost: usize,
    shots: usize,
    fizzled: usize,
    upgrades: usize,
    sneezes: usize,
}

impl Tally {
    fn record(&mut self, event: &Event) {
        match event {
            Event::EnemySpawned { .. } => self.spawned += 1,
            Event::EnemyDefeated { .. } => self.defeated += 1,
            Event::TowerPlaced { .. } => self.towers_placed += 1,
            Event::TowerDestroyed { .. } => self.towers_lost += 1,
            Event::ProjectileFired { .. } => self.shots += 1,
            Event::ShotFizzled { .. } => self.fizzled += 1,
            Event::OrganUpgraded { level, .. } => {
                self.upgrades += 1;
                log::info!("organ upgraded to level {level}");
            }
            Event::SneezeUsed { enemies_hit } => {
                self.sneezes += 1;
                log::info!("sneeze struck {enemies_hit} enemies");
            }
            Event::OrganDestroyed => log::warn!("the organ was destroyed"),
            Event::GameOver {
                reason: GameOverReason::HealthDepleted,
            } => log::warn!("player health depleted"),
            Event::TowerPlacementRejected { kind, reason, .. } => {
                log::warn!("{kind:?} placement rejected: {reason}");
            }
            _ => log::trace!("{event:?}"),
        }
    }
}

fn parse_rect(value: &str) -> Result<[f32; 4], String> {
    let numbers: Vec<f32> = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|error| format!("invalid rectangle `{value}`: {error}"))?;
    <[f32; 4]>::try_from(numbers).map_err(|_| format!("expected X0,Y0,X1,Y1, found `{value}`"))
}

fn obstacle_mask(width: f32, height: f32, blocks: &[[f32; 4]]) -> Result<Option<ObstacleMask>> {
    if blocks.is_empty() {
        return Ok(None);
    }

    let columns = (width / MASK_SCALE).ceil().max(1.0) as u32;
    let rows = (height / MASK_SCALE).ceil().max(1.0) as u32;
    let mut mask = ObstacleMask::open(columns, rows).context("failed to build obstacle mask")?;
    for [x0, y0, x1, y1] in blocks {
        let pixel = |value: f32| (value.max(0.0) / MASK_SCALE).round() as u32;
        mask.block_rect(pixel(*x0), pixel(*y0), pixel(*x1), pixel(*y1));
    }
    Ok(Some(mask))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.tick_ms == 0 {
        bail!("--tick-ms must be positive");
    }

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    let arena = &scenario.simulation.arena;
    let mask = obstacle_mask(arena.width, arena.height, &args.blocks)?;

    let mut orders: Vec<TowerOrder> = scenario.towers.iter().cloned().chain(args.towers).collect();
    orders.sort_by_key(TowerOrder::due);
    let mut orders = orders.into_iter().peekable();

    let mut simulation = Simulation::new(scenario.simulation, mask, args.seed);
    let mut tally = Tally::default();
    let dt = Duration::from_millis(args.tick_ms);
    let limit = Duration::from_secs(args.seconds);
    let mut now = Duration::ZERO;

    while now <= limit && !simulation.is_game_over() && !simulation.is_level_completed() {
        while let Some(order) = orders.next_if(|order| order.due() <= now) {
            match simulation.place_tower(order.kind, order.position()) {
                Ok(towers) => log::debug!("{:?} deployed as {towers:?}", order.kind),
                Err(reason) => log::debug!("{:?} order at {:?} failed: {reason}", order.kind, now),
            }
        }
        if args.auto_upgrade && simulation.upgrade_organ().is_ok() {
            log::debug!("auto-upgrade at {now:?}");
        }
        if args.auto_sneeze
            && query::enemies_visible(simulation.world())
            && simulation.use_sneeze().is_ok()
        {
            log::debug!("auto-sneeze at {now:?}");
        }

        simulation.tick(now, dt);
        for event in simulation.drain_events() {
            tally.record(&event);
        }
        now += dt;
    }

    let world = simulation.world();
    let outcome = if simulation.is_level_completed() {
        "completed"
    } else if simulation.is_game_over() {
        "defeated"
    } else {
        "timed out"
    };
    let pool = query::pool_stats(world);
    println!("outcome: {outcome} after {:.1}s", query::now(world).as_secs_f32());
    println!(
        "player health: {}, resources: {}, organ level: {}",
        query::player_health(world).get(),
        query::resources(world),
        query::organ(world).level
    );
    println!(
        "enemies: {} spawned, {} defeated, {} remaining",
        tally.spawned,
        tally.defeated,
        query::enemy_count(world)
    );
    println!(
        "towers: {} placed, {} lost; shots: {} fired, {} fizzled",
        tally.towers_placed, tally.towers_lost, tally.shots, tally.fizzled
    );
    println!(
        "projectile pool: {} allocated of {}, {} in flight; upgrades: {}, sneezes: {}",
        pool.allocated, pool.capacity, pool.active, tally.upgrades, tally.sneezes
    );

    let mut store = TomlProgressFile::new(args.progress);
    if simulation
        .record_outcome(&mut store)
        .with_context(|| format!("failed to record progress in {}", store.path().display()))?
    {
        println!("progress saved to {}", store.path().display());
    }

    Ok(())
}
