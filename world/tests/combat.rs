use std::time::Duration;

use immune_defence_core::{
    Command, DefenderRef, EnemyId, EnemyKind, EnemyState, EnemyTarget, EntityRef, Event,
    GameOverReason, Health, OrganState, PlacementError, ProjectileRelease, Shooter,
    SimulationConfig, TowerId, TowerKind, WorldPoint,
};
use immune_defence_world::{self as world, query, World};

fn config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.level.tower_unlocks.clear();
    config.level.starting_resources = 1000;
    config
}

fn run(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn tick(world: &mut World, now_ms: u64, dt_ms: u64) -> Vec<Event> {
    run(
        world,
        Command::Tick {
            now: Duration::from_millis(now_ms),
            dt: Duration::from_millis(dt_ms),
        },
    )
}

fn spawn(world: &mut World, x: f32, y: f32) -> EnemyId {
    let events = run(
        world,
        Command::SpawnEnemy {
            kind: EnemyKind::CommonBacteria,
            anchor: WorldPoint::new(x, y),
        },
    );
    events
        .iter()
        .find_map(|event| match event {
            Event::EnemySpawned { enemy, .. } => Some(*enemy),
            _ => None,
        })
        .expect("enemy spawned")
}

fn place_b_cell(world: &mut World, x: f32, y: f32) -> TowerId {
    let events = run(
        world,
        Command::PlaceTower {
            kind: TowerKind::BCell,
            position: WorldPoint::new(x, y),
        },
    );
    events
        .iter()
        .find_map(|event| match event {
            Event::TowerPlaced { tower, .. } => Some(*tower),
            _ => None,
        })
        .expect("tower placed")
}

fn fired(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::ProjectileFired { .. }))
        .count()
}

#[test]
fn tower_respects_fire_rate() {
    let mut world = World::new(config(), None, 1);
    let _ = tick(&mut world, 0, 0);
    let tower = place_b_cell(&mut world, 400.0, 500.0);
    let enemy = spawn(&mut world, 600.0, 500.0);
    let _ = run(&mut world, Command::LockTarget { tower, enemy });

    let shooter = Shooter::Tower(tower);
    assert_eq!(fired(&run(&mut world, Command::Fire { shooter })), 1);

    let _ = tick(&mut world, 300, 300);
    assert_eq!(fired(&run(&mut world, Command::Fire { shooter })), 0);

    let _ = tick(&mut world, 650, 350);
    assert_eq!(fired(&run(&mut world, Command::Fire { shooter })), 1);
}

#[test]
fn defeated_enemy_is_removed_in_two_phases() {
    let mut config = config();
    config.units.enemies.common_bacteria.health = 30;
    let mut world = World::new(config, None, 1);
    let _ = tick(&mut world, 0, 0);
    let tower = place_b_cell(&mut world, 400.0, 500.0);
    let enemy = spawn(&mut world, 600.0, 500.0);
    let _ = run(&mut world, Command::LockTarget { tower, enemy });
    let _ = run(
        &mut world,
        Command::Fire {
            shooter: Shooter::Tower(tower),
        },
    );

    let mut events = Vec::new();
    for step in 1..=3 {
        events.extend(tick(&mut world, step * 100, 100));
        events.extend(run(&mut world, Command::ResolveProjectiles));
    }

    assert!(events.contains(&Event::EnemyDefeated { enemy, reward: 5 }));
    assert!(events.contains(&Event::TargetReleased { tower, enemy }));
    assert!(!query::is_alive(&world, EntityRef::Enemy(enemy)));
    assert_eq!(query::tower_target(&world, tower), None);
    let snapshot = query::enemy_view(&world).get(enemy).copied();
    assert_eq!(snapshot.map(|enemy| enemy.state), Some(EnemyState::Dying));
    assert!(query::due_removals(&world).is_empty());
    assert!(query::verify_invariants(&world).is_ok());

    let _ = tick(&mut world, 1000, 700);
    assert_eq!(query::due_removals(&world), vec![EntityRef::Enemy(enemy)]);
    let events = run(
        &mut world,
        Command::FinalizeRemoval {
            entity: EntityRef::Enemy(enemy),
        },
    );
    assert_eq!(
        events,
        vec![Event::EntityRemoved {
            entity: EntityRef::Enemy(enemy)
        }]
    );
    assert_eq!(query::health(&world, EntityRef::Enemy(enemy)), None);
}

#[test]
fn exhausted_pool_fizzles_without_consuming_cooldown() {
    let mut config = config();
    config.combat.pool_capacity = 1;
    let mut world = World::new(config, None, 1);
    let _ = tick(&mut world, 0, 0);
    let first = place_b_cell(&mut world, 400.0, 400.0);
    let second = place_b_cell(&mut world, 400.0, 600.0);
    let enemy = spawn(&mut world, 600.0, 500.0);
    let _ = run(&mut world, Command::LockTarget { tower: first, enemy });
    let _ = run(&mut world, Command::LockTarget { tower: second, enemy });

    let _ = run(
        &mut world,
        Command::Fire {
            shooter: Shooter::Tower(first),
        },
    );
    let events = run(
        &mut world,
        Command::Fire {
            shooter: Shooter::Tower(second),
        },
    );

    assert_eq!(
        events,
        vec![Event::ShotFizzled {
            shooter: Shooter::Tower(second)
        }]
    );
    let towers = query::tower_view(&world);
    let fire = towers.get(second).map(|tower| tower.fire.next_fire_at());
    assert_eq!(fire, Some(None));
    let pool = query::pool_stats(&world);
    assert_eq!((pool.active, pool.idle, pool.allocated), (1, 0, 1));
}

#[test]
fn enemy_projectile_damages_organ() {
    let mut world = World::new(config(), None, 1);
    let _ = tick(&mut world, 0, 0);
    let enemy = spawn(&mut world, 1100.0, 540.0);
    let target = EnemyTarget::Defender(DefenderRef::Organ);
    let events = run(&mut world, Command::EngageTarget { enemy, target });
    assert_eq!(events, vec![Event::EngagementStarted { enemy, target }]);

    let events = run(
        &mut world,
        Command::Fire {
            shooter: Shooter::Enemy(enemy),
        },
    );
    assert_eq!(fired(&events), 1);

    let mut events = Vec::new();
    for step in 1..=5 {
        events.extend(tick(&mut world, step * 100, 100));
        events.extend(run(&mut world, Command::ResolveProjectiles));
    }

    assert!(events.iter().any(|event| matches!(
        event,
        Event::ProjectileReleased {
            reason: ProjectileRelease::Hit,
            ..
        }
    )));
    assert_eq!(query::organ(&world).health, Health::new(35));
    assert_eq!(query::pool_stats(&world).active, 0);
}

#[test]
fn destroyed_organ_redirects_attackers_to_the_boundary() {
    let mut config = config();
    config.units.organ.base_health = 10;
    let mut world = World::new(config, None, 1);
    let _ = tick(&mut world, 0, 0);
    let enemy = spawn(&mut world, 1100.0, 540.0);
    let _ = run(
        &mut world,
        Command::EngageTarget {
            enemy,
            target: EnemyTarget::Defender(DefenderRef::Organ),
        },
    );
    let _ = run(
        &mut world,
        Command::Fire {
            shooter: Shooter::Enemy(enemy),
        },
    );

    let mut events = Vec::new();
    for step in 1..=5 {
        events.extend(tick(&mut world, step * 100, 100));
        events.extend(run(&mut world, Command::ResolveProjectiles));
    }

    assert!(events.contains(&Event::OrganDestroyed));
    assert_eq!(query::organ(&world).state, OrganState::Destroyed);
    assert_eq!(query::enemy_target(&world, enemy), None);
    assert!(query::verify_invariants(&world).is_ok());

    let events = run(
        &mut world,
        Command::EngageTarget {
            enemy,
            target: EnemyTarget::BoundaryLine,
        },
    );
    assert!(events.contains(&Event::EngagementStarted {
        enemy,
        target: EnemyTarget::BoundaryLine,
    }));
}

#[test]
fn enemy_at_the_goal_line_drains_player_health() {
    let mut config = config();
    config.level.player_health = 15;
    let mut world = World::new(config, None, 1);
    let _ = tick(&mut world, 0, 0);
    let enemy = spawn(&mut world, 1435.0, 200.0);

    let events = run(&mut world, Command::AdvanceEnemies);
    assert!(events.contains(&Event::EnemyReachedGoal { enemy, reward: 5 }));
    assert_eq!(
        query::enemy_target(&world, enemy),
        Some(EnemyTarget::BoundaryLine)
    );

    let events = run(
        &mut world,
        Command::Fire {
            shooter: Shooter::Enemy(enemy),
        },
    );
    assert!(events.contains(&Event::PlayerHealthChanged {
        health: Health::new(0)
    }));
    assert!(events.contains(&Event::GameOver {
        reason: GameOverReason::HealthDepleted
    }));
    assert!(query::is_game_over(&world));

    let events = run(
        &mut world,
        Command::PlaceTower {
            kind: TowerKind::BCell,
            position: WorldPoint::new(400.0, 400.0),
        },
    );
    assert!(matches!(
        events.as_slice(),
        [Event::TowerPlacementRejected {
            reason: PlacementError::GameOver,
            ..
        }]
    ));
}

#[test]
fn sneeze_knocks_back_and_respects_cooldown() {
    let mut world = World::new(config(), None, 1);
    let _ = tick(&mut world, 0, 0);
    let enemy = spawn(&mut world, 600.0, 500.0);
    let _ = run(
        &mut world,
        Command::EngageTarget {
            enemy,
            target: EnemyTarget::Defender(DefenderRef::Organ),
        },
    );

    let events = run(&mut world, Command::UseSneeze);
    assert!(events.contains(&Event::SneezeUsed { enemies_hit: 1 }));
    assert_eq!(query::enemy_target(&world, enemy), None);
    let snapshot = query::enemy_view(&world).get(enemy).copied().expect("enemy");
    assert_eq!(snapshot.health, Health::new(30));
    assert!(snapshot.velocity.dx() < 0.0);
    assert!(snapshot.knockback_until.is_some());

    let events = run(&mut world, Command::UseSneeze);
    assert!(events.is_empty());

    let _ = tick(&mut world, 500, 500);
    let snapshot = query::enemy_view(&world).get(enemy).copied().expect("enemy");
    assert_eq!(snapshot.knockback_until, None);
    assert_eq!(snapshot.velocity.dx(), 0.0);
}
