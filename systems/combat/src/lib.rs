#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that emits fire commands for towers and enemies whose weapons
//! are ready and whose primary target is within attack range.

use std::time::Duration;

use immune_defence_core::{
    Bounds, Command, EnemySnapshot, EnemyState, EnemyView, Shooter, TowerSnapshot, TowerView,
};

/// Combat system that queues firing commands for ready shooters.
#[derive(Debug)]
pub struct Combat {
    visible: Bounds,
    scratch: Vec<Command>,
}

impl Combat {
    /// Creates a combat system; towers hold fire unless an enemy is inside
    /// `visible`.
    #[must_use]
    pub fn new(visible: Bounds) -> Self {
        Self {
            visible,
            scratch: Vec::new(),
        }
    }

    /// Emits `Command::Fire` entries for every shooter ready at `now`.
    pub fn handle(
        &mut self,
        now: Duration,
        towers: &TowerView,
        enemies: &EnemyView,
        out: &mut Vec<Command>,
    ) {
        self.scratch.clear();

        let enemies_visible = enemies
            .iter()
            .any(|enemy| enemy.is_active() && self.visible.contains(enemy.position));
        if enemies_visible {
            for tower in towers.iter() {
                if tower_ready(now, tower, enemies) {
                    self.scratch.push(Command::Fire {
                        shooter: Shooter::Tower(tower.id),
                    });
                }
            }
        }

        for enemy in enemies.iter() {
            if enemy_ready(now, enemy) {
                self.scratch.push(Command::Fire {
                    shooter: Shooter::Enemy(enemy.id),
                });
            }
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }
}

fn tower_ready(now: Duration, tower: &TowerSnapshot, enemies: &EnemyView) -> bool {
    if !tower.is_active() || !tower.fire.is_ready(now) {
        return false;
    }
    tower
        .target
        .and_then(|target| enemies.get(target))
        .is_some_and(|enemy| {
            enemy.is_active() && tower.position.distance(enemy.position) <= tower.attack_range
        })
}

fn enemy_ready(now: Duration, enemy: &EnemySnapshot) -> bool {
    enemy.state == EnemyState::Attacking
        && enemy.knockback_until.is_none()
        && enemy.target.is_some()
        && enemy.fire.is_ready(now)
}
