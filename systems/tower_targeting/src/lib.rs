#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that scores candidate enemies for every tower and emits lock
//! requests without exceeding the enemies' targeted-by slots.
//!
//! Each tower keeps a potential-target set fed by its detection radius. The
//! set is pruned lazily, only when the tower re-evaluates. Re-evaluation runs
//! on a fixed cadence that tightens while the current target sits beyond
//! attack range. The current target earns a lock-in bonus large enough that a
//! tower switches only when a challenger is decisively better.

use std::{collections::BTreeMap, time::Duration};

use immune_defence_core::{
    Bounds, Command, DefenderRef, EnemyId, EnemySnapshot, EnemyTarget, EnemyView,
    TargetingTuning, TowerId, TowerSnapshot, TowerView,
};

#[derive(Debug, Default)]
struct Tracker {
    potential: Vec<EnemyId>,
    last_evaluation: Option<Duration>,
    next_evaluation: Duration,
}

/// Tower targeting system that reuses scratch buffers to avoid repeated allocations.
#[derive(Debug)]
pub struct TowerTargeting {
    tuning: TargetingTuning,
    field: Bounds,
    trackers: BTreeMap<TowerId, Tracker>,
    claim_delta: BTreeMap<EnemyId, i64>,
    stale: Vec<TowerId>,
}

impl TowerTargeting {
    /// Creates a targeting system whose towers ignore enemies outside `field`.
    #[must_use]
    pub fn new(tuning: TargetingTuning, field: Bounds) -> Self {
        Self {
            tuning,
            field,
            trackers: BTreeMap::new(),
            claim_delta: BTreeMap::new(),
            stale: Vec::new(),
        }
    }

    /// Emits `LockTarget`/`ReleaseTarget` commands for the provided snapshot.
    pub fn handle(
        &mut self,
        now: Duration,
        towers: &TowerView,
        enemies: &EnemyView,
        out: &mut Vec<Command>,
    ) {
        self.forget_missing_towers(towers);
        self.claim_delta.clear();

        for tower in towers.iter().filter(|tower| tower.is_active()) {
            self.handle_tower(now, tower, enemies, out);
        }
    }

    /// Number of enemies the tower currently tracks as potential targets.
    #[must_use]
    pub fn potential_targets(&self, tower: TowerId) -> usize {
        self.trackers
            .get(&tower)
            .map_or(0, |tracker| tracker.potential.len())
    }

    fn forget_missing_towers(&mut self, towers: &TowerView) {
        self.stale.clear();
        self.stale.extend(
            self.trackers
                .keys()
                .copied()
                .filter(|id| !towers.get(*id).is_some_and(TowerSnapshot::is_active)),
        );
        for id in &self.stale {
            let _ = self.trackers.remove(id);
        }
    }

    fn handle_tower(
        &mut self,
        now: Duration,
        tower: &TowerSnapshot,
        enemies: &EnemyView,
        out: &mut Vec<Command>,
    ) {
        let field = self.field;
        let tracker = self.trackers.entry(tower.id).or_default();

        for enemy in enemies.iter() {
            if enemy.is_active()
                && within(tower, enemy, tower.detection_range)
                && !tracker.potential.contains(&enemy.id)
            {
                tracker.potential.push(enemy.id);
            }
        }

        let mut current = tower.target;
        if let Some(target) = current {
            let valid = enemies
                .get(target)
                .is_some_and(|enemy| is_valid(tower, enemy, field));
            if !valid {
                out.push(Command::ReleaseTarget { tower: tower.id });
                *self.claim_delta.entry(target).or_default() -= 1;
                current = None;
            }
        }

        let tracker = self.trackers.entry(tower.id).or_default();
        let beyond_reach = current
            .and_then(|target| enemies.get(target))
            .is_some_and(|enemy| !within(tower, enemy, tower.attack_range));
        if beyond_reach {
            if let Some(last) = tracker.last_evaluation {
                let fast = last + self.tuning.fast_evaluation_interval();
                tracker.next_evaluation = tracker.next_evaluation.min(fast);
            }
        }

        if current.is_some() && now < tracker.next_evaluation {
            return;
        }

        tracker
            .potential
            .retain(|id| enemies.get(*id).is_some_and(|enemy| is_valid(tower, enemy, field)));

        let mut best: Option<(f32, EnemyId)> = None;
        for id in &tracker.potential {
            let Some(enemy) = enemies.get(*id) else {
                continue;
            };
            let is_current = current == Some(enemy.id);
            if !is_current && !has_free_slot(enemy, &self.claim_delta) {
                continue;
            }
            let score = score(&self.tuning, tower, enemy, is_current);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, enemy.id));
            }
        }

        let chosen = best.map(|(_, id)| id);
        if let Some(target) = chosen {
            if current != Some(target) {
                log::trace!("{:?} prefers {target:?} over {current:?}", tower.id);
                out.push(Command::LockTarget {
                    tower: tower.id,
                    enemy: target,
                });
                *self.claim_delta.entry(target).or_default() += 1;
                if let Some(previous) = current {
                    *self.claim_delta.entry(previous).or_default() -= 1;
                }
            }
        }

        let fast = chosen
            .and_then(|target| enemies.get(target))
            .is_some_and(|enemy| !within(tower, enemy, tower.attack_range));
        let interval = if fast {
            self.tuning.fast_evaluation_interval()
        } else {
            self.tuning.evaluation_interval()
        };
        tracker.last_evaluation = Some(now);
        tracker.next_evaluation = now + interval;
    }
}

/// Desirability of `enemy` for `tower`; higher wins.
#[must_use]
pub fn score(
    tuning: &TargetingTuning,
    tower: &TowerSnapshot,
    enemy: &EnemySnapshot,
    is_current: bool,
) -> f32 {
    let distance = tower.position.distance(enemy.position);
    let mut score = tuning.base_score - tuning.distance_weight * distance;

    if distance <= tower.attack_range {
        score += tuning.in_range_bonus;
    } else if distance <= tower.attack_range * tuning.near_range_factor {
        score += tuning.near_range_bonus;
    }

    if is_current {
        score += tuning.stickiness_bonus + tuning.lock_in_bonus;
    }

    if enemy.target == Some(EnemyTarget::Defender(DefenderRef::Tower(tower.id))) {
        score += tuning.aggressor_bonus;
    }

    let other_lockers = enemy.locked_by.saturating_sub(u32::from(is_current));
    score + tuning.focus_fire_bonus * other_lockers as f32
}

fn within(tower: &TowerSnapshot, enemy: &EnemySnapshot, range: f32) -> bool {
    tower.position.distance_squared(enemy.position) <= range * range
}

fn is_valid(tower: &TowerSnapshot, enemy: &EnemySnapshot, field: Bounds) -> bool {
    enemy.is_active() && field.contains(enemy.position) && within(tower, enemy, tower.detection_range)
}

fn has_free_slot(enemy: &EnemySnapshot, claim_delta: &BTreeMap<EnemyId, i64>) -> bool {
    let delta = claim_delta.get(&enemy.id).copied().unwrap_or(0);
    i64::from(enemy.locked_by) + delta < i64::from(enemy.targeted_by_slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use immune_defence_core::{
        EnemyKind, EnemyState, FireControl, Health, TowerKind, TowerState, Velocity, WorldPoint,
    };

    fn tower(x: f32) -> TowerSnapshot {
        TowerSnapshot {
            id: TowerId::new(0),
            kind: TowerKind::BCell,
            position: WorldPoint::new(x, 500.0),
            state: TowerState::Seeking,
            health: Health::new(50),
            attack_range: 432.0,
            detection_range: 1440.0,
            attraction_slots: 3,
            attackers: 0,
            target: None,
            fire: FireControl::new(),
        }
    }

    fn enemy(id: u32, x: f32) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(id),
            kind: EnemyKind::CommonBacteria,
            position: WorldPoint::new(x, 500.0),
            velocity: Velocity::ZERO,
            state: EnemyState::Advancing,
            health: Health::new(60),
            speed: 11.52,
            attack_range: 216.0,
            targeted_by_slots: 3,
            locked_by: 0,
            target: None,
            fire: FireControl::new(),
            knockback_until: None,
        }
    }

    #[test]
    fn closer_enemies_score_higher() {
        let tuning = TargetingTuning::default();
        let tower = tower(0.0);
        let near = score(&tuning, &tower, &enemy(0, 100.0), false);
        let far = score(&tuning, &tower, &enemy(1, 300.0), false);
        assert!(near > far);
    }

    #[test]
    fn range_bands_add_bonuses() {
        let tuning = TargetingTuning::default();
        let tower = tower(0.0);
        let inside = score(&tuning, &tower, &enemy(0, 432.0), false);
        let near = score(&tuning, &tower, &enemy(0, 600.0), false);
        let outside = score(&tuning, &tower, &enemy(0, 700.0), false);

        assert_eq!(inside, 1000.0 - 864.0 + 500.0);
        assert_eq!(near, 1000.0 - 1200.0 + 200.0);
        assert_eq!(outside, 1000.0 - 1400.0);
    }

    #[test]
    fn aggressors_and_focus_fire_raise_priority() {
        let tuning = TargetingTuning::default();
        let tower = tower(0.0);
        let plain = score(&tuning, &tower, &enemy(0, 100.0), false);

        let mut aggressor = enemy(0, 100.0);
        aggressor.target = Some(EnemyTarget::Defender(DefenderRef::Tower(tower.id)));
        assert_eq!(score(&tuning, &tower, &aggressor, false), plain + 300.0);

        let mut focused = enemy(0, 100.0);
        focused.locked_by = 2;
        assert_eq!(score(&tuning, &tower, &focused, false), plain + 100.0);
    }

    #[test]
    fn local_claims_count_against_slots() {
        let mut delta = BTreeMap::new();
        let mut candidate = enemy(4, 0.0);
        candidate.locked_by = 2;
        assert!(has_free_slot(&candidate, &delta));

        let _ = delta.insert(candidate.id, 1);
        assert!(!has_free_slot(&candidate, &delta));
    }

    #[test]
    fn off_field_target_is_released_and_replaced() {
        let mut locked = tower(400.0);
        locked.target = Some(EnemyId::new(0));
        let mut straggler = enemy(0, -40.0);
        straggler.locked_by = 1;
        let towers = TowerView::from_snapshots(vec![locked]);
        let enemies = EnemyView::from_snapshots(vec![straggler, enemy(1, 600.0)]);

        let mut targeting =
            TowerTargeting::new(TargetingTuning::default(), Bounds::from_size(1440.0, 1080.0));
        let mut commands = Vec::new();
        targeting.handle(Duration::ZERO, &towers, &enemies, &mut commands);

        assert_eq!(
            commands,
            vec![
                Command::ReleaseTarget { tower: locked.id },
                Command::LockTarget {
                    tower: locked.id,
                    enemy: EnemyId::new(1),
                },
            ]
        );
        assert_eq!(targeting.potential_targets(locked.id), 1);
    }
}
