#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system choosing which defender each enemy attacks.
//!
//! Enemies without a target search on a fixed cadence for the nearest
//! defender with a free attraction slot. Once the organ is destroyed the
//! goal line becomes the fallback target. Placing a tower forces nearby
//! enemies to search again immediately.

use std::{collections::BTreeMap, time::Duration};

use immune_defence_core::{
    Command, DefenderRef, EnemyId, EnemySnapshot, EnemyTarget, EnemyView, Event, OrganSnapshot,
    OrganState, TargetingTuning, TowerView, WorldPoint,
};

/// Enemy targeting system tracking per-enemy search cadence.
#[derive(Debug)]
pub struct EnemyTargeting {
    tuning: TargetingTuning,
    next_search: BTreeMap<EnemyId, Duration>,
    claim_delta: BTreeMap<DefenderRef, i64>,
    new_towers: Vec<WorldPoint>,
}

impl EnemyTargeting {
    /// Creates a targeting system using the search interval and retarget radius
    /// from `tuning`.
    #[must_use]
    pub fn new(tuning: TargetingTuning) -> Self {
        Self {
            tuning,
            next_search: BTreeMap::new(),
            claim_delta: BTreeMap::new(),
            new_towers: Vec::new(),
        }
    }

    /// Emits `EngageTarget` commands for enemies whose preferred target changed.
    pub fn handle(
        &mut self,
        now: Duration,
        events: &[Event],
        towers: &TowerView,
        enemies: &EnemyView,
        organ: &OrganSnapshot,
        out: &mut Vec<Command>,
    ) {
        self.new_towers.clear();
        self.new_towers
            .extend(events.iter().filter_map(|event| match event {
                Event::TowerPlaced { position, .. } => Some(*position),
                _ => None,
            }));
        self.next_search.retain(|id, _| enemies.get(*id).is_some());
        self.claim_delta.clear();

        for enemy in enemies.iter() {
            if !enemy.is_active() || enemy.knockback_until.is_some() {
                continue;
            }
            if enemy.target == Some(EnemyTarget::BoundaryLine) {
                continue;
            }

            let radius = self.tuning.retarget_radius;
            let forced = self
                .new_towers
                .iter()
                .any(|tower| tower.distance_squared(enemy.position) <= radius * radius);
            let due = self
                .next_search
                .get(&enemy.id)
                .map_or(true, |next| now >= *next);

            if !forced && (enemy.target.is_some() || !due) {
                continue;
            }

            let choice = self.choose(enemy, towers, organ);
            let _ = self
                .next_search
                .insert(enemy.id, now + self.tuning.enemy_search_interval());

            let Some(target) = choice else {
                continue;
            };
            if enemy.target == Some(target) {
                continue;
            }

            log::trace!("{:?} seeks {target:?}", enemy.id);
            out.push(Command::EngageTarget {
                enemy: enemy.id,
                target,
            });
            if let Some(defender) = target.defender() {
                *self.claim_delta.entry(defender).or_default() += 1;
            }
            if let Some(previous) = enemy.target.and_then(EnemyTarget::defender) {
                *self.claim_delta.entry(previous).or_default() -= 1;
            }
        }
    }

    fn choose(
        &self,
        enemy: &EnemySnapshot,
        towers: &TowerView,
        organ: &OrganSnapshot,
    ) -> Option<EnemyTarget> {
        let current = enemy.target.and_then(EnemyTarget::defender);
        let mut best: Option<(f32, DefenderRef)> = None;
        let mut consider = |distance: f32, defender: DefenderRef| {
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, defender));
            }
        };

        for tower in towers.iter().filter(|tower| tower.is_active()) {
            let defender = DefenderRef::Tower(tower.id);
            let free = self.free_slots(defender, tower.attackers, tower.attraction_slots) > 0;
            if free || current == Some(defender) {
                consider(enemy.position.distance(tower.position), defender);
            }
        }

        if organ.state == OrganState::Healthy {
            let defender = DefenderRef::Organ;
            let free = self.free_slots(defender, organ.attackers, organ.attraction_slots) > 0;
            if free || current == Some(defender) {
                consider(enemy.position.distance(organ.position), defender);
            }
        }

        match best {
            Some((_, defender)) => Some(EnemyTarget::Defender(defender)),
            None if organ.state == OrganState::Destroyed => Some(EnemyTarget::BoundaryLine),
            None => None,
        }
    }

    fn free_slots(&self, defender: DefenderRef, attackers: u32, slots: u32) -> i64 {
        let delta = self.claim_delta.get(&defender).copied().unwrap_or(0);
        i64::from(slots) - i64::from(attackers) - delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use immune_defence_core::{
        EnemyKind, EnemyState, FireControl, Health, TowerId, TowerKind, TowerSnapshot,
        TowerState, Velocity,
    };

    fn enemy(id: u32, x: f32) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(id),
            kind: EnemyKind::CommonBacteria,
            position: WorldPoint::new(x, 500.0),
            velocity: Velocity::ZERO,
            state: EnemyState::Seeking,
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

    fn organ(state: OrganState) -> OrganSnapshot {
        OrganSnapshot {
            position: WorldPoint::new(1260.0, 540.0),
            state,
            health: Health::new(50),
            max_health: Health::new(50),
            level: 1,
            attraction_slots: 5,
            attackers: 0,
        }
    }

    fn tower(id: u32, x: f32, attackers: u32) -> TowerSnapshot {
        TowerSnapshot {
            id: TowerId::new(id),
            kind: TowerKind::BCell,
            position: WorldPoint::new(x, 500.0),
            state: TowerState::Seeking,
            health: Health::new(50),
            attack_range: 432.0,
            detection_range: 1440.0,
            attraction_slots: 3,
            attackers,
            target: None,
            fire: FireControl::new(),
        }
    }

    #[test]
    fn nearest_defender_with_free_slot_wins() {
        let targeting = EnemyTargeting::new(TargetingTuning::default());
        let towers = TowerView::from_snapshots(vec![tower(0, 300.0, 3), tower(1, 600.0, 0)]);

        let choice = targeting.choose(&enemy(0, 100.0), &towers, &organ(OrganState::Healthy));

        assert_eq!(
            choice,
            Some(EnemyTarget::Defender(DefenderRef::Tower(TowerId::new(1))))
        );
    }

    #[test]
    fn destroyed_organ_falls_back_to_boundary_line() {
        let targeting = EnemyTargeting::new(TargetingTuning::default());
        let towers = TowerView::from_snapshots(Vec::new());

        assert_eq!(
            targeting.choose(&enemy(0, 100.0), &towers, &organ(OrganState::Destroyed)),
            Some(EnemyTarget::BoundaryLine)
        );
    }

    #[test]
    fn saturated_organ_leaves_enemy_seeking() {
        let targeting = EnemyTargeting::new(TargetingTuning::default());
        let towers = TowerView::from_snapshots(Vec::new());
        let mut full = organ(OrganState::Healthy);
        full.attackers = full.attraction_slots;

        assert_eq!(targeting.choose(&enemy(0, 100.0), &towers, &full), None);
    }
}
