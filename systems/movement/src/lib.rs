#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic movement system that steers enemies around obstacles.
//!
//! Every enemy heads for its claimed target, or drifts toward the goal line
//! when it has none. The intended heading is probed one short step ahead
//! against the walkability oracle; a blocked probe falls back to the
//! walkable compass direction that ends closest to the target. Velocities
//! blend toward the desired heading instead of snapping to it.

use std::time::Duration;

use immune_defence_core::{
    Command, DefenderRef, EnemySnapshot, EnemyState, EnemyTarget, EnemyView, OrganSnapshot,
    OrganState, SteeringTuning, TowerView, Velocity, Walkability, WorldPoint,
};

const COMPASS: [(f32, f32); 8] = [
    (1.0, 0.0),
    (1.0, 1.0),
    (0.0, 1.0),
    (-1.0, 1.0),
    (-1.0, 0.0),
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
];

const DRIFT_DETOURS: [(f32, f32); 4] = [(1.0, 1.0), (1.0, -1.0), (0.0, 1.0), (0.0, -1.0)];

/// Pure system that emits steering commands followed by a single advance.
#[derive(Debug)]
pub struct Movement {
    tuning: SteeringTuning,
    boundary_x: f32,
}

impl Movement {
    /// Creates a movement system; `boundary_x` locates the goal line.
    #[must_use]
    pub fn new(tuning: SteeringTuning, boundary_x: f32) -> Self {
        Self { tuning, boundary_x }
    }

    /// Emits one `SteerEnemy` per steerable enemy and a trailing `AdvanceEnemies`.
    pub fn handle<W: Walkability>(
        &self,
        walkability: &W,
        enemies: &EnemyView,
        towers: &TowerView,
        organ: &OrganSnapshot,
        out: &mut Vec<Command>,
    ) {
        for enemy in enemies.iter() {
            if !enemy.is_active() || enemy.knockback_until.is_some() {
                continue;
            }
            let velocity = self.steer(walkability, enemy, towers, organ);
            out.push(Command::SteerEnemy {
                enemy: enemy.id,
                velocity,
            });
        }
        out.push(Command::AdvanceEnemies);
    }

    fn steer<W: Walkability>(
        &self,
        walkability: &W,
        enemy: &EnemySnapshot,
        towers: &TowerView,
        organ: &OrganSnapshot,
    ) -> Velocity {
        if enemy.state == EnemyState::Attacking {
            return enemy
                .velocity
                .approach(Velocity::ZERO, self.tuning.attack_braking);
        }

        let desired = match enemy.target.and_then(|target| self.aim(enemy, target, towers, organ)) {
            Some(aim) => self.toward(walkability, enemy, aim),
            None => self.drift(walkability, enemy),
        };
        enemy.velocity.approach(desired, self.tuning.smoothing)
    }

    fn aim(
        &self,
        enemy: &EnemySnapshot,
        target: EnemyTarget,
        towers: &TowerView,
        organ: &OrganSnapshot,
    ) -> Option<WorldPoint> {
        match target {
            EnemyTarget::Defender(DefenderRef::Tower(tower)) => towers
                .get(tower)
                .filter(|tower| tower.is_active())
                .map(|tower| tower.position),
            EnemyTarget::Defender(DefenderRef::Organ) => {
                (organ.state == OrganState::Healthy).then_some(organ.position)
            }
            EnemyTarget::BoundaryLine => Some(WorldPoint::new(self.boundary_x, enemy.position.y())),
        }
    }

    fn toward<W: Walkability>(
        &self,
        walkability: &W,
        enemy: &EnemySnapshot,
        aim: WorldPoint,
    ) -> Velocity {
        let desired = Velocity::from_angle(enemy.position.angle_to(aim), enemy.speed);
        if walkability.is_walkable(self.probe(enemy.position, desired)) {
            return desired;
        }

        let mut best: Option<(f32, Velocity)> = None;
        for (dx, dy) in COMPASS {
            let candidate = Velocity::new(dx * enemy.speed, dy * enemy.speed);
            let probe = self.probe(enemy.position, candidate);
            if !walkability.is_walkable(probe) {
                continue;
            }
            let distance = probe.distance(aim);
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, candidate));
            }
        }
        best.map_or(Velocity::ZERO, |(_, velocity)| velocity)
    }

    fn drift<W: Walkability>(&self, walkability: &W, enemy: &EnemySnapshot) -> Velocity {
        let ahead = Velocity::new(enemy.speed, 0.0);
        if walkability.is_walkable(self.probe(enemy.position, ahead)) {
            return ahead;
        }
        DRIFT_DETOURS
            .iter()
            .map(|(dx, dy)| Velocity::new(dx * enemy.speed, dy * enemy.speed))
            .find(|candidate| walkability.is_walkable(self.probe(enemy.position, *candidate)))
            .unwrap_or(ahead)
    }

    fn probe(&self, from: WorldPoint, velocity: Velocity) -> WorldPoint {
        from.advanced(velocity, Duration::from_secs_f32(self.tuning.probe_seconds.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use immune_defence_core::{
        EnemyId, EnemyKind, FireControl, Health, OpenField, TowerSnapshot,
    };

    struct WallAhead;

    impl Walkability for WallAhead {
        fn is_walkable(&self, point: WorldPoint) -> bool {
            point.x() <= 100.0 || point.y() > 500.5
        }
    }

    fn movement() -> Movement {
        Movement::new(SteeringTuning::default(), 1430.0)
    }

    fn organ() -> OrganSnapshot {
        OrganSnapshot {
            position: WorldPoint::new(1260.0, 500.0),
            state: OrganState::Healthy,
            health: Health::new(50),
            max_health: Health::new(50),
            level: 1,
            attraction_slots: 5,
            attackers: 0,
        }
    }

    fn enemy(state: EnemyState, target: Option<EnemyTarget>) -> EnemySnapshot {
        EnemySnapshot {
            id: EnemyId::new(0),
            kind: EnemyKind::CommonBacteria,
            position: WorldPoint::new(100.0, 500.0),
            velocity: Velocity::ZERO,
            state,
            health: Health::new(60),
            speed: 60.0,
            attack_range: 216.0,
            targeted_by_slots: 3,
            locked_by: 0,
            target,
            fire: FireControl::new(),
            knockback_until: None,
        }
    }

    fn steer<W: Walkability>(walkability: &W, enemy: &EnemySnapshot) -> Velocity {
        let towers = TowerView::from_snapshots(Vec::<TowerSnapshot>::new());
        movement().steer(walkability, enemy, &towers, &organ())
    }

    #[test]
    fn advancing_enemy_blends_toward_target() {
        let organ_target = Some(EnemyTarget::Defender(DefenderRef::Organ));
        let velocity = steer(&OpenField, &enemy(EnemyState::Advancing, organ_target));

        assert!((velocity.dx() - 12.0).abs() < 1e-3);
        assert!(velocity.dy().abs() < 1e-3);
    }

    #[test]
    fn blocked_heading_takes_closest_walkable_compass_direction() {
        let organ_target = Some(EnemyTarget::Defender(DefenderRef::Organ));
        let velocity = steer(&WallAhead, &enemy(EnemyState::Advancing, organ_target));

        assert!(velocity.dy() > 0.0, "detours through the open lower side");
        assert!(velocity.dx() >= 0.0);
    }

    #[test]
    fn attacking_enemy_brakes() {
        let mut attacking = enemy(EnemyState::Attacking, None);
        attacking.velocity = Velocity::new(10.0, -10.0);

        let velocity = steer(&OpenField, &attacking);

        assert!((velocity.dx() - 7.0).abs() < 1e-3);
        assert!((velocity.dy() + 7.0).abs() < 1e-3);
    }

    #[test]
    fn enemy_without_target_drifts_right() {
        let velocity = steer(&OpenField, &enemy(EnemyState::Seeking, None));
        assert!(velocity.dx() > 0.0);
        assert_eq!(velocity.dy(), 0.0);
    }

    #[test]
    fn knocked_back_enemies_are_left_alone() {
        let mut stunned = enemy(EnemyState::Seeking, None);
        stunned.knockback_until = Some(Duration::from_millis(400));
        let enemies = EnemyView::from_snapshots(vec![stunned]);
        let towers = TowerView::from_snapshots(Vec::new());
        let mut commands = Vec::new();

        movement().handle(&OpenField, &enemies, &towers, &organ(), &mut commands);

        assert_eq!(commands, vec![Command::AdvanceEnemies]);
    }
}
