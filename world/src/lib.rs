#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Immune Defence.
//!
//! The world owns every entity, the slot ledger linking attackers and
//! defenders, and the projectile pool. It mutates only through [`apply`] and
//! re-validates every command against the current state, so systems may act
//! on views that went stale earlier in the same tick.

use std::time::Duration;

use immune_defence_core::{
    Bounds, Command, DefenderRef, EnemyId, EnemyKind, EnemyState, EnemyTarget, EntityRef, Event,
    Faction, GameOverReason, Health, OrganState, PlacementError, ProjectileRelease, Shooter,
    SimulationConfig, SlotError, SpawnError, TowerId, TowerKind, TowerState, Velocity,
    Walkability, WorldPoint,
};
use immune_defence_system_placement::{PlacementSearch, ValidAreaCache};

mod aggro;
mod enemies;
mod projectiles;
mod towers;
mod walkability;

pub use walkability::{MaskError, ObstacleMask, WalkabilityMap, TRANSPARENT};

use aggro::AggroLedger;
use enemies::EnemyRegistry;
use projectiles::{sweep_hit, Flight, ProjectilePool};
use towers::{formation, TowerRegistry};

const PLACEMENT_SEED_SALT: u64 = 0x42f0_e1eb_d4a5_3c21;

#[derive(Debug)]
struct Organ {
    position: WorldPoint,
    state: OrganState,
    health: Health,
    level: u32,
    resource_timer: Duration,
}

#[derive(Debug)]
struct Player {
    health: Health,
    resources: u32,
    game_over: bool,
    sneeze_ready_at: Duration,
}

/// Represents the authoritative Immune Defence world state.
#[derive(Debug)]
pub struct World {
    config: SimulationConfig,
    walkability: WalkabilityMap,
    placement: PlacementSearch,
    towers: TowerRegistry,
    enemies: EnemyRegistry,
    organ: Organ,
    player: Player,
    aggro: AggroLedger,
    projectiles: ProjectilePool,
    now: Duration,
    last_dt: Duration,
}

impl World {
    /// Creates a world for one level.
    ///
    /// `mask` backs the walkability oracle; `None` makes every point walkable.
    /// `seed` drives the placement search's cache sampling.
    #[must_use]
    pub fn new(config: SimulationConfig, mask: Option<ObstacleMask>, seed: u64) -> Self {
        let arena = &config.arena;
        let walkability = WalkabilityMap::new(mask, arena.width, arena.height);

        let spawn_bounds = Bounds::new(
            WorldPoint::new(arena.spawn_x.min(0.0), 0.0),
            WorldPoint::new(arena.width, arena.height),
        );
        let mut placement = PlacementSearch::new(
            config.placement.clone(),
            spawn_bounds,
            seed ^ PLACEMENT_SEED_SALT,
        );
        let band = Bounds::new(
            WorldPoint::new(0.0, arena.spawn_margin),
            WorldPoint::new(
                config.placement.cache_band_width,
                arena.height - arena.spawn_margin,
            ),
        );
        placement.set_cache(ValidAreaCache::scan(
            &walkability,
            band,
            config.placement.cache_step,
        ));

        let organ = Organ {
            position: arena.organ_position,
            state: OrganState::Healthy,
            health: Health::new(config.units.organ.max_health_at(1)),
            level: 1,
            resource_timer: Duration::ZERO,
        };
        let player = Player {
            health: Health::new(config.level.player_health),
            resources: config.level.starting_resources,
            game_over: false,
            sneeze_ready_at: Duration::ZERO,
        };
        let projectiles = ProjectilePool::new(config.combat.pool_capacity);

        Self {
            walkability,
            placement,
            towers: TowerRegistry::new(),
            enemies: EnemyRegistry::new(),
            organ,
            player,
            aggro: AggroLedger::default(),
            projectiles,
            now: Duration::ZERO,
            last_dt: Duration::ZERO,
            config,
        }
    }

    fn tick(&mut self, now: Duration, dt: Duration, out_events: &mut Vec<Event>) {
        self.now = now;
        self.last_dt = dt;
        out_events.push(Event::TimeAdvanced { now, dt });
        log::trace!("tick at {now:?} (dt {dt:?})");

        for enemy in self.enemies.iter_mut() {
            if enemy.knockback_until.is_some_and(|until| until <= now) {
                enemy.knockback_until = None;
                enemy.velocity = Velocity::ZERO;
            }
        }

        self.generate_resources(dt, out_events);
        self.refresh_tower_alertness();
    }

    fn generate_resources(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        let interval = self.config.combat.resource_interval();
        if self.organ.state != OrganState::Healthy || interval.is_zero() {
            return;
        }

        self.organ.resource_timer = self.organ.resource_timer.saturating_add(dt);
        while self.organ.resource_timer >= interval {
            self.organ.resource_timer -= interval;
            let amount = self.config.units.organ.resource_gen_at(self.organ.level);
            self.player.resources = self.player.resources.saturating_add(amount);
            out_events.push(Event::ResourceGenerated { amount });
            out_events.push(Event::ResourcesChanged {
                resources: self.player.resources,
            });
        }
    }

    fn refresh_tower_alertness(&mut self) {
        let enemies = &self.enemies;
        for tower in self.towers.iter_mut() {
            if matches!(tower.state, TowerState::Engaged | TowerState::Destroyed) {
                continue;
            }
            let limit = tower.stats.detection_range * tower.stats.detection_range;
            let detected = enemies.iter().any(|enemy| {
                enemy.is_active() && tower.position.distance_squared(enemy.position) <= limit
            });
            tower.state = if detected {
                TowerState::Seeking
            } else {
                TowerState::Idle
            };
        }
    }

    fn spawn_enemy(&mut self, kind: EnemyKind, anchor: WorldPoint, out_events: &mut Vec<Event>) {
        if self.player.game_over {
            out_events.push(Event::EnemySpawnRejected {
                kind,
                reason: SpawnError::GameOver,
            });
            return;
        }

        let occupied: Vec<WorldPoint> = self
            .enemies
            .iter()
            .filter(|enemy| enemy.is_active())
            .map(|enemy| enemy.position)
            .collect();

        let Some(placement) = self.placement.search(anchor, &self.walkability, &occupied) else {
            out_events.push(Event::EnemySpawnRejected {
                kind,
                reason: SpawnError::NoValidPosition,
            });
            return;
        };

        let stats = self.config.units.enemies.get(kind);
        let enemy = self.enemies.insert(kind, placement.point, stats);
        out_events.push(Event::EnemySpawned {
            enemy,
            kind,
            position: placement.point,
        });
    }

    fn place_tower(&mut self, kind: TowerKind, position: WorldPoint, out_events: &mut Vec<Event>) {
        let stats = self.config.units.towers.get(kind).clone();
        let cap = self.config.level.max_towers.map(|cap| cap as usize);
        let mut population = self.towers.active_count();

        let rejection = if self.player.game_over {
            Some(PlacementError::GameOver)
        } else if self.now < self.config.level.unlock_time(kind) {
            Some(PlacementError::Locked)
        } else if self.player.resources < stats.cost {
            Some(PlacementError::InsufficientResources)
        } else if cap.is_some_and(|cap| population >= cap) {
            Some(PlacementError::OverCapacity)
        } else {
            None
        };

        if let Some(reason) = rejection {
            out_events.push(Event::TowerPlacementRejected {
                kind,
                position,
                reason,
            });
            return;
        }

        let field = self
            .config
            .arena
            .bounds()
            .expanded(-self.config.arena.edge_margin);
        let spacing = self.config.placement.formation_spacing;
        let mut placed = 0usize;

        for point in formation(position, stats.deploy_count.max(1), spacing) {
            if cap.is_some_and(|cap| population >= cap) {
                break;
            }
            if !field.contains(point) || !self.walkability.is_walkable(point) {
                log::debug!("skipping {kind:?} at ({:.1}, {:.1})", point.x(), point.y());
                continue;
            }

            let tower = self.towers.insert(kind, point, &stats);
            population += 1;
            placed += 1;
            out_events.push(Event::TowerPlaced {
                tower,
                kind,
                position: point,
            });
        }

        if placed == 0 {
            out_events.push(Event::TowerPlacementRejected {
                kind,
                position,
                reason: PlacementError::Blocked,
            });
            return;
        }

        self.player.resources -= stats.cost;
        out_events.push(Event::ResourcesChanged {
            resources: self.player.resources,
        });
    }

    fn lock_target(&mut self, tower: TowerId, enemy: EnemyId, out_events: &mut Vec<Event>) {
        if let Err(reason) = self.validate_lock(tower, enemy) {
            out_events.push(Event::LockRejected {
                tower,
                enemy,
                reason,
            });
            return;
        }

        if self.aggro.lock_of(tower) == Some(enemy) {
            return;
        }

        let slots = self
            .enemies
            .get(enemy)
            .map_or(0, |record| record.stats.targeted_by_slots);
        match self.aggro.lock(tower, enemy, slots) {
            Ok(released) => {
                if let Some(previous) = released {
                    out_events.push(Event::TargetReleased {
                        tower,
                        enemy: previous,
                    });
                }
                if let Some(record) = self.towers.get_mut(tower) {
                    record.state = TowerState::Engaged;
                }
                log::debug!("{tower:?} locked {enemy:?}");
                out_events.push(Event::TargetLocked { tower, enemy });
            }
            Err(reason) => out_events.push(Event::LockRejected {
                tower,
                enemy,
                reason,
            }),
        }
    }

    fn validate_lock(&self, tower: TowerId, enemy: EnemyId) -> Result<(), SlotError> {
        let Some(tower_record) = self.towers.get(tower) else {
            log::warn!("lock requested by unknown {tower:?}");
            return Err(SlotError::Unknown);
        };
        let Some(enemy_record) = self.enemies.get(enemy) else {
            log::warn!("lock requested on unknown {enemy:?}");
            return Err(SlotError::Unknown);
        };
        let detection = tower_record.stats.detection_range;
        if !tower_record.is_active()
            || !enemy_record.is_active()
            || tower_record.position.distance_squared(enemy_record.position)
                > detection * detection
        {
            return Err(SlotError::Inactive);
        }
        Ok(())
    }

    fn release_target(&mut self, tower: TowerId, out_events: &mut Vec<Event>) {
        let Some(enemy) = self.aggro.release_lock(tower) else {
            return;
        };
        if let Some(record) = self.towers.get_mut(tower) {
            if record.is_active() {
                record.state = TowerState::Seeking;
            }
        }
        log::debug!("{tower:?} released {enemy:?}");
        out_events.push(Event::TargetReleased { tower, enemy });
    }

    fn engage_target(&mut self, enemy: EnemyId, target: EnemyTarget, out_events: &mut Vec<Event>) {
        let slots = match self.validate_engagement(enemy, target) {
            Ok(slots) => slots,
            Err(reason) => {
                out_events.push(Event::EngagementRejected {
                    enemy,
                    target,
                    reason,
                });
                return;
            }
        };

        if self.aggro.engagement_of(enemy) == Some(target) {
            return;
        }

        match self.aggro.engage(enemy, target, slots) {
            Ok(released) => {
                if let Some(previous) = released {
                    out_events.push(Event::EngagementEnded {
                        enemy,
                        target: previous,
                    });
                }
                log::debug!("{enemy:?} engaged {target:?}");
                out_events.push(Event::EngagementStarted { enemy, target });
                self.refresh_enemy_state(enemy);
            }
            Err(reason) => out_events.push(Event::EngagementRejected {
                enemy,
                target,
                reason,
            }),
        }
    }

    fn validate_engagement(
        &self,
        enemy: EnemyId,
        target: EnemyTarget,
    ) -> Result<Option<u32>, SlotError> {
        let Some(record) = self.enemies.get(enemy) else {
            log::warn!("engagement requested by unknown {enemy:?}");
            return Err(SlotError::Unknown);
        };
        if !record.is_active() || record.is_knocked_back() {
            return Err(SlotError::Inactive);
        }

        match target {
            EnemyTarget::Defender(DefenderRef::Tower(tower)) => {
                let Some(tower) = self.towers.get(tower) else {
                    return Err(SlotError::Unknown);
                };
                if !tower.is_active() {
                    return Err(SlotError::Inactive);
                }
                Ok(Some(tower.stats.attraction_slots))
            }
            EnemyTarget::Defender(DefenderRef::Organ) => {
                if self.organ.state != OrganState::Healthy {
                    return Err(SlotError::Inactive);
                }
                Ok(Some(self.config.units.organ.attraction_slots))
            }
            EnemyTarget::BoundaryLine => {
                if self.organ.state == OrganState::Healthy {
                    return Err(SlotError::Inactive);
                }
                Ok(None)
            }
        }
    }

    fn steer_enemy(&mut self, enemy: EnemyId, velocity: Velocity) {
        if let Some(record) = self.enemies.get_mut(enemy) {
            if record.is_active() && !record.is_knocked_back() {
                record.velocity = velocity;
            }
        }
    }

    fn advance_enemies(&mut self, out_events: &mut Vec<Event>) {
        let dt = self.last_dt;
        let arena = &self.config.arena;
        let movement_bounds = Bounds::new(
            WorldPoint::new(arena.spawn_x.min(0.0), 0.0),
            WorldPoint::new(arena.width, arena.height),
        );
        let boundary_x = arena.boundary_x();
        let mut arrivals = Vec::new();

        for enemy in self.enemies.iter_mut() {
            if !enemy.is_active() {
                continue;
            }

            let next = movement_bounds.clamp(enemy.position.advanced(enemy.velocity, dt));
            if self.walkability.is_walkable(next) {
                enemy.position = next;
            } else {
                enemy.velocity = Velocity::ZERO;
            }

            if enemy.position.x() >= boundary_x
                && self.aggro.engagement_of(enemy.id) != Some(EnemyTarget::BoundaryLine)
            {
                arrivals.push(enemy.id);
            }
        }

        for enemy in arrivals {
            self.reach_goal(enemy, out_events);
        }

        for enemy in self.enemies.active_ids() {
            self.refresh_enemy_state(enemy);
        }
    }

    fn reach_goal(&mut self, enemy: EnemyId, out_events: &mut Vec<Event>) {
        if let Some(previous) = self.aggro.disengage(enemy) {
            out_events.push(Event::EngagementEnded {
                enemy,
                target: previous,
            });
        }
        if self
            .aggro
            .engage(enemy, EnemyTarget::BoundaryLine, None)
            .is_ok()
        {
            out_events.push(Event::EngagementStarted {
                enemy,
                target: EnemyTarget::BoundaryLine,
            });
        }

        let Some(record) = self.enemies.get_mut(enemy) else {
            return;
        };
        record.velocity = Velocity::ZERO;
        record.state = EnemyState::Attacking;
        if !record.reached_goal {
            record.reached_goal = true;
            log::debug!("{enemy:?} reached the goal line");
            out_events.push(Event::EnemyReachedGoal {
                enemy,
                reward: record.stats.reward,
            });
        }
    }

    fn refresh_enemy_state(&mut self, enemy: EnemyId) {
        let target = self.aggro.engagement_of(enemy);
        let aim = target.and_then(|target| self.aim_point(enemy, target));
        let Some(record) = self.enemies.get_mut(enemy) else {
            return;
        };
        if !record.is_active() {
            return;
        }
        record.state = match aim {
            None => EnemyState::Seeking,
            Some(point) if record.position.distance(point) <= record.stats.attack_range => {
                EnemyState::Attacking
            }
            Some(_) => EnemyState::Advancing,
        };
    }

    /// Point an enemy aims at when attacking `target`.
    fn aim_point(&self, enemy: EnemyId, target: EnemyTarget) -> Option<WorldPoint> {
        match target {
            EnemyTarget::Defender(DefenderRef::Tower(tower)) => self
                .towers
                .get(tower)
                .filter(|tower| tower.is_active())
                .map(|tower| tower.position),
            EnemyTarget::Defender(DefenderRef::Organ) => {
                (self.organ.state == OrganState::Healthy).then_some(self.organ.position)
            }
            EnemyTarget::BoundaryLine => self.enemies.get(enemy).map(|record| {
                WorldPoint::new(self.config.arena.boundary_x(), record.position.y())
            }),
        }
    }

    fn fire(&mut self, shooter: Shooter, out_events: &mut Vec<Event>) {
        match shooter {
            Shooter::Tower(tower) => self.fire_tower(tower, out_events),
            Shooter::Enemy(enemy) => self.fire_enemy(enemy, out_events),
        }
    }

    fn fire_tower(&mut self, tower: TowerId, out_events: &mut Vec<Event>) {
        let Some(record) = self.towers.get(tower) else {
            log::warn!("fire requested by unknown {tower:?}");
            return;
        };
        if !record.is_active() || !record.fire.is_ready(self.now) {
            return;
        }
        let Some(enemy) = self.aggro.lock_of(tower) else {
            return;
        };
        let Some(target) = self.enemies.get(enemy).filter(|target| target.is_active()) else {
            return;
        };
        if record.position.distance(target.position) > record.stats.attack_range
            || !self.enemies_visible()
        {
            return;
        }

        let rotation = record.position.angle_to(target.position);
        let flight = Flight {
            shooter: Shooter::Tower(tower),
            target: EntityRef::Enemy(enemy),
            damage: record.stats.damage,
            origin: record.position,
            position: record.position,
            velocity: Velocity::from_angle(rotation, record.stats.projectile_speed),
            max_range: None,
        };
        let fire_rate = record.stats.fire_rate();

        if self.launch(flight, rotation, out_events) {
            if let Some(record) = self.towers.get_mut(tower) {
                record.fire.record_shot(self.now, fire_rate);
            }
        }
    }

    fn fire_enemy(&mut self, enemy: EnemyId, out_events: &mut Vec<Event>) {
        let Some(record) = self.enemies.get(enemy) else {
            log::warn!("fire requested by unknown {enemy:?}");
            return;
        };
        if !record.is_active() || record.is_knocked_back() || !record.fire.is_ready(self.now) {
            return;
        }
        let Some(target) = self.aggro.engagement_of(enemy) else {
            return;
        };
        let Some(aim) = self.aim_point(enemy, target) else {
            return;
        };
        let attack_range = record.stats.attack_range;
        if record.position.distance(aim) > attack_range {
            return;
        }

        let damage = record.stats.damage;
        let fire_rate = record.stats.fire_rate();
        let origin = record.position;

        let fired = match target.defender() {
            None => {
                self.damage_player(damage, out_events);
                true
            }
            Some(defender) => {
                let rotation = origin.angle_to(aim);
                let flight = Flight {
                    shooter: Shooter::Enemy(enemy),
                    target: EntityRef::from(defender),
                    damage,
                    origin,
                    position: origin,
                    velocity: Velocity::from_angle(
                        rotation,
                        self.config.combat.enemy_projectile_speed,
                    ),
                    max_range: Some(attack_range),
                };
                self.launch(flight, rotation, out_events)
            }
        };

        if fired {
            if let Some(record) = self.enemies.get_mut(enemy) {
                record.fire.record_shot(self.now, fire_rate);
            }
        }
    }

    fn launch(&mut self, flight: Flight, rotation: f32, out_events: &mut Vec<Event>) -> bool {
        let shooter = flight.shooter;
        let origin = flight.origin;
        match self.projectiles.acquire(flight) {
            Some(projectile) => {
                out_events.push(Event::ProjectileFired {
                    projectile,
                    shooter,
                    origin,
                    rotation,
                });
                true
            }
            None => {
                out_events.push(Event::ShotFizzled { shooter });
                false
            }
        }
    }

    fn enemies_visible(&self) -> bool {
        let visible = self
            .config
            .arena
            .bounds()
            .expanded(self.config.combat.offscreen_margin);
        self.enemies
            .iter()
            .any(|enemy| enemy.is_active() && visible.contains(enemy.position))
    }

    fn resolve_projectiles(&mut self, out_events: &mut Vec<Event>) {
        let dt = self.last_dt;
        let field = self
            .config
            .arena
            .bounds()
            .expanded(self.config.combat.offscreen_margin);
        let in_flight: Vec<_> = self.projectiles.active_ids().collect();

        for projectile in in_flight {
            let Some(previous) = self.projectiles.advance(projectile, dt) else {
                continue;
            };
            let Some(flight) = self.projectiles.flight(projectile).copied() else {
                continue;
            };

            let reason = if let Some(victim) = self.first_hit(&flight, previous) {
                let _ = self.projectiles.release(projectile);
                out_events.push(Event::ProjectileReleased {
                    projectile,
                    reason: ProjectileRelease::Hit,
                });
                self.apply_damage(victim, flight.damage, out_events);
                continue;
            } else if flight.range_exceeded() {
                ProjectileRelease::RangeExceeded
            } else if !field.contains(flight.position) {
                ProjectileRelease::OutOfBounds
            } else {
                continue;
            };

            let _ = self.projectiles.release(projectile);
            out_events.push(Event::ProjectileReleased { projectile, reason });
        }
    }

    /// First opposing entity crossed by the projectile's path this tick.
    fn first_hit(&self, flight: &Flight, previous: WorldPoint) -> Option<EntityRef> {
        let radius = self.config.combat.hit_radius;
        let sweep = |centre: WorldPoint| sweep_hit(previous, flight.position, centre, radius);
        let mut best: Option<(f32, EntityRef)> = None;
        let mut consider = |t: Option<f32>, entity: EntityRef| {
            if let Some(t) = t {
                if best.map_or(true, |(best_t, _)| t < best_t) {
                    best = Some((t, entity));
                }
            }
        };

        match flight.faction() {
            Faction::Defender => {
                for enemy in self.enemies.iter().filter(|enemy| enemy.is_active()) {
                    consider(sweep(enemy.position), EntityRef::Enemy(enemy.id));
                }
            }
            Faction::Attacker => {
                for tower in self.towers.iter().filter(|tower| tower.is_active()) {
                    consider(sweep(tower.position), EntityRef::Tower(tower.id));
                }
                if self.organ.state == OrganState::Healthy {
                    consider(sweep(self.organ.position), EntityRef::Organ);
                }
            }
        }

        best.map(|(_, entity)| entity)
    }

    fn apply_damage(&mut self, entity: EntityRef, damage: u32, out_events: &mut Vec<Event>) {
        match entity {
            EntityRef::Enemy(enemy) => {
                let Some(record) = self.enemies.get_mut(enemy).filter(|r| r.is_active()) else {
                    return;
                };
                record.health = record.health.saturating_sub(damage);
                let health = record.health;
                out_events.push(Event::EntityDamaged {
                    entity,
                    damage,
                    health,
                });
                if health.is_zero() {
                    self.kill_enemy(enemy, out_events);
                }
            }
            EntityRef::Tower(tower) => {
                let Some(record) = self.towers.get_mut(tower).filter(|r| r.is_active()) else {
                    return;
                };
                record.health = record.health.saturating_sub(damage);
                let health = record.health;
                out_events.push(Event::EntityDamaged {
                    entity,
                    damage,
                    health,
                });
                if health.is_zero() {
                    self.destroy_tower(tower, out_events);
                }
            }
            EntityRef::Organ => {
                if self.organ.state != OrganState::Healthy {
                    return;
                }
                self.organ.health = self.organ.health.saturating_sub(damage);
                let health = self.organ.health;
                out_events.push(Event::EntityDamaged {
                    entity,
                    damage,
                    health,
                });
                out_events.push(Event::OrganDamaged {
                    health,
                    max_health: Health::new(
                        self.config.units.organ.max_health_at(self.organ.level),
                    ),
                });
                if health.is_zero() {
                    self.destroy_organ(out_events);
                }
            }
        }
    }

    fn kill_enemy(&mut self, enemy: EnemyId, out_events: &mut Vec<Event>) {
        let removal_due = self.now + self.config.combat.removal_delay();
        let Some(record) = self.enemies.get_mut(enemy) else {
            return;
        };
        record.state = EnemyState::Dying;
        record.velocity = Velocity::ZERO;
        record.knockback_until = None;
        record.removal_due = Some(removal_due);
        let reward = record.stats.reward;

        if let Some(target) = self.aggro.disengage(enemy) {
            out_events.push(Event::EngagementEnded { enemy, target });
        }
        for tower in self.aggro.release_lockers(enemy) {
            if let Some(record) = self.towers.get_mut(tower) {
                if record.is_active() {
                    record.state = TowerState::Seeking;
                }
            }
            out_events.push(Event::TargetReleased { tower, enemy });
        }

        self.player.resources = self.player.resources.saturating_add(reward);
        log::debug!("{enemy:?} defeated, reward {reward}");
        out_events.push(Event::EnemyDefeated { enemy, reward });
        out_events.push(Event::ResourcesChanged {
            resources: self.player.resources,
        });
    }

    fn destroy_tower(&mut self, tower: TowerId, out_events: &mut Vec<Event>) {
        let removal_due = self.now + self.config.combat.removal_delay();
        let Some(record) = self.towers.get_mut(tower) else {
            return;
        };
        record.state = TowerState::Destroyed;
        record.removal_due = Some(removal_due);

        if let Some(enemy) = self.aggro.release_lock(tower) {
            out_events.push(Event::TargetReleased { tower, enemy });
        }
        self.release_attackers(DefenderRef::Tower(tower), out_events);

        log::debug!("{tower:?} destroyed");
        out_events.push(Event::TowerDestroyed { tower });
    }

    fn destroy_organ(&mut self, out_events: &mut Vec<Event>) {
        self.organ.state = OrganState::Destroyed;
        self.release_attackers(DefenderRef::Organ, out_events);
        log::info!("organ destroyed, attackers fall back to the goal line");
        out_events.push(Event::OrganDestroyed);
    }

    fn release_attackers(&mut self, defender: DefenderRef, out_events: &mut Vec<Event>) {
        for enemy in self.aggro.release_attackers(defender) {
            if let Some(record) = self.enemies.get_mut(enemy) {
                if record.is_active() {
                    record.state = EnemyState::Seeking;
                }
            }
            out_events.push(Event::EngagementEnded {
                enemy,
                target: EnemyTarget::Defender(defender),
            });
        }
    }

    fn damage_player(&mut self, damage: u32, out_events: &mut Vec<Event>) {
        if self.player.game_over {
            return;
        }
        self.player.health = self.player.health.saturating_sub(damage);
        out_events.push(Event::PlayerHealthChanged {
            health: self.player.health,
        });
        if self.player.health.is_zero() {
            self.player.game_over = true;
            log::info!("player health depleted at {:?}", self.now);
            out_events.push(Event::GameOver {
                reason: GameOverReason::HealthDepleted,
            });
        }
    }

    fn finalize_removal(&mut self, entity: EntityRef, out_events: &mut Vec<Event>) {
        let removed = match entity {
            EntityRef::Enemy(enemy) => match self.enemies.get(enemy) {
                Some(record) if !record.is_active() => self.enemies.remove(enemy).is_some(),
                _ => false,
            },
            EntityRef::Tower(tower) => match self.towers.get(tower) {
                Some(record) if !record.is_active() => self.towers.remove(tower).is_some(),
                _ => false,
            },
            EntityRef::Organ => false,
        };

        if removed {
            out_events.push(Event::EntityRemoved { entity });
        } else {
            log::warn!("ignoring removal of {entity:?} which is not awaiting removal");
        }
    }

    fn upgrade_organ(&mut self, out_events: &mut Vec<Event>) {
        if let Err(reason) = query::upgrade_readiness(self) {
            log::debug!("organ upgrade refused: {reason}");
            return;
        }

        let stats = &self.config.units.organ;
        self.player.resources -= stats.upgrade_cost;
        self.organ.level += 1;
        self.organ.health = Health::new(stats.max_health_at(self.organ.level));
        out_events.push(Event::OrganUpgraded {
            level: self.organ.level,
            health: self.organ.health,
            resource_gen: stats.resource_gen_at(self.organ.level),
        });
        out_events.push(Event::ResourcesChanged {
            resources: self.player.resources,
        });
    }

    fn use_sneeze(&mut self, out_events: &mut Vec<Event>) {
        if let Err(reason) = query::sneeze_readiness(self) {
            log::debug!("sneeze refused: {reason}");
            return;
        }
        let Some(skill) = self.config.level.sneeze.clone() else {
            return;
        };

        self.player.sneeze_ready_at = self.now + skill.cooldown();
        let knockback = Velocity::new(-self.config.combat.knockback_speed, 0.0);
        let until = self.now + self.config.combat.knockback();
        let targets = self.enemies.active_ids();

        for &enemy in &targets {
            if let Some(target) = self.aggro.disengage(enemy) {
                out_events.push(Event::EngagementEnded { enemy, target });
            }
            if let Some(record) = self.enemies.get_mut(enemy) {
                record.velocity = knockback;
                record.knockback_until = Some(until);
                record.state = EnemyState::Seeking;
            }
            self.apply_damage(EntityRef::Enemy(enemy), skill.damage, out_events);
        }

        out_events.push(Event::SneezeUsed {
            enemies_hit: targets.len(),
        });
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    if world.player.game_over {
        match command {
            Command::Tick { now, dt } => {
                world.now = now;
                world.last_dt = dt;
                out_events.push(Event::TimeAdvanced { now, dt });
            }
            Command::SpawnEnemy { kind, anchor } => world.spawn_enemy(kind, anchor, out_events),
            Command::PlaceTower { kind, position } => world.place_tower(kind, position, out_events),
            Command::FinalizeRemoval { entity } => world.finalize_removal(entity, out_events),
            _ => {}
        }
        return;
    }

    match command {
        Command::Tick { now, dt } => world.tick(now, dt, out_events),
        Command::SpawnEnemy { kind, anchor } => world.spawn_enemy(kind, anchor, out_events),
        Command::PlaceTower { kind, position } => world.place_tower(kind, position, out_events),
        Command::LockTarget { tower, enemy } => world.lock_target(tower, enemy, out_events),
        Command::ReleaseTarget { tower } => world.release_target(tower, out_events),
        Command::EngageTarget { enemy, target } => world.engage_target(enemy, target, out_events),
        Command::SteerEnemy { enemy, velocity } => world.steer_enemy(enemy, velocity),
        Command::AdvanceEnemies => world.advance_enemies(out_events),
        Command::Fire { shooter } => world.fire(shooter, out_events),
        Command::ResolveProjectiles => world.resolve_projectiles(out_events),
        Command::FinalizeRemoval { entity } => world.finalize_removal(entity, out_events),
        Command::UpgradeOrgan => world.upgrade_organ(out_events),
        Command::UseSneeze => world.use_sneeze(out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use immune_defence_core::{
        ActionError, DefenderRef, EnemyId, EnemySnapshot, EnemyTarget, EnemyView, EntityRef,
        Health, OrganSnapshot, OrganState, ProjectileSnapshot, SimulationConfig, TowerId,
        TowerSnapshot, TowerView,
    };
    use thiserror::Error;

    use super::{WalkabilityMap, World};

    /// Current simulation clock.
    #[must_use]
    pub fn now(world: &World) -> Duration {
        world.now
    }

    /// Configuration the world was built from.
    #[must_use]
    pub fn config(world: &World) -> &SimulationConfig {
        &world.config
    }

    /// Walkability oracle backing placement and steering.
    #[must_use]
    pub fn walkability(world: &World) -> &WalkabilityMap {
        &world.walkability
    }

    /// Captures a read-only view of every tower, destroyed ones included.
    #[must_use]
    pub fn tower_view(world: &World) -> TowerView {
        let snapshots = world
            .towers
            .iter()
            .map(|tower| TowerSnapshot {
                id: tower.id,
                kind: tower.kind,
                position: tower.position,
                state: tower.state,
                health: tower.health,
                attack_range: tower.stats.attack_range,
                detection_range: tower.stats.detection_range,
                attraction_slots: tower.stats.attraction_slots,
                attackers: world.aggro.attacker_count(DefenderRef::Tower(tower.id)),
                target: world.aggro.lock_of(tower.id),
                fire: tower.fire,
            })
            .collect();
        TowerView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of every enemy, dying ones included.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        let snapshots = world
            .enemies
            .iter()
            .map(|enemy| EnemySnapshot {
                id: enemy.id,
                kind: enemy.kind,
                position: enemy.position,
                velocity: enemy.velocity,
                state: enemy.state,
                health: enemy.health,
                speed: enemy.stats.speed,
                attack_range: enemy.stats.attack_range,
                targeted_by_slots: enemy.stats.targeted_by_slots,
                locked_by: world.aggro.lock_count(enemy.id),
                target: world.aggro.engagement_of(enemy.id),
                fire: enemy.fire,
                knockback_until: enemy.knockback_until,
            })
            .collect();
        EnemyView::from_snapshots(snapshots)
    }

    /// Captures the organ's state.
    #[must_use]
    pub fn organ(world: &World) -> OrganSnapshot {
        let stats = &world.config.units.organ;
        OrganSnapshot {
            position: world.organ.position,
            state: world.organ.state,
            health: world.organ.health,
            max_health: Health::new(stats.max_health_at(world.organ.level)),
            level: world.organ.level,
            attraction_slots: stats.attraction_slots,
            attackers: world.aggro.attacker_count(DefenderRef::Organ),
        }
    }

    /// Captures every projectile currently in flight.
    #[must_use]
    pub fn projectiles(world: &World) -> Vec<ProjectileSnapshot> {
        world.projectiles.snapshots()
    }

    /// Occupancy of the projectile pool.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PoolStats {
        /// Maximum number of projectiles.
        pub capacity: usize,
        /// Projectiles constructed so far.
        pub allocated: usize,
        /// Projectiles in flight.
        pub active: usize,
        /// Constructed projectiles waiting for reuse.
        pub idle: usize,
    }

    /// Reports the occupancy of the projectile pool.
    #[must_use]
    pub fn pool_stats(world: &World) -> PoolStats {
        PoolStats {
            capacity: world.projectiles.capacity(),
            allocated: world.projectiles.allocated(),
            active: world.projectiles.active_count(),
            idle: world.projectiles.idle_count(),
        }
    }

    /// Player's global health pool.
    #[must_use]
    pub fn player_health(world: &World) -> Health {
        world.player.health
    }

    /// Player's current resources.
    #[must_use]
    pub fn resources(world: &World) -> u32 {
        world.player.resources
    }

    /// Reports whether the level ended.
    #[must_use]
    pub fn is_game_over(world: &World) -> bool {
        world.player.game_over
    }

    /// Reports whether at least one live enemy is on or near the field.
    #[must_use]
    pub fn enemies_visible(world: &World) -> bool {
        world.enemies_visible()
    }

    /// Number of enemy records, including those awaiting removal.
    #[must_use]
    pub fn enemy_count(world: &World) -> usize {
        world.enemies.len()
    }

    /// Reports whether the entity exists and has not entered destruction.
    #[must_use]
    pub fn is_alive(world: &World, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Tower(tower) => world.towers.get(tower).is_some_and(|t| t.is_active()),
            EntityRef::Enemy(enemy) => world.enemies.get(enemy).is_some_and(|e| e.is_active()),
            EntityRef::Organ => world.organ.state == OrganState::Healthy,
        }
    }

    /// Health of the entity, if it is still present.
    #[must_use]
    pub fn health(world: &World, entity: EntityRef) -> Option<Health> {
        match entity {
            EntityRef::Tower(tower) => world.towers.get(tower).map(|t| t.health),
            EntityRef::Enemy(enemy) => world.enemies.get(enemy).map(|e| e.health),
            EntityRef::Organ => Some(world.organ.health),
        }
    }

    /// Enemy locked by the tower, if any.
    #[must_use]
    pub fn tower_target(world: &World, tower: TowerId) -> Option<EnemyId> {
        world.aggro.lock_of(tower)
    }

    /// Target claimed by the enemy, if any.
    #[must_use]
    pub fn enemy_target(world: &World, enemy: EnemyId) -> Option<EnemyTarget> {
        world.aggro.engagement_of(enemy)
    }

    /// Entities whose destruction presentation delay elapsed.
    #[must_use]
    pub fn due_removals(world: &World) -> Vec<EntityRef> {
        let towers = world
            .towers
            .iter()
            .filter(|tower| tower.removal_due.is_some_and(|due| due <= world.now))
            .map(|tower| EntityRef::Tower(tower.id));
        let enemies = world
            .enemies
            .iter()
            .filter(|enemy| enemy.removal_due.is_some_and(|due| due <= world.now))
            .map(|enemy| EntityRef::Enemy(enemy.id));
        towers.chain(enemies).collect()
    }

    /// Checks whether an organ upgrade would currently be accepted.
    pub fn upgrade_readiness(world: &World) -> Result<(), ActionError> {
        let stats = &world.config.units.organ;
        if world.player.game_over {
            Err(ActionError::GameOver)
        } else if world.organ.state != OrganState::Healthy {
            Err(ActionError::Unavailable)
        } else if world.organ.level >= stats.max_level {
            Err(ActionError::MaxLevel)
        } else if world.player.resources < stats.upgrade_cost {
            Err(ActionError::InsufficientResources)
        } else {
            Ok(())
        }
    }

    /// Checks whether the sneeze skill would currently be accepted.
    pub fn sneeze_readiness(world: &World) -> Result<(), ActionError> {
        if world.player.game_over {
            Err(ActionError::GameOver)
        } else if world.config.level.sneeze.is_none() {
            Err(ActionError::Unavailable)
        } else if world.now < world.player.sneeze_ready_at {
            Err(ActionError::OnCooldown)
        } else {
            Ok(())
        }
    }

    /// Structural invariant broken by the world state.
    #[derive(Clone, Debug, PartialEq, Eq, Error)]
    pub enum InvariantViolation {
        /// More holders than slots on an entity.
        #[error("{entity:?} holds {holders} links but only has {slots} slots")]
        SlotOverflow {
            /// Over-subscribed entity.
            entity: EntityRef,
            /// Number of links held on it.
            holders: u32,
            /// Slot capacity.
            slots: u32,
        },
        /// A link is recorded in only one direction.
        #[error("asymmetric link: {0}")]
        AsymmetricLink(String),
        /// An entity in destruction still participates in a link.
        #[error("{0:?} is linked after entering destruction")]
        LinkedAfterDeath(EntityRef),
        /// Pool bookkeeping lost track of a projectile.
        #[error("pool holds {active} active and {idle} idle of {allocated} allocated")]
        PoolLeak {
            /// Projectiles in flight.
            active: usize,
            /// Projectiles awaiting reuse.
            idle: usize,
            /// Projectiles constructed.
            allocated: usize,
        },
    }

    /// Verifies slot caps, link symmetry, liveness of linked entities and pool
    /// conservation.
    pub fn verify_invariants(world: &World) -> Result<(), InvariantViolation> {
        world
            .aggro
            .check_symmetry()
            .map_err(InvariantViolation::AsymmetricLink)?;

        for tower in world.towers.iter() {
            let entity = EntityRef::Tower(tower.id);
            let holders = world.aggro.attacker_count(DefenderRef::Tower(tower.id));
            if holders > tower.stats.attraction_slots {
                return Err(InvariantViolation::SlotOverflow {
                    entity,
                    holders,
                    slots: tower.stats.attraction_slots,
                });
            }
            let linked = holders > 0 || world.aggro.lock_of(tower.id).is_some();
            if !tower.is_active() && linked {
                return Err(InvariantViolation::LinkedAfterDeath(entity));
            }
        }

        for enemy in world.enemies.iter() {
            let entity = EntityRef::Enemy(enemy.id);
            let holders = world.aggro.lock_count(enemy.id);
            if holders > enemy.stats.targeted_by_slots {
                return Err(InvariantViolation::SlotOverflow {
                    entity,
                    holders,
                    slots: enemy.stats.targeted_by_slots,
                });
            }
            let linked = holders > 0 || world.aggro.engagement_of(enemy.id).is_some();
            if !enemy.is_active() && linked {
                return Err(InvariantViolation::LinkedAfterDeath(entity));
            }
        }

        let organ = organ(world);
        if organ.attackers > organ.attraction_slots {
            return Err(InvariantViolation::SlotOverflow {
                entity: EntityRef::Organ,
                holders: organ.attackers,
                slots: organ.attraction_slots,
            });
        }
        if organ.state != OrganState::Healthy && organ.attackers > 0 {
            return Err(InvariantViolation::LinkedAfterDeath(EntityRef::Organ));
        }

        let pool = pool_stats(world);
        if pool.active + pool.idle != pool.allocated || pool.allocated > pool.capacity {
            return Err(InvariantViolation::PoolLeak {
                active: pool.active,
                idle: pool.idle,
                allocated: pool.allocated,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        let mut config = SimulationConfig::default();
        config.level.tower_unlocks.clear();
        config.level.starting_resources = 1000;
        World::new(config, None, 1)
    }

    fn tick(world: &mut World, now_ms: u64, dt_ms: u64) -> Vec<Event> {
        let mut events = Vec::new();
        apply(
            world,
            Command::Tick {
                now: Duration::from_millis(now_ms),
                dt: Duration::from_millis(dt_ms),
            },
            &mut events,
        );
        events
    }

    fn spawn(world: &mut World, x: f32, y: f32) -> EnemyId {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnEnemy {
                kind: EnemyKind::CommonBacteria,
                anchor: WorldPoint::new(x, y),
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::EnemySpawned { enemy, .. }] => *enemy,
            other => panic!("unexpected spawn events: {other:?}"),
        }
    }

    fn place(world: &mut World, kind: TowerKind, x: f32, y: f32) -> Vec<TowerId> {
        let mut events = Vec::new();
        apply(
            world,
            Command::PlaceTower {
                kind,
                position: WorldPoint::new(x, y),
            },
            &mut events,
        );
        events
            .iter()
            .filter_map(|event| match event {
                Event::TowerPlaced { tower, .. } => Some(*tower),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn neutrophils_deploy_in_formation_for_one_payment() {
        let mut world = world();
        let cost = query::config(&world).units.towers.neutrophil.cost;
        let before = query::resources(&world);

        let towers = place(&mut world, TowerKind::Neutrophil, 400.0, 400.0);

        assert_eq!(towers.len(), 3);
        assert_eq!(query::resources(&world), before - cost);
    }

    #[test]
    fn placement_checks_unlocks_and_population_cap() {
        let mut config = SimulationConfig::default();
        config.level.max_towers = Some(1);
        let mut world = World::new(config, None, 1);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::PlaceTower {
                kind: TowerKind::BCell,
                position: WorldPoint::new(300.0, 300.0),
            },
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::TowerPlacementRejected {
                reason: PlacementError::Locked,
                ..
            }]
        ));

        let _ = tick(&mut world, 30_000, 30_000);
        assert_eq!(place(&mut world, TowerKind::BCell, 300.0, 300.0).len(), 1);

        events.clear();
        apply(
            &mut world,
            Command::PlaceTower {
                kind: TowerKind::BCell,
                position: WorldPoint::new(600.0, 300.0),
            },
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [Event::TowerPlacementRejected {
                reason: PlacementError::OverCapacity,
                ..
            }]
        ));
    }

    #[test]
    fn lock_saturates_at_targeted_by_slots() {
        let mut world = world();
        let enemy = spawn(&mut world, 500.0, 500.0);
        let mut towers = Vec::new();
        for index in 0..4 {
            towers.extend(place(
                &mut world,
                TowerKind::BCell,
                300.0,
                200.0 + index as f32 * 100.0,
            ));
        }

        let mut events = Vec::new();
        for tower in &towers {
            apply(
                &mut world,
                Command::LockTarget {
                    tower: *tower,
                    enemy,
                },
                &mut events,
            );
        }

        let locked = events
            .iter()
            .filter(|event| matches!(event, Event::TargetLocked { .. }))
            .count();
        assert_eq!(locked, 3);
        assert!(events.contains(&Event::LockRejected {
            tower: towers[3],
            enemy,
            reason: SlotError::Saturated,
        }));
        assert!(query::verify_invariants(&world).is_ok());
    }

    #[test]
    fn boundary_line_is_refused_while_organ_lives() {
        let mut world = world();
        let enemy = spawn(&mut world, 100.0, 100.0);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::EngageTarget {
                enemy,
                target: EnemyTarget::BoundaryLine,
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::EngagementRejected {
                enemy,
                target: EnemyTarget::BoundaryLine,
                reason: SlotError::Inactive,
            }]
        );
    }

    #[test]
    fn organ_generates_resources_each_interval() {
        let mut world = world();
        let before = query::resources(&world);

        let events = tick(&mut world, 2500, 2500);

        let generated: u32 = events
            .iter()
            .filter_map(|event| match event {
                Event::ResourceGenerated { amount } => Some(*amount),
                _ => None,
            })
            .sum();
        assert_eq!(generated, 10);
        assert_eq!(query::resources(&world), before + 10);
    }

    #[test]
    fn upgrade_heals_organ_to_new_maximum() {
        let mut world = world();
        let mut events = Vec::new();

        apply(&mut world, Command::UpgradeOrgan, &mut events);

        assert!(events.contains(&Event::OrganUpgraded {
            level: 2,
            health: Health::new(75),
            resource_gen: 7,
        }));
        assert_eq!(query::organ(&world).max_health, Health::new(75));
    }

    #[test]
    fn removal_waits_for_destruction() {
        let mut world = world();
        let enemy = spawn(&mut world, 100.0, 100.0);
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::FinalizeRemoval {
                entity: EntityRef::Enemy(enemy),
            },
            &mut events,
        );

        assert!(events.is_empty());
        assert!(query::is_alive(&world, EntityRef::Enemy(enemy)));
    }
}
