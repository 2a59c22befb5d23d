//! Read-only configuration injected into the simulation at construction.
//!
//! Every type deserialises with `#[serde(default)]`, so a configuration file
//! only needs to name the values it overrides. Durations are stored as integer
//! milliseconds and surfaced through [`Duration`] accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Bounds, EnemyKind, TowerKind, WorldPoint};

/// Complete configuration of one simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Arena geometry.
    pub arena: ArenaConfig,
    /// Per-kind unit statistics.
    pub units: UnitsConfig,
    /// Level pacing, economy and unlocks.
    pub level: LevelConfig,
    /// Target scoring constants and evaluation cadence.
    pub targeting: TargetingTuning,
    /// Placement search constants.
    pub placement: PlacementTuning,
    /// Projectile pool and destruction timing.
    pub combat: CombatTuning,
    /// Enemy steering constants.
    pub steering: SteeringTuning,
}

/// Geometry of the play area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Width of the playable field in world units.
    pub width: f32,
    /// Height of the playable field in world units.
    pub height: f32,
    /// Horizontal coordinate at which enemies enter the field.
    pub spawn_x: f32,
    /// Vertical margin kept free of spawn anchors at the top and bottom.
    pub spawn_margin: f32,
    /// Position of the organ.
    pub organ_position: WorldPoint,
    /// Distance from the right edge at which the goal line sits.
    pub boundary_inset: f32,
    /// Minimum distance between a placed tower and the field edge.
    pub edge_margin: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 1440.0,
            height: 1080.0,
            spawn_x: -50.0,
            spawn_margin: 100.0,
            organ_position: WorldPoint::new(1260.0, 540.0),
            boundary_inset: 10.0,
            edge_margin: 30.0,
        }
    }
}

impl ArenaConfig {
    /// Bounds of the playable field.
    #[must_use]
    pub const fn bounds(&self) -> Bounds {
        Bounds::from_size(self.width, self.height)
    }

    /// Horizontal coordinate of the goal line.
    #[must_use]
    pub fn boundary_x(&self) -> f32 {
        self.width - self.boundary_inset
    }
}

/// Statistics shared by every tower of one kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerStats {
    /// Resources charged per placement.
    pub cost: u32,
    /// Maximum health.
    pub health: u32,
    /// Damage dealt per projectile.
    pub damage: u32,
    /// Radius within which firing is permitted.
    pub attack_range: f32,
    /// Radius within which candidates are discovered.
    pub detection_range: f32,
    /// Milliseconds between shots.
    pub fire_rate_ms: u64,
    /// Projectile speed in world units per second.
    pub projectile_speed: f32,
    /// Maximum number of enemies that may attack the tower at once.
    pub attraction_slots: u32,
    /// Number of towers placed per deployment.
    pub deploy_count: u32,
}

impl TowerStats {
    /// Interval between shots.
    #[must_use]
    pub const fn fire_rate(&self) -> Duration {
        Duration::from_millis(self.fire_rate_ms)
    }

    fn preset(
        cost: u32,
        health: u32,
        damage: u32,
        attack_range: f32,
        detection_range: f32,
        fire_rate_ms: u64,
        projectile_speed: f32,
    ) -> Self {
        Self {
            cost,
            health,
            damage,
            attack_range,
            detection_range,
            fire_rate_ms,
            projectile_speed,
            attraction_slots: 3,
            deploy_count: 1,
        }
    }
}

impl Default for TowerStats {
    fn default() -> Self {
        Self::preset(20, 50, 30, 432.0, 1440.0, 600, 1200.0)
    }
}

/// Statistics for every tower kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerRoster {
    /// Neutrophil statistics.
    pub neutrophil: TowerStats,
    /// B-cell statistics.
    pub b_cell: TowerStats,
    /// T-cell statistics.
    pub t_cell: TowerStats,
    /// Macrophage statistics.
    pub macrophage: TowerStats,
}

impl Default for TowerRoster {
    fn default() -> Self {
        Self {
            neutrophil: TowerStats {
                deploy_count: 3,
                ..TowerStats::preset(15, 30, 15, 216.0, 1440.0, 800, 1200.0)
            },
            b_cell: TowerStats::default(),
            t_cell: TowerStats::preset(40, 80, 20, 864.0, 1152.0, 300, 1500.0),
            macrophage: TowerStats::preset(50, 150, 80, 1008.0, 1296.0, 1000, 1000.0),
        }
    }
}

impl TowerRoster {
    /// Statistics of the provided kind.
    #[must_use]
    pub const fn get(&self, kind: TowerKind) -> &TowerStats {
        match kind {
            TowerKind::Neutrophil => &self.neutrophil,
            TowerKind::BCell => &self.b_cell,
            TowerKind::TCell => &self.t_cell,
            TowerKind::Macrophage => &self.macrophage,
        }
    }

    /// Mutable statistics of the provided kind.
    pub fn get_mut(&mut self, kind: TowerKind) -> &mut TowerStats {
        match kind {
            TowerKind::Neutrophil => &mut self.neutrophil,
            TowerKind::BCell => &mut self.b_cell,
            TowerKind::TCell => &mut self.t_cell,
            TowerKind::Macrophage => &mut self.macrophage,
        }
    }
}

/// Statistics shared by every enemy of one kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyStats {
    /// Maximum health.
    pub health: u32,
    /// Damage dealt per projectile.
    pub damage: u32,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Radius within which firing is permitted.
    pub attack_range: f32,
    /// Milliseconds between shots.
    pub fire_rate_ms: u64,
    /// Maximum number of towers that may lock this enemy at once.
    pub targeted_by_slots: u32,
    /// Resources granted when the enemy is killed.
    pub reward: u32,
}

impl EnemyStats {
    /// Interval between shots.
    #[must_use]
    pub const fn fire_rate(&self) -> Duration {
        Duration::from_millis(self.fire_rate_ms)
    }
}

impl Default for EnemyStats {
    fn default() -> Self {
        Self {
            health: 60,
            damage: 15,
            speed: 80.0 * 144.0 / 1000.0,
            attack_range: 216.0,
            fire_rate_ms: 1000,
            targeted_by_slots: 3,
            reward: 5,
        }
    }
}

/// Statistics for every enemy kind.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyRoster {
    /// Common bacteria statistics.
    pub common_bacteria: EnemyStats,
}

impl EnemyRoster {
    /// Statistics of the provided kind.
    #[must_use]
    pub const fn get(&self, kind: EnemyKind) -> &EnemyStats {
        match kind {
            EnemyKind::CommonBacteria => &self.common_bacteria,
        }
    }

    /// Mutable statistics of the provided kind.
    pub fn get_mut(&mut self, kind: EnemyKind) -> &mut EnemyStats {
        match kind {
            EnemyKind::CommonBacteria => &mut self.common_bacteria,
        }
    }
}

/// Statistics of the organ.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganStats {
    /// Maximum health at level one.
    pub base_health: u32,
    /// Maximum health gained per level above one.
    pub health_per_level: u32,
    /// Resources produced per interval at level one.
    pub base_resource_gen: u32,
    /// Resources gained per interval per level above one.
    pub resource_gen_per_level: u32,
    /// Highest reachable level.
    pub max_level: u32,
    /// Resources charged per upgrade.
    pub upgrade_cost: u32,
    /// Maximum number of enemies that may attack the organ at once.
    pub attraction_slots: u32,
}

impl Default for OrganStats {
    fn default() -> Self {
        Self {
            base_health: 50,
            health_per_level: 25,
            base_resource_gen: 5,
            resource_gen_per_level: 2,
            max_level: 5,
            upgrade_cost: 40,
            attraction_slots: 5,
        }
    }
}

impl OrganStats {
    /// Maximum health at the provided level.
    #[must_use]
    pub const fn max_health_at(&self, level: u32) -> u32 {
        self.base_health + self.health_per_level * level.saturating_sub(1)
    }

    /// Resources produced per interval at the provided level.
    #[must_use]
    pub const fn resource_gen_at(&self, level: u32) -> u32 {
        self.base_resource_gen + self.resource_gen_per_level * level.saturating_sub(1)
    }
}

/// Statistics of every unit in the game.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitsConfig {
    /// Tower statistics.
    pub towers: TowerRoster,
    /// Enemy statistics.
    pub enemies: EnemyRoster,
    /// Organ statistics.
    pub organ: OrganStats,
}

/// Enemies released at the start of a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialEnemies {
    /// Kind of the released enemies.
    pub kind: EnemyKind,
    /// Number of enemies.
    pub count: u32,
    /// Milliseconds between consecutive releases.
    pub spacing_ms: u64,
}

impl Default for InitialEnemies {
    fn default() -> Self {
        Self {
            kind: EnemyKind::CommonBacteria,
            count: 5,
            spacing_ms: 400,
        }
    }
}

impl InitialEnemies {
    /// Interval between consecutive releases.
    #[must_use]
    pub const fn spacing(&self) -> Duration {
        Duration::from_millis(self.spacing_ms)
    }
}

/// Timed stream of enemies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Kind of enemy spawned by the wave.
    pub kind: EnemyKind,
    /// Second at which the wave opens.
    pub start_secs: u64,
    /// Second at which the wave closes.
    pub end_secs: u64,
    /// Milliseconds between spawns.
    pub interval_ms: u64,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            kind: EnemyKind::CommonBacteria,
            start_secs: 0,
            end_secs: 60,
            interval_ms: 1000,
        }
    }
}

impl WaveConfig {
    /// Time at which the wave opens.
    #[must_use]
    pub const fn start(&self) -> Duration {
        Duration::from_secs(self.start_secs)
    }

    /// Time at which the wave closes.
    #[must_use]
    pub const fn end(&self) -> Duration {
        Duration::from_secs(self.end_secs)
    }

    /// Interval between spawns.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Time at which a tower kind becomes placeable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerUnlock {
    /// Kind being unlocked.
    pub kind: TowerKind,
    /// Second at which the kind becomes available.
    pub at_secs: u64,
}

impl TowerUnlock {
    /// Time at which the kind becomes available.
    #[must_use]
    pub const fn at(&self) -> Duration {
        Duration::from_secs(self.at_secs)
    }
}

/// Area-of-effect skill that damages and repels every enemy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SneezeSkill {
    /// Milliseconds before the skill may be used again.
    pub cooldown_ms: u64,
    /// Damage dealt to every enemy.
    pub damage: u32,
}

impl Default for SneezeSkill {
    fn default() -> Self {
        Self {
            cooldown_ms: 20_000,
            damage: 30,
        }
    }
}

impl SneezeSkill {
    /// Interval between uses.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Pacing, economy and unlocks of a single level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Identifier recorded in campaign progress.
    pub id: String,
    /// Level unlocked when this one is completed.
    pub next_level: Option<String>,
    /// Starting player health.
    pub player_health: u32,
    /// Starting player resources.
    pub starting_resources: u32,
    /// Enemies released at the start.
    pub initial_enemies: InitialEnemies,
    /// Timed enemy waves.
    pub waves: Vec<WaveConfig>,
    /// Tower unlock schedule.
    pub tower_unlocks: Vec<TowerUnlock>,
    /// Global cap on simultaneously placed towers.
    pub max_towers: Option<u32>,
    /// Sneeze skill, if available in the level.
    pub sneeze: Option<SneezeSkill>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            id: "level_1".to_owned(),
            next_level: Some("level_2".to_owned()),
            player_health: 500,
            starting_resources: 40,
            initial_enemies: InitialEnemies::default(),
            waves: vec![
                WaveConfig::default(),
                WaveConfig {
                    start_secs: 60,
                    end_secs: 120,
                    interval_ms: 700,
                    ..WaveConfig::default()
                },
            ],
            tower_unlocks: vec![
                TowerUnlock {
                    kind: TowerKind::Neutrophil,
                    at_secs: 0,
                },
                TowerUnlock {
                    kind: TowerKind::BCell,
                    at_secs: 30,
                },
            ],
            max_towers: None,
            sneeze: Some(SneezeSkill::default()),
        }
    }
}

impl LevelConfig {
    /// Time at which the last wave closes.
    #[must_use]
    pub fn last_wave_end(&self) -> Duration {
        let waves = self.waves.iter().map(WaveConfig::end).max();
        let initial = self
            .initial_enemies
            .spacing()
            .saturating_mul(self.initial_enemies.count.saturating_sub(1));
        waves.unwrap_or(Duration::ZERO).max(initial)
    }

    /// Time at which the provided kind becomes placeable.
    ///
    /// Kinds without an unlock entry are available from the start.
    #[must_use]
    pub fn unlock_time(&self, kind: TowerKind) -> Duration {
        self.tower_unlocks
            .iter()
            .filter(|unlock| unlock.kind == kind)
            .map(TowerUnlock::at)
            .min()
            .unwrap_or(Duration::ZERO)
    }
}

/// Target scoring constants and evaluation cadence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingTuning {
    /// Constant added to every score.
    pub base_score: f32,
    /// Score lost per unit of distance.
    pub distance_weight: f32,
    /// Bonus for candidates inside attack range.
    pub in_range_bonus: f32,
    /// Bonus for candidates just outside attack range.
    pub near_range_bonus: f32,
    /// Multiple of attack range that still earns the near bonus.
    pub near_range_factor: f32,
    /// Bonus for the current target.
    pub stickiness_bonus: f32,
    /// Bonus for enemies already attacking the evaluating tower.
    pub aggressor_bonus: f32,
    /// Extra bonus for the current target on re-evaluation.
    pub lock_in_bonus: f32,
    /// Bonus per tower already locked on the candidate.
    pub focus_fire_bonus: f32,
    /// Milliseconds between ordinary evaluations.
    pub evaluation_interval_ms: u64,
    /// Milliseconds between evaluations while the target drifts out of reach.
    pub fast_evaluation_interval_ms: u64,
    /// Milliseconds between target searches of a seeking enemy.
    pub enemy_search_interval_ms: u64,
    /// Radius around a new tower within which enemies re-run target selection.
    pub retarget_radius: f32,
}

impl Default for TargetingTuning {
    fn default() -> Self {
        Self {
            base_score: 1000.0,
            distance_weight: 2.0,
            in_range_bonus: 500.0,
            near_range_bonus: 200.0,
            near_range_factor: 1.5,
            stickiness_bonus: 150.0,
            aggressor_bonus: 300.0,
            lock_in_bonus: 1000.0,
            focus_fire_bonus: 50.0,
            evaluation_interval_ms: 1000,
            fast_evaluation_interval_ms: 200,
            enemy_search_interval_ms: 500,
            retarget_radius: 200.0,
        }
    }
}

impl TargetingTuning {
    /// Interval between ordinary evaluations.
    #[must_use]
    pub const fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }

    /// Interval between evaluations while the target drifts out of reach.
    #[must_use]
    pub const fn fast_evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.fast_evaluation_interval_ms)
    }

    /// Interval between target searches of a seeking enemy.
    #[must_use]
    pub const fn enemy_search_interval(&self) -> Duration {
        Duration::from_millis(self.enemy_search_interval_ms)
    }
}

/// Placement search constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementTuning {
    /// Minimum distance between a placed point and any live entity.
    pub min_separation: f32,
    /// Number of spiral candidates tried.
    pub spiral_attempts: u32,
    /// Radius gained per spiral attempt.
    pub spiral_step: f32,
    /// Spacing of the fallback grid.
    pub grid_step: f32,
    /// Half extent of the fallback grid around the anchor.
    pub grid_radius: f32,
    /// Draws taken from the valid-area cache before giving up.
    pub cache_attempts: u32,
    /// Width of the band scanned when building the valid-area cache.
    pub cache_band_width: f32,
    /// Sampling step inside the cached band.
    pub cache_step: f32,
    /// Entity count above which only the nearest entities are checked.
    pub dense_threshold: usize,
    /// Number of nearest entities checked in dense mode.
    pub dense_neighbours: usize,
    /// Spacing between towers of one formation.
    pub formation_spacing: f32,
}

impl Default for PlacementTuning {
    fn default() -> Self {
        Self {
            min_separation: 25.0,
            spiral_attempts: 25,
            spiral_step: 10.0,
            grid_step: 30.0,
            grid_radius: 150.0,
            cache_attempts: 20,
            cache_band_width: 60.0,
            cache_step: 10.0,
            dense_threshold: 8,
            dense_neighbours: 8,
            formation_spacing: 60.0,
        }
    }
}

/// Projectile pool and destruction timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Maximum number of pooled projectiles.
    pub pool_capacity: usize,
    /// Collision radius shared by projectiles and entities.
    pub hit_radius: f32,
    /// Distance beyond the field edge at which projectiles are recycled.
    pub offscreen_margin: f32,
    /// Projectile speed of enemy shots in world units per second.
    pub enemy_projectile_speed: f32,
    /// Milliseconds between destruction phase one and final removal.
    pub removal_delay_ms: u64,
    /// Milliseconds between organ resource payouts.
    pub resource_interval_ms: u64,
    /// Horizontal knockback speed applied by the sneeze skill.
    pub knockback_speed: f32,
    /// Milliseconds the sneeze knockback lasts.
    pub knockback_ms: u64,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            pool_capacity: 100,
            hit_radius: 16.0,
            offscreen_margin: 50.0,
            enemy_projectile_speed: 400.0,
            removal_delay_ms: 500,
            resource_interval_ms: 1000,
            knockback_speed: 1500.0,
            knockback_ms: 400,
        }
    }
}

impl CombatTuning {
    /// Delay between destruction phase one and final removal.
    #[must_use]
    pub const fn removal_delay(&self) -> Duration {
        Duration::from_millis(self.removal_delay_ms)
    }

    /// Interval between organ resource payouts.
    #[must_use]
    pub const fn resource_interval(&self) -> Duration {
        Duration::from_millis(self.resource_interval_ms)
    }

    /// Duration of the sneeze knockback.
    #[must_use]
    pub const fn knockback(&self) -> Duration {
        Duration::from_millis(self.knockback_ms)
    }
}

/// Enemy steering constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringTuning {
    /// Seconds of motion projected when probing walkability ahead.
    pub probe_seconds: f32,
    /// Fraction of the velocity difference applied per tick.
    pub smoothing: f32,
    /// Fraction of the velocity shed per tick while attacking.
    pub attack_braking: f32,
}

impl Default for SteeringTuning {
    fn default() -> Self {
        Self {
            probe_seconds: 1.0 / 60.0,
            smoothing: 0.2,
            attack_braking: 0.3,
        }
    }
}
