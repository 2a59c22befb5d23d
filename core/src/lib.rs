#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Immune Defence engine.
//!
//! This crate defines the message surface that connects hosts, the
//! authoritative world, and pure systems. Hosts and systems submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values that systems
//! and presentation layers consume. Systems read immutable views and respond
//! exclusively with new command batches.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod config;
mod views;

pub use config::{
    ArenaConfig, CombatTuning, EnemyRoster, EnemyStats, InitialEnemies, LevelConfig, OrganStats,
    PlacementTuning, SimulationConfig, SneezeSkill, SteeringTuning, TargetingTuning, TowerRoster,
    TowerStats, TowerUnlock, UnitsConfig, WaveConfig,
};
pub use views::{
    EnemySnapshot, EnemyView, OrganSnapshot, ProjectileSnapshot, TowerSnapshot, TowerView,
};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock to `now`, `dt` after the previous tick.
    Tick {
        /// Absolute simulation time after the tick.
        now: Duration,
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that an enemy be spawned as close as possible to `anchor`.
    SpawnEnemy {
        /// Kind of enemy to create.
        kind: EnemyKind,
        /// Desired spawn point handed to the placement search.
        anchor: WorldPoint,
    },
    /// Requests placement of a tower (or a formation of towers) at `position`.
    PlaceTower {
        /// Kind of tower to construct.
        kind: TowerKind,
        /// Centre of the placement.
        position: WorldPoint,
    },
    /// Requests that a tower lock the provided enemy as its primary target.
    LockTarget {
        /// Tower acquiring the lock.
        tower: TowerId,
        /// Enemy that should be locked.
        enemy: EnemyId,
    },
    /// Requests that a tower drop its current primary target.
    ReleaseTarget {
        /// Tower releasing its lock.
        tower: TowerId,
    },
    /// Requests that an enemy claim the provided target.
    EngageTarget {
        /// Enemy choosing a target.
        enemy: EnemyId,
        /// Target the enemy wants to attack.
        target: EnemyTarget,
    },
    /// Applies a steering velocity to an enemy for the current tick.
    SteerEnemy {
        /// Enemy being steered.
        enemy: EnemyId,
        /// Velocity in world units per second.
        velocity: Velocity,
    },
    /// Integrates every enemy velocity over the current tick.
    AdvanceEnemies,
    /// Requests that a combatant fire at its primary target.
    Fire {
        /// Entity pulling the trigger.
        shooter: Shooter,
    },
    /// Moves every active projectile and resolves hits for the current tick.
    ResolveProjectiles,
    /// Completes the second destruction phase for an entity.
    FinalizeRemoval {
        /// Entity whose presentation delay elapsed.
        entity: EntityRef,
    },
    /// Requests an organ upgrade paid from player resources.
    UpgradeOrgan,
    /// Triggers the sneeze skill against every live enemy.
    UseSneeze,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Absolute simulation time after the tick.
        now: Duration,
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an enemy entered the simulation.
    EnemySpawned {
        /// Identifier assigned to the enemy.
        enemy: EnemyId,
        /// Kind of the spawned enemy.
        kind: EnemyKind,
        /// Position chosen by the placement search.
        position: WorldPoint,
    },
    /// Reports that a spawn request could not be satisfied.
    EnemySpawnRejected {
        /// Kind requested.
        kind: EnemyKind,
        /// Reason the spawn failed.
        reason: SpawnError,
    },
    /// Confirms that a tower was placed.
    TowerPlaced {
        /// Identifier assigned to the tower.
        tower: TowerId,
        /// Kind of the tower.
        kind: TowerKind,
        /// Position of the tower.
        position: WorldPoint,
    },
    /// Reports that a tower placement request was rejected.
    TowerPlacementRejected {
        /// Kind requested.
        kind: TowerKind,
        /// Requested placement centre.
        position: WorldPoint,
        /// Reason the placement failed.
        reason: PlacementError,
    },
    /// A tower locked an enemy as its primary target.
    TargetLocked {
        /// Tower holding the lock.
        tower: TowerId,
        /// Locked enemy.
        enemy: EnemyId,
    },
    /// A tower lock was torn down.
    TargetReleased {
        /// Tower that held the lock.
        tower: TowerId,
        /// Enemy that was locked.
        enemy: EnemyId,
    },
    /// A lock request was refused by slot arbitration.
    LockRejected {
        /// Tower requesting the lock.
        tower: TowerId,
        /// Enemy requested.
        enemy: EnemyId,
        /// Reason for the refusal.
        reason: SlotError,
    },
    /// An enemy claimed a target.
    EngagementStarted {
        /// Enemy attacking.
        enemy: EnemyId,
        /// Claimed target.
        target: EnemyTarget,
    },
    /// An enemy claim was torn down.
    EngagementEnded {
        /// Enemy that held the claim.
        enemy: EnemyId,
        /// Target that was claimed.
        target: EnemyTarget,
    },
    /// An engagement request was refused by slot arbitration.
    EngagementRejected {
        /// Enemy requesting the claim.
        enemy: EnemyId,
        /// Target requested.
        target: EnemyTarget,
        /// Reason for the refusal.
        reason: SlotError,
    },
    /// A projectile left its shooter.
    ProjectileFired {
        /// Pooled projectile handle.
        projectile: ProjectileId,
        /// Entity that fired.
        shooter: Shooter,
        /// Firing origin.
        origin: WorldPoint,
        /// Facing rotation in radians.
        rotation: f32,
    },
    /// A projectile returned to the pool.
    ProjectileReleased {
        /// Pooled projectile handle.
        projectile: ProjectileId,
        /// Why the flight ended.
        reason: ProjectileRelease,
    },
    /// A shot could not be fired because every pooled projectile is in flight.
    ShotFizzled {
        /// Entity that attempted to fire.
        shooter: Shooter,
    },
    /// An entity lost health.
    EntityDamaged {
        /// Entity that was hit.
        entity: EntityRef,
        /// Damage applied.
        damage: u32,
        /// Remaining health.
        health: Health,
    },
    /// An enemy was killed (destruction phase one).
    EnemyDefeated {
        /// Enemy that died.
        enemy: EnemyId,
        /// Resources granted to the player.
        reward: u32,
    },
    /// An enemy reached the goal line.
    EnemyReachedGoal {
        /// Enemy at the boundary.
        enemy: EnemyId,
        /// Reward value of the enemy.
        reward: u32,
    },
    /// A tower was destroyed (destruction phase one).
    TowerDestroyed {
        /// Tower that died.
        tower: TowerId,
    },
    /// An entity was removed from every active collection (phase two).
    EntityRemoved {
        /// Entity that was removed.
        entity: EntityRef,
    },
    /// The organ was damaged.
    OrganDamaged {
        /// Remaining organ health.
        health: Health,
        /// Maximum organ health.
        max_health: Health,
    },
    /// The organ reached zero health.
    OrganDestroyed,
    /// The organ was upgraded.
    OrganUpgraded {
        /// New organ level.
        level: u32,
        /// Restored health.
        health: Health,
        /// Resources produced per interval at the new level.
        resource_gen: u32,
    },
    /// The organ produced resources.
    ResourceGenerated {
        /// Amount added to the player pool.
        amount: u32,
    },
    /// The player's resources changed.
    ResourcesChanged {
        /// Current resources.
        resources: u32,
    },
    /// The player's global health pool changed.
    PlayerHealthChanged {
        /// Current player health.
        health: Health,
    },
    /// The sneeze skill fired.
    SneezeUsed {
        /// Number of enemies hit.
        enemies_hit: usize,
    },
    /// Every wave ended with the player alive and the arena cleared.
    LevelCompleted,
    /// The level can no longer be played.
    GameOver {
        /// Why the game ended.
        reason: GameOverReason,
    },
}

/// Unique identifier assigned to a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tower identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Handle to a pooled projectile instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectileId(u32);

impl ProjectileId {
    /// Creates a new projectile handle with the provided slot index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the slot index of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Structure that can hold attraction slots for attackers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefenderRef {
    /// A placed tower.
    Tower(TowerId),
    /// The single organ.
    Organ,
}

/// Anything an enemy may claim as its primary target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyTarget {
    /// A tower or the organ.
    Defender(DefenderRef),
    /// The indestructible goal line.
    BoundaryLine,
}

impl EnemyTarget {
    /// Returns the defender behind the target, if it is not the boundary line.
    #[must_use]
    pub const fn defender(self) -> Option<DefenderRef> {
        match self {
            Self::Defender(defender) => Some(defender),
            Self::BoundaryLine => None,
        }
    }
}

/// Reference to any health-bearing entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityRef {
    /// A tower.
    Tower(TowerId),
    /// An enemy.
    Enemy(EnemyId),
    /// The organ.
    Organ,
}

impl From<DefenderRef> for EntityRef {
    fn from(defender: DefenderRef) -> Self {
        match defender {
            DefenderRef::Tower(tower) => Self::Tower(tower),
            DefenderRef::Organ => Self::Organ,
        }
    }
}

/// Combat-capable entity that may fire projectiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shooter {
    /// A tower firing at its locked enemy.
    Tower(TowerId),
    /// An enemy firing at its claimed target.
    Enemy(EnemyId),
}

impl Shooter {
    /// Faction that owns projectiles fired by this shooter.
    #[must_use]
    pub const fn faction(self) -> Faction {
        match self {
            Self::Tower(_) => Faction::Defender,
            Self::Enemy(_) => Faction::Attacker,
        }
    }
}

/// Side that owns a projectile, selecting which collision pairs apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Towers and the organ.
    Defender,
    /// Enemies.
    Attacker,
}

/// Kinds of towers the player can deploy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerKind {
    /// Short-ranged swarm deployed in formation.
    Neutrophil,
    /// Medium-ranged rapid shooter.
    BCell,
    /// Long-ranged very rapid shooter.
    TCell,
    /// Heavy long-ranged shooter.
    Macrophage,
}

/// Kinds of enemies spawned by waves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    /// Baseline bacterium.
    CommonBacteria,
}

/// Lifecycle of a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TowerState {
    /// No enemy inside the detection radius.
    Idle,
    /// Enemies detected but no lock is held.
    Seeking,
    /// A primary target is locked.
    Engaged,
    /// Health reached zero; awaiting final removal.
    Destroyed,
}

/// Lifecycle of an enemy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyState {
    /// No target claimed.
    Seeking,
    /// Moving toward a claimed target.
    Advancing,
    /// Holding position and firing at the claimed target.
    Attacking,
    /// Health reached zero; awaiting final removal.
    Dying,
}

/// Lifecycle of the organ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganState {
    /// Alive, attackable, producing resources.
    Healthy,
    /// Health reached zero; the organ stays in place but is inert.
    Destroyed,
}

/// Why a projectile was returned to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileRelease {
    /// The projectile struck an opposing entity.
    Hit,
    /// The projectile left the arena by more than the configured margin.
    OutOfBounds,
    /// The projectile travelled beyond its maximum range.
    RangeExceeded,
}

/// Why the level ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOverReason {
    /// The player's global health reached zero.
    HealthDepleted,
}

/// Reasons a tower placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum PlacementError {
    /// The position is not walkable or lies outside the placeable area.
    #[error("placement blocked by terrain or arena bounds")]
    Blocked,
    /// The global tower population cap is reached.
    #[error("tower population cap reached")]
    OverCapacity,
    /// The player cannot afford the tower.
    #[error("insufficient resources")]
    InsufficientResources,
    /// The tower kind is not unlocked yet.
    #[error("tower kind is not unlocked yet")]
    Locked,
    /// The level already ended.
    #[error("the level is over")]
    GameOver,
}

/// Reasons a player action such as an upgrade or skill may be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ActionError {
    /// The player cannot afford the action.
    #[error("insufficient resources")]
    InsufficientResources,
    /// The organ already reached its highest level.
    #[error("organ is at its maximum level")]
    MaxLevel,
    /// The skill is still cooling down.
    #[error("skill is on cooldown")]
    OnCooldown,
    /// The action is not available in this level or state.
    #[error("action unavailable")]
    Unavailable,
    /// The level already ended.
    #[error("the level is over")]
    GameOver,
}

/// Reasons a spawn request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum SpawnError {
    /// Every placement tier was exhausted.
    #[error("no valid spawn position")]
    NoValidPosition,
    /// The level already ended.
    #[error("the level is over")]
    GameOver,
}

/// Reasons slot arbitration may refuse a lock or claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum SlotError {
    /// Every attraction slot of the requested entity is taken.
    #[error("every attraction slot is taken")]
    Saturated,
    /// The requested entity is dead or out of reach.
    #[error("target is no longer valid")]
    Inactive,
    /// The identifier does not name a live entity.
    #[error("unknown entity")]
    Unknown,
}

/// Health pool of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Health(u32);

impl Health {
    /// Creates a new health value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric health value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Reports whether the pool is exhausted.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the health remaining after `damage`, clamped at zero.
    #[must_use]
    pub const fn saturating_sub(self, damage: u32) -> Self {
        Self(self.0.saturating_sub(damage))
    }
}

/// Point in continuous arena space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    x: f32,
    y: f32,
}

impl WorldPoint {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: WorldPoint) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared Euclidean distance between two points.
    #[must_use]
    pub fn distance_squared(self, other: WorldPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Angle in radians of the ray from `self` toward `other`.
    #[must_use]
    pub fn angle_to(self, other: WorldPoint) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Point displaced by `velocity` integrated over `dt`.
    #[must_use]
    pub fn advanced(self, velocity: Velocity, dt: Duration) -> Self {
        let seconds = dt.as_secs_f32();
        Self::new(
            self.x + velocity.dx() * seconds,
            self.y + velocity.dy() * seconds,
        )
    }
}

/// Velocity in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    dx: f32,
    dy: f32,
}

impl Velocity {
    /// Stationary velocity.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Creates a new velocity.
    #[must_use]
    pub const fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy }
    }

    /// Velocity of magnitude `speed` along `angle` radians.
    #[must_use]
    pub fn from_angle(angle: f32, speed: f32) -> Self {
        Self::new(angle.cos() * speed, angle.sin() * speed)
    }

    /// Horizontal component.
    #[must_use]
    pub const fn dx(&self) -> f32 {
        self.dx
    }

    /// Vertical component.
    #[must_use]
    pub const fn dy(&self) -> f32 {
        self.dy
    }

    /// Magnitude of the velocity.
    #[must_use]
    pub fn speed(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }

    /// Moves `self` toward `target` by `factor` of the difference.
    #[must_use]
    pub fn approach(self, target: Velocity, factor: f32) -> Self {
        Self::new(
            self.dx + (target.dx - self.dx) * factor,
            self.dy + (target.dy - self.dy) * factor,
        )
    }
}

/// Axis-aligned rectangle in arena space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    min: WorldPoint,
    max: WorldPoint,
}

impl Bounds {
    /// Creates bounds from two corners.
    #[must_use]
    pub const fn new(min: WorldPoint, max: WorldPoint) -> Self {
        Self { min, max }
    }

    /// Bounds spanning `[0, width] x [0, height]`.
    #[must_use]
    pub const fn from_size(width: f32, height: f32) -> Self {
        Self::new(WorldPoint::new(0.0, 0.0), WorldPoint::new(width, height))
    }

    /// Upper-left corner.
    #[must_use]
    pub const fn min(&self) -> WorldPoint {
        self.min
    }

    /// Lower-right corner.
    #[must_use]
    pub const fn max(&self) -> WorldPoint {
        self.max
    }

    /// Reports whether the point lies inside the bounds, edges included.
    #[must_use]
    pub fn contains(&self, point: WorldPoint) -> bool {
        point.x() >= self.min.x()
            && point.x() <= self.max.x()
            && point.y() >= self.min.y()
            && point.y() <= self.max.y()
    }

    /// Returns the nearest point inside the bounds.
    #[must_use]
    pub fn clamp(&self, point: WorldPoint) -> WorldPoint {
        WorldPoint::new(
            point.x().clamp(self.min.x(), self.max.x().max(self.min.x())),
            point.y().clamp(self.min.y(), self.max.y().max(self.min.y())),
        )
    }

    /// Bounds grown by `margin` on every side (shrunk for negative margins).
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(
            WorldPoint::new(self.min.x() - margin, self.min.y() - margin),
            WorldPoint::new(self.max.x() + margin, self.max.y() + margin),
        )
    }
}

/// Fire-rate gate held by every combat-capable entity.
///
/// A fresh gate is ready immediately. After a shot at `now` the gate opens
/// again strictly after `now + fire_rate`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireControl {
    next_fire_at: Option<Duration>,
}

impl FireControl {
    /// Creates a gate that permits the first shot immediately.
    #[must_use]
    pub const fn new() -> Self {
        Self { next_fire_at: None }
    }

    /// Reports whether firing is permitted at `now`.
    #[must_use]
    pub fn is_ready(&self, now: Duration) -> bool {
        self.next_fire_at.map_or(true, |next| now > next)
    }

    /// Records a shot taken at `now` with the provided fire rate.
    pub fn record_shot(&mut self, now: Duration, fire_rate: Duration) {
        self.next_fire_at = Some(now.saturating_add(fire_rate));
    }

    /// Time after which the next shot is permitted, if a shot was taken.
    #[must_use]
    pub const fn next_fire_at(&self) -> Option<Duration> {
        self.next_fire_at
    }
}

/// Query surface answering point traversability.
pub trait Walkability {
    /// Reports whether an entity may stand at `point`.
    fn is_walkable(&self, point: WorldPoint) -> bool;
}

impl<W: Walkability + ?Sized> Walkability for &W {
    fn is_walkable(&self, point: WorldPoint) -> bool {
        (**self).is_walkable(point)
    }
}

/// Walkability oracle that accepts every point.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenField;

impl Walkability for OpenField {
    fn is_walkable(&self, _point: WorldPoint) -> bool {
        true
    }
}

/// Persisted campaign progress.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    /// Levels the player finished.
    pub completed_levels: BTreeSet<String>,
    /// Levels the player may start.
    pub unlocked_levels: BTreeSet<String>,
}

impl Progress {
    /// Records a completed level and unlocks its successor, if any.
    ///
    /// Returns `true` when the progress changed.
    pub fn record_completion(&mut self, level: &str, next_level: Option<&str>) -> bool {
        let mut changed = self.completed_levels.insert(level.to_owned());
        changed |= self.unlocked_levels.insert(level.to_owned());
        if let Some(next) = next_level {
            changed |= self.unlocked_levels.insert(next.to_owned());
        }
        changed
    }
}

/// Port through which campaign progress is loaded and saved.
pub trait ProgressStore {
    /// Error produced by the backing storage.
    type Error;

    /// Loads the stored progress, returning defaults when none exists.
    fn load_progress(&self) -> Result<Progress, Self::Error>;

    /// Persists the provided progress.
    fn save_progress(&mut self, progress: &Progress) -> Result<(), Self::Error>;
}
