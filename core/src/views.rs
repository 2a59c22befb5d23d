//! Immutable snapshots handed from the world to pure systems.

use std::time::Duration;

use crate::{
    EnemyId, EnemyKind, EnemyState, EnemyTarget, EntityRef, Faction, FireControl, Health,
    OrganState, ProjectileId, Shooter, TowerId, TowerKind, TowerState, Velocity, WorldPoint,
};

/// Immutable representation of a single tower's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TowerSnapshot {
    /// Identifier allocated to the tower by the world.
    pub id: TowerId,
    /// Kind of tower that was constructed.
    pub kind: TowerKind,
    /// Position of the tower.
    pub position: WorldPoint,
    /// Lifecycle state.
    pub state: TowerState,
    /// Remaining health.
    pub health: Health,
    /// Radius within which firing is permitted.
    pub attack_range: f32,
    /// Radius within which candidates are discovered.
    pub detection_range: f32,
    /// Maximum number of simultaneous attackers.
    pub attraction_slots: u32,
    /// Number of enemies currently attacking the tower.
    pub attackers: u32,
    /// Enemy currently locked as primary target.
    pub target: Option<EnemyId>,
    /// Fire-rate gate of the tower.
    pub fire: FireControl,
}

impl TowerSnapshot {
    /// Reports whether the tower still takes part in combat.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != TowerState::Destroyed
    }

    /// Reports whether another enemy may claim the tower.
    #[must_use]
    pub fn has_free_slot(&self) -> bool {
        self.is_active() && self.attackers < self.attraction_slots
    }
}

/// Read-only snapshot describing all towers in the arena.
#[derive(Clone, Debug, Default)]
pub struct TowerView {
    snapshots: Vec<TowerSnapshot>,
}

impl TowerView {
    /// Creates a new tower view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TowerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured tower snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TowerSnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of the provided tower.
    #[must_use]
    pub fn get(&self, id: TowerId) -> Option<&TowerSnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TowerSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single enemy's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Identifier allocated to the enemy by the world.
    pub id: EnemyId,
    /// Kind of the enemy.
    pub kind: EnemyKind,
    /// Position of the enemy.
    pub position: WorldPoint,
    /// Current velocity.
    pub velocity: Velocity,
    /// Lifecycle state.
    pub state: EnemyState,
    /// Remaining health.
    pub health: Health,
    /// Movement speed in world units per second.
    pub speed: f32,
    /// Radius within which firing is permitted.
    pub attack_range: f32,
    /// Maximum number of towers that may lock the enemy.
    pub targeted_by_slots: u32,
    /// Number of towers currently locking the enemy.
    pub locked_by: u32,
    /// Target currently claimed by the enemy.
    pub target: Option<EnemyTarget>,
    /// Fire-rate gate of the enemy.
    pub fire: FireControl,
    /// Time until which a knockback overrides steering.
    pub knockback_until: Option<Duration>,
}

impl EnemySnapshot {
    /// Reports whether the enemy still takes part in combat.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != EnemyState::Dying
    }

    /// Reports whether another tower may lock the enemy.
    #[must_use]
    pub fn can_be_targeted(&self) -> bool {
        self.is_active() && self.locked_by < self.targeted_by_slots
    }
}

/// Read-only snapshot describing all enemies in the arena.
#[derive(Clone, Debug, Default)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a new enemy view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured enemy snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Looks up the snapshot of the provided enemy.
    #[must_use]
    pub fn get(&self, id: EnemyId) -> Option<&EnemySnapshot> {
        self.snapshots
            .binary_search_by_key(&id, |snapshot| snapshot.id)
            .ok()
            .map(|index| &self.snapshots[index])
    }

    /// Number of captured enemies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no enemies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}

/// Immutable representation of the organ.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrganSnapshot {
    /// Position of the organ.
    pub position: WorldPoint,
    /// Lifecycle state.
    pub state: OrganState,
    /// Remaining health.
    pub health: Health,
    /// Maximum health at the current level.
    pub max_health: Health,
    /// Current level.
    pub level: u32,
    /// Maximum number of simultaneous attackers.
    pub attraction_slots: u32,
    /// Number of enemies currently attacking the organ.
    pub attackers: u32,
}

impl OrganSnapshot {
    /// Reports whether another enemy may claim the organ.
    #[must_use]
    pub fn has_free_slot(&self) -> bool {
        self.state == OrganState::Healthy && self.attackers < self.attraction_slots
    }
}

/// Immutable representation of an in-flight projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileSnapshot {
    /// Pooled handle.
    pub id: ProjectileId,
    /// Entity that fired the projectile.
    pub shooter: Shooter,
    /// Side owning the projectile.
    pub faction: Faction,
    /// Entity the projectile was aimed at.
    pub target: EntityRef,
    /// Firing origin.
    pub origin: WorldPoint,
    /// Current position.
    pub position: WorldPoint,
    /// Current velocity.
    pub velocity: Velocity,
    /// Maximum straight-line distance from the origin.
    pub max_range: Option<f32>,
}
