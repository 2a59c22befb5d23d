//! Authoritative enemy state.

use std::{collections::BTreeMap, time::Duration};

use immune_defence_core::{
    EnemyId, EnemyKind, EnemyState, EnemyStats, FireControl, Health, Velocity, WorldPoint,
};

#[derive(Clone, Debug)]
pub(crate) struct EnemyRecord {
    pub(crate) id: EnemyId,
    pub(crate) kind: EnemyKind,
    pub(crate) position: WorldPoint,
    pub(crate) velocity: Velocity,
    pub(crate) state: EnemyState,
    pub(crate) health: Health,
    pub(crate) stats: EnemyStats,
    pub(crate) fire: FireControl,
    pub(crate) knockback_until: Option<Duration>,
    pub(crate) reached_goal: bool,
    pub(crate) removal_due: Option<Duration>,
}

impl EnemyRecord {
    pub(crate) fn is_active(&self) -> bool {
        self.state != EnemyState::Dying
    }

    pub(crate) fn is_knocked_back(&self) -> bool {
        self.knockback_until.is_some()
    }
}

#[derive(Debug)]
pub(crate) struct EnemyRegistry {
    entries: BTreeMap<EnemyId, EnemyRecord>,
    next_enemy_id: EnemyId,
}

impl EnemyRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_enemy_id: EnemyId::new(0),
        }
    }

    pub(crate) fn insert(
        &mut self,
        kind: EnemyKind,
        position: WorldPoint,
        stats: &EnemyStats,
    ) -> EnemyId {
        let id = self.next_enemy_id;
        self.next_enemy_id = EnemyId::new(id.get().saturating_add(1));
        let _ = self.entries.insert(
            id,
            EnemyRecord {
                id,
                kind,
                position,
                velocity: Velocity::ZERO,
                state: EnemyState::Seeking,
                health: Health::new(stats.health),
                stats: stats.clone(),
                fire: FireControl::new(),
                knockback_until: None,
                reached_goal: false,
                removal_due: None,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: EnemyId) -> Option<&EnemyRecord> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EnemyId) -> Option<&mut EnemyRecord> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: EnemyId) -> Option<EnemyRecord> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &EnemyRecord> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut EnemyRecord> {
        self.entries.values_mut()
    }

    pub(crate) fn active_ids(&self) -> Vec<EnemyId> {
        self.iter()
            .filter(|enemy| enemy.is_active())
            .map(|enemy| enemy.id)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
