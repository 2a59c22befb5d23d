//! Authoritative tower state management utilities.

use std::{collections::BTreeMap, f32::consts::TAU, time::Duration};

use immune_defence_core::{
    FireControl, Health, TowerId, TowerKind, TowerState, TowerStats, WorldPoint,
};

/// Tower stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct TowerRecord {
    pub(crate) id: TowerId,
    pub(crate) kind: TowerKind,
    pub(crate) position: WorldPoint,
    pub(crate) state: TowerState,
    pub(crate) health: Health,
    pub(crate) stats: TowerStats,
    pub(crate) fire: FireControl,
    pub(crate) removal_due: Option<Duration>,
}

impl TowerRecord {
    pub(crate) fn is_active(&self) -> bool {
        self.state != TowerState::Destroyed
    }
}

/// Registry that stores towers and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct TowerRegistry {
    entries: BTreeMap<TowerId, TowerRecord>,
    next_tower_id: TowerId,
}

impl TowerRegistry {
    /// Creates an empty tower registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_tower_id: TowerId::new(0),
        }
    }

    pub(crate) fn insert(
        &mut self,
        kind: TowerKind,
        position: WorldPoint,
        stats: &TowerStats,
    ) -> TowerId {
        let id = self.next_tower_id;
        self.next_tower_id = TowerId::new(id.get().saturating_add(1));
        let _ = self.entries.insert(
            id,
            TowerRecord {
                id,
                kind,
                position,
                state: TowerState::Idle,
                health: Health::new(stats.health),
                stats: stats.clone(),
                fire: FireControl::new(),
                removal_due: None,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: TowerId) -> Option<&TowerRecord> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TowerId) -> Option<&mut TowerRecord> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: TowerId) -> Option<TowerRecord> {
        self.entries.remove(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &TowerRecord> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TowerRecord> {
        self.entries.values_mut()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.iter().filter(|tower| tower.is_active()).count()
    }
}

/// Positions of a deployment of `count` towers centred on `centre`.
///
/// Pairs sit side by side, triples form a triangle and larger groups a ring.
pub(crate) fn formation(centre: WorldPoint, count: u32, spacing: f32) -> Vec<WorldPoint> {
    let (x, y) = (centre.x(), centre.y());
    match count {
        0 => Vec::new(),
        1 => vec![centre],
        2 => vec![
            WorldPoint::new(x - spacing / 2.0, y),
            WorldPoint::new(x + spacing / 2.0, y),
        ],
        3 => vec![
            WorldPoint::new(x, y - spacing * 0.6),
            WorldPoint::new(x - spacing * 0.5, y + spacing * 0.3),
            WorldPoint::new(x + spacing * 0.5, y + spacing * 0.3),
        ],
        _ => (0..count)
            .map(|index| {
                let angle = index as f32 * TAU / count as f32;
                WorldPoint::new(x + angle.cos() * spacing, y + angle.sin() * spacing)
            })
            .collect(),
    }
}
