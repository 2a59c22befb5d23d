//! Bidirectional slot ledger linking towers, enemies and the organ.
//!
//! Both directions of every link live in this one structure and are only
//! mutated together, so a lock or claim can never be one-sided.

use std::collections::{BTreeMap, BTreeSet};

use immune_defence_core::{DefenderRef, EnemyId, EnemyTarget, SlotError, TowerId};

#[derive(Debug, Default)]
pub(crate) struct AggroLedger {
    tower_locks: BTreeMap<TowerId, EnemyId>,
    locked_by: BTreeMap<EnemyId, BTreeSet<TowerId>>,
    engagements: BTreeMap<EnemyId, EnemyTarget>,
    attackers: BTreeMap<DefenderRef, BTreeSet<EnemyId>>,
}

impl AggroLedger {
    pub(crate) fn lock_of(&self, tower: TowerId) -> Option<EnemyId> {
        self.tower_locks.get(&tower).copied()
    }

    pub(crate) fn lock_count(&self, enemy: EnemyId) -> u32 {
        self.locked_by
            .get(&enemy)
            .map_or(0, |towers| towers.len() as u32)
    }

    pub(crate) fn engagement_of(&self, enemy: EnemyId) -> Option<EnemyTarget> {
        self.engagements.get(&enemy).copied()
    }

    pub(crate) fn attacker_count(&self, defender: DefenderRef) -> u32 {
        self.attackers
            .get(&defender)
            .map_or(0, |enemies| enemies.len() as u32)
    }

    /// Locks `enemy` for `tower`, releasing the tower's previous lock first.
    ///
    /// Returns the enemy whose lock was released, if any. The slot cap is
    /// checked before anything is torn down, so a refused lock leaves the
    /// previous one intact.
    pub(crate) fn lock(
        &mut self,
        tower: TowerId,
        enemy: EnemyId,
        targeted_by_slots: u32,
    ) -> Result<Option<EnemyId>, SlotError> {
        if self.lock_of(tower) == Some(enemy) {
            return Ok(None);
        }

        if self.lock_count(enemy) >= targeted_by_slots {
            return Err(SlotError::Saturated);
        }

        let released = self.release_lock(tower);
        let _ = self.tower_locks.insert(tower, enemy);
        let _ = self.locked_by.entry(enemy).or_default().insert(tower);
        Ok(released)
    }

    /// Releases the lock held by `tower`, returning the enemy it referenced.
    pub(crate) fn release_lock(&mut self, tower: TowerId) -> Option<EnemyId> {
        let enemy = self.tower_locks.remove(&tower)?;
        if let Some(towers) = self.locked_by.get_mut(&enemy) {
            let _ = towers.remove(&tower);
            if towers.is_empty() {
                let _ = self.locked_by.remove(&enemy);
            }
        }
        Some(enemy)
    }

    /// Claims `target` for `enemy`, releasing the enemy's previous claim first.
    ///
    /// `attraction_slots` is `None` for targets without a cap.
    pub(crate) fn engage(
        &mut self,
        enemy: EnemyId,
        target: EnemyTarget,
        attraction_slots: Option<u32>,
    ) -> Result<Option<EnemyTarget>, SlotError> {
        if self.engagement_of(enemy) == Some(target) {
            return Ok(None);
        }

        if let (Some(defender), Some(slots)) = (target.defender(), attraction_slots) {
            if self.attacker_count(defender) >= slots {
                return Err(SlotError::Saturated);
            }
        }

        let released = self.disengage(enemy);
        let _ = self.engagements.insert(enemy, target);
        if let Some(defender) = target.defender() {
            let _ = self.attackers.entry(defender).or_default().insert(enemy);
        }
        Ok(released)
    }

    /// Drops the claim held by `enemy`, returning the released target.
    pub(crate) fn disengage(&mut self, enemy: EnemyId) -> Option<EnemyTarget> {
        let target = self.engagements.remove(&enemy)?;
        if let Some(defender) = target.defender() {
            if let Some(enemies) = self.attackers.get_mut(&defender) {
                let _ = enemies.remove(&enemy);
                if enemies.is_empty() {
                    let _ = self.attackers.remove(&defender);
                }
            }
        }
        Some(target)
    }

    /// Tears down every tower lock referencing `enemy`.
    pub(crate) fn release_lockers(&mut self, enemy: EnemyId) -> Vec<TowerId> {
        let towers: Vec<TowerId> = self
            .locked_by
            .remove(&enemy)
            .map(|towers| towers.into_iter().collect())
            .unwrap_or_default();
        for tower in &towers {
            let _ = self.tower_locks.remove(tower);
        }
        towers
    }

    /// Tears down every claim referencing `defender`.
    pub(crate) fn release_attackers(&mut self, defender: DefenderRef) -> Vec<EnemyId> {
        let enemies: Vec<EnemyId> = self
            .attackers
            .remove(&defender)
            .map(|enemies| enemies.into_iter().collect())
            .unwrap_or_default();
        for enemy in &enemies {
            let _ = self.engagements.remove(enemy);
        }
        enemies
    }

    /// Checks that both directions of every link agree.
    pub(crate) fn check_symmetry(&self) -> Result<(), String> {
        for (tower, enemy) in &self.tower_locks {
            let mirrored = self
                .locked_by
                .get(enemy)
                .is_some_and(|towers| towers.contains(tower));
            if !mirrored {
                return Err(format!("{tower:?} locks {enemy:?} without a back-reference"));
            }
        }
        for (enemy, towers) in &self.locked_by {
            for tower in towers {
                if self.tower_locks.get(tower) != Some(enemy) {
                    return Err(format!("{enemy:?} lists {tower:?} which does not lock it"));
                }
            }
        }
        for (enemy, target) in &self.engagements {
            if let Some(defender) = target.defender() {
                let mirrored = self
                    .attackers
                    .get(&defender)
                    .is_some_and(|enemies| enemies.contains(enemy));
                if !mirrored {
                    return Err(format!("{enemy:?} claims {defender:?} without a back-reference"));
                }
            }
        }
        for (defender, enemies) in &self.attackers {
            for enemy in enemies {
                if self.engagements.get(enemy).and_then(|target| target.defender())
                    != Some(*defender)
                {
                    return Err(format!("{defender:?} lists {enemy:?} which does not claim it"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower(id: u32) -> TowerId {
        TowerId::new(id)
    }

    fn enemy(id: u32) -> EnemyId {
        EnemyId::new(id)
    }

    #[test]
    fn lock_respects_targeted_by_slots() {
        let mut ledger = AggroLedger::default();
        for id in 0..3 {
            assert_eq!(ledger.lock(tower(id), enemy(7), 3), Ok(None));
        }

        assert_eq!(ledger.lock(tower(9), enemy(7), 3), Err(SlotError::Saturated));
        assert_eq!(ledger.lock_count(enemy(7)), 3);
        assert_eq!(ledger.lock_of(tower(9)), None);
        assert!(ledger.check_symmetry().is_ok());
    }

    #[test]
    fn relocking_releases_previous_target_first() {
        let mut ledger = AggroLedger::default();
        assert_eq!(ledger.lock(tower(1), enemy(1), 3), Ok(None));
        assert_eq!(ledger.lock(tower(1), enemy(2), 3), Ok(Some(enemy(1))));

        assert_eq!(ledger.lock_count(enemy(1)), 0);
        assert_eq!(ledger.lock_count(enemy(2)), 1);
        assert!(ledger.check_symmetry().is_ok());
    }

    #[test]
    fn refused_lock_keeps_existing_lock() {
        let mut ledger = AggroLedger::default();
        assert_eq!(ledger.lock(tower(1), enemy(1), 3), Ok(None));
        assert_eq!(ledger.lock(tower(2), enemy(2), 1), Ok(None));

        assert_eq!(ledger.lock(tower(1), enemy(2), 1), Err(SlotError::Saturated));
        assert_eq!(ledger.lock_of(tower(1)), Some(enemy(1)));
    }

    #[test]
    fn boundary_claims_bypass_slot_bookkeeping() {
        let mut ledger = AggroLedger::default();
        for id in 0..10 {
            assert_eq!(
                ledger.engage(enemy(id), EnemyTarget::BoundaryLine, None),
                Ok(None)
            );
        }
        assert_eq!(ledger.attacker_count(DefenderRef::Organ), 0);
        assert!(ledger.check_symmetry().is_ok());
    }

    #[test]
    fn releasing_a_defender_clears_every_claim() {
        let mut ledger = AggroLedger::default();
        let organ = EnemyTarget::Defender(DefenderRef::Organ);
        assert_eq!(ledger.engage(enemy(1), organ, Some(5)), Ok(None));
        assert_eq!(ledger.engage(enemy(2), organ, Some(5)), Ok(None));

        let released = ledger.release_attackers(DefenderRef::Organ);

        assert_eq!(released, vec![enemy(1), enemy(2)]);
        assert_eq!(ledger.engagement_of(enemy(1)), None);
        assert_eq!(ledger.attacker_count(DefenderRef::Organ), 0);
        assert!(ledger.check_symmetry().is_ok());
    }

    #[test]
    fn releasing_an_enemy_clears_every_lock() {
        let mut ledger = AggroLedger::default();
        assert_eq!(ledger.lock(tower(1), enemy(4), 3), Ok(None));
        assert_eq!(ledger.lock(tower(2), enemy(4), 3), Ok(None));

        assert_eq!(ledger.release_lockers(enemy(4)), vec![tower(1), tower(2)]);
        assert_eq!(ledger.lock_of(tower(1)), None);
        assert!(ledger.check_symmetry().is_ok());
    }
}
