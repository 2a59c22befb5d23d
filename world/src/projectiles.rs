//! Fixed-capacity projectile pool.
//!
//! Slots are allocated lazily up to the configured capacity and recycled via
//! a free list. A released slot holds no flight state at all, so a reused
//! handle starts exactly like a freshly allocated one.

use std::time::Duration;

use immune_defence_core::{
    EntityRef, Faction, ProjectileId, ProjectileSnapshot, Shooter, Velocity, WorldPoint,
};

/// Per-flight state stamped onto a pooled projectile when it is fired.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Flight {
    pub(crate) shooter: Shooter,
    pub(crate) target: EntityRef,
    pub(crate) damage: u32,
    pub(crate) origin: WorldPoint,
    pub(crate) position: WorldPoint,
    pub(crate) velocity: Velocity,
    pub(crate) max_range: Option<f32>,
}

impl Flight {
    pub(crate) fn faction(&self) -> Faction {
        self.shooter.faction()
    }

    pub(crate) fn range_exceeded(&self) -> bool {
        self.max_range
            .is_some_and(|range| self.origin.distance_squared(self.position) > range * range)
    }
}

#[derive(Debug)]
pub(crate) struct ProjectilePool {
    slots: Vec<Option<Flight>>,
    free: Vec<ProjectileId>,
    capacity: usize,
}

impl ProjectilePool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    /// Activates a projectile for `flight`, or `None` when every slot is in flight.
    pub(crate) fn acquire(&mut self, flight: Flight) -> Option<ProjectileId> {
        if let Some(id) = self.free.pop() {
            self.slots[id.get() as usize] = Some(flight);
            return Some(id);
        }

        if self.slots.len() >= self.capacity {
            log::debug!("projectile pool exhausted at {} slots", self.capacity);
            return None;
        }

        let id = ProjectileId::new(self.slots.len() as u32);
        self.slots.push(Some(flight));
        Some(id)
    }

    /// Returns the projectile to the pool. Releasing an idle handle is a no-op.
    pub(crate) fn release(&mut self, id: ProjectileId) -> bool {
        match self.slots.get_mut(id.get() as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn flight(&self, id: ProjectileId) -> Option<&Flight> {
        self.slots.get(id.get() as usize).and_then(Option::as_ref)
    }

    /// Moves the projectile along its velocity, returning the previous position.
    pub(crate) fn advance(&mut self, id: ProjectileId, dt: Duration) -> Option<WorldPoint> {
        let flight = self.slots.get_mut(id.get() as usize)?.as_mut()?;
        let previous = flight.position;
        flight.position = previous.advanced(flight.velocity, dt);
        Some(previous)
    }

    pub(crate) fn active_ids(&self) -> impl Iterator<Item = ProjectileId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| ProjectileId::new(index as u32))
    }

    pub(crate) fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn allocated(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn snapshots(&self) -> Vec<ProjectileSnapshot> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref().map(|flight| ProjectileSnapshot {
                    id: ProjectileId::new(index as u32),
                    shooter: flight.shooter,
                    faction: flight.faction(),
                    target: flight.target,
                    origin: flight.origin,
                    position: flight.position,
                    velocity: flight.velocity,
                    max_range: flight.max_range,
                })
            })
            .collect()
    }
}

/// Fraction along the segment `from -> to` at which it first comes within
/// `radius` of `centre`, if it does.
pub(crate) fn sweep_hit(
    from: WorldPoint,
    to: WorldPoint,
    centre: WorldPoint,
    radius: f32,
) -> Option<f32> {
    let dx = to.x() - from.x();
    let dy = to.y() - from.y();
    let fx = from.x() - centre.x();
    let fy = from.y() - centre.y();

    let c = fx * fx + fy * fy - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }

    let a = dx * dx + dy * dy;
    if a <= f32::EPSILON {
        return None;
    }

    let b = 2.0 * (fx * dx + fy * dy);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use immune_defence_core::{EnemyId, TowerId};

    fn flight(max_range: Option<f32>) -> Flight {
        Flight {
            shooter: Shooter::Tower(TowerId::new(0)),
            target: EntityRef::Enemy(EnemyId::new(0)),
            damage: 5,
            origin: WorldPoint::new(0.0, 0.0),
            position: WorldPoint::new(0.0, 0.0),
            velocity: Velocity::new(1200.0, 0.0),
            max_range,
        }
    }

    #[test]
    fn pool_conserves_slots_across_reuse() {
        let mut pool = ProjectilePool::new(2);
        let first = pool.acquire(flight(None)).expect("first slot");
        let second = pool.acquire(flight(None)).expect("second slot");
        assert!(pool.acquire(flight(None)).is_none(), "capacity is fixed");

        assert!(pool.release(first));
        assert!(!pool.release(first), "double release is ignored");
        assert_eq!(pool.active_count() + pool.idle_count(), pool.allocated());

        let reused = pool.acquire(flight(Some(10.0))).expect("recycled slot");
        assert_eq!(reused, first);
        assert_ne!(reused, second);
        assert_eq!(pool.allocated(), 2);
        assert_eq!(pool.flight(reused).and_then(|f| f.max_range), Some(10.0));
    }

    #[test]
    fn range_is_measured_from_origin() {
        let mut pool = ProjectilePool::new(1);
        let id = pool.acquire(flight(Some(500.0))).expect("slot");
        let step = Duration::from_millis(100);

        for _ in 0..4 {
            let _ = pool.advance(id, step);
            assert!(!pool.flight(id).expect("active").range_exceeded());
        }

        let _ = pool.advance(id, step);
        assert!(pool.flight(id).expect("active").range_exceeded());
    }

    #[test]
    fn sweep_detects_crossing_and_misses() {
        let from = WorldPoint::new(0.0, 0.0);
        let to = WorldPoint::new(100.0, 0.0);
        let hit = sweep_hit(from, to, WorldPoint::new(50.0, 5.0), 10.0).expect("crosses");
        assert!(hit > 0.3 && hit < 0.5);
        assert!(sweep_hit(from, to, WorldPoint::new(50.0, 40.0), 10.0).is_none());
        assert!(sweep_hit(from, to, WorldPoint::new(200.0, 0.0), 10.0).is_none());
        assert_eq!(sweep_hit(from, to, WorldPoint::new(2.0, 0.0), 10.0), Some(0.0));
    }
}
