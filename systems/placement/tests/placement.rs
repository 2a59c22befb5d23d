use immune_defence_core::{Bounds, PlacementTuning, Walkability, WorldPoint};
use immune_defence_system_placement::{PlacementSearch, PlacementTier, ValidAreaCache};

/// Field with a solid wall covering `x ∈ [0, 200]` except a narrow gate.
struct WalledEntry;

impl Walkability for WalledEntry {
    fn is_walkable(&self, point: WorldPoint) -> bool {
        let x = point.x().max(0.0);
        if !(0.0..=1000.0).contains(&point.y()) || x > 1000.0 {
            return false;
        }
        x > 200.0 || (480.0..=520.0).contains(&point.y())
    }
}

struct Blocked;

impl Walkability for Blocked {
    fn is_walkable(&self, _point: WorldPoint) -> bool {
        false
    }
}

fn bounds() -> Bounds {
    Bounds::new(WorldPoint::new(-50.0, 0.0), WorldPoint::new(1000.0, 1000.0))
}

#[test]
fn every_returned_point_is_walkable() {
    let mut search = PlacementSearch::new(PlacementTuning::default(), bounds(), 0x5eed);
    search.set_cache(ValidAreaCache::scan(
        &WalledEntry,
        Bounds::new(WorldPoint::new(0.0, 0.0), WorldPoint::new(60.0, 1000.0)),
        10.0,
    ));

    let mut occupied = Vec::new();
    for index in 0..40 {
        let anchor = WorldPoint::new(-50.0, 100.0 + (index * 20) as f32);
        if let Some(placement) = search.search(anchor, &WalledEntry, &occupied) {
            assert!(
                WalledEntry.is_walkable(placement.point),
                "placement {index} at {:?} via {:?} is blocked",
                placement.point,
                placement.tier
            );
            occupied.push(placement.point);
        }
    }

    assert!(!occupied.is_empty(), "the gate admits at least one spawn");
}

#[test]
fn blocked_anchor_falls_back_to_grid_when_spiral_is_exhausted() {
    let mut tuning = PlacementTuning::default();
    tuning.spiral_attempts = 0;
    let mut search = PlacementSearch::new(tuning, bounds(), 3);

    let anchor = WorldPoint::new(150.0, 300.0);
    let placement = search
        .search(anchor, &WalledEntry, &[])
        .expect("grid reaches past the wall");

    assert_eq!(placement.tier, PlacementTier::Grid);
    assert!(WalledEntry.is_walkable(placement.point));
}

#[test]
fn cache_is_the_last_resort() {
    let mut tuning = PlacementTuning::default();
    tuning.spiral_attempts = 0;
    tuning.grid_radius = 0.0;
    let mut search = PlacementSearch::new(tuning, bounds(), 11);
    search.set_cache(ValidAreaCache::scan(
        &WalledEntry,
        Bounds::new(WorldPoint::new(0.0, 0.0), WorldPoint::new(0.0, 1000.0)),
        10.0,
    ));

    let placement = search
        .search(WorldPoint::new(100.0, 100.0), &WalledEntry, &[])
        .expect("cache holds the gate");

    assert_eq!(placement.tier, PlacementTier::Cache);
    assert!((480.0..=520.0).contains(&placement.point.y()));
}

#[test]
fn exhausted_search_reports_none() {
    let mut search = PlacementSearch::new(PlacementTuning::default(), bounds(), 5);
    assert!(search
        .search(WorldPoint::new(10.0, 10.0), &Blocked, &[])
        .is_none());
    assert!(search.cache().is_none());
}

#[test]
fn identical_seeds_draw_identical_cache_points() {
    let cache = ValidAreaCache::scan(
        &WalledEntry,
        Bounds::new(WorldPoint::new(300.0, 0.0), WorldPoint::new(360.0, 1000.0)),
        10.0,
    );
    let mut tuning = PlacementTuning::default();
    tuning.spiral_attempts = 0;
    tuning.grid_radius = 0.0;

    let run = |seed: u64| {
        let mut search = PlacementSearch::new(tuning.clone(), bounds(), seed);
        search.set_cache(cache.clone());
        (0..5)
            .filter_map(|_| {
                search
                    .search(WorldPoint::new(100.0, 100.0), &WalledEntry, &[])
                    .map(|placement| placement.point)
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(run(42), run(42));
    assert_eq!(run(42).len(), 5);
}
