#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Layered spatial search that finds walkable, uncrowded placement points.
//!
//! Strategies are tried cheapest first: the anchor itself, a golden-angle
//! spiral around it, a fixed-step grid, and finally random draws from a cache
//! of walkable runs scanned once per level.

use immune_defence_core::{Bounds, PlacementTuning, Walkability, WorldPoint};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Angular increment between spiral candidates, `2π / φ²` radians.
pub const GOLDEN_ANGLE: f32 = 2.399_963;

/// Strategy that produced a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementTier {
    /// The anchor itself was acceptable.
    Direct,
    /// A golden-angle spiral candidate was accepted.
    Spiral,
    /// A fallback grid cell was accepted.
    Grid,
    /// A point drawn from the valid-area cache was accepted.
    Cache,
}

/// Accepted placement point and the strategy that found it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Accepted point.
    pub point: WorldPoint,
    /// Strategy that produced the point.
    pub tier: PlacementTier,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct WalkableRun {
    x: f32,
    y_start: f32,
    samples: u32,
}

/// Precomputed maximal runs of walkable samples inside a vertical band.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidAreaCache {
    runs: Vec<WalkableRun>,
    step: f32,
}

impl ValidAreaCache {
    /// Scans `band` column by column at `step` spacing, recording every
    /// maximal run of consecutive walkable samples.
    #[must_use]
    pub fn scan<W: Walkability>(walkability: &W, band: Bounds, step: f32) -> Self {
        let mut runs = Vec::new();
        if step <= 0.0 {
            return Self { runs, step };
        }

        let mut x = band.min().x();
        while x <= band.max().x() {
            let mut current: Option<WalkableRun> = None;
            let mut y = band.min().y();
            while y <= band.max().y() {
                if walkability.is_walkable(WorldPoint::new(x, y)) {
                    match &mut current {
                        Some(run) => run.samples += 1,
                        None => {
                            current = Some(WalkableRun {
                                x,
                                y_start: y,
                                samples: 1,
                            })
                        }
                    }
                } else if let Some(run) = current.take() {
                    runs.push(run);
                }
                y += step;
            }
            if let Some(run) = current.take() {
                runs.push(run);
            }
            x += step;
        }

        log::debug!("valid-area cache holds {} walkable runs", runs.len());
        Self { runs, step }
    }

    /// Number of recorded runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Reports whether the scan found no walkable sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> Option<WorldPoint> {
        if self.runs.is_empty() {
            return None;
        }
        let run = self.runs[rng.gen_range(0..self.runs.len())];
        let offset = rng.gen_range(0..run.samples);
        Some(WorldPoint::new(
            run.x,
            run.y_start + offset as f32 * self.step,
        ))
    }
}

/// Placement search with its seeded random source and optional cache.
#[derive(Debug)]
pub struct PlacementSearch {
    tuning: PlacementTuning,
    bounds: Bounds,
    cache: Option<ValidAreaCache>,
    rng: ChaCha8Rng,
    neighbours: Vec<WorldPoint>,
}

impl PlacementSearch {
    /// Creates a search confined to `bounds` without a valid-area cache.
    #[must_use]
    pub fn new(tuning: PlacementTuning, bounds: Bounds, seed: u64) -> Self {
        Self {
            tuning,
            bounds,
            cache: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            neighbours: Vec::new(),
        }
    }

    /// Installs the cache consulted once the geometric strategies fail.
    pub fn set_cache(&mut self, cache: ValidAreaCache) {
        self.cache = Some(cache);
    }

    /// Currently installed cache, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&ValidAreaCache> {
        self.cache.as_ref()
    }

    /// Finds a walkable point at least `min_separation` away from every
    /// point in `occupied`, starting from `anchor`.
    pub fn search<W: Walkability>(
        &mut self,
        anchor: WorldPoint,
        walkability: &W,
        occupied: &[WorldPoint],
    ) -> Option<Placement> {
        self.prepare_neighbours(anchor, occupied);

        let placement = self
            .direct(anchor, walkability)
            .or_else(|| self.spiral(anchor, walkability))
            .or_else(|| self.grid(anchor, walkability))
            .or_else(|| self.cached());

        match &placement {
            Some(found) => log::debug!(
                "placement near ({:.1}, {:.1}) resolved via {:?}",
                anchor.x(),
                anchor.y(),
                found.tier
            ),
            None => log::debug!(
                "placement near ({:.1}, {:.1}) exhausted every tier",
                anchor.x(),
                anchor.y()
            ),
        }
        placement
    }

    fn direct<W: Walkability>(&self, anchor: WorldPoint, walkability: &W) -> Option<Placement> {
        self.accepts(anchor, walkability).then_some(Placement {
            point: anchor,
            tier: PlacementTier::Direct,
        })
    }

    fn spiral<W: Walkability>(&self, anchor: WorldPoint, walkability: &W) -> Option<Placement> {
        (1..=self.tuning.spiral_attempts).find_map(|attempt| {
            let radius = self.tuning.spiral_step * attempt as f32;
            let angle = GOLDEN_ANGLE * attempt as f32;
            let candidate = self.bounds.clamp(WorldPoint::new(
                anchor.x() + angle.cos() * radius,
                anchor.y() + angle.sin() * radius,
            ));
            self.accepts(candidate, walkability).then_some(Placement {
                point: candidate,
                tier: PlacementTier::Spiral,
            })
        })
    }

    fn grid<W: Walkability>(&self, anchor: WorldPoint, walkability: &W) -> Option<Placement> {
        let step = self.tuning.grid_step;
        if step <= 0.0 {
            return None;
        }

        let rings = (self.tuning.grid_radius / step).floor() as i32;
        for ring in 1..=rings {
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs().max(dy.abs()) != ring {
                        continue;
                    }
                    let candidate = WorldPoint::new(
                        anchor.x() + dx as f32 * step,
                        anchor.y() + dy as f32 * step,
                    );
                    if !self.bounds.contains(candidate) {
                        continue;
                    }
                    if self.accepts(candidate, walkability) {
                        return Some(Placement {
                            point: candidate,
                            tier: PlacementTier::Grid,
                        });
                    }
                }
            }
        }
        None
    }

    fn cached(&mut self) -> Option<Placement> {
        let cache = self.cache.as_ref()?;
        for _ in 0..self.tuning.cache_attempts {
            let candidate = cache.sample(&mut self.rng)?;
            if self.is_separated(candidate) {
                return Some(Placement {
                    point: candidate,
                    tier: PlacementTier::Cache,
                });
            }
        }
        None
    }

    fn accepts<W: Walkability>(&self, candidate: WorldPoint, walkability: &W) -> bool {
        walkability.is_walkable(candidate) && self.is_separated(candidate)
    }

    fn is_separated(&self, candidate: WorldPoint) -> bool {
        let limit = self.tuning.min_separation * self.tuning.min_separation;
        self.neighbours
            .iter()
            .all(|other| candidate.distance_squared(*other) >= limit)
    }

    // Dense crowds only check the entities nearest to the anchor.
    fn prepare_neighbours(&mut self, anchor: WorldPoint, occupied: &[WorldPoint]) {
        self.neighbours.clear();
        self.neighbours.extend_from_slice(occupied);
        if self.neighbours.len() > self.tuning.dense_threshold {
            self.neighbours.sort_by(|a, b| {
                anchor
                    .distance_squared(*a)
                    .total_cmp(&anchor.distance_squared(*b))
            });
            self.neighbours.truncate(self.tuning.dense_neighbours);
        }
    }
}
