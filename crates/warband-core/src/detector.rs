//! Visibility and collision detection.
//!
//! Each tick the detector takes a position snapshot and reports:
//!
//! - `enter_view` sightings for pairs that became mutually visible this tick,
//!   one per direction
//! - `exit_view` sightings for pairs that were visible on the previous call
//!   and are not any more (out of range or dead), one per direction
//! - collision contacts for every pair currently inside the collision radius
//!   where at least one side is a bullet, repeated every tick the condition
//!   holds
//!
//! The only state carried between ticks is the set of pairs that were in
//! view on the previous call.
//!
//! # Determinism
//!
//! The pairwise pass may run on the rayon pool. Its results are sorted by
//! snapshot position before anything is emitted, so output order is the same
//! as a sequential pass: pairs in creation order of their first member, then
//! their second.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::entity::{EntityId, Role};
use crate::registry::UnitSnapshot;

/// Below this many living entities the pairwise pass stays on the caller's
/// thread.
const PARALLEL_THRESHOLD: usize = 64;

/// `observer` saw `target` come into or leave its view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sighting {
    /// Entity whose hook fires.
    pub observer: EntityId,
    /// Entity that came into or left view.
    pub target: EntityId,
}

/// Two entities inside the collision radius.
///
/// `a` precedes `b` in creation order. Each side is notified separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// First entity of the pair.
    pub a: EntityId,
    /// Second entity of the pair.
    pub b: EntityId,
}

/// Events produced by one detection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Detection {
    /// New sightings, two per pair that entered view.
    pub enter_view: Vec<Sighting>,
    /// Lost sightings, two per pair that left view.
    pub exit_view: Vec<Sighting>,
    /// Current collisions, one per pair.
    pub collisions: Vec<Contact>,
}

impl Detection {
    /// Returns `true` if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enter_view.is_empty() && self.exit_view.is_empty() && self.collisions.is_empty()
    }
}

/// Result of testing one pair.
#[derive(Debug, Clone, Copy)]
struct PairHit {
    i: usize,
    j: usize,
    colliding: bool,
}

/// Pairwise visibility and collision detector.
#[derive(Debug, Clone)]
pub struct Detector {
    view_radius: f64,
    collision_radius: f64,
    parallel: bool,
    /// Pairs in view after the last pass, smaller id first.
    in_view: BTreeSet<(EntityId, EntityId)>,
}

impl Detector {
    /// Creates a detector with no remembered pairs.
    #[must_use]
    pub fn new(view_radius: f64, collision_radius: f64, parallel: bool) -> Self {
        Self {
            view_radius,
            collision_radius,
            parallel,
            in_view: BTreeSet::new(),
        }
    }

    /// Runs one detection pass over `snapshot`.
    ///
    /// Dead entries are ignored. Distances are compared with strict `<`.
    /// Lost pairs are ordered like new ones, by the snapshot position of
    /// their members.
    pub fn detect(&mut self, snapshot: &[UnitSnapshot]) -> Detection {
        let living: Vec<&UnitSnapshot> =
            snapshot.iter().filter(|u| u.is_alive()).collect();
        let hits = self.pairwise(&living);

        let mut detection = Detection::default();
        let mut in_view = BTreeSet::new();
        for hit in hits {
            let (a, b) = (living[hit.i], living[hit.j]);
            let key = pair_key(&a.id, &b.id);
            if !self.in_view.contains(&key) {
                detection.enter_view.push(Sighting {
                    observer: a.id.clone(),
                    target: b.id.clone(),
                });
                detection.enter_view.push(Sighting {
                    observer: b.id.clone(),
                    target: a.id.clone(),
                });
            }
            in_view.insert(key);

            if hit.colliding {
                detection.collisions.push(Contact {
                    a: a.id.clone(),
                    b: b.id.clone(),
                });
            }
        }
        let previous = std::mem::replace(&mut self.in_view, in_view);
        detection.exit_view = self.lost_pairs(previous, snapshot);
        detection
    }

    /// Sightings for pairs in `previous` that are no longer in view.
    fn lost_pairs(
        &self,
        previous: BTreeSet<(EntityId, EntityId)>,
        snapshot: &[UnitSnapshot],
    ) -> Vec<Sighting> {
        let slot: HashMap<&EntityId, usize> =
            snapshot.iter().enumerate().map(|(i, u)| (&u.id, i)).collect();
        let position = |id: &EntityId| slot.get(id).copied().unwrap_or(usize::MAX);

        let mut lost: Vec<(EntityId, EntityId)> = previous
            .into_iter()
            .filter(|key| !self.in_view.contains(key))
            .map(|(a, b)| if position(&b) < position(&a) { (b, a) } else { (a, b) })
            .collect();
        lost.sort_by_key(|(a, b)| (position(a), position(b)));

        lost.into_iter()
            .flat_map(|(a, b)| {
                [
                    Sighting {
                        observer: a.clone(),
                        target: b.clone(),
                    },
                    Sighting {
                        observer: b,
                        target: a,
                    },
                ]
            })
            .collect()
    }

    fn pairwise(&self, living: &[&UnitSnapshot]) -> Vec<PairHit> {
        let view_sq = self.view_radius * self.view_radius;
        let collision_sq = self.collision_radius * self.collision_radius;
        let test = |i: usize, j: usize| -> Option<PairHit> {
            let (a, b) = (living[i], living[j]);
            let dist_sq = a.position.distance_squared(b.position);
            if dist_sq >= view_sq {
                return None;
            }
            let bullet_involved = a.role == Role::Bullet || b.role == Role::Bullet;
            Some(PairHit {
                i,
                j,
                colliding: bullet_involved && dist_sq < collision_sq,
            })
        };

        let n = living.len();
        if self.parallel && n >= PARALLEL_THRESHOLD {
            let mut hits: Vec<PairHit> = (0..n)
                .into_par_iter()
                .flat_map_iter(|i| ((i + 1)..n).filter_map(move |j| test(i, j)))
                .collect();
            hits.sort_unstable_by_key(|hit| (hit.i, hit.j));
            hits
        } else {
            (0..n)
                .flat_map(|i| ((i + 1)..n).filter_map(move |j| test(i, j)))
                .collect()
        }
    }

    /// Returns `true` if the pair was in view after the last pass.
    #[must_use]
    pub fn is_in_view(&self, a: &EntityId, b: &EntityId) -> bool {
        self.in_view.contains(&pair_key(a, b))
    }

    /// Number of pairs currently in view.
    #[must_use]
    pub fn pairs_in_view(&self) -> usize {
        self.in_view.len()
    }

    /// Forgets every remembered pair.
    pub fn reset(&mut self) {
        self.in_view.clear();
    }
}

fn pair_key(a: &EntityId, b: &EntityId) -> (EntityId, EntityId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
