//! Position, heading and point-to-point motion helpers.
//!
//! Rotation is measured in radians with 0 pointing along -Y (screen "up")
//! and increasing clockwise, so the heading toward a point is
//! `atan2(dy, dx) + PI/2`, normalised to `[0, 2PI)`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Position and rotation of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World position.
    pub position: DVec2,
    /// Rotation in radians.
    pub rotation: f64,
}

impl Pose {
    /// Creates a pose.
    #[must_use]
    pub const fn new(position: DVec2, rotation: f64) -> Self {
        Self { position, rotation }
    }

    /// Moves at most `max_step` toward `target`.
    ///
    /// Returns the new position and whether the target was reached. A target
    /// closer than `max_step` is snapped to exactly.
    #[must_use]
    pub fn step_towards(&self, target: DVec2, max_step: f64) -> (DVec2, bool) {
        let offset = target - self.position;
        let distance = offset.length();
        if distance <= max_step {
            return (target, true);
        }
        (self.position + offset / distance * max_step, false)
    }

    /// Rotation that faces `target` from this pose.
    #[must_use]
    pub fn heading_to(&self, target: DVec2) -> f64 {
        let offset = target - self.position;
        (offset.y.atan2(offset.x) + FRAC_PI_2).rem_euclid(TAU)
    }

    /// Turns at most `max_turn` radians toward `target`, taking the shorter way
    /// round.
    ///
    /// Returns the new rotation and whether it now faces the target.
    #[must_use]
    pub fn turn_towards(&self, target: DVec2, max_turn: f64) -> (f64, bool) {
        let heading = self.heading_to(target);
        let current = self.rotation.rem_euclid(TAU);
        let mut delta = heading - current;
        if delta > PI {
            delta -= TAU;
        } else if delta <= -PI {
            delta += TAU;
        }

        if delta.abs() <= max_turn {
            (heading, true)
        } else {
            ((current + max_turn.copysign(delta)).rem_euclid(TAU), false)
        }
    }

    /// Point `distance` ahead of this position in the direction of `target`.
    #[must_use]
    pub fn point_toward(&self, target: DVec2, distance: f64) -> DVec2 {
        let offset = target - self.position;
        let length = offset.length();
        if length <= f64::EPSILON {
            return self.position;
        }
        self.position + offset / length * distance
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(DVec2::ZERO, 0.0)
    }
}
