//! Simulation configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```
//! use warband_core::config::SimConfig;
//!
//! let config = SimConfig::from_json_str(r#"{ "view_radius": 200.0 }"#).unwrap();
//! assert!((config.view_radius - 200.0).abs() < f64::EPSILON);
//! assert_eq!(config.dispatch_rounds, 1);
//! ```

use std::path::Path;
use std::time::Duration;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::entity::Role;
use crate::error::{ConfigError, LoadError};

/// Tunables for the tick pipeline and the built-in role scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seconds of simulated time per tick.
    pub dt: f64,
    /// Two living entities closer than this see each other.
    pub view_radius: f64,
    /// Two living entities closer than this collide (if one is a bullet).
    pub collision_radius: f64,
    /// Soldier travel speed, units per second.
    pub soldier_speed: f64,
    /// General travel speed, units per second.
    pub general_speed: f64,
    /// Bullet travel speed, units per second.
    pub bullet_speed: f64,
    /// Aiming speed, radians per second.
    pub turn_rate: f64,
    /// Distance ahead of the shooter at which bullets appear.
    pub muzzle_offset: f64,
    /// Width of the playing field. Scripts pick wander targets inside it.
    pub arena_width: f64,
    /// Height of the playing field.
    pub arena_height: f64,
    /// Same-tick state-change dispatch rounds before reactions are deferred.
    pub dispatch_rounds: u32,
    /// Fuel a single hook call may burn.
    pub hook_step_budget: u32,
    /// Wall-clock budget for a single hook call, in milliseconds.
    pub hook_time_budget_ms: u64,
    /// Run the pairwise detection pass on the rayon pool.
    pub parallel_detection: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            view_radius: 150.0,
            collision_radius: 15.0,
            soldier_speed: 150.0,
            general_speed: 50.0,
            bullet_speed: 300.0,
            turn_rate: std::f64::consts::PI,
            muzzle_offset: 20.0,
            arena_width: 800.0,
            arena_height: 800.0,
            dispatch_rounds: 1,
            hook_step_budget: 1_000,
            hook_time_budget_ms: 50,
            parallel_detection: true,
        }
    }
}

impl SimConfig {
    /// Parses a JSON config and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Json`] for malformed input and
    /// [`LoadError::Config`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// As [`SimConfig::from_json_str`], plus [`LoadError::Io`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("dt", self.dt),
            ("view_radius", self.view_radius),
            ("collision_radius", self.collision_radius),
            ("soldier_speed", self.soldier_speed),
            ("general_speed", self.general_speed),
            ("bullet_speed", self.bullet_speed),
            ("turn_rate", self.turn_rate),
            ("arena_width", self.arena_width),
            ("arena_height", self.arena_height),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError {
                    field,
                    reason: "must be positive and finite",
                });
            }
        }
        if !(self.muzzle_offset.is_finite() && self.muzzle_offset >= 0.0) {
            return Err(ConfigError {
                field: "muzzle_offset",
                reason: "must be non-negative and finite",
            });
        }
        if self.collision_radius >= self.view_radius {
            return Err(ConfigError {
                field: "collision_radius",
                reason: "must be smaller than view_radius",
            });
        }
        if self.dispatch_rounds == 0 {
            return Err(ConfigError {
                field: "dispatch_rounds",
                reason: "must be at least 1",
            });
        }
        if self.hook_step_budget == 0 {
            return Err(ConfigError {
                field: "hook_step_budget",
                reason: "must be at least 1",
            });
        }
        if self.hook_time_budget_ms == 0 {
            return Err(ConfigError {
                field: "hook_time_budget_ms",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Travel speed for a role, units per second.
    #[must_use]
    pub const fn speed_for(&self, role: Role) -> f64 {
        match role {
            Role::Soldier => self.soldier_speed,
            Role::General => self.general_speed,
            Role::Bullet => self.bullet_speed,
        }
    }

    /// Per-tick distance for a role.
    #[must_use]
    pub fn step_for(&self, role: Role) -> f64 {
        self.speed_for(role) * self.dt
    }

    /// Upper corner of the playing field. The lower corner is the origin.
    #[must_use]
    pub const fn arena_size(&self) -> DVec2 {
        DVec2::new(self.arena_width, self.arena_height)
    }

    /// Hook wall-clock budget.
    #[must_use]
    pub const fn hook_time_budget(&self) -> Duration {
        Duration::from_millis(self.hook_time_budget_ms)
    }
}
