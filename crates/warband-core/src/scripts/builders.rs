//! Command builders for hook scripts.
//!
//! Pure string formatters. The output is valid command text as long as the
//! ids passed in are valid tokens.
//!
//! ```
//! use warband_core::scripts::builders::{command, move_to, shoot};
//!
//! assert_eq!(move_to(10.0, 2.5), "move(10, 2.5)");
//! assert_eq!(shoot("enemy"), "shoot(enemy)");
//! assert_eq!(command("s1", &move_to(1.0, 1.0)), "command(s1, move(1, 1))");
//! ```

use std::fmt::Display;

/// `move(x, y)` for the hook owner.
#[must_use]
pub fn move_to(x: f64, y: f64) -> String {
    format!("move({x}, {y})")
}

/// `shoot(target)` for the hook owner.
#[must_use]
pub fn shoot(target: impl Display) -> String {
    format!("shoot({target})")
}

/// `command(target, state)`: the hook owner orders `target`.
#[must_use]
pub fn command(target: impl Display, state: &str) -> String {
    format!("command({target}, {state})")
}

/// `idle`
#[must_use]
pub fn idle() -> String {
    "idle".to_string()
}

/// `dead`
#[must_use]
pub fn dead() -> String {
    "dead".to_string()
}
