//! Scenario and determinism tests for the whole tick pipeline.
//!
//! - `scenarios.rs`: end-to-end behaviour of timelines, hooks and detection
//! - `determinism.rs`: identical inputs and seed give identical runs
//! - `helpers.rs`: timelines, simulation factories and lookups

mod helpers;
mod scenarios;

pub use helpers::*;
