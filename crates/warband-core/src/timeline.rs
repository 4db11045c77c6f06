//! Timeline scheduler.
//!
//! A timeline is a time-ordered multimap of pre-authored deltas. Buckets are
//! keyed by tick; deltas inside a bucket keep their authored order.
//! [`Timeline::advance`] releases everything due, oldest bucket first, and
//! refuses to go backwards.
//!
//! # Source format
//!
//! A JSON object mapping tick numbers (as strings) to arrays of command text:
//!
//! ```
//! use warband_core::timeline::Timeline;
//!
//! let mut timeline = Timeline::from_json_str(r#"{
//!     "0": ["new_unit(soldier, a, 0, 0, 0, 1)", "new_unit(soldier, b, 500, 500, 0, 2)"],
//!     "5": ["move(a, 10, 10)"]
//! }"#).unwrap();
//!
//! assert_eq!(timeline.advance(0).unwrap().len(), 2);
//! assert!(timeline.advance(4).unwrap().is_empty());
//! assert_eq!(timeline.advance(5).unwrap().len(), 1);
//! assert!(timeline.advance(3).is_err());
//! ```
//!
//! Loading is all-or-nothing: the first malformed command aborts with its
//! bucket and index.

use std::collections::BTreeMap;
use std::path::Path;

use crate::command::{self, Delta};
use crate::error::{LoadError, SchedulerError};

/// Pre-authored deltas keyed by tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    buckets: BTreeMap<u64, Vec<Delta>>,
    /// Argument of the last `advance` call.
    watermark: Option<u64>,
}

impl Timeline {
    /// Creates an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `deltas` to the bucket at `time`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::BucketInPast`] if `time` has already been
    /// released.
    pub fn schedule(
        &mut self,
        time: u64,
        deltas: impl IntoIterator<Item = Delta>,
    ) -> Result<(), SchedulerError> {
        if let Some(watermark) = self.watermark {
            if time <= watermark {
                return Err(SchedulerError::BucketInPast { time, watermark });
            }
        }
        self.buckets.entry(time).or_default().extend(deltas);
        Ok(())
    }

    /// Removes and returns every delta scheduled at or before `current`, in
    /// (time, authored order) order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::OrderingViolation`] if `current` is lower
    /// than the previous call's argument. Nothing is released in that case.
    pub fn advance(&mut self, current: u64) -> Result<Vec<Delta>, SchedulerError> {
        if let Some(previous) = self.watermark {
            if current < previous {
                return Err(SchedulerError::OrderingViolation {
                    previous,
                    requested: current,
                });
            }
        }
        self.watermark = Some(current);

        let later = match current.checked_add(1) {
            Some(next) => self.buckets.split_off(&next),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.buckets, later);
        Ok(due.into_values().flatten().collect())
    }

    /// Highest time released so far.
    #[must_use]
    pub const fn watermark(&self) -> Option<u64> {
        self.watermark
    }

    /// Time of the next pending bucket.
    #[must_use]
    pub fn next_time(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    /// Number of deltas not yet released.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Returns `true` once every delta has been released.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Parses a JSON timeline.
    ///
    /// # Errors
    ///
    /// - [`LoadError::Json`] if the text is not an object of string arrays
    /// - [`LoadError::InvalidTime`] for a key that is not a non-negative integer
    /// - [`LoadError::Command`] for the first command that fails to parse
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;

        let mut by_time: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for (key, commands) in raw {
            let time = key
                .trim()
                .parse::<u64>()
                .map_err(|_| LoadError::InvalidTime(key.clone()))?;
            by_time.entry(time).or_default().extend(commands);
        }

        let mut timeline = Self::new();
        for (time, commands) in by_time {
            let deltas = commands
                .iter()
                .enumerate()
                .map(|(index, text)| {
                    command::parse_delta(text, None)
                        .map_err(|source| LoadError::Command { time, index, source })
                })
                .collect::<Result<Vec<_>, _>>()?;
            timeline.schedule(time, deltas)?;
        }
        Ok(timeline)
    }

    /// Reads and parses a JSON timeline file.
    ///
    /// # Errors
    ///
    /// As [`Timeline::from_json_str`], plus [`LoadError::Io`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
