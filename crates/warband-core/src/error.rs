//! Error taxonomy for the engine.
//!
//! Errors fall into two groups:
//!
//! - **Recovered**: [`ParseError`], [`RegistryError`] and [`HookError`]. These
//!   fail a single command, delta or hook call. The tick pipeline logs them,
//!   counts them in [`Diagnostics`](crate::diagnostics::Diagnostics) and moves on.
//! - **Fatal**: [`SchedulerError`] (a caller asked the timeline to run
//!   backwards) and the load-time errors [`LoadError`] / [`ConfigError`], which
//!   abort a run before tick 0.

use thiserror::Error;

use crate::entity::{EntityId, Role};

// =============================================================================
// Codec
// =============================================================================

/// A command string could not be parsed.
///
/// Carries the offending fragment of the input so that timeline authors and
/// script writers can locate the problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in `{fragment}`")]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// The part of the input that triggered the error.
    pub fragment: String,
}

impl ParseError {
    /// Creates a parse error for the given fragment.
    #[must_use]
    pub fn new(kind: ParseErrorKind, fragment: impl Into<String>) -> Self {
        Self {
            kind,
            fragment: fragment.into(),
        }
    }
}

/// Reason a command string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A character outside the command alphabet.
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    /// The input stopped in the middle of a term.
    #[error("unexpected end of input")]
    UnexpectedEnd,
    /// A complete command was followed by more text.
    #[error("trailing input")]
    TrailingInput,
    /// Terms nested deeper than any valid command.
    #[error("nesting too deep")]
    TooDeep,
    /// The leading keyword is not part of the grammar.
    #[error("unknown keyword `{0}`")]
    UnknownKeyword(String),
    /// Wrong number of positional arguments.
    #[error("`{keyword}` expects {expected} argument(s), found {found}")]
    Arity {
        /// Keyword whose arity was violated.
        keyword: &'static str,
        /// Accepted argument counts, human readable.
        expected: &'static str,
        /// Number of arguments supplied.
        found: usize,
    },
    /// `new_unit` with a role other than `soldier` or `general`.
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    /// Malformed entity identifier.
    #[error("invalid identifier")]
    InvalidId,
    /// Malformed or non-finite number.
    #[error("invalid number")]
    InvalidNumber,
    /// Team is not a positive integer.
    #[error("team must be a positive integer")]
    InvalidTeam,
    /// `command(..)` inside another `command(..)`.
    #[error("`command` cannot be nested inside another command")]
    NestedCommand,
    /// `move(x, y)` / `shoot(id)` shorthand without an owning entity.
    #[error("shorthand command needs an owning entity")]
    MissingSubject,
}

// =============================================================================
// Registry
// =============================================================================

/// Consistency violation while creating or mutating an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `new_unit` for an id that already exists.
    #[error("entity `{0}` already exists")]
    DuplicateId(EntityId),
    /// A delta addressed an id that was never created.
    #[error("no entity `{0}`")]
    UnknownId(EntityId),
    /// A `command(..)` issued by an entity that cannot give orders.
    #[error("entity `{0}` is a {1} and cannot issue commands")]
    NotACommander(EntityId, Role),
    /// A create delta for a role only the engine spawns.
    #[error("entity `{0}` cannot be created as a {1}")]
    NotSpawnable(EntityId, Role),
}

// =============================================================================
// Hooks
// =============================================================================

/// A scripted hook misbehaved. Always treated as "no command returned".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The hook used more fuel than its step budget allows.
    #[error("step budget of {budget} exhausted")]
    BudgetExceeded {
        /// Configured step budget.
        budget: u32,
    },
    /// The hook ran longer than its wall-clock budget.
    #[error("ran for {elapsed_ms} ms, budget is {budget_ms} ms")]
    Timeout {
        /// Measured duration of the call.
        elapsed_ms: u128,
        /// Configured time budget.
        budget_ms: u64,
    },
    /// The hook reported an internal failure.
    #[error("hook failed: {0}")]
    Failed(String),
    /// The hook panicked.
    #[error("hook panicked: {0}")]
    Panicked(String),
}

// =============================================================================
// Scheduler
// =============================================================================

/// The timeline was driven in a way that would break determinism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `advance` was called with a time lower than the previous call.
    #[error("timeline advanced to {requested} after {previous}")]
    OrderingViolation {
        /// Argument of the previous `advance` call.
        previous: u64,
        /// Offending argument.
        requested: u64,
    },
    /// A bucket was scheduled at or below the release watermark.
    #[error("bucket at time {time} is not after watermark {watermark}")]
    BucketInPast {
        /// Time of the rejected bucket.
        time: u64,
        /// Current release watermark.
        watermark: u64,
    },
}

// =============================================================================
// Configuration and loading
// =============================================================================

/// A configuration value is out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid config field `{field}`: {reason}")]
pub struct ConfigError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: &'static str,
}

/// Loading a timeline or configuration failed. Aborts the run before it starts.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source file could not be read.
    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),
    /// The source is not valid JSON of the expected shape.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A time bucket key is not a non-negative integer.
    #[error("invalid time bucket `{0}`")]
    InvalidTime(String),
    /// A command inside a bucket failed to parse.
    #[error("malformed command #{index} at time {time}: {source}")]
    Command {
        /// Time bucket holding the command.
        time: u64,
        /// Position of the command within its bucket.
        index: usize,
        /// Underlying parse error.
        #[source]
        source: ParseError,
    },
    /// The parsed bucket could not be scheduled.
    #[error(transparent)]
    Schedule(#[from] SchedulerError),
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
