//! Error type for the simulation engine.
//!
//! Deadline misses are simulation outcomes and never show up here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A strategy was asked for a capability it does not declare, e.g. a
    /// job-level dynamic algorithm queried for task-level priorities.
    #[error("{algorithm} does not support {operation}")]
    UnsupportedOperation {
        algorithm: String,
        operation: &'static str,
    },

    /// No strategy of this kind is registered under the given name.
    #[error("unknown {kind} {name:?}")]
    UnknownStrategy { kind: &'static str, name: String },

    /// The scenario object graph is malformed.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

pub type Result<T> = std::result::Result<T, SimError>;
