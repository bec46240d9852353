//! Errors raised before a run starts

use thiserror::Error;

use crate::vm::ProgramRejection;
use crate::PayoffError;

/// A run configuration that cannot be executed
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    #[error("no strategies selected")]
    NoStrategies,
    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),
    #[error("strategy `{0}` selected more than once")]
    DuplicateStrategy(String),
    #[error("{field} must be within [{min}, {max}] (got {value})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be finite and at least {min} (got {value})")]
    BelowMinimum { field: &'static str, min: f64, value: f64 },
    #[error("sweep expands to {combinations} runs, limit is {limit}")]
    SweepTooLarge { combinations: usize, limit: usize },
    #[error("invalid payoff matrix: {0}")]
    Payoff(#[from] PayoffError),
}

/// Refusals when adding a strategy to a registry
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RegistryError {
    #[error("strategy id must not be empty")]
    EmptyId,
    #[error("strategy `{0}` is already registered")]
    DuplicateId(String),
    #[error("custom strategy `{id}` rejected: {source}")]
    Rejected {
        id: String,
        #[source]
        source: ProgramRejection,
    },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
