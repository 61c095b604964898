use thiserror::Error;

/// Caller contract violations detected by the solvers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("the MDP offers no actions, the maximum over actions is undefined")]
    NoActions,

    #[error("value table has no entry for state {0}")]
    MissingValue(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
