use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{V1Request, V1Response};

/// Failures of the solve call itself, as opposed to a solver that ran and
/// reported a non-"ok" status.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SolverError {
    /// The solver service could not be reached
    #[error("Solver unreachable: {0}")]
    Unreachable(String),

    /// The solver did not answer within the command's budget
    #[error("Solver timed out after {0} ms")]
    Timeout(u64),

    /// The solver answered with something that is not a solve response
    #[error("Invalid solver response: {0}")]
    InvalidResponse(String),

    /// The solver reported an internal failure
    #[error("Solver internal error: {0}")]
    Internal(String),
}

/// Result type alias for solver operations
pub type SolverResult<T> = Result<T, SolverError>;

/// SolveDelegate defines the port for the external challenge-solving subsystem.
///
/// Browser management, navigation and challenge clearing all live behind this
/// single operation; retries (if any) are the implementation's concern.
#[async_trait]
pub trait SolveDelegate: Send + Sync + 'static {
    async fn solve(&self, request: V1Request) -> SolverResult<V1Response>;
}
