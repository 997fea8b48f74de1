//! Error types for the engine crate.

use crate::store::StoreError;
use leadflow_core::ExecutionId;
use std::fmt;

/// Errors from engine operations.
///
/// Node-level failures are not errors: they fail the execution and are
/// reported through `StepOutcome`/`RunOutcome`. An `EngineError` means the
/// engine itself could not make progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A store operation failed.
    Store(StoreError),
    /// The referenced execution does not exist.
    ExecutionNotFound { execution_id: ExecutionId },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::ExecutionNotFound { execution_id } => {
                write!(f, "execution not found: {execution_id}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::ExecutionNotFound { .. } => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display() {
        let execution_id = ExecutionId::new();
        let err = EngineError::ExecutionNotFound { execution_id };
        assert!(err.to_string().contains("execution not found"));

        let err: EngineError = StoreError::backend("down").into();
        assert!(err.to_string().contains("down"));
    }
}
