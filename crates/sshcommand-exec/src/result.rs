//! Result types for a single execution attempt

use crate::error::ExecError;

/// Outcome of one attempt, classified by the phase a failure happened in
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// Command ran and exited successfully
    Success(Vec<u8>),
    /// Host could not be reached or the session could not be set up
    TransportFailure(ExecError),
    /// Command ran but failed; carries whatever output was captured
    ExecutionFailure {
        /// Output captured before the failure
        output: Vec<u8>,
        /// Failure cause
        error: ExecError,
    },
}

impl AttemptOutcome {
    /// Captured output (empty for transport failures)
    #[must_use]
    pub fn output(&self) -> &[u8] {
        match self {
            AttemptOutcome::Success(output) | AttemptOutcome::ExecutionFailure { output, .. } => {
                output.as_slice()
            }
            AttemptOutcome::TransportFailure(_) => &[],
        }
    }

    /// Failure cause, if any
    #[must_use]
    pub fn error(&self) -> Option<&ExecError> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::TransportFailure(error)
            | AttemptOutcome::ExecutionFailure { error, .. } => Some(error),
        }
    }

    /// Whether the failure happened while the command was executing
    #[must_use]
    pub fn executed(&self) -> bool {
        matches!(self, AttemptOutcome::ExecutionFailure { .. })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }

    /// Output on success, the failure cause otherwise
    ///
    /// # Errors
    /// Returns the attempt's error for both failure variants
    pub fn into_result(self) -> Result<Vec<u8>, ExecError> {
        match self {
            AttemptOutcome::Success(output) => Ok(output),
            AttemptOutcome::TransportFailure(error)
            | AttemptOutcome::ExecutionFailure { error, .. } => Err(error),
        }
    }

    /// Short label for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::TransportFailure(_) => "transport_failure",
            AttemptOutcome::ExecutionFailure { .. } => "execution_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportPhase;

    #[test]
    fn test_transport_failure_has_no_output() {
        let outcome = AttemptOutcome::TransportFailure(ExecError::Transport {
            phase: TransportPhase::Dial,
            message: "connection refused".to_string(),
        });
        assert!(outcome.output().is_empty());
        assert!(!outcome.executed());
        assert_eq!(outcome.kind(), "transport_failure");
        assert!(outcome.into_result().unwrap_err().is_transport());
    }

    #[test]
    fn test_execution_failure_keeps_partial_output() {
        let outcome = AttemptOutcome::ExecutionFailure {
            output: b"partial".to_vec(),
            error: ExecError::Execution {
                exit_status: Some(2),
                message: "process exited with status 2".to_string(),
            },
        };
        assert!(outcome.executed());
        assert_eq!(outcome.kind(), "execution_failure");
        assert_eq!(outcome.output(), b"partial");
        assert!(outcome.error().is_some_and(ExecError::is_execution));
    }
}
