//! Tolerance policy: which attempt outcomes count as overall success

use crate::error::ExecError;
use crate::result::AttemptOutcome;

/// Decides whether an attempt outcome is acceptable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TolerancePolicy {
    /// Accept outcomes where the command ran but failed
    pub ignore_execute_errors: bool,
}

impl TolerancePolicy {
    #[must_use]
    pub fn new(ignore_execute_errors: bool) -> Self {
        Self {
            ignore_execute_errors,
        }
    }

    /// Transport failures are never accepted, whatever the flag says.
    #[must_use]
    pub fn accepts(&self, outcome: &AttemptOutcome) -> bool {
        match outcome {
            AttemptOutcome::Success(_) => true,
            AttemptOutcome::ExecutionFailure { .. } => self.ignore_execute_errors,
            AttemptOutcome::TransportFailure(_) => false,
        }
    }

    /// Output of an accepted outcome, or the error that rejected it
    ///
    /// # Errors
    /// Returns the outcome's error when [`accepts`](Self::accepts) is false
    pub fn apply(&self, outcome: AttemptOutcome) -> Result<Vec<u8>, ExecError> {
        match outcome {
            AttemptOutcome::Success(output) => Ok(output),
            AttemptOutcome::ExecutionFailure { output, .. } if self.ignore_execute_errors => {
                Ok(output)
            }
            AttemptOutcome::ExecutionFailure { error, .. }
            | AttemptOutcome::TransportFailure(error) => Err(error),
        }
    }
}
