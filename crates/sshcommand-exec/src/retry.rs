//! Retry controller: repeats attempts within a wall-clock bound
//!
//! The elapsed-time check happens before every attempt except the first, so
//! at least one attempt is always made, even with a zero retry timeout.

use std::fmt;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::policy::TolerancePolicy;
use crate::request::{ExecutionRequest, RetryPolicy};
use crate::traits::RemoteExecutor;

/// States of one execution with retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    NotStarted,
    Attempting,
    Succeeded,
    Failed,
}

impl RetryState {
    /// Check whether a transition is allowed
    #[must_use]
    pub fn can_transition_to(self, next: RetryState) -> bool {
        matches!(
            (self, next),
            (RetryState::NotStarted, RetryState::Attempting)
                | (
                    RetryState::Attempting,
                    RetryState::Succeeded | RetryState::Failed
                )
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed)
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetryState::NotStarted => "not_started",
            RetryState::Attempting => "attempting",
            RetryState::Succeeded => "succeeded",
            RetryState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Drives attempts for a single request until it succeeds or gives up
#[derive(Debug)]
pub struct RetryController {
    retry: RetryPolicy,
    tolerance: TolerancePolicy,
    state: RetryState,
    attempts: u32,
}

impl RetryController {
    #[must_use]
    pub fn new(retry: RetryPolicy, tolerance: TolerancePolicy) -> Self {
        Self {
            retry,
            tolerance,
            state: RetryState::NotStarted,
            attempts: 0,
        }
    }

    /// Controller configured from a request
    #[must_use]
    pub fn for_request(request: &ExecutionRequest) -> Self {
        Self::new(
            request.retry,
            TolerancePolicy::new(request.ignore_execute_errors),
        )
    }

    #[must_use]
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Number of attempts made so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn transition_to(&mut self, next: RetryState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid retry transition {} -> {next}",
            self.state
        );
        debug!(from = %self.state, to = %next, "retry state transition");
        self.state = next;
    }

    /// Run the request to a terminal state
    ///
    /// The controller is single-use; running it again after it finished, or
    /// after a run was cancelled mid-attempt, is a validation error.
    ///
    /// # Errors
    /// Returns a validation error without attempting anything if the request
    /// is malformed, otherwise the last attempt's error once retries are
    /// exhausted
    #[instrument(
        skip(self, executor, request),
        fields(address = %request.connection.address(), executor = executor.executor_type())
    )]
    pub async fn run(
        &mut self,
        executor: &dyn RemoteExecutor,
        request: &ExecutionRequest,
    ) -> Result<Vec<u8>, ExecError> {
        if self.state.is_terminal() {
            return Err(ExecError::Validation(format!(
                "retry controller already {}",
                self.state
            )));
        }
        if self.state == RetryState::Attempting {
            return Err(ExecError::Validation(
                "retry controller was interrupted mid-run".to_string(),
            ));
        }
        request.validate()?;

        self.transition_to(RetryState::Attempting);
        let start = Instant::now();

        loop {
            self.attempts += 1;
            let outcome = executor.attempt(request).await;
            let kind = outcome.kind();
            if let (true, Some(error)) = (self.tolerance.accepts(&outcome), outcome.error()) {
                warn!(attempt = self.attempts, error = %error, "ignoring command execution error");
            }

            let error = match self.tolerance.apply(outcome) {
                Ok(output) => {
                    self.transition_to(RetryState::Succeeded);
                    info!(attempts = self.attempts, elapsed = ?start.elapsed(), "command succeeded");
                    return Ok(output);
                }
                Err(error) => error,
            };

            if !self.retry.enabled || !error.is_retryable() {
                return Err(self.fail(error));
            }

            warn!(
                attempt = self.attempts,
                outcome = kind,
                error = %error,
                interval = ?self.retry.interval,
                "attempt failed, retrying"
            );
            sleep(self.retry.interval).await;

            if start.elapsed() >= self.retry.timeout {
                warn!(timeout = ?self.retry.timeout, "retry timeout elapsed");
                return Err(self.fail(error));
            }
        }
    }

    fn fail(&mut self, error: ExecError) -> ExecError {
        self.transition_to(RetryState::Failed);
        warn!(attempts = self.attempts, error = %error, "command failed");
        error
    }
}

/// Execute a request with its retry and tolerance policies
///
/// # Errors
/// See [`RetryController::run`]
pub async fn execute_with_policy(
    executor: &dyn RemoteExecutor,
    request: &ExecutionRequest,
) -> Result<Vec<u8>, ExecError> {
    RetryController::for_request(request)
        .run(executor, request)
        .await
}
