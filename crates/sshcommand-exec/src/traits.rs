//! Remote executor trait

use async_trait::async_trait;

use crate::request::ExecutionRequest;
use crate::result::AttemptOutcome;

/// Performs a single, self-contained execution attempt
///
/// Each call establishes its own session and releases it before returning.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run the request's command once and classify the outcome
    async fn attempt(&self, request: &ExecutionRequest) -> AttemptOutcome;

    /// Executor name for logging
    fn executor_type(&self) -> &'static str;
}
