//! sshcommand-exec: Remote command execution over SSH
//!
//! Opens a fresh SSH session per attempt, runs one command, classifies the
//! outcome as transport- or execution-phase, and retries within a
//! wall-clock bound under a tolerance policy.

pub mod error;
pub mod keys;
pub mod policy;
pub mod request;
pub mod result;
pub mod retry;
pub mod ssh;
pub mod traits;

pub use error::{ExecError, TransportPhase};
pub use keys::{AuthMethod, KeySource};
pub use policy::TolerancePolicy;
pub use request::{ConnectionInfo, ExecutionRequest, HostKeyPolicy, PtyConfig, RetryPolicy};
pub use result::AttemptOutcome;
pub use retry::{RetryController, RetryState, execute_with_policy};
pub use ssh::{SshExecutor, SshSession, run_once};
pub use traits::RemoteExecutor;
