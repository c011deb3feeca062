//! Error types for sshcommand-exec

use std::fmt;

use thiserror::Error;

/// Step of session establishment at which a transport failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    /// TCP dial and SSH handshake
    Dial,
    /// User authentication
    Auth,
    /// Opening the session channel
    Session,
    /// Pseudo-terminal negotiation
    Pty,
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportPhase::Dial => "dial",
            TransportPhase::Auth => "auth",
            TransportPhase::Session => "session",
            TransportPhase::Pty => "pty",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while executing a remote command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Request is malformed; raised before any network activity
    #[error("invalid request: {0}")]
    Validation(String),

    /// Host could not be reached, authenticated to, or set up
    #[error("transport error ({phase}): {message}")]
    Transport {
        /// Phase the failure occurred in
        phase: TransportPhase,
        /// Underlying cause
        message: String,
    },

    /// The host was reached but the command itself failed
    #[error("command execution failed: {message}")]
    Execution {
        /// Remote exit status, if one was reported
        exit_status: Option<u32>,
        /// Underlying cause
        message: String,
    },
}

impl ExecError {
    pub(crate) fn transport(phase: TransportPhase, message: impl Into<String>) -> Self {
        ExecError::Transport {
            phase,
            message: message.into(),
        }
    }

    pub(crate) fn execution(exit_status: Option<u32>, message: impl Into<String>) -> Self {
        ExecError::Execution {
            exit_status,
            message: message.into(),
        }
    }

    /// Transport phase, for transport errors
    #[must_use]
    pub fn phase(&self) -> Option<TransportPhase> {
        match self {
            ExecError::Transport { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, ExecError::Transport { .. })
    }

    #[must_use]
    pub fn is_execution(&self) -> bool {
        matches!(self, ExecError::Execution { .. })
    }

    /// Check if error may go away on another attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExecError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_phase() {
        let err = ExecError::transport(TransportPhase::Pty, "channel refused pty-req");
        assert_eq!(
            err.to_string(),
            "transport error (pty): channel refused pty-req"
        );
        assert_eq!(err.phase(), Some(TransportPhase::Pty));
    }

    #[test]
    fn test_validation_not_retryable() {
        assert!(!ExecError::Validation("no credentials".into()).is_retryable());
        assert!(ExecError::execution(Some(1), "exit status 1").is_retryable());
        assert!(ExecError::transport(TransportPhase::Dial, "refused").is_retryable());
    }
}
