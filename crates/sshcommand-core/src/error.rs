//! Core error types for sshcommand-core

use sshcommand_exec::ExecError;
use thiserror::Error;

/// Errors surfaced to the caller of a command resource
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// A parameter failed validation; nothing was sent over the network
    #[error("invalid parameter {field}: {message}")]
    InvalidParameter {
        /// Parameter name as written in the parameter file
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Parameter file could not be loaded
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Execution failed after the retry policy gave up
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl CoreError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::InvalidParameter {
            field,
            message: message.into(),
        }
    }

    /// Whether the error was raised before any network activity
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidParameter { .. }
                | CoreError::ConfigError(_)
                | CoreError::Exec(ExecError::Validation(_))
        )
    }
}
