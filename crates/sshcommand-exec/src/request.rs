//! Execution request and its connection, retry and terminal settings

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;
use crate::keys::AuthMethod;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default remote user
pub const DEFAULT_USER: &str = "root";

/// Connection information for SSH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (default root)
    #[serde(default = "default_user")]
    pub user: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

impl ConnectionInfo {
    /// Create connection info with the default port and user
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set remote user
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Dial address, always `host:port`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bounded retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Whether failed attempts are repeated at all
    pub enabled: bool,
    /// Wall-clock bound measured from the first attempt
    pub timeout: Duration,
    /// Sleep between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Retry until `timeout` has elapsed, sleeping `interval` between attempts
    #[must_use]
    pub fn within(timeout: Duration, interval: Duration) -> Self {
        Self {
            enabled: true,
            timeout,
            interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: Duration::from_secs(5 * 60),
            interval: Duration::from_secs(5),
        }
    }
}

/// Pseudo-terminal parameters requested on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyConfig {
    /// Terminal type
    pub term: String,
    /// Height in rows
    pub rows: u32,
    /// Width in columns
    pub columns: u32,
    /// Input and output baud rate
    pub speed: u32,
    /// Whether the remote side echoes input
    pub echo: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            term: "xterm".to_string(),
            rows: 80,
            columns: 40,
            speed: 14_400,
            echo: false,
        }
    }
}

/// How the server's host key is treated
///
/// Host keys are not verified. Every request has to name this choice
/// explicitly so the trust gap is visible where requests are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostKeyPolicy {
    /// Accept any host key without verification (vulnerable to MITM)
    InsecureAcceptAny,
}

/// Everything needed to run one command on one host
#[derive(Clone)]
pub struct ExecutionRequest {
    pub connection: ConnectionInfo,
    /// Credentials, offered in order
    pub auth_methods: Vec<AuthMethod>,
    pub command: String,
    /// Bounds dial, handshake and authentication
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    /// Treat execution-phase failures as success
    pub ignore_execute_errors: bool,
    pub pty: PtyConfig,
    pub host_key: HostKeyPolicy,
}

impl ExecutionRequest {
    /// Create a request with default timeouts, no retry and a default PTY
    pub fn new(
        connection: ConnectionInfo,
        command: impl Into<String>,
        host_key: HostKeyPolicy,
    ) -> Self {
        Self {
            connection,
            auth_methods: Vec::new(),
            command: command.into(),
            connect_timeout: Duration::from_secs(5 * 60),
            retry: RetryPolicy::disabled(),
            ignore_execute_errors: false,
            pty: PtyConfig::default(),
            host_key,
        }
    }

    /// Append a credential
    #[must_use]
    pub fn with_auth(mut self, method: AuthMethod) -> Self {
        self.auth_methods.push(method);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn ignore_execute_errors(mut self, ignore: bool) -> Self {
        self.ignore_execute_errors = ignore;
        self
    }

    #[must_use]
    pub fn with_pty(mut self, pty: PtyConfig) -> Self {
        self.pty = pty;
        self
    }

    /// Check request invariants before any network activity
    ///
    /// # Errors
    /// Returns `ExecError::Validation` describing the first violation
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.connection.host.trim().is_empty() {
            return Err(ExecError::Validation("host must not be empty".to_string()));
        }
        if self.command.is_empty() {
            return Err(ExecError::Validation(
                "command must not be empty".to_string(),
            ));
        }
        if self.auth_methods.is_empty() {
            return Err(ExecError::Validation(
                "at least one authentication method is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ExecutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("connection", &self.connection)
            .field("auth_methods", &self.auth_methods)
            .field("command", &self.command)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .field("ignore_execute_errors", &self.ignore_execute_errors)
            .field("host_key", &self.host_key)
            .finish_non_exhaustive()
    }
}
