//! Command parameters as supplied by the caller, and their validation

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sshcommand_exec::{
    AuthMethod, ConnectionInfo, ExecutionRequest, HostKeyPolicy, KeySource, RetryPolicy,
};
use tracing::debug;

use crate::duration::parse_duration;
use crate::error::CoreError;

/// Default for `connection_timeout` and `retry_timeout`
pub const DEFAULT_TIMEOUT: &str = "5m";

/// Default for `retry_interval`
pub const DEFAULT_RETRY_INTERVAL: &str = "5s";

/// Parameters of one remote command
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandParams {
    /// Host to connect to
    pub host: String,
    /// Command to run, passed verbatim to the remote shell
    pub command: String,
    /// SSH user (defaults to root)
    #[serde(default = "default_user")]
    pub user: String,
    /// SSH port (defaults to 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Private key text
    #[serde(default)]
    pub private_key: Option<String>,
    /// Path to a private key file
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// Environment variable holding a base64-encoded private key
    #[serde(default)]
    pub private_key_env: Option<String>,
    /// Passphrase for encrypted private keys
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// Password, tried after any keys
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout")]
    pub connection_timeout: String,
    #[serde(default)]
    pub ignore_execute_errors: bool,
    #[serde(default)]
    pub retry: bool,
    #[serde(default = "default_timeout")]
    pub retry_timeout: String,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: String,
    /// Acknowledge that host keys are not verified
    #[serde(default)]
    pub insecure_ignore_host_key: bool,
}

fn default_user() -> String {
    sshcommand_exec::request::DEFAULT_USER.to_string()
}

fn default_port() -> u16 {
    sshcommand_exec::request::DEFAULT_PORT
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

fn default_retry_interval() -> String {
    DEFAULT_RETRY_INTERVAL.to_string()
}

impl std::fmt::Debug for CommandParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |set: bool| if set { Some("<redacted>") } else { None };
        f.debug_struct("CommandParams")
            .field("host", &self.host)
            .field("command", &self.command)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("private_key", &redacted(self.private_key.is_some()))
            .field("private_key_path", &self.private_key_path)
            .field("private_key_env", &self.private_key_env)
            .field("password", &redacted(self.password.is_some()))
            .field("connection_timeout", &self.connection_timeout)
            .field("ignore_execute_errors", &self.ignore_execute_errors)
            .field("retry", &self.retry)
            .field("retry_timeout", &self.retry_timeout)
            .field("retry_interval", &self.retry_interval)
            .field("insecure_ignore_host_key", &self.insecure_ignore_host_key)
            .finish_non_exhaustive()
    }
}

impl CommandParams {
    /// Parameters with defaults for everything but host and command
    pub fn new(host: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            command: command.into(),
            user: default_user(),
            port: default_port(),
            private_key: None,
            private_key_path: None,
            private_key_env: None,
            private_key_passphrase: None,
            password: None,
            connection_timeout: default_timeout(),
            ignore_execute_errors: false,
            retry: false,
            retry_timeout: default_timeout(),
            retry_interval: default_retry_interval(),
            insecure_ignore_host_key: false,
        }
    }

    /// Load parameters from a TOML file
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse parameters from TOML text
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` on malformed TOML or unknown fields
    pub fn from_toml(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::ConfigError(e.to_string()))
    }

    /// Credentials in the order they are offered: keys first, then password
    fn auth_methods(&self) -> Result<Vec<AuthMethod>, CoreError> {
        let passphrase = self.private_key_passphrase.as_deref();
        let mut methods = Vec::new();

        let sources = [
            ("private_key", self.private_key.clone().map(KeySource::Inline)),
            ("private_key_path", self.private_key_path.clone().map(KeySource::Path)),
            ("private_key_env", self.private_key_env.clone().map(KeySource::Env)),
        ];
        for (field, source) in sources {
            let Some(source) = source else { continue };
            let method = AuthMethod::from_key(&source, passphrase)
                .map_err(|e| CoreError::invalid(field, e.to_string()))?;
            methods.push(method);
        }

        if let Some(password) = &self.password {
            methods.push(AuthMethod::password(password.clone()));
        }

        if methods.is_empty() {
            return Err(CoreError::invalid(
                "private_key",
                "no credentials supplied; set a private key or a password",
            ));
        }
        Ok(methods)
    }

    /// Validate every parameter and build the execution request
    ///
    /// # Errors
    /// Returns `CoreError::InvalidParameter` naming the first bad field
    pub fn into_request(self) -> Result<ExecutionRequest, CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::invalid("host", "must not be empty"));
        }
        if self.command.is_empty() {
            return Err(CoreError::invalid("command", "must not be empty"));
        }
        if !self.insecure_ignore_host_key {
            return Err(CoreError::invalid(
                "insecure_ignore_host_key",
                "host keys are never verified; set to true to accept this",
            ));
        }

        let duration = |field: &'static str, value: &str| {
            parse_duration(value).map_err(|e| CoreError::invalid(field, e.to_string()))
        };
        let connect_timeout = duration("connection_timeout", &self.connection_timeout)?;
        let retry_timeout = duration("retry_timeout", &self.retry_timeout)?;
        let retry_interval = duration("retry_interval", &self.retry_interval)?;

        let auth_methods = self.auth_methods()?;

        let retry = if self.retry {
            RetryPolicy::within(retry_timeout, retry_interval)
        } else {
            RetryPolicy {
                enabled: false,
                timeout: retry_timeout,
                interval: retry_interval,
            }
        };

        let connection = ConnectionInfo::new(self.host)
            .with_port(self.port)
            .with_user(self.user);

        let request = auth_methods.into_iter().fold(
            ExecutionRequest::new(connection, self.command, HostKeyPolicy::InsecureAcceptAny)
                .with_connect_timeout(connect_timeout)
                .with_retry(retry)
                .ignore_execute_errors(self.ignore_execute_errors),
            ExecutionRequest::with_auth,
        );

        debug!(request = ?request, "validated command parameters");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const ED25519_KEY: &str =
        include_str!("../../sshcommand-exec/tests/fixtures/id_ed25519");

    fn params() -> CommandParams {
        CommandParams {
            password: Some("secret".to_string()),
            insecure_ignore_host_key: true,
            ..CommandParams::new("example.org", "uptime")
        }
    }

    #[test]
    fn test_defaults_from_toml() {
        let params = CommandParams::from_toml(
            r#"
host = "example.org"
command = "uptime"
password = "secret"
"#,
        )
        .unwrap();

        assert_eq!(params.user, "root");
        assert_eq!(params.port, 22);
        assert_eq!(params.connection_timeout, "5m");
        assert_eq!(params.retry_interval, "5s");
        assert!(!params.retry);
        assert!(!params.ignore_execute_errors);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = CommandParams::from_toml("host = \"h\"\ncommand = \"c\"\nfoo = 1\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigError(_)));
    }

    #[test]
    fn test_into_request() {
        let request = CommandParams {
            port: 2222,
            user: "deploy".to_string(),
            retry: true,
            retry_timeout: "1s".to_string(),
            retry_interval: "200ms".to_string(),
            connection_timeout: "30s".to_string(),
            ..params()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.connection.address(), "example.org:2222");
        assert_eq!(request.connection.user, "deploy");
        assert_eq!(request.connect_timeout, Duration::from_secs(30));
        assert_eq!(
            request.retry,
            RetryPolicy::within(Duration::from_secs(1), Duration::from_millis(200))
        );
        assert_eq!(request.auth_methods.len(), 1);
    }

    #[test]
    fn test_negative_durations_clamp_to_zero() {
        let request = CommandParams {
            retry: true,
            retry_timeout: "-1m".to_string(),
            retry_interval: "-5s".to_string(),
            ..params()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.retry.timeout, Duration::ZERO);
        assert_eq!(request.retry.interval, Duration::ZERO);
    }

    #[test]
    fn test_no_credentials_is_validation_error() {
        let err = CommandParams {
            password: None,
            ..params()
        }
        .into_request()
        .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("no credentials"));
    }

    #[test]
    fn test_bad_duration_names_field() {
        let err = CommandParams {
            retry_interval: "soon".to_string(),
            ..params()
        }
        .into_request()
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::InvalidParameter {
                field: "retry_interval",
                ..
            }
        ));
    }

    #[test]
    fn test_keys_offered_before_password() {
        let request = CommandParams {
            private_key: Some(ED25519_KEY.to_string()),
            ..params()
        }
        .into_request()
        .unwrap();

        let names: Vec<_> = request.auth_methods.iter().map(AuthMethod::name).collect();
        assert_eq!(names, ["publickey", "password"]);
    }

    #[test]
    fn test_unparsable_key_rejected() {
        let err = CommandParams {
            private_key: Some("-----BEGIN NOTHING-----".to_string()),
            ..params()
        }
        .into_request()
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::InvalidParameter {
                field: "private_key",
                ..
            }
        ));
    }

    #[test]
    fn test_host_key_acknowledgement_required() {
        let err = CommandParams {
            insecure_ignore_host_key: false,
            ..params()
        }
        .into_request()
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::InvalidParameter {
                field: "insecure_ignore_host_key",
                ..
            }
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", params()).contains("secret"));
    }
}
