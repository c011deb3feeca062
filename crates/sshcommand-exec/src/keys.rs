//! Credential resolution for SSH authentication

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::keys::{PrivateKey, decode_secret_key};
use tracing::debug;

use crate::error::ExecError;

/// Where a private key comes from
#[derive(Clone)]
pub enum KeySource {
    /// Key text (OpenSSH or PEM) supplied directly
    Inline(String),
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key from environment
    Env(String),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Inline(_) => f.write_str("Inline(<redacted>)"),
            KeySource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            KeySource::Env(var) => f.debug_tuple("Env").field(var).finish(),
        }
    }
}

impl KeySource {
    /// Parse the key into a signer
    ///
    /// # Errors
    /// Returns `KeyError` if the key cannot be read or decoded
    pub fn resolve(&self, passphrase: Option<&str>) -> Result<PrivateKey, KeyError> {
        let text = match self {
            KeySource::Inline(text) => text.clone(),
            KeySource::Path(path) => {
                validate_key_permissions(path)?;
                std::fs::read_to_string(path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
                    _ => KeyError::Io(e.to_string()),
                })?
            }
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;
                String::from_utf8(key_data).map_err(|_| KeyError::InvalidBase64)?
            }
        };

        let key = decode_secret_key(&text, passphrase)
            .map_err(|e| KeyError::Unparsable(e.to_string()))?;

        debug!(source = ?self, algorithm = %key.algorithm(), "decoded private key");

        Ok(key)
    }
}

/// A single credential offered to the server, tried in list order
#[derive(Clone)]
pub enum AuthMethod {
    /// Public key authentication with a decoded signer
    PublicKey(Arc<PrivateKey>),
    /// Password authentication
    Password(String),
}

impl AuthMethod {
    /// Resolve a key source into a public key credential
    ///
    /// # Errors
    /// Returns `ExecError::Validation` if the key cannot be resolved
    pub fn from_key(source: &KeySource, passphrase: Option<&str>) -> Result<Self, ExecError> {
        let key = source
            .resolve(passphrase)
            .map_err(|e| ExecError::Validation(format!("unable to parse private key: {e}")))?;
        Ok(AuthMethod::PublicKey(Arc::new(key)))
    }

    /// Password credential
    pub fn password(password: impl Into<String>) -> Self {
        AuthMethod::Password(password.into())
    }

    /// Method name as used in the SSH protocol
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::PublicKey(_) => "publickey",
            AuthMethod::Password(_) => "password",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::PublicKey(key) => write!(f, "PublicKey({})", key.algorithm()),
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unparsable(String),

    #[error("I/O error: {0}")]
    Io(String),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
        _ => KeyError::Io(e.to_string()),
    })?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    const ED25519_KEY: &str = include_str!("../tests/fixtures/id_ed25519");
    const ED25519_KEY_ENCRYPTED: &str = include_str!("../tests/fixtures/id_ed25519_passphrase");
    const PASSPHRASE: &str = "correct horse";

    #[test]
    fn test_inline_key_resolves() {
        let key = KeySource::Inline(ED25519_KEY.to_string()).resolve(None).unwrap();
        assert_eq!(key.algorithm().as_str(), "ssh-ed25519");
    }

    #[test]
    fn test_encrypted_key_needs_passphrase() {
        let source = KeySource::Inline(ED25519_KEY_ENCRYPTED.to_string());
        assert!(source.resolve(Some(PASSPHRASE)).is_ok());
        assert!(matches!(source.resolve(None), Err(KeyError::Unparsable(_))));
    }

    #[test]
    fn test_env_key_resolves() {
        let var = "SSHCOMMAND_TEST_KEY_BASE64";
        // SAFETY: the variable name is unique to this test
        unsafe { env::set_var(var, STANDARD.encode(ED25519_KEY)) };

        let resolved = KeySource::Env(var.to_string()).resolve(None);

        unsafe { env::remove_var(var) };
        assert!(resolved.is_ok());
    }

    #[test]
    fn test_env_key_invalid_base64() {
        let var = "SSHCOMMAND_TEST_KEY_NOT_BASE64";
        // SAFETY: the variable name is unique to this test
        unsafe { env::set_var(var, "%%% not base64 %%%") };

        let resolved = KeySource::Env(var.to_string()).resolve(None);

        unsafe { env::remove_var(var) };
        assert!(matches!(resolved, Err(KeyError::InvalidBase64)));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ED25519_KEY.as_bytes()).unwrap();
        let source = KeySource::Path(file.path().to_path_buf());

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(
            source.resolve(None),
            Err(KeyError::BadPermissions(_))
        ));

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        assert!(source.resolve(None).is_ok());
    }

    #[test]
    fn test_from_key_builds_publickey_method() {
        let method =
            AuthMethod::from_key(&KeySource::Inline(ED25519_KEY.to_string()), None).unwrap();
        assert_eq!(method.name(), "publickey");
        assert!(matches!(method, AuthMethod::PublicKey(_)));
    }

    #[test]
    fn test_inline_garbage_is_unparsable() {
        let source = KeySource::Inline("not a key".to_string());
        assert!(matches!(
            source.resolve(None),
            Err(KeyError::Unparsable(_))
        ));
    }

    #[test]
    fn test_env_not_set() {
        let source = KeySource::Env("SSHCOMMAND_TEST_KEY_THAT_IS_NOT_SET".to_string());
        assert!(matches!(source.resolve(None), Err(KeyError::EnvNotSet(_))));
    }

    #[test]
    fn test_missing_key_file() {
        let source = KeySource::Path(PathBuf::from("/nonexistent/sshcommand/id_ed25519"));
        assert!(matches!(source.resolve(None), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_from_key_maps_to_validation() {
        let err = AuthMethod::from_key(&KeySource::Inline(String::new()), None).unwrap_err();
        assert!(matches!(err, ExecError::Validation(_)));
        assert!(err.to_string().contains("unable to parse private key"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", AuthMethod::password("hunter2"));
        assert!(!debug.contains("hunter2"));

        let debug = format!("{:?}", KeySource::Inline("-----BEGIN SECRET".to_string()));
        assert!(!debug.contains("BEGIN"));
    }
}
