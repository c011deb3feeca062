//! Command resource: validated parameters in, result record out

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sshcommand_exec::{RemoteExecutor, execute_with_policy};
use tracing::{info, instrument};

use crate::config::CommandParams;
use crate::error::CoreError;

/// Result of running a command resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResource {
    /// Stable identity derived from host and command
    pub id: String,
    pub host: String,
    pub command: String,
    /// Captured output, lossily decoded as UTF-8
    pub result: String,
}

/// Identity of a command resource: hex SHA-256 of `"<host>-<command>"`
#[must_use]
pub fn resource_id(host: &str, command: &str) -> String {
    let digest = Sha256::digest(format!("{host}-{command}").as_bytes());
    hex::encode(digest)
}

/// Validate parameters, run the command and build the result record
///
/// Used for both creating/updating a resource and reading it as a data
/// source; there is no state to consult.
///
/// # Errors
/// Returns `CoreError::InvalidParameter` before any network activity if
/// validation fails, or `CoreError::Exec` with the last attempt's error
#[instrument(skip(params, executor), fields(host = %params.host))]
pub async fn apply(
    params: CommandParams,
    executor: &dyn RemoteExecutor,
) -> Result<CommandResource, CoreError> {
    let host = params.host.clone();
    let command = params.command.clone();

    let request = params.into_request()?;
    let output = execute_with_policy(executor, &request).await?;

    let resource = CommandResource {
        id: resource_id(&host, &command),
        result: String::from_utf8_lossy(&output).into_owned(),
        host,
        command,
    };

    info!(id = %resource.id, bytes = output.len(), "command resource applied");

    Ok(resource)
}
