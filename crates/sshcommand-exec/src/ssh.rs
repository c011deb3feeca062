//! SSH session establishment and single-attempt command execution using russh

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::PrivateKeyWithHashAlg;
use russh::keys::ssh_key::{self, HashAlg};
use russh::{Channel, ChannelMsg, Disconnect, Pty, client};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::{ExecError, TransportPhase};
use crate::keys::AuthMethod;
use crate::request::{ExecutionRequest, HostKeyPolicy, PtyConfig};
use crate::result::AttemptOutcome;
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    address: String,
    host_key: HostKeyPolicy,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.host_key {
            HostKeyPolicy::InsecureAcceptAny => {
                warn!(
                    address = %self.address,
                    fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
                    "accepting host key without verification"
                );
                Ok(true)
            }
        }
    }
}

/// An authenticated transport with one command channel and a PTY
///
/// Call [`SshSession::close`] when done; it never fails.
pub struct SshSession {
    address: String,
    handle: client::Handle<SshClientHandler>,
    channel: Channel<client::Msg>,
    /// Server already closed the channel
    channel_closed: bool,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("address", &self.address)
            .field("channel_closed", &self.channel_closed)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    /// Dial, authenticate, open a session channel and request a PTY
    ///
    /// Anything acquired before a failure is released before returning.
    ///
    /// # Errors
    /// Returns `ExecError::Transport` tagged with the phase that failed
    #[instrument(skip(request), fields(address = %request.connection.address()))]
    pub async fn open(request: &ExecutionRequest) -> Result<Self, ExecError> {
        let address = request.connection.address();

        let handle = timeout(request.connect_timeout, connect(request, &address))
            .await
            .map_err(|_| {
                ExecError::transport(
                    TransportPhase::Dial,
                    format!(
                        "timed out after {:?} connecting to {address}",
                        request.connect_timeout
                    ),
                )
            })??;

        let channel = match handle.channel_open_session().await {
            Ok(channel) => channel,
            Err(e) => {
                disconnect(&handle, &address).await;
                return Err(ExecError::transport(
                    TransportPhase::Session,
                    format!("creating session: {e}"),
                ));
            }
        };

        let mut session = Self {
            address,
            handle,
            channel,
            channel_closed: false,
        };

        if let Err(e) = session.request_pty(&request.pty).await {
            session.close().await;
            return Err(e);
        }

        debug!(address = %session.address, "session ready");
        Ok(session)
    }

    /// Request a pseudo terminal and wait for the server's answer
    async fn request_pty(&mut self, pty: &PtyConfig) -> Result<(), ExecError> {
        let modes = [
            (Pty::ECHO, u32::from(pty.echo)),
            (Pty::TTY_OP_ISPEED, pty.speed),
            (Pty::TTY_OP_OSPEED, pty.speed),
        ];

        self.channel
            .request_pty(true, &pty.term, pty.columns, pty.rows, 0, 0, &modes)
            .await
            .map_err(|e| {
                ExecError::transport(
                    TransportPhase::Pty,
                    format!("requesting pseudo terminal: {e}"),
                )
            })?;

        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => {
                    return Err(ExecError::transport(
                        TransportPhase::Pty,
                        "server refused pseudo terminal request",
                    ));
                }
                Some(ChannelMsg::Close) | None => {
                    self.channel_closed = true;
                    return Err(ExecError::transport(
                        TransportPhase::Pty,
                        "channel closed while requesting pseudo terminal",
                    ));
                }
                Some(_) => {}
            }
        }
    }

    /// Close the channel and the transport, logging failures
    pub async fn close(self) {
        if !self.channel_closed {
            if let Err(e) = self.channel.close().await {
                warn!(address = %self.address, error = %e, "closing SSH channel");
            }
        }
        disconnect(&self.handle, &self.address).await;
    }
}

async fn connect(
    request: &ExecutionRequest,
    address: &str,
) -> Result<client::Handle<SshClientHandler>, ExecError> {
    let conn = &request.connection;

    info!(
        address = %address,
        user = %conn.user,
        methods = request.auth_methods.len(),
        "connecting to SSH"
    );

    let config = Arc::new(client::Config::default());
    let handler = SshClientHandler {
        address: address.to_string(),
        host_key: request.host_key,
    };

    let mut handle = client::connect(config, (conn.host.as_str(), conn.port), handler)
        .await
        .map_err(|e| {
            ExecError::transport(
                TransportPhase::Dial,
                format!("opening SSH connection: {e}"),
            )
        })?;

    for method in &request.auth_methods {
        let result = match method {
            AuthMethod::PublicKey(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                handle
                    .authenticate_publickey(
                        &conn.user,
                        PrivateKeyWithHashAlg::new(Arc::clone(key), hash_alg),
                    )
                    .await
            }
            AuthMethod::Password(password) => {
                handle.authenticate_password(&conn.user, password).await
            }
        };

        match result {
            Ok(auth) if auth.success() => {
                info!(address = %address, method = method.name(), "SSH connected and authenticated");
                return Ok(handle);
            }
            Ok(_) => debug!(method = method.name(), "authentication method rejected"),
            Err(e) => {
                disconnect(&handle, address).await;
                return Err(ExecError::transport(
                    TransportPhase::Auth,
                    format!("{} authentication: {e}", method.name()),
                ));
            }
        }
    }

    disconnect(&handle, address).await;
    Err(ExecError::transport(
        TransportPhase::Auth,
        format!(
            "unable to authenticate as {}: no supported methods remain",
            conn.user
        ),
    ))
}

async fn disconnect(handle: &client::Handle<SshClientHandler>, address: &str) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
    {
        warn!(address = %address, error = %e, "closing SSH connection");
    }
}

/// Run `command` verbatim on an open session and capture its output
///
/// Every failure here is an execution-phase failure.
#[instrument(skip(session, command), fields(address = %session.address))]
pub async fn run_once(session: &mut SshSession, command: &str) -> AttemptOutcome {
    let start = Instant::now();

    debug!(command = %command, "executing remote command");

    if let Err(e) = session.channel.exec(true, command).await {
        return AttemptOutcome::ExecutionFailure {
            output: Vec::new(),
            error: ExecError::execution(None, format!("starting command: {e}")),
        };
    }

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;
    let mut failure = None;

    loop {
        match session.channel.wait().await {
            Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                // stderr
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus {
                exit_status: status,
            }) => exit_status = Some(status),
            Some(ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            }) => {
                failure = Some(format!(
                    "process killed by signal {signal_name:?} {error_message}"
                ));
            }
            Some(ChannelMsg::Failure) => {
                failure = Some("server refused exec request".to_string());
                break;
            }
            Some(ChannelMsg::Close) | None => {
                session.channel_closed = true;
                break;
            }
            _ => {}
        }
    }

    let duration = start.elapsed();

    debug!(
        status = ?exit_status,
        stdout_bytes = stdout.len(),
        duration = ?duration,
        "remote command completed"
    );

    let error = match (failure, exit_status) {
        (Some(message), status) => Some(ExecError::execution(status, message)),
        (None, Some(0)) => None,
        (None, Some(status)) => Some(ExecError::execution(
            Some(status),
            format!("process exited with status {status}"),
        )),
        (None, None) => Some(ExecError::execution(
            None,
            "process exited without reporting an exit status",
        )),
    };

    match error {
        None => AttemptOutcome::Success(stdout),
        Some(error) => {
            if !stderr.is_empty() {
                debug!(stderr = %String::from_utf8_lossy(&stderr), "remote command stderr");
            }
            AttemptOutcome::ExecutionFailure {
                output: stdout,
                error,
            }
        }
    }
}

/// SSH command executor
///
/// Opens a fresh session for every attempt and always releases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshExecutor;

impl SshExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, request), fields(address = %request.connection.address()))]
    async fn attempt(&self, request: &ExecutionRequest) -> AttemptOutcome {
        let mut session = match SshSession::open(request).await {
            Ok(session) => session,
            Err(e) => return AttemptOutcome::TransportFailure(e),
        };

        let outcome = run_once(&mut session, &request.command).await;
        session.close().await;
        outcome
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}
