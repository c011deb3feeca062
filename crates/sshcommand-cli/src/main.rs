//! sshcommand CLI
//!
//! Runs one command on a remote host over SSH and prints the result record
//! as JSON

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use eyre::{WrapErr, eyre};
use sshcommand_core::{CommandParams, CommandResource, apply};
use sshcommand_core::config::{DEFAULT_RETRY_INTERVAL, DEFAULT_TIMEOUT};
use sshcommand_exec::SshExecutor;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming a parameter file for `apply`
const CONFIG_ENV: &str = "SSHCOMMAND_CONFIG";

/// Environment variable consulted when no password flag is given
const PASSWORD_ENV: &str = "SSHCOMMAND_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "sshcommand", version)]
#[command(about = "Run a command on a remote host over SSH", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command described by flags
    #[command(name = "run")]
    Run(RunArgs),

    /// Run a command described by a TOML parameter file
    #[command(name = "apply")]
    Apply {
        /// Parameter file (defaults to $SSHCOMMAND_CONFIG)
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Host to connect to
    #[arg(long)]
    host: String,

    /// Command to run
    #[arg(long)]
    command: String,

    #[arg(short, long, default_value = "root")]
    user: String,

    #[arg(short, long, default_value_t = 22)]
    port: u16,

    /// Path to a private key file
    #[arg(short = 'i', long)]
    identity: Option<PathBuf>,

    /// Environment variable holding a base64-encoded private key
    #[arg(long)]
    key_env: Option<String>,

    /// Passphrase for an encrypted private key
    #[arg(long)]
    passphrase: Option<String>,

    /// Password (falls back to $SSHCOMMAND_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Bound on dial, handshake and authentication
    #[arg(long, default_value = DEFAULT_TIMEOUT)]
    connection_timeout: String,

    /// Retry failed attempts until the retry timeout elapses
    #[arg(long)]
    retry: bool,

    #[arg(long, default_value = DEFAULT_TIMEOUT)]
    retry_timeout: String,

    #[arg(long, default_value = DEFAULT_RETRY_INTERVAL)]
    retry_interval: String,

    /// Report success when the command itself fails
    #[arg(long)]
    ignore_execute_errors: bool,

    /// Accept any host key without verification
    #[arg(long)]
    insecure_ignore_host_key: bool,
}

impl RunArgs {
    fn into_params(self) -> CommandParams {
        let password = self
            .password
            .or_else(|| std::env::var(PASSWORD_ENV).ok());

        CommandParams {
            user: self.user,
            port: self.port,
            private_key_path: self.identity,
            private_key_env: self.key_env,
            private_key_passphrase: self.passphrase,
            password,
            connection_timeout: self.connection_timeout,
            ignore_execute_errors: self.ignore_execute_errors,
            retry: self.retry,
            retry_timeout: self.retry_timeout,
            retry_interval: self.retry_interval,
            insecure_ignore_host_key: self.insecure_ignore_host_key,
            ..CommandParams::new(self.host, self.command)
        }
    }
}

fn load_params(file: Option<PathBuf>) -> Result<CommandParams> {
    let path = file
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .ok_or_else(|| eyre!("no parameter file given and {CONFIG_ENV} is not set"))?;

    info!(path = %path.display(), "loading command parameters");
    CommandParams::load(&path).wrap_err_with(|| format!("loading {}", path.display()))
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the result record
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let params = match cli.command {
        Commands::Run(args) => {
            info!("using command parameters from flags");
            args.into_params()
        }
        Commands::Apply { file } => load_params(file)?,
    };

    let resource: CommandResource = apply(params, &SshExecutor::new()).await?;
    info!(id = %resource.id, host = %resource.host, "command applied");

    println!("{}", serde_json::to_string_pretty(&resource)?);
    Ok(())
}
