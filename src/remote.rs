//! Remote Execution Gateway
//!
//! Runs one shell command per call on the monitored host over SSH and hands
//! back its stdout. Every call opens a fresh session and closes it afterwards.
//!
//! The host key is accepted on first contact without pinning.

use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Transport display cap, in characters
pub const DISPLAY_LIMIT: usize = 4096;

/// Default location of the PostgreSQL log read by `get_repl_logs`
pub const DEFAULT_REPL_LOG_PATH: &str = "/var/log/postgresql/postgresql-14-main.log";

/// Remote execution errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("SSH authentication failed for user {0}")]
    AuthFailed(String),

    #[error("SSH task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Connection settings for the monitored host
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Anything that can run a shell command and return its stdout
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, RemoteError>;
}

/// Password-authenticated SSH executor, one session per command
pub struct SshExecutor {
    settings: SshSettings,
}

impl SshExecutor {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn open_session(settings: &SshSettings) -> Result<Session, RemoteError> {
        let tcp = TcpStream::connect((settings.host.as_str(), settings.port))?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&settings.user, &settings.password)?;

        if !session.authenticated() {
            return Err(RemoteError::AuthFailed(settings.user.clone()));
        }

        Ok(session)
    }

    /// Blocking: connect, exec, read stdout to EOF, disconnect.
    fn run_blocking(settings: &SshSettings, command: &str) -> Result<String, RemoteError> {
        let session = Self::open_session(settings)?;

        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        let mut raw = Vec::new();
        channel.read_to_end(&mut raw)?;

        channel.wait_close().ok();
        session.disconnect(None, "done", None).ok();

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, command: &str) -> Result<String, RemoteError> {
        let settings = self.settings.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || Self::run_blocking(&settings, &command)).await?
    }
}

/// Fixed catalog of diagnostics the bot may run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Release,
    Uname,
    Uptime,
    DiskUsage,
    MemoryUsage,
    CpuStats,
    LoggedInUsers,
    RecentLogins,
    CriticalLogs,
    Processes,
    Sockets,
    Services,
    ReplicationLogs,
    InstalledPackages,
    PackageInfo(String),
}

impl RemoteCommand {
    /// Catalog entries reachable by a bot command of the same name
    pub const DIAGNOSTICS: [(&'static str, RemoteCommand); 13] = [
        ("get_release", RemoteCommand::Release),
        ("get_uname", RemoteCommand::Uname),
        ("get_uptime", RemoteCommand::Uptime),
        ("get_df", RemoteCommand::DiskUsage),
        ("get_free", RemoteCommand::MemoryUsage),
        ("get_mpstat", RemoteCommand::CpuStats),
        ("get_w", RemoteCommand::LoggedInUsers),
        ("get_auths", RemoteCommand::RecentLogins),
        ("get_critical", RemoteCommand::CriticalLogs),
        ("get_ps", RemoteCommand::Processes),
        ("get_ss", RemoteCommand::Sockets),
        ("get_services", RemoteCommand::Services),
        ("get_repl_logs", RemoteCommand::ReplicationLogs),
    ];

    /// Resolve a bot command name (without the leading `/`)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::DIAGNOSTICS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, cmd)| cmd.clone())
    }

    /// Shell command line for this entry
    pub fn command_line(&self, repl_log_path: &str) -> String {
        match self {
            Self::Release => "lsb_release -a".to_string(),
            Self::Uname => "uname -a".to_string(),
            Self::Uptime => "uptime".to_string(),
            Self::DiskUsage => "df -h".to_string(),
            Self::MemoryUsage => "free -m".to_string(),
            Self::CpuStats => "mpstat".to_string(),
            Self::LoggedInUsers => "w".to_string(),
            Self::RecentLogins => "last | head -n 10".to_string(),
            Self::CriticalLogs => "journalctl -p crit -n 5".to_string(),
            Self::Processes => "ps aux".to_string(),
            Self::Sockets => "ss -tuln".to_string(),
            Self::Services => "service --status-all".to_string(),
            Self::ReplicationLogs => {
                format!("sudo cat {} | grep repl", shell_quote(repl_log_path))
            }
            Self::InstalledPackages => "apt list --installed".to_string(),
            Self::PackageInfo(name) => format!("apt-cache show {}", shell_quote(name)),
        }
    }
}

/// Wrap a value in single quotes for the remote POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Hard prefix cut to `limit` characters; no line-boundary handling.
pub fn truncate_for_display(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Outcome of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommandResult {
    pub raw_output: String,
    pub display_output: String,
    pub succeeded: bool,
}

impl RemoteCommandResult {
    fn from_output(raw_output: String) -> Self {
        let display_output = truncate_for_display(&raw_output, DISPLAY_LIMIT).to_string();
        Self {
            raw_output,
            display_output,
            succeeded: true,
        }
    }

    fn failed() -> Self {
        Self {
            raw_output: String::new(),
            display_output: String::new(),
            succeeded: false,
        }
    }

    /// Succeeded with something to show
    pub fn has_output(&self) -> bool {
        self.succeeded && !self.display_output.trim().is_empty()
    }
}

/// Gateway over an executor: catalog lookup, error capture, display cap
#[derive(Clone)]
pub struct RemoteGateway {
    executor: Arc<dyn RemoteExecutor>,
    repl_log_path: String,
}

impl RemoteGateway {
    pub fn new(executor: Arc<dyn RemoteExecutor>, repl_log_path: impl Into<String>) -> Self {
        Self {
            executor,
            repl_log_path: repl_log_path.into(),
        }
    }

    /// Run one catalog command. Never fails; errors are logged and flagged.
    pub async fn run(&self, command: &RemoteCommand) -> RemoteCommandResult {
        let line = command.command_line(&self.repl_log_path);
        info!("Remote command: {}", line);

        match self.executor.execute(&line).await {
            Ok(output) => {
                debug!("Remote command returned {} bytes", output.len());
                RemoteCommandResult::from_output(output)
            }
            Err(e) => {
                warn!("Remote command {:?} failed: {}", line, e);
                RemoteCommandResult::failed()
            }
        }
    }
}
