use crate::admin::ReplSetSettings;
use std::collections::HashSet;
use std::convert::TryFrom;
use std::env;
use std::path::PathBuf;
use tokio::time::Duration;

const DEFAULT_REPL_SET_NAME: &str = "testset";
const DEFAULT_IP: &str = "127.0.0.1";
const DEFAULT_STORAGE_ENGINE: &str = "wiredTiger";
const DEFAULT_OPLOG_SIZE_MB: u32 = 1;
const DEFAULT_CONVERGENCE_ATTEMPTS: u32 = 120;
const DEFAULT_CONVERGENCE_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MEMBER_READY_TIMEOUT: Duration = Duration::from_secs(20);

const SERVER_BINARY_ENV: &str = "MONGOMS_SYSTEM_BINARY";
const SHELL_BINARY_ENV: &str = "MONGOMS_SHELL_BINARY";
const DEFAULT_SERVER_BINARY: &str = "mongod";
const DEFAULT_SHELL_BINARY: &str = "mongosh";

/// Options for one replica set. Every field is optional; see `ReplSetOptionsValidated` for
/// the defaults.
#[derive(Clone, Debug, Default)]
pub struct ReplSetOptions {
    /// Number of members. Must be at least 1.
    pub count: Option<usize>,
    /// Replica set name, passed to every member and to the initiate command.
    pub name: Option<String>,
    /// Database name appended to connection strings when `get_uri()` isn't given one.
    pub db_name: Option<String>,
    pub ip: Option<String>,
    pub storage_engine: Option<String>,
    pub oplog_size_mb: Option<u32>,
    /// Extra arguments passed to every member.
    pub args: Vec<String>,
    /// Per-member overrides, by member index. May be shorter than `count`.
    pub member_options: Vec<MemberOptions>,
    pub auto_start: Option<bool>,
    /// How many status polls to make before giving up on a primary.
    pub convergence_attempts: Option<u32>,
    pub convergence_interval: Option<Duration>,
    /// How long one member may take to report that it accepts connections.
    pub member_ready_timeout: Option<Duration>,
    pub settings: ReplSetSettings,
    pub binary: BinaryOptions,
}

#[derive(Clone, Debug, Default)]
pub struct MemberOptions {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub storage_engine: Option<String>,
    pub args: Vec<String>,
    pub priority: Option<f64>,
    pub arbiter_only: bool,
}

/// Where to find the engine binaries. Falls back to `MONGOMS_SYSTEM_BINARY` /
/// `MONGOMS_SHELL_BINARY`, then to `mongod` / `mongosh` on `PATH`.
#[derive(Clone, Debug, Default)]
pub struct BinaryOptions {
    pub server: Option<PathBuf>,
    pub shell: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub(crate) struct ReplSetOptionsValidated {
    pub count: usize,
    pub name: String,
    pub db_name: Option<String>,
    pub ip: String,
    pub storage_engine: String,
    pub oplog_size_mb: u32,
    pub args: Vec<String>,
    // Always exactly `count` entries.
    pub members: Vec<MemberOptions>,
    pub auto_start: bool,
    pub convergence_attempts: u32,
    pub convergence_interval: Duration,
    pub member_ready_timeout: Duration,
    pub settings: ReplSetSettings,
    pub server_binary: PathBuf,
    pub shell_binary: PathBuf,
}

impl ReplSetOptionsValidated {
    fn validate(&self, configured_members: usize) -> Result<(), String> {
        if self.count < 1 {
            return Err("ReplSet count needs to be 1 or higher".to_string());
        }
        if configured_members > self.count {
            return Err(format!(
                "{} member options given for a replica set of {} members",
                configured_members, self.count
            ));
        }
        if self.name.is_empty() {
            return Err("ReplSet name must not be empty".to_string());
        }
        if self
            .name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&' | ','))
        {
            return Err(format!("ReplSet name {:?} contains reserved characters", self.name));
        }
        if self.convergence_attempts < 1 {
            return Err("Convergence attempts must be at least 1".to_string());
        }
        if self.convergence_interval == Duration::from_millis(0) {
            return Err("Convergence interval must be greater than zero".to_string());
        }
        if self.member_ready_timeout == Duration::from_millis(0) {
            return Err("Member ready timeout must be greater than zero".to_string());
        }

        let mut ports = HashSet::with_capacity(self.count);
        for (index, member) in self.members.iter().enumerate() {
            if let Some(port) = member.port {
                if !ports.insert(port) {
                    return Err(format!("Member {} reuses port {}", index, port));
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<ReplSetOptions> for ReplSetOptionsValidated {
    type Error = String;

    fn try_from(options: ReplSetOptions) -> Result<Self, Self::Error> {
        let count = options.count.unwrap_or(1);
        let configured_members = options.member_options.len();
        let mut members = options.member_options;
        if members.len() < count {
            members.resize_with(count, MemberOptions::default);
        }

        let values = ReplSetOptionsValidated {
            count,
            name: options.name.unwrap_or_else(|| DEFAULT_REPL_SET_NAME.to_string()),
            db_name: options.db_name,
            ip: options.ip.unwrap_or_else(|| DEFAULT_IP.to_string()),
            storage_engine: options
                .storage_engine
                .unwrap_or_else(|| DEFAULT_STORAGE_ENGINE.to_string()),
            oplog_size_mb: options.oplog_size_mb.unwrap_or(DEFAULT_OPLOG_SIZE_MB),
            args: options.args,
            members,
            auto_start: options.auto_start.unwrap_or(true),
            convergence_attempts: options.convergence_attempts.unwrap_or(DEFAULT_CONVERGENCE_ATTEMPTS),
            convergence_interval: options.convergence_interval.unwrap_or(DEFAULT_CONVERGENCE_INTERVAL),
            member_ready_timeout: options.member_ready_timeout.unwrap_or(DEFAULT_MEMBER_READY_TIMEOUT),
            settings: options.settings,
            server_binary: resolve_binary(options.binary.server, SERVER_BINARY_ENV, DEFAULT_SERVER_BINARY),
            shell_binary: resolve_binary(options.binary.shell, SHELL_BINARY_ENV, DEFAULT_SHELL_BINARY),
        };

        values.validate(configured_members)?;
        Ok(values)
    }
}

fn resolve_binary(explicit: Option<PathBuf>, env_var: &str, fallback: &str) -> PathBuf {
    explicit
        .or_else(|| env::var_os(env_var).filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(fallback))
}
