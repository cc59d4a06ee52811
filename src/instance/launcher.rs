use crate::instance::port;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

/// Network address a member listens on. Displays as `host:port`, which is the form used both in
/// the initiate command and in connection strings.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MemberAddress {
    pub host: String,
    pub port: u16,
}

impl MemberAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        MemberAddress {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything a launcher needs to bring up one member. The port is always resolved before the
/// spec is built.
#[derive(Clone, Debug)]
pub struct InstanceSpec {
    pub index: usize,
    pub ip: String,
    pub port: u16,
    pub repl_set_name: String,
    pub storage_engine: String,
    pub oplog_size_mb: Option<u32>,
    // None means the launcher creates (and later removes) a temporary directory.
    pub db_path: Option<PathBuf>,
    pub args: Vec<String>,
    pub ready_timeout: Duration,
}

impl InstanceSpec {
    pub fn address(&self) -> MemberAddress {
        MemberAddress::new(self.ip.clone(), self.port)
    }
}

/// InstanceLauncher spawns server processes. `launch()` resolves only after the process has
/// signalled that it accepts connections, or fails with the reason it never did.
#[async_trait::async_trait]
pub trait InstanceLauncher: Send + Sync {
    async fn launch(&self, spec: InstanceSpec) -> Result<Box<dyn ServerInstance>, InstanceError>;

    /// Hand out a port that is free right now. The pool makes sure it is not reused.
    fn allocate_port(&self, ip: &str) -> Result<u16, InstanceError> {
        port::pick_free_port(ip).map_err(InstanceError::PortAllocation)
    }
}

/// A running server process. Owned by exactly one pool slot.
#[async_trait::async_trait]
pub trait ServerInstance: Send + Sync {
    fn address(&self) -> MemberAddress;

    fn data_dir(&self) -> &Path;

    /// Stop the process and wait until it has exited. Calling it again is a no-op.
    async fn stop(&mut self) -> Result<(), InstanceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("Failed to allocate a free port: {0}")]
    PortAllocation(io::Error),

    #[error("No unused port found after {0} allocation attempts")]
    PortsExhausted(usize),

    #[error("Failed to prepare data directory {path:?}: {source}")]
    DataDirectory { path: PathBuf, source: io::Error },

    #[error("Failed to spawn {binary:?}: {source}")]
    Spawn { binary: PathBuf, source: io::Error },

    #[error("Process did not report readiness within {0:?}")]
    ReadyTimeout(Duration),

    #[error("Process exited before accepting connections")]
    ExitedEarly,

    #[error("Process reported a startup failure: {0}")]
    StartupFailure(String),

    #[error("Failed to stop process: {0}")]
    Stop(io::Error),
}
