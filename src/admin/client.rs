use crate::admin::status::ReplSetStatus;
use crate::instance::MemberAddress;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tokio::time::Duration;

/// AdminConnector opens an administrative connection to one member.
#[async_trait::async_trait]
pub trait AdminConnector: Send + Sync {
    async fn connect(&self, address: &MemberAddress) -> Result<Box<dyn AdminClient>, AdminError>;
}

#[async_trait::async_trait]
pub trait AdminClient: Send + Sync {
    /// Issue `replSetInitiate` with the given configuration.
    async fn initiate(&self, config: &InitiateConfig) -> Result<(), AdminError>;

    /// Issue `replSetGetStatus` and report every member's role.
    async fn status(&self) -> Result<ReplSetStatus, AdminError>;

    async fn close(&self) {}
}

/// Body of the `replSetInitiate` command. Field names follow the engine's document format.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InitiateConfig {
    #[serde(rename = "_id")]
    pub set_name: String,
    pub members: Vec<InitiateMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ReplSetSettings>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InitiateMember {
    #[serde(rename = "_id")]
    pub id: usize,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(rename = "arbiterOnly", skip_serializing_if = "std::ops::Not::not")]
    pub arbiter_only: bool,
}

/// Optional `settings` sub-document of the initiate command.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReplSetSettings {
    #[serde(rename = "chainingAllowed", skip_serializing_if = "Option::is_none")]
    pub chaining_allowed: Option<bool>,
    #[serde(rename = "heartbeatTimeoutSecs", skip_serializing_if = "Option::is_none")]
    pub heartbeat_timeout_secs: Option<u32>,
    #[serde(rename = "electionTimeoutMillis", skip_serializing_if = "Option::is_none")]
    pub election_timeout_millis: Option<u64>,
}

impl ReplSetSettings {
    pub(crate) fn is_empty(&self) -> bool {
        self == &ReplSetSettings::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Could not reach {address}: {reason}")]
    Unreachable { address: MemberAddress, reason: String },

    #[error("{command} rejected (code {code:?}): {message}")]
    CommandRejected {
        command: &'static str,
        code: Option<i64>,
        message: String,
    },

    #[error("Admin command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to run admin shell {binary:?}: {source}")]
    Shell { binary: PathBuf, source: io::Error },

    #[error("Admin shell exited with {status}: {stderr}")]
    ShellExited { status: String, stderr: String },

    #[error("Unexpected reply: {0}")]
    Decode(String),
}
