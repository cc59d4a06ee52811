use crate::admin::client::{AdminClient, AdminConnector, AdminError, InitiateConfig};
use crate::admin::status::{MemberRole, MemberStatus, ReplSetStatus};
use crate::instance::MemberAddress;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::Duration;

const PING_SCRIPT: &str = "JSON.stringify(db.adminCommand({ ping: 1 }))";

// Project the status reply down to plain JSON; the raw reply carries BSON types
// (timestamps, dates) that don't stringify portably.
const STATUS_SCRIPT: &str = "JSON.stringify((function () { \
    const s = db.adminCommand({ replSetGetStatus: 1 }); \
    return { ok: s.ok, code: s.code, errmsg: s.errmsg, set: s.set, \
    members: (s.members || []).map(function (m) { return { name: m.name, state: m.state }; }) }; \
})())";

/// ShellConnector talks to members through the engine's command line shell: one shell
/// invocation per command, replies read back as JSON.
pub struct ShellConnector {
    logger: slog::Logger,
    binary: PathBuf,
    command_timeout: Duration,
}

impl ShellConnector {
    pub fn new(logger: slog::Logger, binary: PathBuf) -> Self {
        ShellConnector {
            logger,
            binary,
            command_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }
}

#[async_trait::async_trait]
impl AdminConnector for ShellConnector {
    async fn connect(&self, address: &MemberAddress) -> Result<Box<dyn AdminClient>, AdminError> {
        let client = ShellClient {
            logger: self.logger.new(slog::o!("Admin" => address.to_string())),
            binary: self.binary.clone(),
            address: address.clone(),
            command_timeout: self.command_timeout,
        };

        let reply = client
            .eval(PING_SCRIPT)
            .await
            .and_then(|reply| {
                check_ok("ping", &reply)?;
                Ok(reply)
            })
            .map_err(|e| AdminError::Unreachable {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        slog::debug!(client.logger, "Connected: {}", reply);

        Ok(Box::new(client))
    }
}

struct ShellClient {
    logger: slog::Logger,
    binary: PathBuf,
    address: MemberAddress,
    command_timeout: Duration,
}

impl ShellClient {
    async fn eval(&self, script: &str) -> Result<Value, AdminError> {
        let output = Command::new(&self.binary)
            .arg("--quiet")
            .arg("--host")
            .arg(&self.address.host)
            .arg("--port")
            .arg(self.address.port.to_string())
            .arg("--eval")
            .arg(script)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.command_timeout, output)
            .await
            .map_err(|_| AdminError::Timeout(self.command_timeout))?
            .map_err(|source| AdminError::Shell {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AdminError::ShellExited {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_reply(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait::async_trait]
impl AdminClient for ShellClient {
    async fn initiate(&self, config: &InitiateConfig) -> Result<(), AdminError> {
        let script = initiate_script(config)?;
        slog::info!(self.logger, "{}", script);

        let reply = self.eval(&script).await?;
        check_ok("replSetInitiate", &reply).map(|_| ())
    }

    async fn status(&self) -> Result<ReplSetStatus, AdminError> {
        let reply = self.eval(STATUS_SCRIPT).await?;
        let reply = check_ok("replSetGetStatus", &reply)?;
        parse_status(reply)
    }
}

fn initiate_script(config: &InitiateConfig) -> Result<String, AdminError> {
    let document = serde_json::to_string(config).map_err(|e| AdminError::Decode(e.to_string()))?;
    Ok(format!(
        "JSON.stringify(db.adminCommand({{ replSetInitiate: {} }}))",
        document
    ))
}

/// The shell may print banners or warnings before the reply; the reply is the last JSON line.
fn parse_reply(stdout: &str) -> Result<Value, AdminError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .last()
        .ok_or_else(|| AdminError::Decode(format!("no JSON document in shell output: {:?}", stdout)))?;

    serde_json::from_str(line).map_err(|e| AdminError::Decode(e.to_string()))
}

fn check_ok<'a>(command: &'static str, reply: &'a Value) -> Result<&'a Value, AdminError> {
    if reply.get("ok").and_then(Value::as_f64) == Some(1.0) {
        return Ok(reply);
    }

    Err(AdminError::CommandRejected {
        command,
        code: reply.get("code").and_then(Value::as_i64),
        message: reply
            .get("errmsg")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| reply.to_string()),
    })
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(default)]
    set: String,
    #[serde(default)]
    members: Vec<RawMember>,
}

#[derive(Deserialize)]
struct RawMember {
    name: String,
    state: i32,
}

fn parse_status(reply: &Value) -> Result<ReplSetStatus, AdminError> {
    let raw = RawStatus::deserialize(reply).map_err(|e| AdminError::Decode(e.to_string()))?;

    Ok(ReplSetStatus {
        set_name: raw.set,
        members: raw
            .members
            .into_iter()
            .map(|m| MemberStatus {
                name: m.name,
                role: MemberRole::from_state_code(m.state),
            })
            .collect(),
    })
}
