//! Fake collaborators for exercising the controller without spawning processes.
use crate::admin::{
    AdminClient, AdminConnector, AdminError, InitiateConfig, MemberRole, MemberStatus, ReplSetStatus,
};
use crate::instance::{InstanceError, InstanceLauncher, InstanceSpec, MemberAddress, ServerInstance};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

pub(crate) fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

#[derive(Default)]
pub(crate) struct FakeLauncherLog {
    pub(crate) launched: Vec<(usize, u16)>,
    pub(crate) specs: Vec<InstanceSpec>,
    pub(crate) stopped: Vec<usize>,
    // Launched and not yet stopped.
    pub(crate) alive: usize,
}

pub(crate) struct FakeLauncher {
    next_port: AtomicU16,
    port_sequence: Mutex<VecDeque<u16>>,
    fail_at: Option<usize>,
    fail_stop_at: Option<usize>,
    // When set, every launch waits for one permit.
    gate: Option<Arc<Semaphore>>,
    log: Arc<Mutex<FakeLauncherLog>>,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        FakeLauncher {
            next_port: AtomicU16::new(40000),
            port_sequence: Mutex::new(VecDeque::new()),
            fail_at: None,
            fail_stop_at: None,
            gate: None,
            log: Arc::new(Mutex::new(FakeLauncherLog::default())),
        }
    }

    pub(crate) fn with_port_sequence(ports: Vec<u16>) -> Self {
        let launcher = Self::new();
        *launcher.port_sequence.lock().unwrap() = ports.into_iter().collect();
        launcher
    }

    pub(crate) fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub(crate) fn failing_stop_at(mut self, index: usize) -> Self {
        self.fail_stop_at = Some(index);
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn log(&self) -> MutexGuard<'_, FakeLauncherLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl InstanceLauncher for FakeLauncher {
    async fn launch(&self, spec: InstanceSpec) -> Result<Box<dyn ServerInstance>, InstanceError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|_| InstanceError::ExitedEarly)?.forget();
        }

        {
            let mut log = self.log.lock().unwrap();
            log.launched.push((spec.index, spec.port));
            log.specs.push(spec.clone());
        }

        if self.fail_at == Some(spec.index) {
            return Err(InstanceError::StartupFailure(format!(
                "addr already in use on port {}",
                spec.port
            )));
        }

        self.log.lock().unwrap().alive += 1;
        Ok(Box::new(FakeInstance {
            index: spec.index,
            address: spec.address(),
            data_dir: PathBuf::from(format!("/tmp/fake-{}", spec.index)),
            fail_stop: self.fail_stop_at == Some(spec.index),
            stopped: false,
            log: self.log.clone(),
        }))
    }

    fn allocate_port(&self, _ip: &str) -> Result<u16, InstanceError> {
        if let Some(port) = self.port_sequence.lock().unwrap().pop_front() {
            return Ok(port);
        }
        Ok(self.next_port.fetch_add(1, Ordering::SeqCst))
    }
}

struct FakeInstance {
    index: usize,
    address: MemberAddress,
    data_dir: PathBuf,
    fail_stop: bool,
    stopped: bool,
    log: Arc<Mutex<FakeLauncherLog>>,
}

#[async_trait::async_trait]
impl ServerInstance for FakeInstance {
    fn address(&self) -> MemberAddress {
        self.address.clone()
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn stop(&mut self) -> Result<(), InstanceError> {
        if !self.stopped {
            self.stopped = true;
            let mut log = self.log.lock().unwrap();
            log.stopped.push(self.index);
            log.alive -= 1;
        }

        if self.fail_stop {
            return Err(InstanceError::Stop(io::Error::new(
                io::ErrorKind::Other,
                "kill failed",
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum PrimaryAfter {
    Polls(u32),
    Never,
}

#[derive(Default)]
pub(crate) struct FakeAdminLog {
    pub(crate) connects: Vec<MemberAddress>,
    pub(crate) initiated: Vec<InitiateConfig>,
    pub(crate) status_calls: u32,
    pub(crate) closed: u32,
}

/// Fake engine: after initiate, reports every member as starting up until `primary_after`
/// status calls have been made, then member 0 as primary and the rest as secondaries or arbiters.
pub(crate) struct FakeConnector {
    reject_initiate: bool,
    primary_after: PrimaryAfter,
    log: Arc<Mutex<FakeAdminLog>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        FakeConnector {
            reject_initiate: false,
            primary_after: PrimaryAfter::Polls(2),
            log: Arc::new(Mutex::new(FakeAdminLog::default())),
        }
    }

    pub(crate) fn rejecting_initiate(mut self) -> Self {
        self.reject_initiate = true;
        self
    }

    pub(crate) fn with_primary_after(mut self, primary_after: PrimaryAfter) -> Self {
        self.primary_after = primary_after;
        self
    }

    pub(crate) fn log(&self) -> MutexGuard<'_, FakeAdminLog> {
        self.log.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl AdminConnector for FakeConnector {
    async fn connect(&self, address: &MemberAddress) -> Result<Box<dyn AdminClient>, AdminError> {
        self.log.lock().unwrap().connects.push(address.clone());

        Ok(Box::new(FakeAdminClient {
            reject_initiate: self.reject_initiate,
            primary_after: self.primary_after,
            log: self.log.clone(),
        }))
    }
}

struct FakeAdminClient {
    reject_initiate: bool,
    primary_after: PrimaryAfter,
    log: Arc<Mutex<FakeAdminLog>>,
}

#[async_trait::async_trait]
impl AdminClient for FakeAdminClient {
    async fn initiate(&self, config: &InitiateConfig) -> Result<(), AdminError> {
        if self.reject_initiate {
            return Err(AdminError::CommandRejected {
                command: "replSetInitiate",
                code: Some(93),
                message: "invalid replset config".to_string(),
            });
        }

        self.log.lock().unwrap().initiated.push(config.clone());
        Ok(())
    }

    async fn status(&self) -> Result<ReplSetStatus, AdminError> {
        let mut log = self.log.lock().unwrap();
        log.status_calls += 1;

        let config = match log.initiated.last() {
            Some(config) => config.clone(),
            None => {
                return Err(AdminError::CommandRejected {
                    command: "replSetGetStatus",
                    code: Some(94),
                    message: "no replset config has been received".to_string(),
                })
            }
        };

        let elected = match self.primary_after {
            PrimaryAfter::Polls(polls) => log.status_calls >= polls,
            PrimaryAfter::Never => false,
        };

        Ok(ReplSetStatus {
            set_name: config.set_name.clone(),
            members: config
                .members
                .iter()
                .map(|m| MemberStatus {
                    name: m.host.clone(),
                    role: match (elected, m.id, m.arbiter_only) {
                        (false, _, _) => MemberRole::Other(5),
                        (true, 0, _) => MemberRole::Primary,
                        (true, _, true) => MemberRole::Arbiter,
                        (true, _, false) => MemberRole::Secondary,
                    },
                })
                .collect(),
        })
    }

    async fn close(&self) {
        self.log.lock().unwrap().closed += 1;
    }
}
