use crate::api::{ReplSetError, ReplSetOptionsValidated};
use crate::instance::{InstanceError, InstanceLauncher, InstanceSpec, MemberAddress, ServerInstance};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

// Auto-allocated ports that collide with one already handed out are thrown away and re-drawn.
const MAX_PORT_ATTEMPTS: usize = 10;

/// Startup holds the lock while members come up; teardown takes it to stop whatever was started.
pub(crate) type SharedPool = Arc<Mutex<ReplSetMemberPool>>;

/// ReplSetMemberPool owns the ServerInstances of one replica set, in index order. Index 0 is
/// the seed member, against which the replica set is initiated.
pub(crate) struct ReplSetMemberPool {
    logger: slog::Logger,
    launcher: Arc<dyn InstanceLauncher>,
    options: Arc<ReplSetOptionsValidated>,
    members: Vec<Box<dyn ServerInstance>>,
    // Explicitly configured ports, never handed out by auto allocation.
    reserved_ports: HashSet<u16>,
    used_ports: HashSet<u16>,
}

impl ReplSetMemberPool {
    pub(crate) fn new(
        logger: slog::Logger,
        launcher: Arc<dyn InstanceLauncher>,
        options: Arc<ReplSetOptionsValidated>,
    ) -> Self {
        let reserved_ports = options.members.iter().filter_map(|m| m.port).collect();

        ReplSetMemberPool {
            logger,
            launcher,
            members: Vec::with_capacity(options.count),
            options,
            reserved_ports,
            used_ports: HashSet::new(),
        }
    }

    pub(crate) fn shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    /// Start members strictly one after another. A member must report ready before the next is
    /// spawned; the first one that doesn't aborts the rest.
    pub(crate) async fn start_all(&mut self) -> Result<(), ReplSetError> {
        for index in self.members.len()..self.options.count {
            let spec = self.instance_spec(index).map_err(|e| member_start_failure(index, e))?;
            slog::info!(self.logger, "Starting member {} on {}", index, spec.address());

            let instance = self
                .launcher
                .launch(spec)
                .await
                .map_err(|e| member_start_failure(index, e))?;
            slog::debug!(self.logger, "Member {} ready, data in {:?}", index, instance.data_dir());
            self.members.push(instance);
        }

        slog::info!(self.logger, "All {} members are listening", self.members.len());
        Ok(())
    }

    /// Stop every member concurrently and wait for all of them. Failures are collected, never
    /// raised.
    pub(crate) async fn stop_all(&mut self) -> StopReport {
        let members = std::mem::take(&mut self.members);
        let stopping: Vec<_> = members
            .into_iter()
            .enumerate()
            .map(|(index, mut instance)| {
                let address = instance.address();
                let handle = tokio::spawn(async move { instance.stop().await });
                (index, address, handle)
            })
            .collect();

        let mut report = StopReport::default();
        for (index, address, handle) in stopping {
            let outcome = match handle.await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(join_error) => Err(join_error.to_string()),
            };
            match outcome {
                Ok(()) => report.stopped += 1,
                Err(error) => {
                    slog::warn!(self.logger, "Member {} ({}) failed to stop: {}", index, address, error);
                    report.failures.push(MemberStopFailure { index, address, error });
                }
            }
        }

        report
    }

    pub(crate) fn seed_address(&self) -> Option<MemberAddress> {
        self.members.first().map(|m| m.address())
    }

    pub(crate) fn all_addresses(&self) -> Vec<MemberAddress> {
        self.members.iter().map(|m| m.address()).collect()
    }

    fn instance_spec(&mut self, index: usize) -> Result<InstanceSpec, InstanceError> {
        let port = self.assign_port(index)?;
        let member = &self.options.members[index];

        let mut args = self.options.args.clone();
        args.extend(member.args.iter().cloned());

        Ok(InstanceSpec {
            index,
            ip: self.options.ip.clone(),
            port,
            repl_set_name: self.options.name.clone(),
            storage_engine: member
                .storage_engine
                .clone()
                .unwrap_or_else(|| self.options.storage_engine.clone()),
            oplog_size_mb: Some(self.options.oplog_size_mb),
            db_path: member.db_path.clone(),
            args,
            ready_timeout: self.options.member_ready_timeout,
        })
    }

    fn assign_port(&mut self, index: usize) -> Result<u16, InstanceError> {
        if let Some(port) = self.options.members[index].port {
            self.used_ports.insert(port);
            return Ok(port);
        }

        for _ in 0..MAX_PORT_ATTEMPTS {
            let port = self.launcher.allocate_port(&self.options.ip)?;
            if self.reserved_ports.contains(&port) || self.used_ports.contains(&port) {
                slog::debug!(self.logger, "Port {} already taken in this pool, drawing again", port);
                continue;
            }
            self.used_ports.insert(port);
            return Ok(port);
        }

        Err(InstanceError::PortsExhausted(MAX_PORT_ATTEMPTS))
    }
}

fn member_start_failure(index: usize, cause: InstanceError) -> ReplSetError {
    ReplSetError::MemberStartFailure {
        index,
        cause: Arc::new(cause),
    }
}

/// What `stop()` did. Members that failed to stop are listed, but stopping still completes.
#[derive(Clone, Debug, Default)]
pub struct StopReport {
    pub stopped: usize,
    pub failures: Vec<MemberStopFailure>,
}

#[derive(Clone, Debug)]
pub struct MemberStopFailure {
    pub index: usize,
    pub address: MemberAddress,
    pub error: String,
}
