use crate::instance::launcher::{InstanceError, InstanceLauncher, InstanceSpec, MemberAddress, ServerInstance};
use crate::instance::stop_signal::{self, StopHandle, StopSignal};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

/// MongodLauncher runs one `mongod` process per member and decides readiness from the
/// process's own log output.
pub struct MongodLauncher {
    logger: slog::Logger,
    binary: PathBuf,
    temp_root: PathBuf,
}

impl MongodLauncher {
    pub fn new(logger: slog::Logger, binary: PathBuf) -> Self {
        MongodLauncher {
            logger,
            binary,
            temp_root: std::env::temp_dir(),
        }
    }

    /// Temporary member directories are created below `temp_root` instead of the system temp dir.
    pub fn with_temp_root(mut self, temp_root: PathBuf) -> Self {
        self.temp_root = temp_root;
        self
    }

    fn temp_db_path(&self, index: usize) -> PathBuf {
        let suffix: u32 = rand::thread_rng().gen();
        self.temp_root
            .join(format!("mongo-mem-{}-{}-{:08x}", std::process::id(), index, suffix))
    }
}

fn command_args(spec: &InstanceSpec, db_path: &Path) -> Vec<String> {
    let mut args = vec![
        "--port".to_string(),
        spec.port.to_string(),
        "--bind_ip".to_string(),
        spec.ip.clone(),
        "--replSet".to_string(),
        spec.repl_set_name.clone(),
        "--dbpath".to_string(),
        db_path.to_string_lossy().to_string(),
        "--storageEngine".to_string(),
        spec.storage_engine.clone(),
    ];
    if let Some(oplog_size_mb) = spec.oplog_size_mb {
        args.push("--oplogSize".to_string());
        args.push(oplog_size_mb.to_string());
    }
    args.extend(spec.args.iter().cloned());
    args
}

#[async_trait::async_trait]
impl InstanceLauncher for MongodLauncher {
    async fn launch(&self, spec: InstanceSpec) -> Result<Box<dyn ServerInstance>, InstanceError> {
        let logger = self.logger.new(slog::o!("Member" => spec.index, "Port" => spec.port));

        let (db_path, remove_on_stop) = match &spec.db_path {
            Some(path) => (path.clone(), false),
            None => (self.temp_db_path(spec.index), true),
        };
        // No await between creating the directory and owning it through the instance, so a
        // cancelled launch always cleans up.
        std::fs::create_dir_all(&db_path).map_err(|source| InstanceError::DataDirectory {
            path: db_path.clone(),
            source,
        })?;

        let args = command_args(&spec, &db_path);
        slog::info!(logger, "Spawning {:?} {}", self.binary, args.join(" "));

        let spawned = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                if remove_on_stop {
                    let _ = tokio::fs::remove_dir_all(&db_path).await;
                }
                return Err(InstanceError::Spawn {
                    binary: self.binary.clone(),
                    source,
                });
            }
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(watch_log(logger.clone(), stdout, Some(ready_tx)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(watch_log(logger.clone(), stderr, None));
        }

        let (stop_handle, stop_signal) = stop_signal::new();
        let (exited_tx, exited_rx) = oneshot::channel();
        tokio::spawn(supervise(logger.clone(), child, stop_signal, exited_tx));

        let mut instance = MongodInstance {
            logger,
            address: spec.address(),
            data_dir: db_path,
            remove_on_stop,
            stop_handle: Some(stop_handle),
            exited: Some(exited_rx),
        };

        let readiness = match tokio::time::timeout(spec.ready_timeout, ready_rx).await {
            Ok(Ok(result)) => result,
            // Log stream ended without either marker.
            Ok(Err(_)) => Err(InstanceError::ExitedEarly),
            Err(_) => Err(InstanceError::ReadyTimeout(spec.ready_timeout)),
        };

        match readiness {
            Ok(()) => {
                slog::info!(instance.logger, "Accepting connections");
                Ok(Box::new(instance))
            }
            Err(e) => {
                slog::warn!(instance.logger, "Never became ready: {}", e);
                if let Err(stop_error) = instance.stop().await {
                    slog::warn!(instance.logger, "Cleanup after failed start: {}", stop_error);
                }
                Err(e)
            }
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
enum LogSignal {
    Ready,
    Failure(String),
    Other,
}

// Matches both the legacy text log format and the structured JSON format (4.4+).
fn classify_log_line(line: &str) -> LogSignal {
    let lower = line.to_ascii_lowercase();
    if lower.contains("waiting for connections") {
        LogSignal::Ready
    } else if lower.contains("addr already in use") || lower.contains("address already in use") {
        LogSignal::Failure("port already in use".to_string())
    } else if lower.contains("exception in initandlisten") || lower.contains("dbexception in initandlisten") {
        LogSignal::Failure(line.to_string())
    } else if lower.contains("shutting down with code") {
        LogSignal::Failure(line.to_string())
    } else {
        LogSignal::Other
    }
}

async fn watch_log<R>(
    logger: slog::Logger,
    stream: R,
    mut ready: Option<oneshot::Sender<Result<(), InstanceError>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                slog::debug!(logger, "Log stream read failed: {}", e);
                return;
            }
        };
        slog::debug!(logger, "{}", line);

        let outcome = match classify_log_line(&line) {
            LogSignal::Ready => Ok(()),
            LogSignal::Failure(reason) => Err(InstanceError::StartupFailure(reason)),
            LogSignal::Other => continue,
        };
        // First marker wins, later ones are only logged.
        if let Some(ready) = ready.take() {
            let _ = ready.send(outcome);
        }
    }
}

async fn supervise(
    logger: slog::Logger,
    mut child: Child,
    stop_signal: StopSignal,
    exited: oneshot::Sender<Result<(), InstanceError>>,
) {
    let exited_on_its_own = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop_signal => None,
    };

    let result = match exited_on_its_own {
        Some(Ok(status)) => {
            slog::info!(logger, "Process exited on its own with {}", status);
            Ok(())
        }
        Some(Err(e)) => Err(InstanceError::Stop(e)),
        None => {
            slog::info!(logger, "Killing process");
            child.kill().await.map_err(InstanceError::Stop)
        }
    };

    let _ = exited.send(result);
}

struct MongodInstance {
    logger: slog::Logger,
    address: MemberAddress,
    data_dir: PathBuf,
    remove_on_stop: bool,
    stop_handle: Option<StopHandle>,
    exited: Option<oneshot::Receiver<Result<(), InstanceError>>>,
}

#[async_trait::async_trait]
impl ServerInstance for MongodInstance {
    fn address(&self) -> MemberAddress {
        self.address.clone()
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn stop(&mut self) -> Result<(), InstanceError> {
        if let Some(stop_handle) = self.stop_handle.take() {
            stop_handle.stop();
        }
        let exit_result = match self.exited.take() {
            // Supervisor gone means the process is already reaped.
            Some(exited) => exited.await.unwrap_or(Ok(())),
            None => Ok(()),
        };

        if self.remove_on_stop {
            self.remove_on_stop = false;
            if let Err(e) = tokio::fs::remove_dir_all(&self.data_dir).await {
                slog::warn!(self.logger, "Failed to remove {:?}: {}", self.data_dir, e);
            }
        }

        exit_result
    }
}

impl Drop for MongodInstance {
    // Dropped without stop(), e.g. a cancelled launch: the process is killed through the stop
    // signal, the temporary directory goes once it has exited.
    fn drop(&mut self) {
        if !self.remove_on_stop {
            return;
        }
        self.remove_on_stop = false;

        drop(self.stop_handle.take());
        let exited = self.exited.take();
        let data_dir = std::mem::take(&mut self.data_dir);
        let logger = self.logger.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Some(exited) = exited {
                        let _ = exited.await;
                    }
                    if let Err(e) = tokio::fs::remove_dir_all(&data_dir).await {
                        slog::warn!(logger, "Failed to remove {:?}: {}", data_dir, e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_dir_all(&data_dir) {
                    slog::warn!(logger, "Failed to remove {:?}: {}", data_dir, e);
                }
            }
        }
    }
}
