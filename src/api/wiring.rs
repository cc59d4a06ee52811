use crate::actor::{ActorClient, ReplSetActor};
use crate::admin::{AdminConnector, ShellConnector};
use crate::api::client::MemoryReplSet;
use crate::api::options::ReplSetOptionsValidated;
use crate::api::{ReplSetError, ReplSetOptions};
use crate::controller::{self, ReplSetController};
use crate::instance::{InstanceLauncher, MongodLauncher};
use std::convert::TryFrom;
use std::sync::Arc;

const ACTOR_QUEUE_SIZE: usize = 16;

pub struct MemoryReplSetConfig {
    pub options: ReplSetOptions,
    pub info_logger: slog::Logger,
}

impl MemoryReplSetConfig {
    /// Config that logs nowhere.
    pub fn new(options: ReplSetOptions) -> Self {
        MemoryReplSetConfig {
            options,
            info_logger: slog::Logger::root(slog::Discard, slog::o!()),
        }
    }
}

/// Create a replica set backed by real `mongod` processes, administered through the shell.
///
/// Needs two binaries: `mongod` and the `mongosh` shell, which is a separate download since
/// MongoDB 6.0. See `BinaryOptions` for how they are located. A missing shell surfaces as
/// `InitiateCommandFailure` naming the binary. Use `try_create_repl_set_with()` to plug in a
/// different `AdminConnector`.
///
/// Must be called from within a tokio runtime. With `auto_start` (the default) startup has
/// already begun when this returns; use `wait_until_running()` to wait for it.
pub fn try_create_repl_set(config: MemoryReplSetConfig) -> Result<MemoryReplSet, ReplSetError> {
    let options = validate(config.options)?;
    let logger = config.info_logger;

    let launcher = MongodLauncher::new(
        logger.new(slog::o!("Component" => "launcher")),
        options.server_binary.clone(),
    );
    let connector = ShellConnector::new(
        logger.new(slog::o!("Component" => "admin")),
        options.shell_binary.clone(),
    );

    wire(logger, options, Arc::new(launcher), Arc::new(connector))
}

/// Same as `try_create_repl_set()`, with caller supplied process and admin collaborators.
pub fn try_create_repl_set_with(
    config: MemoryReplSetConfig,
    launcher: Arc<dyn InstanceLauncher>,
    connector: Arc<dyn AdminConnector>,
) -> Result<MemoryReplSet, ReplSetError> {
    let options = validate(config.options)?;

    wire(config.info_logger, options, launcher, connector)
}

fn validate(options: ReplSetOptions) -> Result<ReplSetOptionsValidated, ReplSetError> {
    ReplSetOptionsValidated::try_from(options).map_err(ReplSetError::InvalidConfiguration)
}

fn wire(
    root_logger: slog::Logger,
    options: ReplSetOptionsValidated,
    launcher: Arc<dyn InstanceLauncher>,
    connector: Arc<dyn AdminConnector>,
) -> Result<MemoryReplSet, ReplSetError> {
    tokio::runtime::Handle::try_current().map_err(|_| ReplSetError::RuntimeUnavailable)?;

    let options = Arc::new(options);
    let logger = root_logger.new(slog::o!("ReplSet" => options.name.clone()));

    let (actor_client, actor_queue_rx) = ActorClient::new(ACTOR_QUEUE_SIZE);
    let (notifier, snapshot) = controller::state_notifier();

    let mut controller = ReplSetController::new(
        logger.clone(),
        options.clone(),
        launcher,
        connector,
        notifier,
        actor_client.weak(),
    );
    // Before the loop is spawned, so the handle is already in Init when returned.
    if options.auto_start {
        controller.start();
    }

    let actor = ReplSetActor::new(logger, actor_queue_rx, controller);
    tokio::spawn(actor.run_event_loop());

    Ok(MemoryReplSet::new(actor_client, snapshot, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeConnector, FakeLauncher};

    #[test]
    fn zero_members_is_rejected_before_anything_runs() {
        let launcher = Arc::new(FakeLauncher::new());
        let result = try_create_repl_set_with(
            MemoryReplSetConfig::new(ReplSetOptions {
                count: Some(0),
                ..ReplSetOptions::default()
            }),
            launcher.clone(),
            Arc::new(FakeConnector::new()),
        );

        match result {
            Err(ReplSetError::InvalidConfiguration(message)) => {
                assert_eq!(message, "ReplSet count needs to be 1 or higher")
            }
            Err(e) => panic!("Unexpected {:?}", e),
            Ok(_) => panic!("Expected InvalidConfiguration"),
        }
        assert!(launcher.log().launched.is_empty());
    }

    #[test]
    fn requires_a_runtime() {
        let result = try_create_repl_set_with(
            MemoryReplSetConfig::new(ReplSetOptions::default()),
            Arc::new(FakeLauncher::new()),
            Arc::new(FakeConnector::new()),
        );

        assert!(matches!(result, Err(ReplSetError::RuntimeUnavailable)));
    }
}
