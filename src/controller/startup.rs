use crate::actor::WeakActorClient;
use crate::admin::{AdminClient, AdminConnector, InitiateConfig, InitiateMember};
use crate::api::{ReplSetError, ReplSetOptionsValidated};
use crate::controller::controller::TeardownDone;
use crate::instance::MemberAddress;
use crate::pool::SharedPool;
use crate::poller::ConvergencePoller;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sent back to the controller once one startup attempt has run to completion.
#[derive(Debug)]
pub(crate) struct StartupReport {
    pub(crate) generation: u64,
    // Member addresses in pool order on success.
    pub(crate) result: Result<Vec<MemberAddress>, ReplSetError>,
}

/// StartupTask runs one startup attempt in the background: clean up whatever the previous
/// attempt left, start the members, initiate, then poll for a primary. It never touches
/// controller state; its only output is a `StartupReport` sent through the actor.
pub(crate) struct StartupTask {
    pub(crate) logger: slog::Logger,
    pub(crate) generation: u64,
    pub(crate) options: Arc<ReplSetOptionsValidated>,
    pub(crate) pool: SharedPool,
    pub(crate) previous_pool: Option<SharedPool>,
    pub(crate) previous_teardown: Option<TeardownDone>,
    pub(crate) connector: Arc<dyn AdminConnector>,
    pub(crate) cancel: CancellationToken,
    pub(crate) actor_client: WeakActorClient,
}

impl StartupTask {
    pub(crate) async fn run(self) {
        if let Some(teardown) = self.previous_teardown {
            teardown.wait().await;
        }
        if let Some(previous) = self.previous_pool {
            let report = previous.lock().await.stop_all().await;
            slog::info!(
                self.logger,
                "Stopped {} members left by the previous startup ({} failed)",
                report.stopped,
                report.failures.len()
            );
        }

        let sequence = start_sequence(&self.logger, &self.options, &self.pool, self.connector.as_ref());
        let result = tokio::select! {
            result = sequence => result,
            _ = self.cancel.cancelled() => {
                slog::info!(self.logger, "Startup cancelled");
                return;
            }
        };

        self.actor_client
            .startup_finished(StartupReport {
                generation: self.generation,
                result,
            })
            .await;
    }
}

async fn start_sequence(
    logger: &slog::Logger,
    options: &ReplSetOptionsValidated,
    pool: &SharedPool,
    connector: &dyn AdminConnector,
) -> Result<Vec<MemberAddress>, ReplSetError> {
    let (seed, members) = {
        let mut pool = pool.lock().await;
        pool.start_all().await?;
        match pool.seed_address() {
            Some(seed) => (seed, pool.all_addresses()),
            None => {
                return Err(ReplSetError::InvalidConfiguration(
                    "Replica set has no members".to_string(),
                ))
            }
        }
    };

    let client = connector.connect(&seed).await.map_err(|e| initiate_failure(&seed, e))?;
    let result = initiate_and_converge(logger, options, client.as_ref(), &seed, &members).await;
    client.close().await;

    result.map(|_| members)
}

async fn initiate_and_converge(
    logger: &slog::Logger,
    options: &ReplSetOptionsValidated,
    client: &dyn AdminClient,
    seed: &MemberAddress,
    members: &[MemberAddress],
) -> Result<(), ReplSetError> {
    let config = initiate_config(options, members);
    slog::info!(logger, "Initiating replica set {:?} against {}", config.set_name, seed);
    client
        .initiate(&config)
        .await
        .map_err(|e| initiate_failure(seed, e))?;

    let mut poller = ConvergencePoller::new(
        logger.clone(),
        options.convergence_attempts,
        options.convergence_interval,
    );
    poller.await_primary(client, members.len()).await?;
    Ok(())
}

fn initiate_failure(seed: &MemberAddress, cause: crate::admin::AdminError) -> ReplSetError {
    ReplSetError::InitiateCommandFailure {
        seed: seed.clone(),
        cause: Arc::new(cause),
    }
}

/// Members keep pool order and take their index as `_id`.
pub(crate) fn initiate_config(options: &ReplSetOptionsValidated, members: &[MemberAddress]) -> InitiateConfig {
    InitiateConfig {
        set_name: options.name.clone(),
        members: members
            .iter()
            .zip(options.members.iter())
            .enumerate()
            .map(|(id, (address, member))| InitiateMember {
                id,
                host: address.to_string(),
                priority: member.priority,
                arbiter_only: member.arbiter_only,
            })
            .collect(),
        settings: if options.settings.is_empty() {
            None
        } else {
            Some(options.settings.clone())
        },
    }
}
