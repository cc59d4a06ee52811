use crate::actor::WeakActorClient;
use crate::admin::AdminConnector;
use crate::api::{ReplSetError, ReplSetOptionsValidated};
use crate::controller::notifier::{self, ControllerSnapshot, StartupOutcomeListener, StartupOutcomeNotifier, StateNotifier};
use crate::controller::startup::{StartupReport, StartupTask};
use crate::controller::state::{next_state, ReplSetState, Transition};
use crate::instance::{InstanceLauncher, MemberAddress};
use crate::pool::{ReplSetMemberPool, SharedPool, StopReport};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Resolves once every member of the stopped pool has exited.
pub(crate) type Teardown = JoinHandle<StopReport>;

/// Completion flag of the most recent teardown. Later stops and restarts wait on it so no one
/// observes `stop()` returning, or spawns members, while old members are still exiting.
#[derive(Clone)]
pub(crate) struct TeardownDone(watch::Receiver<bool>);

impl TeardownDone {
    pub(crate) async fn wait(mut self) {
        loop {
            if *self.0.borrow() {
                return;
            }
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

struct StartupHandle {
    cancel: CancellationToken,
    // Controller dropped mid-startup (handle gone) cancels the attempt too.
    _cancel_on_drop: DropGuard,
    join: JoinHandle<()>,
    outcome: StartupOutcomeNotifier,
}

/// ReplSetController is the replica set state machine. It runs inside the actor, so every
/// method here is called from one task at a time and none of them may block.
pub(crate) struct ReplSetController {
    logger: slog::Logger,
    options: Arc<ReplSetOptionsValidated>,
    launcher: Arc<dyn InstanceLauncher>,
    connector: Arc<dyn AdminConnector>,

    state: ReplSetState,
    // Bumped by every start(). Reports from older attempts are ignored.
    generation: u64,
    pool: Option<SharedPool>,
    startup: Option<StartupHandle>,
    startup_listener: Option<StartupOutcomeListener>,
    teardown_done: Option<TeardownDone>,
    last_error: Option<ReplSetError>,
    members: Vec<MemberAddress>,

    notifier: StateNotifier,
    actor_client: WeakActorClient,
}

impl ReplSetController {
    pub(crate) fn new(
        logger: slog::Logger,
        options: Arc<ReplSetOptionsValidated>,
        launcher: Arc<dyn InstanceLauncher>,
        connector: Arc<dyn AdminConnector>,
        notifier: StateNotifier,
        actor_client: WeakActorClient,
    ) -> Self {
        ReplSetController {
            logger,
            options,
            launcher,
            connector,
            state: ReplSetState::Stopped,
            generation: 0,
            pool: None,
            startup: None,
            startup_listener: None,
            teardown_done: None,
            last_error: None,
            members: Vec::new(),
            notifier,
            actor_client,
        }
    }

    /// No-op while Init or Running. From Stopped or Errored, begin a new startup attempt in the
    /// background and move to Init before returning.
    pub(crate) fn start(&mut self) {
        if matches!(self.state, ReplSetState::Init | ReplSetState::Running) {
            slog::debug!(self.logger, "start() ignored, already {:?}", self.state);
            return;
        }

        self.generation += 1;
        self.last_error = None;
        self.members.clear();

        let logger = self.logger.new(slog::o!("Generation" => self.generation));
        let pool = ReplSetMemberPool::new(logger.clone(), self.launcher.clone(), self.options.clone()).shared();
        let previous_pool = self.pool.replace(pool.clone());

        let cancel = CancellationToken::new();
        let (outcome, listener) = notifier::startup_outcome();
        let task = StartupTask {
            logger,
            generation: self.generation,
            options: self.options.clone(),
            pool,
            previous_pool,
            previous_teardown: self.teardown_done.clone(),
            connector: self.connector.clone(),
            cancel: cancel.clone(),
            actor_client: self.actor_client.clone(),
        };
        let join = tokio::spawn(task.run());

        self.startup = Some(StartupHandle {
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            join,
            outcome,
        });
        self.startup_listener = Some(listener);
        self.transition(Transition::Start);
    }

    /// Move to Stopped right away and hand back the teardown of whatever was started. Waiters of
    /// an in-flight startup are released with `StartCancelled`.
    pub(crate) fn stop(&mut self) -> Teardown {
        if self.state == ReplSetState::Stopped {
            let previous = self.teardown_done.clone();
            return tokio::spawn(async move {
                if let Some(previous) = previous {
                    previous.wait().await;
                }
                StopReport::default()
            });
        }

        let startup = self.startup.take();
        let pool = self.pool.take();
        if let Some(startup) = &startup {
            startup.cancel.cancel();
        }

        self.members.clear();
        self.transition(Transition::Stop);
        if let Some(startup) = &startup {
            startup.outcome.notify(Err(ReplSetError::StartCancelled));
        }

        let (done_tx, done_rx) = watch::channel(false);
        let previous = self.teardown_done.replace(TeardownDone(done_rx));
        let logger = self.logger.clone();

        tokio::spawn(async move {
            if let Some(startup) = startup {
                // Cancelled above; this only waits for the task to let go of the pool.
                let _ = startup.join.await;
            }
            if let Some(previous) = previous {
                previous.wait().await;
            }

            let report = match pool {
                Some(pool) => pool.lock().await.stop_all().await,
                None => StopReport::default(),
            };
            slog::info!(
                logger,
                "Teardown complete: {} stopped, {} failed",
                report.stopped,
                report.failures.len()
            );
            let _ = done_tx.send(true);
            report
        })
    }

    pub(crate) fn startup_finished(&mut self, report: StartupReport) {
        if report.generation != self.generation || self.state != ReplSetState::Init {
            slog::debug!(
                self.logger,
                "Ignoring result of startup {} (current {}, state {:?})",
                report.generation,
                self.generation,
                self.state
            );
            return;
        }

        let startup = match self.startup.take() {
            Some(startup) => startup,
            None => return,
        };

        let outcome = match report.result {
            Ok(members) => {
                self.members = members;
                self.transition(Transition::StartupSucceeded);
                Ok(())
            }
            Err(e) => {
                slog::error!(self.logger, "Startup {} failed: {}", report.generation, e);
                self.last_error = Some(e.clone());
                self.transition(Transition::StartupFailed);
                Err(e)
            }
        };

        // The snapshot is published first so a released waiter never reads a stale state.
        startup.outcome.notify(outcome);
    }

    fn transition(&mut self, transition: Transition) {
        let old = self.state;
        match next_state(old, transition) {
            Some(new) => {
                self.state = new;
                slog::info!(self.logger, "{:?} -> {:?}", old, new);
                self.notifier.publish(old, self.snapshot());
            }
            None => slog::warn!(self.logger, "Ignoring illegal {:?} while {:?}", transition, old),
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            members: self.members.clone(),
            last_error: self.last_error.clone(),
            startup: self.startup_listener.clone(),
        }
    }
}
