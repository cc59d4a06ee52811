use crate::actor::ActorClient;
use crate::api::event_bus::ReplSetEventListener;
use crate::api::options::ReplSetOptionsValidated;
use crate::api::uri::build_connection_uri;
use crate::api::ReplSetError;
use crate::controller::{ReplSetState, SnapshotListener};
use crate::instance::MemberAddress;
use crate::pool::StopReport;
use std::sync::Arc;

/// Handle to one disposable replica set. Dropping it shuts the controller down and abandons any
/// startup in progress; member processes are killed and their temporary directories removed in
/// the background. Only `stop()` waits for them to exit.
pub struct MemoryReplSet {
    actor_client: ActorClient,
    snapshot: SnapshotListener,
    options: Arc<ReplSetOptionsValidated>,
}

impl MemoryReplSet {
    pub(crate) fn new(
        actor_client: ActorClient,
        snapshot: SnapshotListener,
        options: Arc<ReplSetOptionsValidated>,
    ) -> Self {
        MemoryReplSet {
            actor_client,
            snapshot,
            options,
        }
    }

    /// Begin starting the replica set. Returns once the set is in Init; startup failures are
    /// reported by `wait_until_running()`. Does nothing if already Init or Running.
    pub async fn start(&self) -> Result<(), ReplSetError> {
        self.actor_client.start().await
    }

    /// Stop every member and return once all of them have exited. Safe to call in any state,
    /// any number of times.
    pub async fn stop(&self) -> Result<StopReport, ReplSetError> {
        let teardown = self.actor_client.stop().await?;
        teardown.await.map_err(|_| ReplSetError::ControllerExited)
    }

    /// Resolves once Running. Waiting from Init suspends until startup finishes and fails with
    /// its error if it didn't succeed. From Stopped or Errored this fails right away.
    pub async fn wait_until_running(&self) -> Result<(), ReplSetError> {
        let snapshot = self.snapshot.current();
        match snapshot.state {
            ReplSetState::Running => Ok(()),
            ReplSetState::Init => match snapshot.startup {
                Some(startup) => startup.wait().await,
                None => Err(ReplSetError::ControllerExited),
            },
            state => Err(ReplSetError::NotStartable { state }),
        }
    }

    /// Connection string for the running set. `db_name` overrides the configured database name.
    pub fn get_uri(&self, db_name: Option<&str>) -> Result<String, ReplSetError> {
        let snapshot = self.snapshot.current();
        if snapshot.state != ReplSetState::Running {
            return Err(ReplSetError::NotRunning { state: snapshot.state });
        }

        Ok(build_connection_uri(
            &snapshot.members,
            &self.options.name,
            db_name.or_else(|| self.db_name()),
        ))
    }

    /// Configured database name, if any. There is no default: unless one is configured or
    /// passed to `get_uri()`, connection strings carry an empty path (`/?replicaSet=...`).
    pub fn db_name(&self) -> Option<&str> {
        self.options.db_name.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn state(&self) -> ReplSetState {
        self.snapshot.current().state
    }

    /// Error of the most recent failed startup. Cleared by the next `start()`.
    pub fn last_error(&self) -> Option<ReplSetError> {
        self.snapshot.current().last_error
    }

    /// Member addresses in index order. Empty unless Running.
    pub fn members(&self) -> Vec<MemberAddress> {
        self.snapshot.current().members
    }

    /// Listen to state changes from now on.
    pub fn subscribe(&self) -> ReplSetEventListener {
        ReplSetEventListener::new(self.snapshot.subscribe())
    }
}
