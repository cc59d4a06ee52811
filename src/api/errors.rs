use crate::admin::AdminError;
use crate::controller::ReplSetState;
use crate::instance::{InstanceError, MemberAddress};
use std::sync::Arc;

/// Every failure the replica-set handle reports. Startup failures are recorded once and handed
/// to every waiter, so causes are shared behind `Arc`.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ReplSetError {
    #[error("Invalid replica set configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Member {index} failed to start: {cause}")]
    MemberStartFailure { index: usize, cause: Arc<InstanceError> },

    #[error("Replica set initiate against seed member {seed} failed: {cause}")]
    InitiateCommandFailure { seed: MemberAddress, cause: Arc<AdminError> },

    #[error("No stable primary after {attempts} status polls, last observed: {last_observed}")]
    ConvergenceTimeout { attempts: u32, last_observed: String },

    #[error("State is {state:?}, not Running or Init. Cannot wait on something that does not start")]
    NotStartable { state: ReplSetState },

    #[error("Replica set is not running (state {state:?})")]
    NotRunning { state: ReplSetState },

    // A waiter's startup was torn down by stop() before it finished.
    #[error("Startup was cancelled by stop()")]
    StartCancelled,

    #[error("A replica set must be created from within a tokio runtime")]
    RuntimeUnavailable,

    // Controller logic runs on a background task. This error is returned if the task has exited.
    #[error("Replica set controller task has exited")]
    ControllerExited,
}
