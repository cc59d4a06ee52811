use crate::controller::ReplSetState;
use tokio::sync::broadcast;

/// A state transition, as published by the controller. One is published per transition, in
/// order. Observing them is advisory: correctness never depends on anyone listening.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StateChange {
    pub old: ReplSetState,
    pub new: ReplSetState,
}

pub struct ReplSetEventListener {
    rcv: broadcast::Receiver<StateChange>,
}

impl ReplSetEventListener {
    pub(crate) fn new(rcv: broadcast::Receiver<StateChange>) -> Self {
        ReplSetEventListener { rcv }
    }

    /// `next()` returns the next state change, or None once the replica set handle is gone. A
    /// listener that falls too far behind skips the changes it missed.
    pub async fn next(&mut self) -> Option<StateChange> {
        loop {
            match self.rcv.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
