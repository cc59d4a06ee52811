use crate::api::{ReplSetError, StateChange};
use crate::controller::ReplSetState;
use crate::instance::MemberAddress;
use tokio::sync::{broadcast, watch};

const EVENT_BUFFER: usize = 16;

/// Everything a caller may observe about the controller, published as one value so no reader
/// ever sees a field from before a transition next to a field from after it.
#[derive(Clone, Debug)]
pub(crate) struct ControllerSnapshot {
    pub(crate) state: ReplSetState,
    // Only populated while Running.
    pub(crate) members: Vec<MemberAddress>,
    pub(crate) last_error: Option<ReplSetError>,
    // The current (or most recent) startup attempt.
    pub(crate) startup: Option<StartupOutcomeListener>,
}

impl ControllerSnapshot {
    fn stopped() -> Self {
        ControllerSnapshot {
            state: ReplSetState::Stopped,
            members: Vec::new(),
            last_error: None,
            startup: None,
        }
    }
}

pub(crate) fn new() -> (StateNotifier, SnapshotListener) {
    let (snapshot_snd, snapshot_rcv) = watch::channel(ControllerSnapshot::stopped());
    let (events_snd, _) = broadcast::channel(EVENT_BUFFER);

    (
        StateNotifier {
            snapshot: snapshot_snd,
            events: events_snd.clone(),
        },
        SnapshotListener {
            rcv: snapshot_rcv,
            events: events_snd,
        },
    )
}

pub(crate) struct StateNotifier {
    snapshot: watch::Sender<ControllerSnapshot>,
    events: broadcast::Sender<StateChange>,
}

impl StateNotifier {
    /// Replace the published snapshot, then broadcast exactly one change event for it.
    pub(crate) fn publish(&self, old: ReplSetState, snapshot: ControllerSnapshot) {
        let change = StateChange {
            old,
            new: snapshot.state,
        };
        self.snapshot.send_replace(snapshot);
        // No subscribers is fine.
        let _ = self.events.send(change);
    }
}

#[derive(Clone)]
pub(crate) struct SnapshotListener {
    rcv: watch::Receiver<ControllerSnapshot>,
    events: broadcast::Sender<StateChange>,
}

impl SnapshotListener {
    pub(crate) fn current(&self) -> ControllerSnapshot {
        self.rcv.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }
}

pub(crate) fn startup_outcome() -> (StartupOutcomeNotifier, StartupOutcomeListener) {
    let (snd, rcv) = watch::channel(None);

    (StartupOutcomeNotifier { snd }, StartupOutcomeListener { rcv })
}

/// Resolves every waiter of one startup attempt. The outcome is set once and stays readable,
/// so waiters that arrive late still see it.
pub(crate) struct StartupOutcomeNotifier {
    snd: watch::Sender<Option<Result<(), ReplSetError>>>,
}

impl StartupOutcomeNotifier {
    pub(crate) fn notify(&self, outcome: Result<(), ReplSetError>) {
        self.snd.send_replace(Some(outcome));
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StartupOutcomeListener {
    rcv: watch::Receiver<Option<Result<(), ReplSetError>>>,
}

impl StartupOutcomeListener {
    pub(crate) async fn wait(mut self) -> Result<(), ReplSetError> {
        loop {
            let outcome = self.rcv.borrow().clone();
            if let Some(outcome) = outcome {
                return outcome;
            }

            if self.rcv.changed().await.is_err() {
                // Notifier dropped. It may still have set a value right before.
                let outcome = self.rcv.borrow().clone();
                return outcome.unwrap_or(Err(ReplSetError::ControllerExited));
            }
        }
    }
}
