/// Lifecycle state of a replica set. Exactly one holds at any instant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplSetState {
    Stopped,
    Init,
    Running,
    Errored,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Transition {
    Start,
    StartupSucceeded,
    StartupFailed,
    Stop,
}

/// `next_state()` is the whole transition table. None means the transition is illegal from
/// `current` and must be ignored.
///
/// ```text
/// Stopped --Start--> Init --StartupSucceeded--> Running --Stop--> Stopped
///                    Init --StartupFailed-----> Errored --Stop--> Stopped
///                    Init --Stop--> Stopped     Errored --Start--> Init
/// ```
pub(crate) fn next_state(current: ReplSetState, transition: Transition) -> Option<ReplSetState> {
    use self::ReplSetState::*;

    match (current, transition) {
        (Stopped, Transition::Start) | (Errored, Transition::Start) => Some(Init),
        (Init, Transition::StartupSucceeded) => Some(Running),
        (Init, Transition::StartupFailed) => Some(Errored),
        (Init, Transition::Stop) | (Running, Transition::Stop) | (Errored, Transition::Stop) => Some(Stopped),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::state::ReplSetState::*;

    const ALL_STATES: [ReplSetState; 4] = [Stopped, Init, Running, Errored];

    #[test]
    fn legal_transitions() {
        assert_eq!(next_state(Stopped, Transition::Start), Some(Init));
        assert_eq!(next_state(Init, Transition::StartupSucceeded), Some(Running));
        assert_eq!(next_state(Init, Transition::StartupFailed), Some(Errored));
        assert_eq!(next_state(Init, Transition::Stop), Some(Stopped));
        assert_eq!(next_state(Running, Transition::Stop), Some(Stopped));
        assert_eq!(next_state(Errored, Transition::Stop), Some(Stopped));
        assert_eq!(next_state(Errored, Transition::Start), Some(Init));
    }

    #[test]
    fn start_is_illegal_once_started() {
        assert_eq!(next_state(Init, Transition::Start), None);
        assert_eq!(next_state(Running, Transition::Start), None);
    }

    #[test]
    fn startup_outcomes_only_apply_to_init() {
        for state in ALL_STATES.iter().filter(|s| **s != Init) {
            assert_eq!(next_state(*state, Transition::StartupSucceeded), None, "{:?}", state);
            assert_eq!(next_state(*state, Transition::StartupFailed), None, "{:?}", state);
        }
    }

    #[test]
    fn stop_from_stopped_is_not_a_transition() {
        assert_eq!(next_state(Stopped, Transition::Stop), None);
    }

    #[test]
    fn running_is_only_reachable_through_init() {
        for state in ALL_STATES.iter() {
            for transition in [
                Transition::Start,
                Transition::StartupSucceeded,
                Transition::StartupFailed,
                Transition::Stop,
            ]
            .iter()
            {
                if next_state(*state, *transition) == Some(Running) {
                    assert_eq!(*state, Init);
                }
            }
        }
    }
}
