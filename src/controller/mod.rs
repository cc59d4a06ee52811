//! The replica set state machine and the background startup sequence it drives.
mod controller;
mod notifier;
mod startup;
mod state;

pub use state::ReplSetState;

pub(crate) use controller::ReplSetController;
pub(crate) use controller::Teardown;
pub(crate) use notifier::new as state_notifier;
pub(crate) use notifier::SnapshotListener;
pub(crate) use startup::StartupReport;
