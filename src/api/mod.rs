//! This mod is meant to hold most of the code for the library's client-facing API.
mod client;
mod errors;
mod event_bus;
mod options;
mod uri;
mod wiring;

pub use client::MemoryReplSet;
pub use errors::ReplSetError;
pub use event_bus::ReplSetEventListener;
pub use event_bus::StateChange;
pub use options::BinaryOptions;
pub use options::MemberOptions;
pub use options::ReplSetOptions;
pub use wiring::try_create_repl_set;
pub use wiring::try_create_repl_set_with;
pub use wiring::MemoryReplSetConfig;

pub(crate) use options::ReplSetOptionsValidated;
