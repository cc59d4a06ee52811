//! One database-engine process per `ServerInstance`. The rest of the crate only sees the traits
//! in `launcher`; `mongod` is the process-backed implementation.
mod launcher;
mod mongod;
mod port;
mod stop_signal;

pub use launcher::InstanceError;
pub use launcher::InstanceLauncher;
pub use launcher::InstanceSpec;
pub use launcher::MemberAddress;
pub use launcher::ServerInstance;
pub use mongod::MongodLauncher;
