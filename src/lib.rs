mod actor;
mod admin;
mod api;
mod controller;
mod instance;
mod logging;
mod poller;
mod pool;
mod time;

#[cfg(test)]
mod test_utils;

pub use admin::AdminClient;
pub use admin::AdminConnector;
pub use admin::AdminError;
pub use admin::InitiateConfig;
pub use admin::InitiateMember;
pub use admin::MemberRole;
pub use admin::MemberStatus;
pub use admin::ReplSetSettings;
pub use admin::ReplSetStatus;
pub use admin::ShellConnector;
pub use api::try_create_repl_set;
pub use api::try_create_repl_set_with;
pub use api::BinaryOptions;
pub use api::MemberOptions;
pub use api::MemoryReplSet;
pub use api::MemoryReplSetConfig;
pub use api::ReplSetError;
pub use api::ReplSetEventListener;
pub use api::ReplSetOptions;
pub use api::StateChange;
pub use controller::ReplSetState;
pub use instance::InstanceError;
pub use instance::InstanceLauncher;
pub use instance::InstanceSpec;
pub use instance::MemberAddress;
pub use instance::MongodLauncher;
pub use instance::ServerInstance;
pub use logging::create_file_logger;
pub use logging::create_stdout_logger;
pub use pool::MemberStopFailure;
pub use pool::StopReport;

