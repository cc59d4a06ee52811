//! Administrative protocol of the database engine, consumed but not implemented here: an
//! "initiate replica set" command and a "status" query.
mod client;
mod shell;
mod status;

pub use client::AdminClient;
pub use client::AdminConnector;
pub use client::AdminError;
pub use client::InitiateConfig;
pub use client::InitiateMember;
pub use client::ReplSetSettings;
pub use shell::ShellConnector;
pub use status::MemberRole;
pub use status::MemberStatus;
pub use status::ReplSetStatus;

pub(crate) use status::Convergence;
