mod member_pool;

pub use member_pool::MemberStopFailure;
pub use member_pool::StopReport;

pub(crate) use member_pool::ReplSetMemberPool;
pub(crate) use member_pool::SharedPool;
