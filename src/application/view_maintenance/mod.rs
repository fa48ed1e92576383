/// Aggregate view maintenance - dirty flag and periodic refresh
mod dirty_flag;
mod refresh_scheduler;

pub use dirty_flag::ViewDirtyFlag;
pub use refresh_scheduler::{ViewRefreshScheduler, DEFAULT_REFRESH_INTERVAL};
