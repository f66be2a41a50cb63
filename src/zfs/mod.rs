pub mod cmd;
pub mod dataset;
pub mod pool;
pub mod snapshot;

pub use cmd::{MockZfsCmd, SystemZfsCmd, ZfsCmd};
pub use dataset::Dataset;
pub use pool::Zfs;
pub use snapshot::Snapshot;
