pub mod backup;
pub mod dirs;
pub mod file_handle;

pub use backup::{backup, move_to_backup, BackupLocation};
pub use dirs::{cache_dir, config_dir};
pub use file_handle::FileHandle;
