use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// An immutable, timestamped, read-only mirror of a dataset's tree,
/// exposed under `<dataset mountpoint>/.zfs/snapshot/<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Short name, without the dataset prefix.
    pub name: String,
    /// Fully qualified name as zfs knows it: `<dataset>@<name>`.
    pub full_name: String,
    pub created: DateTime<Utc>,
    pub mount_point: PathBuf,
}

impl Snapshot {
    /// A snapshot directory under `.zfs/snapshot` appears empty until the
    /// snapshot is mounted, so a cheap listing probe answers the question.
    pub fn is_mounted(&self) -> Result<bool> {
        let mut entries = std::fs::read_dir(&self.mount_point)?;
        Ok(entries.next().is_some())
    }
}
