use chrono::DateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};

use super::cmd::ZfsCmd;
use super::snapshot::Snapshot;
use crate::error::Result;

/// A zfs dataset (aka zfs filesystem): a named, mounted tree with zero or
/// more snapshots.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub used: u64,
    pub avail: u64,
    pub refer: u64,
    pub mount_point: PathBuf,
    cmd: Arc<dyn ZfsCmd>,
}

impl Dataset {
    /// Plain constructor, mainly for tests and embedding - datasets are
    /// normally discovered via [`crate::zfs::Zfs`].
    pub fn new(name: impl Into<String>, mount_point: impl Into<PathBuf>, cmd: Arc<dyn ZfsCmd>) -> Self {
        Self::from_listing(name, 0, 0, 0, mount_point, cmd)
    }

    pub(crate) fn from_listing(
        name: impl Into<String>,
        used: u64,
        avail: u64,
        refer: u64,
        mount_point: impl Into<PathBuf>,
        cmd: Arc<dyn ZfsCmd>,
    ) -> Self {
        Self {
            name: name.into(),
            used,
            avail,
            refer,
            mount_point: mount_point.into(),
            cmd,
        }
    }

    /// List this dataset's snapshots, newest first.
    ///
    /// Parses the tab separated output of
    /// `zfs list -t snapshot -s creation -r -d 1 -o name,creation -Hp`;
    /// creation times are epoch seconds thanks to `-p`.
    pub fn scan_snapshots(&self) -> Result<Vec<Snapshot>> {
        let out = self.cmd.exec(&[
            "list",
            "-t",
            "snapshot",
            "-s",
            "creation",
            "-r",
            "-d",
            "1",
            "-o",
            "name,creation",
            "-Hp",
            &self.name,
        ])?;

        let mut snapshots = Vec::new();
        for line in out.lines() {
            let Some((full_name, creation)) = line.split_once('\t') else {
                trace!("ignore invalid formatted line: '{line}'");
                continue;
            };
            let Ok(secs) = creation.trim().parse::<i64>() else {
                warn!("unable to parse creation time '{creation}' of {full_name}");
                continue;
            };
            let Some(created) = DateTime::from_timestamp(secs, 0) else {
                warn!("creation time {secs} of {full_name} out of range");
                continue;
            };

            // strip the dataset prefix from '<dataset>@<name>'
            let name = full_name.rsplit('@').next().unwrap_or(full_name).to_string();
            let mount_point = self.mount_point.join(".zfs/snapshot").join(&name);

            snapshots.push(Snapshot {
                name,
                full_name: full_name.to_string(),
                created,
                mount_point,
            });
        }

        // `-s creation` lists oldest first
        snapshots.reverse();
        Ok(snapshots)
    }

    /// Mirror of `path` inside the given snapshot of this dataset.
    pub fn path_in_snapshot(&self, path: &Path, snap: &Snapshot) -> PathBuf {
        let rel = path.strip_prefix(&self.mount_point).unwrap_or(path);
        let rel = rel.strip_prefix("/").unwrap_or(rel);
        snap.mount_point.join(rel)
    }
}
