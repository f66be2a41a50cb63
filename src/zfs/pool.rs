use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use super::cmd::{SystemZfsCmd, ZfsCmd};
use super::dataset::Dataset;
use super::snapshot::Snapshot;
use crate::config::ZfsConfig;
use crate::error::{Error, Result};

/// Handle for a zfs pool and the mounted datasets below it.
#[derive(Debug, Clone)]
pub struct Zfs {
    name: String,
    datasets: Vec<Dataset>,
    cmd: Arc<dyn ZfsCmd>,
}

impl Zfs {
    /// Scan the datasets under the pool `name`.
    pub fn new(name: &str, config: &ZfsConfig) -> Result<Self> {
        Self::with_cmd(name, Arc::new(SystemZfsCmd::new(config.use_sudo)))
    }

    /// Like [`Zfs::new`], with a custom command backend.
    pub fn with_cmd(name: &str, cmd: Arc<dyn ZfsCmd>) -> Result<Self> {
        let datasets = scan_datasets(name, &cmd)?;
        Ok(Self {
            name: name.to_string(),
            datasets,
            cmd,
        })
    }

    pub(crate) fn from_parts(name: &str, datasets: Vec<Dataset>, cmd: Arc<dyn ZfsCmd>) -> Self {
        Self {
            name: name.to_string(),
            datasets,
            cmd,
        }
    }

    /// Resolve the pool and dataset holding `path` by probing every pool.
    pub fn for_file_path(path: &Path, config: &ZfsConfig) -> Result<(Zfs, Dataset)> {
        let cmd: Arc<dyn ZfsCmd> = Arc::new(SystemZfsCmd::new(config.use_sudo));
        let out = cmd.exec(&["list", "-Ho", "name"])?;

        for pool in out.lines().filter(|l| !l.is_empty() && !l.contains('/')) {
            let zfs = match Zfs::with_cmd(pool, Arc::clone(&cmd)) {
                Ok(zfs) => zfs,
                Err(err) => {
                    debug!("skip pool {pool}: {err}");
                    continue;
                }
            };
            if let Ok(dataset) = zfs.find_dataset_for_path(path) {
                return Ok((zfs, dataset));
            }
        }
        Err(Error::not_found(format!(
            "no dataset found for path: {}",
            path.display()
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn find_dataset_by_name(&self, name: &str) -> Result<Dataset> {
        self.datasets
            .iter()
            .find(|ds| ds.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no dataset with name: '{name}'")))
    }

    /// The dataset whose mountpoint is the longest prefix of `path`.
    pub fn find_dataset_for_path(&self, path: &Path) -> Result<Dataset> {
        let mut candidates: Vec<&Dataset> = self.datasets.iter().collect();
        candidates.sort_by_key(|ds| std::cmp::Reverse(ds.mount_point.as_os_str().len()));

        for ds in candidates {
            if path.starts_with(&ds.mount_point) {
                debug!(
                    "dataset for path found - path: {}, dataset: {}",
                    path.display(),
                    ds.name
                );
                return Ok(ds.clone());
            }
        }
        Err(Error::not_found(format!(
            "no dataset for path: '{}'",
            path.display()
        )))
    }

    /// Ask zfs to mount the given snapshot.
    pub fn mount_snapshot(&self, snap: &Snapshot) -> Result<()> {
        debug!("mount snapshot: {}", snap.full_name);
        self.cmd.exec(&["mount", &snap.full_name])?;
        Ok(())
    }
}

/// Parse the tab separated output of
/// `zfs list -Hp -o name,used,avail,refer,mountpoint -r -t filesystem`.
fn scan_datasets(name: &str, cmd: &Arc<dyn ZfsCmd>) -> Result<Vec<Dataset>> {
    debug!("search datasets under pool: {name}");
    let out = cmd.exec(&[
        "list",
        "-Hp",
        "-o",
        "name,used,avail,refer,mountpoint",
        "-r",
        "-t",
        "filesystem",
        name,
    ])?;

    let mut datasets = Vec::new();
    for line in out.lines() {
        let fields: Vec<&str> = line.splitn(5, '\t').collect();
        if fields.len() != 5 {
            trace!("ignore invalid formatted line: '{line}'");
            continue;
        }
        let (Ok(used), Ok(avail), Ok(refer)) = (
            fields[1].parse::<u64>(),
            fields[2].parse::<u64>(),
            fields[3].parse::<u64>(),
        ) else {
            trace!("ignore line with non numeric sizes: '{line}'");
            continue;
        };

        match fields[4] {
            "legacy" | "none" | "-" => {
                debug!("ignore dataset without usable mountpoint: {}", fields[0]);
            }
            mount_point => {
                trace!("dataset found - name: '{}', mountpoint: '{mount_point}'", fields[0]);
                datasets.push(Dataset::from_listing(
                    fields[0],
                    used,
                    avail,
                    refer,
                    mount_point,
                    Arc::clone(cmd),
                ));
            }
        }
    }
    Ok(datasets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::MockZfsCmd;
    use std::path::PathBuf;

    fn pool(listing: &str) -> Zfs {
        Zfs::with_cmd("tank", Arc::new(MockZfsCmd::ok(listing))).unwrap()
    }

    #[test]
    fn test_scan_datasets() {
        let zfs = pool(
            "tank\t100\t200\t50\t/tank\n\
             tank/docs\t10\t200\t5\t/tank/docs\n\
             tank/hidden\t10\t200\t5\tnone\n\
             tank/old\t10\t200\t5\tlegacy",
        );
        assert_eq!(zfs.datasets().len(), 2);
        assert_eq!(zfs.datasets()[0].name, "tank");
        assert_eq!(zfs.datasets()[0].used, 100);
        assert_eq!(zfs.datasets()[1].mount_point, PathBuf::from("/tank/docs"));
    }

    #[test]
    fn test_find_dataset_by_name() {
        let zfs = pool("tank\t1\t1\t1\t/tank");
        assert!(zfs.find_dataset_by_name("tank").is_ok());
        assert!(zfs.find_dataset_by_name("nope").is_err());
    }

    #[test]
    fn test_find_dataset_for_path_picks_longest_mount() {
        let zfs = pool(
            "tank\t1\t1\t1\t/tank\n\
             tank/docs\t1\t1\t1\t/tank/docs",
        );
        let ds = zfs
            .find_dataset_for_path(Path::new("/tank/docs/notes.txt"))
            .unwrap();
        assert_eq!(ds.name, "tank/docs");

        let ds = zfs.find_dataset_for_path(Path::new("/tank/other.txt")).unwrap();
        assert_eq!(ds.name, "tank");

        assert!(zfs.find_dataset_for_path(Path::new("/elsewhere")).is_err());
    }

    #[test]
    fn test_scan_datasets_propagates_command_failure() {
        let err = Zfs::with_cmd("tank", Arc::new(MockZfsCmd::fail("no such pool"))).unwrap_err();
        assert!(matches!(err, Error::ZfsCommand { .. }));
    }
}
