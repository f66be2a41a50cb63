use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::comparator::{new_comparator, CompareMethod, Comparator};
use super::date_range::DateRange;
use crate::error::Result;
use crate::fs::FileHandle;
use crate::zfs::{Dataset, Snapshot, Zfs};

/// One discovered version of a file: the live file, the copy inside the
/// snapshot's mirrored tree and the snapshot itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub current: FileHandle,
    pub backup: FileHandle,
    pub snapshot: Snapshot,
}

/// Outcome of one scan pass. Created fresh per call, never mutated after
/// return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub file_versions: Vec<FileVersion>,
    pub date_range: DateRange,
    /// Snapshots probed inside the date range.
    pub snaps_scanned: usize,
    /// Remaining work estimate: total - skipped - scanned.
    pub snaps_to_scan: usize,
    /// In-range snapshots that hold no version of the file.
    pub snaps_file_missing: usize,
    pub last_scanned_snapshot: Option<Snapshot>,
    pub scan_duration: Duration,
}

/// Walks a dataset's snapshot history, newest first, and reports the
/// snapshots that hold a genuinely different version of a file.
#[derive(Debug)]
pub struct Scanner<'a> {
    date_range: DateRange,
    compare_method: CompareMethod,
    dataset: &'a Dataset,
    zfs: &'a Zfs,
    mount_snapshots: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(
        date_range: DateRange,
        compare_method: CompareMethod,
        dataset: &'a Dataset,
        zfs: &'a Zfs,
    ) -> Self {
        Self {
            date_range,
            compare_method,
            dataset,
            zfs,
            mount_snapshots: false,
        }
    }

    /// Ask the collaborator to mount snapshots that are not auto-mounted
    /// before probing them.
    pub fn mount_snapshots(mut self, enabled: bool) -> Self {
        self.mount_snapshots = enabled;
        self
    }

    /// Scan the dataset's snapshots for versions of the file at
    /// `path_current`.
    ///
    /// Snapshots newer than the date range are skipped; the walk stops at
    /// the first snapshot older than the range. A snapshot without the file
    /// is counted, not an error - deleted and recreated files are normal.
    pub fn find_file_versions(&self, path_current: &Path) -> Result<ScanResult> {
        let start = Instant::now();

        let current_fh = FileHandle::new(path_current)?;
        let snaps = self.dataset.scan_snapshots()?;
        debug!(
            "search versions of {} {}",
            path_current.display(),
            self.date_range
        );

        let mut file_versions = Vec::new();
        let mut comparator: Option<Box<dyn Comparator>> = None;
        let mut snaps_skipped = 0;
        let mut snaps_scanned = 0;
        let mut snaps_file_missing = 0;
        let mut last_scanned: Option<Snapshot> = None;

        for (idx, snap) in snaps.iter().enumerate() {
            if self.date_range.is_before(snap.created) {
                // younger snapshots may still be followed by in-range ones
                snaps_skipped += 1;
                trace!("skip snapshot {} - younger than the range", snap.name);
                continue;
            }
            if self.date_range.is_after(snap.created) {
                // snapshots come newest first - everything below is older
                debug!("stop scan - snapshot {} is older than the range", snap.name);
                break;
            }

            if self.mount_snapshots && !self.ensure_mounted(snap) {
                continue;
            }

            if comparator.is_none() {
                // the live file may already have been edited after the first
                // in-range snapshot was taken; compare against the most
                // recent prior in-time copy instead when one exists
                let baseline_path = self.find_last_path_in_snapshots(path_current, &snaps[..idx]);
                let baseline_path = baseline_path.as_deref().unwrap_or(path_current);
                let baseline = FileHandle::new(baseline_path)?;
                let bound = new_comparator(self.compare_method, &baseline);
                debug!(
                    "bound '{}' comparator against baseline {}",
                    bound.method(),
                    baseline_path.display()
                );
                comparator = Some(bound);
            }

            let snap_path = self.dataset.path_in_snapshot(path_current, snap);
            let snap_fh = match FileHandle::new(&snap_path) {
                Ok(fh) => fh,
                Err(_) => {
                    // not every snapshot has a version of the file - it may
                    // have been deleted and recreated in between
                    snaps_file_missing += 1;
                    continue;
                }
            };

            trace!("check if the file changed under {}", snap_fh.path.display());
            if let Some(cmp) = comparator.as_mut() {
                if cmp.has_changed(&snap_fh) {
                    debug!("file changed in snapshot {}", snap.name);
                    file_versions.push(FileVersion {
                        current: current_fh.clone(),
                        backup: snap_fh,
                        snapshot: snap.clone(),
                    });
                }
            }

            snaps_scanned += 1;
            last_scanned = Some(snap.clone());
        }

        let result = ScanResult {
            file_versions,
            date_range: self.date_range,
            snaps_scanned,
            snaps_to_scan: snaps.len() - snaps_skipped - snaps_scanned,
            snaps_file_missing,
            last_scanned_snapshot: last_scanned,
            scan_duration: start.elapsed(),
        };
        debug!(
            "{} versions of {} found - scan took {:?}",
            result.file_versions.len(),
            path_current.display(),
            result.scan_duration
        );
        Ok(result)
    }

    /// Mount `snap` if necessary; false skips the snapshot.
    fn ensure_mounted(&self, snap: &Snapshot) -> bool {
        match snap.is_mounted() {
            Ok(true) => true,
            Ok(false) => {
                if let Err(err) = self.zfs.mount_snapshot(snap) {
                    warn!("unable to mount snapshot {}: {err} - skipped", snap.name);
                    return false;
                }
                true
            }
            Err(err) => {
                warn!("unable to check if snapshot {} is mounted: {err}", snap.name);
                true
            }
        }
    }

    /// Backward search over the already visited (newer) snapshots for the
    /// most recent one that contains the file.
    fn find_last_path_in_snapshots(&self, path: &Path, earlier: &[Snapshot]) -> Option<PathBuf> {
        for snap in earlier.iter().rev() {
            let snap_path = self.dataset.path_in_snapshot(path, snap);
            if snap_path.is_file() {
                return Some(snap_path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::{MockZfsCmd, ZfsCmd};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    // day `n` of the synthetic snapshot history
    fn day(n: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, n, 12, 0, 0).unwrap()
    }

    fn range(from_day: u32, to_day: u32) -> DateRange {
        DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2020, 1, from_day).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2020, 1, to_day).unwrap(),
        )
        .unwrap()
    }

    /// A dataset under a temp dir with snapshots s1..sN (s1 oldest), each
    /// mirrored under `.zfs/snapshot/<name>` and listed by a canned zfs cmd.
    struct Fixture {
        _dir: tempfile::TempDir,
        mount: PathBuf,
        dataset: Dataset,
        zfs: Zfs,
    }

    impl Fixture {
        fn new(snapshot_contents: &[Option<&str>]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mount = dir.path().to_path_buf();

            let mut listing = String::new();
            for (i, content) in snapshot_contents.iter().enumerate() {
                let nr = i + 1;
                let snap_dir = mount.join(format!(".zfs/snapshot/s{nr}"));
                std::fs::create_dir_all(&snap_dir).unwrap();
                if let Some(content) = content {
                    std::fs::write(snap_dir.join("testfile"), content).unwrap();
                }
                listing.push_str(&format!("tank@s{nr}\t{}\n", day(nr as u32).timestamp()));
            }

            let cmd: Arc<dyn ZfsCmd> = Arc::new(MockZfsCmd::ok(listing.trim_end()));
            let dataset = Dataset::new("tank", &mount, Arc::clone(&cmd));
            let zfs = Zfs::from_parts("tank", vec![dataset.clone()], cmd);

            Self {
                _dir: dir,
                mount,
                dataset,
                zfs,
            }
        }

        fn write_live(&self, content: &str) -> PathBuf {
            let path = self.mount.join("testfile");
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    #[test]
    fn test_scan_window() {
        // 5 snapshots dated day 1..5, range [day2, day4]
        let fx = Fixture::new(&[Some("v1"), Some("v2"), Some("v3"), Some("v4"), Some("v5")]);
        let live = fx.write_live("live");

        let scanner = Scanner::new(range(2, 4), CompareMethod::Md5, &fx.dataset, &fx.zfs);
        let result = scanner.find_file_versions(&live).unwrap();

        assert_eq!(result.snaps_scanned, 3);
        assert_eq!(result.snaps_to_scan, 1); // s1, never reached
        assert_eq!(result.snaps_file_missing, 0);
        assert_eq!(result.last_scanned_snapshot.as_ref().unwrap().name, "s2");
        // all three in-range versions differ pairwise
        let names: Vec<&str> = result
            .file_versions
            .iter()
            .map(|v| v.snapshot.name.as_str())
            .collect();
        assert_eq!(names, ["s4", "s3", "s2"]);
    }

    #[test]
    fn test_collapses_runs_of_identical_versions() {
        // s4 and s3 hold the same content - only the newer one is reported
        let fx = Fixture::new(&[Some("old"), Some("old"), Some("mid"), Some("mid"), Some("new")]);
        let live = fx.write_live("live");

        let scanner = Scanner::new(range(1, 5), CompareMethod::Md5, &fx.dataset, &fx.zfs);
        let result = scanner.find_file_versions(&live).unwrap();

        let names: Vec<&str> = result
            .file_versions
            .iter()
            .map(|v| v.snapshot.name.as_str())
            .collect();
        assert_eq!(names, ["s5", "s4", "s2"]);
    }

    #[test]
    fn test_missing_file_is_not_fatal() {
        let fx = Fixture::new(&[Some("v1"), None, Some("v3")]);
        let live = fx.write_live("live");

        let scanner = Scanner::new(range(1, 3), CompareMethod::Md5, &fx.dataset, &fx.zfs);
        let result = scanner.find_file_versions(&live).unwrap();

        assert_eq!(result.snaps_file_missing, 1);
        assert_eq!(result.snaps_scanned, 2);
    }

    #[test]
    fn test_baseline_is_most_recent_prior_snapshot() {
        // the live file was edited after s5 was taken; s5 (skipped, too new)
        // and s4 hold the same content, so s4 is *not* a new version
        let fx = Fixture::new(&[Some("a"), Some("a"), Some("b"), Some("same"), Some("same")]);
        let live = fx.write_live("edited later");

        let scanner = Scanner::new(range(1, 4), CompareMethod::Md5, &fx.dataset, &fx.zfs);
        let result = scanner.find_file_versions(&live).unwrap();

        let names: Vec<&str> = result
            .file_versions
            .iter()
            .map(|v| v.snapshot.name.as_str())
            .collect();
        assert_eq!(names, ["s3", "s2"]);
    }

    #[test]
    fn test_missing_live_file_is_an_error() {
        let fx = Fixture::new(&[Some("v1")]);
        let missing = fx.mount.join("never-created");

        let scanner = Scanner::new(range(1, 1), CompareMethod::Md5, &fx.dataset, &fx.zfs);
        assert!(scanner.find_file_versions(&missing).is_err());
    }
}
