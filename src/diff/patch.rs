use chrono::Local;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

use super::delta::{Delta, DeltaKind};
use crate::error::{Error, Result};
use crate::fs::{move_to_backup, FileHandle};

/// Apply the given deltas to the live file.
///
/// Deleted chunks are inserted again and inserted chunks are dropped, so
/// this *reverts* the change described by the deltas instead of re-applying
/// it.
///
/// Three phases:
/// 1. verify: every Equal delta must match the live file byte for byte,
///    otherwise the file changed since the diff was taken and nothing is
///    written ([`Error::VerificationFailed`])
/// 2. apply: the patched content is written to a temporary sibling file;
///    on failure the temp file is removed and the live file stays untouched
/// 3. commit: the live file is moved into the backup directory, then the
///    temp file is renamed into its place
pub fn apply_deltas(fh: &FileHandle, deltas: &[Delta]) -> Result<()> {
    verify_deltas_are_applicable(fh, deltas)?;

    let parent = fh
        .path
        .parent()
        .ok_or_else(|| Error::validation(format!("no parent directory for: {}", fh.path.display())))?;
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let work_path = parent.join(format!(".zrw-patch-in-process-{}_{}", fh.name, ts));

    if let Err(err) = apply_deltas_to(fh, deltas, &work_path) {
        let _ = fs::remove_file(&work_path);
        debug!("apply failed - live file untouched: {err}");
        return Err(err);
    }

    let backup_path = match move_to_backup(fh) {
        Ok(path) => path,
        Err(err) => {
            let _ = fs::remove_file(&work_path);
            return Err(err);
        }
    };
    info!("live file preserved at: {}", backup_path.display());

    fs::rename(&work_path, &fh.path)?;
    Ok(())
}

/// Check that the Equal chunks still match the live file. Read only, no
/// side effects.
fn verify_deltas_are_applicable(fh: &FileHandle, deltas: &[Delta]) -> Result<()> {
    let mut f = fs::File::open(&fh.path)?;

    for delta in deltas {
        if delta.kind != DeltaKind::Equal {
            continue;
        }
        f.seek(SeekFrom::Start(delta.byte_pos_target - 1))?;
        let mut buf = vec![0u8; delta.text.len()];
        let n = read_up_to(&mut f, &mut buf)?;
        if buf[..n] != *delta.text.as_bytes() {
            return Err(Error::VerificationFailed {
                path: fh.path.clone(),
                pos: delta.byte_pos_target,
            });
        }
    }
    Ok(())
}

/// Stream the live file to `dst_path` with the deltas inverse-applied.
fn apply_deltas_to(fh: &FileHandle, deltas: &[Delta], dst_path: &Path) -> Result<()> {
    let mut src = fs::File::open(&fh.path)?;
    let mut dst = fs::File::create(dst_path)?;

    let mut src_pos: u64 = 0;
    for delta in deltas {
        match delta.kind {
            DeltaKind::Delete => {
                // copy unchanged, then restore the deleted text
                let unchanged = delta.byte_pos_target - 1 - src_pos;
                src_pos += io::copy(&mut (&mut src).take(unchanged), &mut dst)?;
                dst.write_all(delta.text.as_bytes())?;
            }
            DeltaKind::Insert => {
                // copy unchanged, then skip the inserted text
                let unchanged = delta.byte_pos_target - 1 - src_pos;
                src_pos += io::copy(&mut (&mut src).take(unchanged), &mut dst)?;

                let len = delta.text.len() as u64;
                src.seek(SeekFrom::Current(len as i64))?;
                src_pos += len;
            }
            DeltaKind::Equal => {}
        }
    }
    // copy everything after the last delta
    io::copy(&mut src, &mut dst)?;
    dst.sync_all()?;
    Ok(())
}

fn read_up_to(f: &mut fs::File, buf: &mut [u8]) -> Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match f.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::engine::compute_diff;

    const OLD: &str = "first line\nsecond line\nfourth line\n";
    const NEW: &str = "first line\nsecond line\nthird line\nfourth line\n";

    fn live_file(dir: &Path, content: &str) -> FileHandle {
        let path = dir.join("file.txt");
        std::fs::write(&path, content).unwrap();
        FileHandle::new(&path).unwrap()
    }

    #[test]
    fn test_revert_insert() {
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), NEW);

        let deltas = compute_diff(OLD, NEW, 0).line_deltas;
        apply_deltas(&fh, &deltas).unwrap();

        assert_eq!(std::fs::read_to_string(&fh.path).unwrap(), OLD);
    }

    #[test]
    fn test_revert_delete() {
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), OLD);

        let deltas = compute_diff(NEW, OLD, 0).line_deltas;
        apply_deltas(&fh, &deltas).unwrap();

        assert_eq!(std::fs::read_to_string(&fh.path).unwrap(), NEW);
    }

    #[test]
    fn test_revert_with_context_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), NEW);

        // context deltas exercise the verify phase as well
        let deltas = compute_diff(OLD, NEW, 1).line_deltas;
        apply_deltas(&fh, &deltas).unwrap();

        assert_eq!(std::fs::read_to_string(&fh.path).unwrap(), OLD);
    }

    #[test]
    fn test_replacement_round_trip() {
        let from = "a\nb\nc\nd\ne\n";
        let target = "a\nB\nc\nd\nE\n";
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), target);

        let deltas = compute_diff(from, target, 1).line_deltas;
        apply_deltas(&fh, &deltas).unwrap();

        assert_eq!(std::fs::read_to_string(&fh.path).unwrap(), from);
    }

    #[test]
    fn test_backup_created() {
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), NEW);

        let deltas = compute_diff(OLD, NEW, 0).line_deltas;
        apply_deltas(&fh, &deltas).unwrap();

        let backup_dir = dir.path().join(".zrw");
        let backups: Vec<_> = std::fs::read_dir(&backup_dir).unwrap().collect();
        assert_eq!(backups.len(), 1);
        let backup_path = backups[0].as_ref().unwrap().path();
        assert_eq!(std::fs::read_to_string(backup_path).unwrap(), NEW);
    }

    #[test]
    fn test_verification_gate() {
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), NEW);

        let deltas = compute_diff(OLD, NEW, 1).line_deltas;

        // the file changes between diff computation and patch application
        let mutated = NEW.replace("second", "seXond");
        std::fs::write(&fh.path, &mutated).unwrap();

        let err = apply_deltas(&fh, &deltas).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed { .. }));
        // file is byte for byte unchanged
        assert_eq!(std::fs::read_to_string(&fh.path).unwrap(), mutated);
        // and no temp or backup artifacts are left behind
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["file.txt".to_string()]);
    }

    #[test]
    fn test_truncated_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let fh = live_file(dir.path(), NEW);

        let deltas = compute_diff(OLD, NEW, 1).line_deltas;

        // file got shorter than the version the deltas describe
        std::fs::write(&fh.path, "first line\n").unwrap();

        let err = apply_deltas(&fh, &deltas).unwrap_err();
        assert!(matches!(err, Error::VerificationFailed { .. }));
    }
}
