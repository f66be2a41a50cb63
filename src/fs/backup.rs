use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::fs::dirs::cache_dir;
use crate::fs::FileHandle;

/// Name of the hidden backup directory next to a file.
const SIBLING_BACKUP_DIR: &str = ".zrw";

/// Where backup copies of a live file are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupLocation {
    /// Hidden `.zrw` directory next to the file.
    Sibling,
    /// Mirror of the file's directory tree under the user cache dir.
    CacheMirror,
}

/// Copy `fh` into its backup location and return the backup path.
///
/// The backup name carries a timestamp suffix so repeated backups of the
/// same file never collide.
pub fn backup(fh: &FileHandle, location: BackupLocation) -> Result<PathBuf> {
    let backup_path = backup_path_for(fh, location)?;
    info!("copy live file '{}' to backup: {}", fh.name, backup_path.display());
    fh.copy_as(&backup_path)?;
    Ok(backup_path)
}

/// Move `fh` into the sibling backup directory.
///
/// Used by the patch commit phase: the original file must vanish from its
/// path in the same step that preserves it.
pub fn move_to_backup(fh: &FileHandle) -> Result<PathBuf> {
    let backup_path = backup_path_for(fh, BackupLocation::Sibling)?;
    info!("move live file '{}' to backup: {}", fh.name, backup_path.display());
    std::fs::rename(&fh.path, &backup_path)?;
    Ok(backup_path)
}

fn backup_path_for(fh: &FileHandle, location: BackupLocation) -> Result<PathBuf> {
    let parent = fh
        .path
        .parent()
        .ok_or_else(|| Error::validation(format!("no parent directory for: {}", fh.path.display())))?;

    let dir = match location {
        BackupLocation::Sibling => parent.join(SIBLING_BACKUP_DIR),
        BackupLocation::CacheMirror => {
            let mut dir = cache_dir()?.join("backups");
            dir.push(parent.strip_prefix("/").unwrap_or(parent));
            dir
        }
    };
    ensure_backup_dir(&dir)?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("{}_{}", fh.name, ts)))
}

fn ensure_backup_dir(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(md) if md.is_dir() => Ok(()),
        Ok(_) => {
            let msg = format!("backup directory exists but is not a directory: {}", dir.display());
            warn!("{msg}");
            Err(Error::validation(msg))
        }
        Err(_) => {
            info!("create backup directory: {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_backup_copies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "v1").unwrap();

        let fh = FileHandle::new(&path).unwrap();
        let backup_path = backup(&fh, BackupLocation::Sibling).unwrap();

        assert!(backup_path.starts_with(dir.path().join(SIBLING_BACKUP_DIR)));
        assert!(backup_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("notes.txt_"));
        assert_eq!(std::fs::read_to_string(&backup_path).unwrap(), "v1");
        // original still in place
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "v1");
    }

    #[test]
    fn test_move_to_backup_moves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "v1").unwrap();

        let fh = FileHandle::new(&path).unwrap();
        let backup_path = move_to_backup(&fh).unwrap();

        assert!(!path.exists());
        assert_eq!(std::fs::read_to_string(&backup_path).unwrap(), "v1");
    }

    #[test]
    fn test_backup_dir_collision_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "v1").unwrap();
        // a *file* named like the backup dir blocks the backup
        std::fs::write(dir.path().join(SIBLING_BACKUP_DIR), "").unwrap();

        let fh = FileHandle::new(&path).unwrap();
        let err = backup(&fh, BackupLocation::Sibling).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
