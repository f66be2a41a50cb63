use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Handle for file access, copies and metadata lookups.
///
/// Size and modification time are captured when the handle is created;
/// a handle is cheap to clone and safe to serialize (paths only, no open
/// file descriptors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHandle {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

impl FileHandle {
    /// Stat `path` and wrap it in a handle. Directories are rejected.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let md = std::fs::metadata(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::not_found(format!("file not found: {}", path.display()))
            }
            _ => Error::Io(e),
        })?;
        if md.is_dir() {
            return Err(Error::validation(format!("not a file: {}", path.display())));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mtime = DateTime::from(md.modified()?);

        Ok(Self {
            name,
            path,
            size: md.len(),
            mtime,
        })
    }

    /// Sniff the MIME type from the first 512 bytes of content.
    pub fn mime_type(&self) -> Result<String> {
        let mut f = File::open(&self.path)?;
        let mut buf = [0u8; 512];
        let n = f.read(&mut buf)?;
        Ok(sniff_content_type(&buf[..n]).to_string())
    }

    /// Read the whole file content.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.path)?)
    }

    /// Read the file content as a string, replacing invalid utf-8.
    pub fn read_string(&self) -> Result<String> {
        let buf = self.read()?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Copy the file content to the given writer.
    pub fn copy_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut f = File::open(&self.path)?;
        std::io::copy(&mut f, w)?;
        Ok(())
    }

    /// Copy the file to `path`, fsyncing the target.
    pub fn copy_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut src = File::open(&self.path)?;
        let mut dst = File::create(path.as_ref())?;
        std::io::copy(&mut src, &mut dst)?;
        dst.sync_all()?;
        Ok(())
    }
}

/// Text or opaque binary - all the comparator selection cares about.
/// An empty file counts as text.
fn sniff_content_type(buf: &[u8]) -> &'static str {
    if buf.is_empty() {
        return "text/plain; charset=utf-8";
    }
    if buf.contains(&0) {
        return "application/octet-stream";
    }
    match std::str::from_utf8(buf) {
        Ok(_) => "text/plain; charset=utf-8",
        // a multi-byte sequence cut off at the 512 byte boundary is still text
        Err(e) if e.valid_up_to() + 4 >= buf.len() => "text/plain; charset=utf-8",
        Err(_) => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileHandle::new(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_new_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileHandle::new(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_stat_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello\n").unwrap();

        let fh = FileHandle::new(&path).unwrap();
        assert_eq!(fh.name, "a.txt");
        assert_eq!(fh.size, 6);
    }

    #[test]
    fn test_mime_type_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "just some text\n").unwrap();

        let fh = FileHandle::new(&path).unwrap();
        assert!(fh.mime_type().unwrap().starts_with("text"));
    }

    #[test]
    fn test_mime_type_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, [0u8, 159, 146, 150, 0, 1, 2]).unwrap();

        let fh = FileHandle::new(&path).unwrap();
        assert_eq!(fh.mime_type().unwrap(), "application/octet-stream");
    }

    #[test]
    fn test_copy_as() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::write(&src, "content").unwrap();

        let fh = FileHandle::new(&src).unwrap();
        fh.copy_as(&dst).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "content");
        // source untouched
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "content");
    }
}
