use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result};
use crate::fs::FileHandle;

/// How file versions are compared during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMethod {
    Size,
    MTime,
    SizeAndMTime,
    Content,
    Md5,
    /// md5 for text files, size+mtime for everything else.
    Auto,
}

impl CompareMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareMethod::Size => "size",
            CompareMethod::MTime => "mtime",
            CompareMethod::SizeAndMTime => "size+mtime",
            CompareMethod::Content => "content",
            CompareMethod::Md5 => "md5",
            CompareMethod::Auto => "auto",
        }
    }
}

impl fmt::Display for CompareMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "size" => Ok(CompareMethod::Size),
            "mtime" | "modTime" => Ok(CompareMethod::MTime),
            "size+mtime" | "size+modTime" => Ok(CompareMethod::SizeAndMTime),
            "content" => Ok(CompareMethod::Content),
            "md5" => Ok(CompareMethod::Md5),
            "auto" => Ok(CompareMethod::Auto),
            _ => Err(Error::validation(format!(
                "no such compare method: '{s}' - available: size, mtime, size+mtime, content, md5, auto"
            ))),
        }
    }
}

/// Stateful "has this file materially changed" predicate.
///
/// A comparator is bound to a baseline file and remembers the signature of
/// the previous candidate: `has_changed` answers true only when the
/// candidate differs from *both* the baseline and the previous candidate.
/// Callers walk snapshots newest to oldest, so this collapses a run of
/// identical old versions into a single reported change.
///
/// One comparator instance serves exactly one scan pass; never share it
/// across files or datasets.
pub trait Comparator {
    /// The concrete strategy behind this instance (`Auto` is resolved at
    /// construction and never appears here).
    fn method(&self) -> CompareMethod;

    fn has_changed(&mut self, candidate: &FileHandle) -> bool;
}

/// Build a comparator for `method`, bound to `baseline`.
pub fn new_comparator(method: CompareMethod, baseline: &FileHandle) -> Box<dyn Comparator> {
    match method {
        CompareMethod::Size => Box::new(CompareBySize::new(baseline)),
        CompareMethod::MTime => Box::new(CompareByMTime::new(baseline)),
        CompareMethod::SizeAndMTime => Box::new(CompareBySizeAndMTime::new(baseline)),
        CompareMethod::Content => Box::new(CompareByContent::new(baseline)),
        CompareMethod::Md5 => Box::new(CompareByMd5::new(baseline)),
        CompareMethod::Auto => {
            let mime = baseline.mime_type().unwrap_or_default();
            if mime.starts_with("text") {
                Box::new(CompareByMd5::new(baseline))
            } else {
                Box::new(CompareBySizeAndMTime::new(baseline))
            }
        }
    }
}

struct CompareBySize {
    actual: u64,
    prev: Option<u64>,
}

impl CompareBySize {
    fn new(baseline: &FileHandle) -> Self {
        Self {
            actual: baseline.size,
            prev: None,
        }
    }
}

impl Comparator for CompareBySize {
    fn method(&self) -> CompareMethod {
        CompareMethod::Size
    }

    fn has_changed(&mut self, candidate: &FileHandle) -> bool {
        let prev = self.prev.replace(candidate.size);
        self.actual != candidate.size && prev != Some(candidate.size)
    }
}

struct CompareByMTime {
    actual: DateTime<Utc>,
    prev: Option<DateTime<Utc>>,
}

impl CompareByMTime {
    fn new(baseline: &FileHandle) -> Self {
        Self {
            actual: baseline.mtime,
            prev: None,
        }
    }
}

impl Comparator for CompareByMTime {
    fn method(&self) -> CompareMethod {
        CompareMethod::MTime
    }

    fn has_changed(&mut self, candidate: &FileHandle) -> bool {
        let prev = self.prev.replace(candidate.mtime);
        self.actual != candidate.mtime && prev != Some(candidate.mtime)
    }
}

struct CompareBySizeAndMTime {
    by_size: CompareBySize,
    by_mtime: CompareByMTime,
}

impl CompareBySizeAndMTime {
    fn new(baseline: &FileHandle) -> Self {
        Self {
            by_size: CompareBySize::new(baseline),
            by_mtime: CompareByMTime::new(baseline),
        }
    }
}

impl Comparator for CompareBySizeAndMTime {
    fn method(&self) -> CompareMethod {
        CompareMethod::SizeAndMTime
    }

    fn has_changed(&mut self, candidate: &FileHandle) -> bool {
        // no short-circuit: both caches must see every candidate, otherwise
        // a repeated candidate is mis-flagged by the stale half
        let size_changed = self.by_size.has_changed(candidate);
        let mtime_changed = self.by_mtime.has_changed(candidate);
        size_changed || mtime_changed
    }
}

struct CompareByContent {
    actual: Vec<u8>,
    prev: Option<Vec<u8>>,
}

impl CompareByContent {
    fn new(baseline: &FileHandle) -> Self {
        let actual = baseline.read().unwrap_or_else(|err| {
            warn!("unable to read the baseline file {}: {err}", baseline.path.display());
            Vec::new()
        });
        Self { actual, prev: None }
    }
}

impl Comparator for CompareByContent {
    fn method(&self) -> CompareMethod {
        CompareMethod::Content
    }

    fn has_changed(&mut self, candidate: &FileHandle) -> bool {
        let buf = match candidate.read() {
            Ok(buf) => buf,
            Err(err) => {
                // fail open: an unreadable candidate is reported, not hidden
                warn!("unable to read {}: {err}", candidate.path.display());
                return true;
            }
        };
        let changed = self.actual != buf && self.prev.as_deref() != Some(&buf[..]);
        self.prev = Some(buf);
        changed
    }
}

struct CompareByMd5 {
    actual: Option<[u8; 16]>,
    prev: Option<[u8; 16]>,
}

impl CompareByMd5 {
    fn new(baseline: &FileHandle) -> Self {
        let actual = match md5_of(&baseline.path) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!("unable to hash the baseline file {}: {err}", baseline.path.display());
                None
            }
        };
        Self { actual, prev: None }
    }
}

impl Comparator for CompareByMd5 {
    fn method(&self) -> CompareMethod {
        CompareMethod::Md5
    }

    fn has_changed(&mut self, candidate: &FileHandle) -> bool {
        let hash = match md5_of(&candidate.path) {
            Ok(hash) => hash,
            Err(err) => {
                // fail open: an unreadable candidate is reported, not hidden
                warn!("unable to hash {}: {err}", candidate.path.display());
                return true;
            }
        };
        let prev = self.prev.replace(hash);
        self.actual != Some(hash) && prev != Some(hash)
    }
}

/// md5 of a file, streamed in fixed size blocks.
fn md5_of(path: &Path) -> Result<[u8; 16]> {
    let mut f = File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(ctx.compute().0)
}
