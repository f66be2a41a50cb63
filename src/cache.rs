use zfs_rewind::fs::cache_dir;
use zfs_rewind::scanner::FileVersion;
use zfs_rewind::{Error, Result};

const CACHE_FILE: &str = "zrw.cache";

/// Remember the versions from the last scan, so 'diff', 'revert' and
/// 'restore' can address them by index in a later invocation.
pub fn cache_file_versions(versions: &[FileVersion]) -> Result<()> {
    let json = serde_json::to_vec(versions)?;
    std::fs::write(cache_dir()?.join(CACHE_FILE), json)?;
    Ok(())
}

pub fn load_cached_file_versions() -> Result<Vec<FileVersion>> {
    let path = cache_dir()?.join(CACHE_FILE);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(
                "cached file versions not found - run the 'list' action first",
            ));
        }
        Err(err) => return Err(err.into()),
    };
    Ok(serde_json::from_slice(&data)?)
}
