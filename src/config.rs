use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Tool configuration, loaded from `~/.config/zfs-rewind/config.toml`.
///
/// Missing or unparsable files fall back to the defaults - the config file
/// is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// How many days of snapshot history a scan covers by default.
    pub days_to_scan: i64,
    /// Default compare method for scans.
    pub compare_method: String,
    /// Unchanged lines kept around each change in a diff.
    pub diff_context_size: usize,
    /// Place whole-file restore backups in a cache-dir mirror instead of a
    /// hidden sibling directory.
    pub use_cache_dir_for_backups: bool,
    pub zfs: ZfsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ZfsConfig {
    /// Prefix zfs invocations with sudo.
    pub use_sudo: bool,
    /// Mount snapshots on demand before probing them.
    pub mount_snapshots: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            days_to_scan: 7,
            compare_method: "auto".to_string(),
            diff_context_size: 5,
            use_cache_dir_for_backups: true,
            zfs: ZfsConfig::default(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    crate::fs::config_dir().ok().map(|dir| dir.join("config.toml"))
}

/// Load the configuration, falling back to defaults when the file is
/// absent or not parsable.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            debug!("config {} not parsable ({err}) - using defaults", path.display());
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.days_to_scan, 7);
        assert_eq!(config.compare_method, "auto");
        assert!(!config.zfs.use_sudo);
    }

    #[test]
    fn test_parse() {
        let config: Config = toml::from_str(
            r#"
            days-to-scan = 14
            compare-method = "md5"

            [zfs]
            use-sudo = true
            "#,
        )
        .unwrap();
        assert_eq!(config.days_to_scan, 14);
        assert_eq!(config.compare_method, "md5");
        assert!(config.zfs.use_sudo);
        // unset fields keep their defaults
        assert_eq!(config.diff_context_size, 5);
        assert!(!config.zfs.mount_snapshots);
    }
}
