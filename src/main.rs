mod cache;
mod cli;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use zfs_rewind::config::{self, Config};
use zfs_rewind::diff;
use zfs_rewind::fs::{self, BackupLocation, FileHandle};
use zfs_rewind::scanner::{CompareMethod, DateRange, FileVersion, Scanner};
use zfs_rewind::zfs::Zfs;

use crate::cli::{Action, Cli};

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = config::load_config();
    if cli.use_sudo {
        config.zfs.use_sudo = true;
    }
    if cli.mount_snapshots {
        config.zfs.mount_snapshots = true;
    }

    let result = match cli.action {
        Action::List {
            ref file,
            days,
            ref compare_method,
        } => list(&config, file, days, compare_method.as_deref()),
        Action::Diff {
            ref file,
            ref version,
            context,
        } => show_diff(&config, file, version, context),
        Action::Revert {
            ref file,
            ref version,
            hunk,
        } => revert(&config, file, version, hunk),
        Action::Restore {
            ref file,
            ref version,
        } => restore(&config, file, version),
    };

    if let Err(err) = result {
        eprintln!("zrw: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zfs_rewind=warn")),
        1 => EnvFilter::new("zfs_rewind=debug"),
        _ => EnvFilter::new("zfs_rewind=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn list(config: &Config, file: &Path, days: Option<i64>, compare_method: Option<&str>) -> Result<()> {
    let file = absolute(file)?;
    let (zfs, dataset) = Zfs::for_file_path(&file, &config.zfs)?;

    let days = days.unwrap_or(config.days_to_scan);
    let method: CompareMethod = compare_method.unwrap_or(&config.compare_method).parse()?;
    let range = DateRange::n_days_back(days, Utc::now());

    let scanner = Scanner::new(range, method, &dataset, &zfs)
        .mount_snapshots(config.zfs.mount_snapshots);
    let result = scanner.find_file_versions(&file)?;

    if let Err(err) = cache::cache_file_versions(&result.file_versions) {
        eprintln!("zrw: unable to cache the scan result: {err}");
    }

    if result.file_versions.is_empty() {
        println!("no other file versions found in the last {days} days");
        return Ok(());
    }

    let width = result
        .file_versions
        .iter()
        .map(|v| v.snapshot.name.len())
        .max()
        .unwrap_or(0)
        .max("Snapshot".len());
    let header = format!("{:>3} | {:<width$} | {}", "#", "Snapshot", "Snapshot age");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for (idx, version) in result.file_versions.iter().enumerate() {
        let age = human_duration(Utc::now() - version.snapshot.created);
        println!("{idx:>3} | {:<width$} | {age}", version.snapshot.name);
    }
    Ok(())
}

fn show_diff(config: &Config, file: &Path, version: &str, context: Option<usize>) -> Result<()> {
    let file = absolute(file)?;
    let version = lookup_requested_version(version)?;
    let context = context.unwrap_or(config.diff_context_size);

    let result = diff::compute_diff_from_paths(&version.backup.path, &file, context)?;
    if result.line_deltas.is_empty() {
        println!(
            "no differences to the version from snapshot {}",
            version.snapshot.name
        );
        return Ok(());
    }

    println!(
        "Diff between the live file and the version from: {}",
        version.backup.mtime.format("%Y-%m-%d %H:%M:%S")
    );
    print!("{}", diff::pretty_text(&result.line_deltas));
    Ok(())
}

fn revert(config: &Config, file: &Path, version: &str, hunk: Option<usize>) -> Result<()> {
    let file = absolute(file)?;
    let version = lookup_requested_version(version)?;
    let live = FileHandle::new(&file)?;

    let from_text = version.backup.read_string()?;
    let target_text = live.read_string()?;

    match hunk {
        None => {
            let result = diff::compute_diff(&from_text, &target_text, 0);
            diff::apply_deltas(&live, &result.line_deltas)?;
            println!(
                "reverted '{}' to the version from snapshot {}",
                live.name, version.snapshot.name
            );
        }
        Some(idx) => {
            let result = diff::compute_diff(&from_text, &target_text, config.diff_context_size);
            let hunks = diff::split_into_hunks(&result.line_deltas);
            let selected = hunks
                .get(idx)
                .ok_or_else(|| anyhow!("no hunk with index {idx} - {} hunks found", hunks.len()))?;
            diff::apply_deltas(&live, selected)?;
            println!("reverted hunk {idx} of '{}'", live.name);
        }
    }
    Ok(())
}

fn restore(config: &Config, file: &Path, version: &str) -> Result<()> {
    let file = absolute(file)?;
    let version = lookup_requested_version(version)?;
    let live = FileHandle::new(&file)?;

    let location = if config.use_cache_dir_for_backups {
        BackupLocation::CacheMirror
    } else {
        BackupLocation::Sibling
    };
    let backup_path = fs::backup(&live, location)?;
    println!(
        "backup of the live version created at: {}",
        backup_path.display()
    );

    version.backup.copy_as(&file)?;
    println!(
        "restored '{}' from snapshot {}",
        live.name, version.snapshot.name
    );
    Ok(())
}

/// Resolve a version argument from the last cached scan: either a plain
/// index or a snapshot name.
fn lookup_requested_version(arg: &str) -> Result<FileVersion> {
    let versions = cache::load_cached_file_versions()?;

    if let Ok(idx) = arg.parse::<usize>() {
        return versions
            .get(idx)
            .cloned()
            .ok_or_else(|| anyhow!("invalid version index: {idx}"));
    }
    versions
        .into_iter()
        .find(|v| v.snapshot.name == arg)
        .ok_or_else(|| anyhow!("requested version not found: {arg}"))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

fn human_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds();
    if secs < 60 {
        return format!("{secs} seconds");
    }
    let mins = duration.num_minutes();
    if mins < 60 {
        return format!("{mins} minutes");
    }
    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{hours} hours");
    }
    format!("{} days", hours / 24)
}
