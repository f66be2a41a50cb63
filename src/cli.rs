use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "zrw",
    version,
    about = "Find, diff and restore file versions from ZFS snapshots"
)]
pub struct Cli {
    /// Use sudo when executing 'zfs' commands
    #[arg(long, global = true)]
    pub use_sudo: bool,

    /// Mount snapshots on demand (only needed when zfs does not auto-mount them)
    #[arg(long, global = true)]
    pub mount_snapshots: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// List snapshots where the file has a different version
    List {
        file: PathBuf,

        /// Days to scan backwards from today
        #[arg(short, long)]
        days: Option<i64>,

        /// Compare method: size, mtime, size+mtime, content, md5 or auto
        #[arg(short = 'm', long)]
        compare_method: Option<String>,
    },

    /// Show the differences between a version and the live file
    Diff {
        file: PathBuf,

        /// Version from the last 'list' run: index or snapshot name
        version: String,

        /// Context lines around each change
        #[arg(short, long)]
        context: Option<usize>,
    },

    /// Revert the live file to a version via the patch engine
    Revert {
        file: PathBuf,

        /// Version from the last 'list' run: index or snapshot name
        version: String,

        /// Revert only the hunk with this index (counted as shown by 'diff')
        #[arg(long)]
        hunk: Option<usize>,
    },

    /// Restore a whole file from a snapshot
    Restore {
        file: PathBuf,

        /// Version from the last 'list' run: index or snapshot name
        version: String,
    },
}
