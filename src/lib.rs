//! Locate, diff and restore prior versions of a file from ZFS snapshots.
//!
//! A ZFS dataset mirrors every snapshot under `<mountpoint>/.zfs/snapshot/`,
//! so an older version of a file is just another path on disk. This crate
//! walks that snapshot history to find the versions of a file that actually
//! differ ([`scanner`]), computes positionally addressed deltas between a
//! snapshot version and the live file ([`diff`]) and re-applies those deltas
//! to the live file with verification and crash-safe backup semantics
//! ([`diff::patch`]).
//!
//! The `zrw` binary is a thin CLI front end over these pieces.

pub mod config;
pub mod diff;
pub mod error;
pub mod fs;
pub mod scanner;
pub mod zfs;

pub use error::{Error, Result};
