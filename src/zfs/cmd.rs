use std::fmt;
use std::process::Command;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Seam over the `zfs` binary so the listing parsers can be tested without
/// a zfs installation.
pub trait ZfsCmd: fmt::Debug + Send + Sync {
    /// Run `zfs <args>` and return its stdout with the trailing newline
    /// stripped.
    fn exec(&self, args: &[&str]) -> Result<String>;
}

/// Executes the real `zfs` binary, optionally through sudo.
#[derive(Debug, Clone)]
pub struct SystemZfsCmd {
    use_sudo: bool,
}

impl SystemZfsCmd {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

impl ZfsCmd for SystemZfsCmd {
    fn exec(&self, args: &[&str]) -> Result<String> {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("zfs");
            cmd
        } else {
            Command::new("zfs")
        };
        cmd.args(args);

        debug!("execute: zfs {}", args.join(" "));
        let output = cmd.output().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::ZfsNotFound,
            _ => Error::Io(err),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr)
                .trim_end_matches('\n')
                .to_string();
            debug!("zfs command failed - stderr: '{stderr}'");
            return Err(Error::ZfsCommand { stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\n')
            .to_string())
    }
}

/// Canned command for tests: returns fixed output instead of shelling out.
#[derive(Debug, Clone)]
pub struct MockZfsCmd {
    stdout: String,
    stderr: Option<String>,
}

impl MockZfsCmd {
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: None,
        }
    }

    pub fn fail(stderr: &str) -> Self {
        Self {
            stdout: String::new(),
            stderr: Some(stderr.to_string()),
        }
    }
}

impl ZfsCmd for MockZfsCmd {
    fn exec(&self, args: &[&str]) -> Result<String> {
        trace!("would execute: zfs {}", args.join(" "));
        match &self.stderr {
            Some(stderr) => Err(Error::ZfsCommand {
                stderr: stderr.clone(),
            }),
            None => Ok(self.stdout.clone()),
        }
    }
}
