//! Per-router execution contexts.
//!
//! An execution context is an isolated environment — a network namespace
//! plus private run/log state directories — in which one router's
//! daemons live. Acquisition and release are scoped: a context that is
//! still active when dropped is released best-effort.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use super::LifecycleError;

/// Prefix for lab-owned network namespaces.
pub const NETNS_PREFIX: &str = "ospflab-";

/// Scoped handle on one router's isolated environment.
#[derive(Debug)]
pub struct ExecutionContext {
    router: String,
    netns: String,
    state_dir: PathBuf,
    active: bool,
}

impl ExecutionContext {
    /// Create the namespace and private state directories for `router`.
    ///
    /// A stale namespace left over from an earlier run is removed first,
    /// so acquisition is reproducible across crashed sessions.
    pub fn acquire(router: &str, state_root: &Path) -> Result<Self, LifecycleError> {
        let netns = format!("{NETNS_PREFIX}{router}");
        let state_dir = state_root.join(router);

        for sub in ["run", "log"] {
            let dir = state_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| LifecycleError::Context {
                router: router.to_string(),
                reason: format!("cannot create state dir '{}': {e}", dir.display()),
            })?;
        }

        // Best-effort cleanup of a namespace from a previous run.
        let _ = Command::new("ip").args(["netns", "del", &netns]).output();

        let output = Command::new("ip")
            .args(["netns", "add", &netns])
            .output()
            .map_err(|e| LifecycleError::Context {
                router: router.to_string(),
                reason: format!("cannot run 'ip netns add': {e}"),
            })?;
        if !output.status.success() {
            return Err(LifecycleError::Context {
                router: router.to_string(),
                reason: format!(
                    "'ip netns add {netns}' failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        debug!("Acquired execution context '{netns}' for router '{router}'");
        Ok(Self {
            router: router.to_string(),
            netns,
            state_dir,
            active: true,
        })
    }

    pub fn router(&self) -> &str {
        &self.router
    }

    pub fn netns(&self) -> &str {
        &self.netns
    }

    /// Private runtime-state directory (pid files, API sockets).
    pub fn run_dir(&self) -> PathBuf {
        self.state_dir.join("run")
    }

    /// Private log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("log")
    }

    /// Build a command that executes `program` inside this context.
    pub fn command(&self, program: &Path) -> Command {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "exec", &self.netns]).arg(program);
        cmd
    }

    /// Process ids currently running inside this context.
    pub fn pids(&self) -> Result<Vec<u32>, LifecycleError> {
        let output = Command::new("ip")
            .args(["netns", "pids", &self.netns])
            .output()
            .map_err(|e| LifecycleError::Context {
                router: self.router.clone(),
                reason: format!("cannot run 'ip netns pids': {e}"),
            })?;
        if !output.status.success() {
            return Err(LifecycleError::Context {
                router: self.router.clone(),
                reason: format!(
                    "'ip netns pids {}' failed: {}",
                    self.netns,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(parse_pids(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Tear the namespace down. Idempotent: releasing an already
    /// released context is a no-op.
    pub fn release(&mut self) -> Result<(), LifecycleError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let output = Command::new("ip")
            .args(["netns", "del", &self.netns])
            .output()
            .map_err(|e| LifecycleError::Context {
                router: self.router.clone(),
                reason: format!("cannot run 'ip netns del': {e}"),
            })?;
        if !output.status.success() {
            return Err(LifecycleError::Context {
                router: self.router.clone(),
                reason: format!(
                    "'ip netns del {}' failed: {}",
                    self.netns,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        debug!("Released execution context '{}'", self.netns);
        Ok(())
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.release() {
                warn!("Best-effort release of '{}' failed: {e}", self.netns);
            }
        }
    }
}

/// Parse the whitespace-separated pid list printed by `ip netns pids`.
pub fn parse_pids(output: &str) -> Vec<u32> {
    output
        .split_whitespace()
        .filter_map(|tok| tok.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pids() {
        assert_eq!(parse_pids("101\n202\n303\n"), vec![101, 202, 303]);
        assert_eq!(parse_pids(""), Vec::<u32>::new());
        assert_eq!(parse_pids("  41  \n"), vec![41]);
    }

    #[test]
    fn test_parse_pids_skips_garbage() {
        assert_eq!(parse_pids("12\nnot-a-pid\n34\n"), vec![12, 34]);
    }
}
