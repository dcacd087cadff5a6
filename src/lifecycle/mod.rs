//! Router control-plane lifecycle.
//!
//! Each router runs four FRR daemons inside its own execution context.
//! This module owns the lifecycle hooks the network runner drives
//! (configure, start, terminate), the daemon set and its launch order,
//! and the execution-context abstraction. Lifecycle failures are scoped
//! to one router: a daemon that fails to launch never aborts sibling
//! routers, and termination is best-effort across all four daemons.

pub mod context;
pub mod daemons;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use log::{debug, info};

// Re-export key types for easier access
pub use context::ExecutionContext;
pub use daemons::Daemon;

/// How long to wait for zebra's API socket before giving up on a router.
pub const BASE_MANAGER_TIMEOUT: Duration = Duration::from_secs(5);

const BASE_MANAGER_POLL: Duration = Duration::from_millis(100);

/// Errors raised while managing one router's control plane.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("execution context failure for router '{router}': {reason}")]
    Context { router: String, reason: String },

    #[error("failed to launch {daemon} for router '{router}': {reason}")]
    Launch {
        router: String,
        daemon: &'static str,
        reason: String,
    },

    #[error("failed to signal {daemon} (pid {pid}) for router '{router}': {reason}")]
    Termination {
        router: String,
        daemon: &'static str,
        pid: u32,
        reason: String,
    },
}

/// Lifecycle hooks of one node in the running network.
///
/// The network runner calls `configure` and `start` while bringing the
/// network up and `terminate` while tearing it down. `terminate` is
/// best-effort and idempotent: it returns every error it encountered
/// instead of stopping at the first one, and terminating a node with
/// nothing running (or one that was never configured) succeeds.
pub trait NodeLifecycle {
    fn name(&self) -> &str;

    /// Prepare the node's execution context and record where its
    /// generated configuration lives.
    fn configure(&mut self, config_dir: &Path) -> Result<(), LifecycleError>;

    /// Launch the node's long-lived processes.
    fn start(&mut self) -> Result<(), LifecycleError>;

    /// Signal every process and release the execution context.
    fn terminate(&mut self) -> Vec<LifecycleError>;
}

/// [`NodeLifecycle`] implementation for a lab router: four FRR daemons
/// in a private netns, IPv4 forwarding enabled.
#[derive(Debug)]
pub struct RouterRuntime {
    name: String,
    state_root: PathBuf,
    context: Option<ExecutionContext>,
    config_dir: Option<PathBuf>,
    base_timeout: Duration,
}

impl RouterRuntime {
    pub fn new(name: &str, state_root: &Path) -> Self {
        Self {
            name: name.to_string(),
            state_root: state_root.to_path_buf(),
            context: None,
            config_dir: None,
            base_timeout: BASE_MANAGER_TIMEOUT,
        }
    }

    fn launch(
        &self,
        ctx: &ExecutionContext,
        daemon: Daemon,
        config_dir: &Path,
    ) -> Result<(), LifecycleError> {
        let mut cmd = ctx.command(&daemon.binary());
        cmd.args(daemon.args(config_dir, &ctx.run_dir()));
        let output = cmd.output().map_err(|e| LifecycleError::Launch {
            router: self.name.clone(),
            daemon: daemon.process_name(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(LifecycleError::Launch {
                router: self.name.clone(),
                daemon: daemon.process_name(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        debug!("Launched {} for router '{}'", daemon.process_name(), self.name);
        Ok(())
    }

    /// Block until zebra's API socket appears in the context's run dir.
    /// The protocol daemons register their routes through that socket,
    /// so launching them earlier would be fire-and-forget.
    fn wait_for_base_manager(&self, ctx: &ExecutionContext) -> Result<(), LifecycleError> {
        let socket = daemons::zserv_socket(&ctx.run_dir());
        let deadline = Instant::now() + self.base_timeout;
        while !socket.exists() {
            if Instant::now() >= deadline {
                return Err(LifecycleError::Launch {
                    router: self.name.clone(),
                    daemon: Daemon::Zebra.process_name(),
                    reason: format!(
                        "API socket '{}' did not appear within {:?}",
                        socket.display(),
                        self.base_timeout
                    ),
                });
            }
            std::thread::sleep(BASE_MANAGER_POLL);
        }
        Ok(())
    }
}

impl NodeLifecycle for RouterRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, config_dir: &Path) -> Result<(), LifecycleError> {
        let ctx = ExecutionContext::acquire(&self.name, &self.state_root)?;

        let output = ctx
            .command(Path::new("sysctl"))
            .args(["-w", "net.ipv4.ip_forward=1"])
            .output()
            .map_err(|e| LifecycleError::Context {
                router: self.name.clone(),
                reason: format!("cannot run sysctl: {e}"),
            })?;
        if !output.status.success() {
            return Err(LifecycleError::Context {
                router: self.name.clone(),
                reason: format!(
                    "enabling IPv4 forwarding failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        self.context = Some(ctx);
        self.config_dir = Some(config_dir.to_path_buf());
        Ok(())
    }

    fn start(&mut self) -> Result<(), LifecycleError> {
        let ctx = self.context.as_ref().ok_or_else(|| LifecycleError::Context {
            router: self.name.clone(),
            reason: "start called before configure".to_string(),
        })?;
        let config_dir = self.config_dir.clone().ok_or_else(|| LifecycleError::Context {
            router: self.name.clone(),
            reason: "no config directory recorded".to_string(),
        })?;

        // The base manager first; protocol daemons only once it listens.
        self.launch(ctx, Daemon::Zebra, &config_dir)?;
        self.wait_for_base_manager(ctx)?;
        for daemon in &Daemon::ALL[1..] {
            self.launch(ctx, *daemon, &config_dir)?;
        }

        info!(
            "Router '{}' control plane is up ({} daemons)",
            self.name,
            Daemon::ALL.len()
        );
        Ok(())
    }

    fn terminate(&mut self) -> Vec<LifecycleError> {
        let mut errors = Vec::new();
        let Some(mut ctx) = self.context.take() else {
            // Nothing was ever acquired; terminating is a no-op.
            return errors;
        };

        match ctx.pids() {
            Ok(pids) => {
                for pid in pids {
                    // A pid that vanished between listing and inspection
                    // simply isn't running anymore.
                    let Ok(comm) = fs::read_to_string(format!("/proc/{pid}/comm")) else {
                        continue;
                    };
                    let comm = comm.trim();
                    let Some(daemon) = Daemon::ALL.iter().find(|d| d.process_name() == comm)
                    else {
                        continue;
                    };
                    if let Err(reason) = signal_term(pid) {
                        errors.push(LifecycleError::Termination {
                            router: self.name.clone(),
                            daemon: daemon.process_name(),
                            pid,
                            reason,
                        });
                    } else {
                        debug!("Signaled {} (pid {pid}) on router '{}'", comm, self.name);
                    }
                }
            }
            Err(e) => errors.push(e),
        }

        // Release only after every daemon name has been processed.
        if let Err(e) = ctx.release() {
            errors.push(e);
        }
        errors
    }
}

/// Send SIGTERM to `pid`. A process that is already gone counts as
/// success, which keeps termination idempotent.
fn signal_term(pid: u32) -> Result<(), String> {
    let output = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .output()
        .map_err(|e| e.to_string())?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("No such process") {
        Ok(())
    } else {
        Err(stderr.trim().to_string())
    }
}
