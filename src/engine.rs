//! External emulation-engine boundary.
//!
//! The virtual link fabric (veths, bridges, host addressing) is owned by
//! an external engine; this crate only hands it a topology manifest and
//! drives its lifetime. The module holds the trait seam the orchestrator
//! runs against, the YAML manifest types, and [`CommandEngine`], which
//! drives an engine binary as a child process.

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use crate::topology::Topology;

/// The external collaborator that realizes virtual links and bridges.
///
/// `stop` is best-effort: it returns every error it encountered instead
/// of failing fast, so teardown always runs to completion.
pub trait EmulationEngine {
    /// Hand the frozen topology to the engine.
    fn build(&mut self, topology: &Topology) -> Result<()>;

    /// Bring the link fabric up.
    fn start(&mut self) -> Result<()>;

    /// Tear the link fabric down, collecting rather than raising errors.
    fn stop(&mut self) -> Vec<Report>;
}

#[derive(Serialize, Debug)]
struct ManifestRouter {
    name: String,
    role: &'static str,
    interfaces: Vec<String>,
}

#[derive(Serialize, Debug)]
struct ManifestHost {
    name: String,
    ip: String,
    gateway: String,
}

#[derive(Serialize, Debug)]
struct ManifestLink {
    node_a: String,
    iface_a: String,
    node_b: String,
    iface_b: String,
}

/// Engine-facing description of the lab, serialized to YAML.
#[derive(Serialize, Debug)]
pub struct LabManifest {
    routers: Vec<ManifestRouter>,
    hosts: Vec<ManifestHost>,
    switches: Vec<String>,
    links: Vec<ManifestLink>,
}

impl LabManifest {
    pub fn from_topology(topology: &Topology) -> Self {
        Self {
            routers: topology
                .routers()
                .iter()
                .map(|r| ManifestRouter {
                    name: r.name().to_string(),
                    role: r.role().as_str(),
                    interfaces: r.interfaces().to_vec(),
                })
                .collect(),
            hosts: topology
                .hosts()
                .iter()
                .map(|h| ManifestHost {
                    name: h.name.clone(),
                    ip: h.ip.clone(),
                    gateway: h.gateway.clone(),
                })
                .collect(),
            switches: topology
                .switches()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            links: topology
                .links()
                .iter()
                .map(|l| ManifestLink {
                    node_a: l.a.node.clone(),
                    iface_a: l.a.iface.clone(),
                    node_b: l.b.node.clone(),
                    iface_b: l.b.iface.clone(),
                })
                .collect(),
        }
    }
}

/// Serialize the topology manifest to `path`.
pub fn write_manifest(topology: &Topology, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create '{}'", parent.display()))?;
    }
    let manifest = LabManifest::from_topology(topology);
    let yaml = serde_yaml::to_string(&manifest)?;
    fs::write(path, yaml)
        .wrap_err_with(|| format!("failed to write manifest '{}'", path.display()))?;
    debug!("Wrote topology manifest to '{}'", path.display());
    Ok(())
}

/// [`EmulationEngine`] implementation that runs an external engine
/// binary: the manifest path is its only argument, it holds the fabric
/// up for as long as it runs, and it tears down on SIGTERM.
pub struct CommandEngine {
    program: PathBuf,
    manifest_path: PathBuf,
    child: Option<Child>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            manifest_path: manifest_path.into(),
            child: None,
        }
    }
}

impl EmulationEngine for CommandEngine {
    fn build(&mut self, topology: &Topology) -> Result<()> {
        write_manifest(topology, &self.manifest_path)
    }

    fn start(&mut self) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg(&self.manifest_path)
            .spawn()
            .wrap_err_with(|| {
                format!("failed to spawn emulation engine '{}'", self.program.display())
            })?;

        // Surface an engine that died during its own bring-up instead of
        // pretending the fabric exists.
        if let Some(status) = child.try_wait().wrap_err("engine status check failed")? {
            return Err(eyre!(
                "emulation engine '{}' exited immediately with {status}",
                self.program.display()
            ));
        }

        info!(
            "Emulation engine '{}' running (pid {})",
            self.program.display(),
            child.id()
        );
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) -> Vec<Report> {
        let mut errors = Vec::new();
        let Some(mut child) = self.child.take() else {
            return errors;
        };

        let pid = child.id();
        let term = Command::new("kill").args(["-TERM", &pid.to_string()]).output();
        match term {
            Ok(output) if !output.status.success() => {
                errors.push(eyre!(
                    "signaling engine (pid {pid}) failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }
            Err(e) => errors.push(eyre!("cannot signal engine (pid {pid}): {e}")),
            Ok(_) => {}
        }

        match child.wait() {
            Ok(status) => debug!("Emulation engine exited with {status}"),
            Err(e) => errors.push(eyre!("waiting for engine exit failed: {e}")),
        }
        errors
    }
}
