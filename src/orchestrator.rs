//! Network orchestration.
//!
//! Decides the generation policy, drives the provisioning pass over all
//! routers, and owns the run contract: once the network is brought up,
//! teardown executes exactly once on every exit path — normal session
//! exit, session error, or panic — before `run` returns.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use color_eyre::eyre::{Report, Result, WrapErr};
use log::{debug, info, warn};
use serde::Serialize;

use crate::confgen::{self, ConfigError, ConfigTemplate, GeneratedConfig};
use crate::engine::EmulationEngine;
use crate::lifecycle::{NodeLifecycle, RouterRuntime};
use crate::topology::Topology;

/// Decide whether router configs should be (re)generated.
///
/// An explicit request always wins. Otherwise regeneration happens only
/// when the config root is missing or empty — the first-run convenience —
/// and a warning points the operator at the explicit flag for later
/// regenerations.
pub fn decide_generation_policy(requested: bool, config_root: &Path) -> bool {
    if requested {
        return true;
    }
    let first_run = match fs::read_dir(config_root) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    };
    if first_run {
        warn!(
            "Config root '{}' is missing or empty; generating router configs. \
             Pass --generate-config to regenerate explicitly later.",
            config_root.display()
        );
        true
    } else {
        debug!(
            "Keeping existing router configs under '{}'",
            config_root.display()
        );
        false
    }
}

/// Outcome of one provisioning pass.
#[derive(Debug)]
pub struct ProvisionReport {
    pub generated: Vec<GeneratedConfig>,
    pub failures: Vec<(String, ConfigError)>,
}

impl ProvisionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Generate configuration for every router in the topology.
///
/// Hosts and switches carry no configuration and are skipped. A failure
/// on one router is recorded in the report and never aborts the pass
/// for its siblings.
pub fn provision(
    topology: &Topology,
    template: &ConfigTemplate,
    path_template: &str,
    regenerate: bool,
) -> ProvisionReport {
    let mut report = ProvisionReport {
        generated: Vec::new(),
        failures: Vec::new(),
    };
    if !regenerate {
        info!("Router config generation skipped");
        return report;
    }

    for router in topology.routers() {
        match confgen::generate(router, template, path_template) {
            Ok(config) => {
                for warning in &config.warnings {
                    warn!("Router '{}': {warning}", router.name());
                }
                report.generated.push(config);
            }
            Err(e) => {
                warn!("Provisioning router '{}' failed: {e}", router.name());
                report.failures.push((router.name().to_string(), e));
            }
        }
    }
    info!(
        "Generated configs for {} of {} routers",
        report.generated.len(),
        topology.routers().len()
    );
    report
}

#[derive(Serialize, Debug)]
pub struct RouterInfo {
    pub name: String,
    pub role: String,
    pub interfaces: Vec<String>,
    pub config_dir: PathBuf,
}

#[derive(Serialize, Debug)]
pub struct NodeRegistry {
    pub routers: Vec<RouterInfo>,
}

/// Write the router registry next to the generated configs so operators
/// and tooling can map router identity to config location.
pub fn write_node_registry(topology: &Topology, path_template: &str, path: &Path) -> Result<()> {
    let registry = NodeRegistry {
        routers: topology
            .routers()
            .iter()
            .map(|r| RouterInfo {
                name: r.name().to_string(),
                role: r.role().as_str().to_string(),
                interfaces: r.interfaces().to_vec(),
                config_dir: confgen::config_dir(path_template, r.name()),
            })
            .collect(),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&registry)?;
    fs::write(path, json)
        .wrap_err_with(|| format!("failed to write registry '{}'", path.display()))?;
    info!("Node registry written to '{}'", path.display());
    Ok(())
}

/// One node under orchestration: its lifecycle hooks plus the config
/// directory handed to `configure`.
pub struct NodeEntry {
    pub config_dir: PathBuf,
    pub node: Box<dyn NodeLifecycle>,
}

/// Drives the emulation engine and every router's lifecycle hooks.
pub struct Orchestrator<E: EmulationEngine> {
    engine: E,
    nodes: Vec<NodeEntry>,
}

impl<E: EmulationEngine> Orchestrator<E> {
    pub fn new(engine: E, nodes: Vec<NodeEntry>) -> Self {
        Self { engine, nodes }
    }

    /// Build an orchestrator with one [`RouterRuntime`] per router in
    /// the topology.
    pub fn for_topology(
        engine: E,
        topology: &Topology,
        path_template: &str,
        state_root: &Path,
    ) -> Self {
        let nodes = topology
            .routers()
            .iter()
            .map(|r| NodeEntry {
                config_dir: confgen::config_dir(path_template, r.name()),
                node: Box::new(RouterRuntime::new(r.name(), state_root)) as Box<dyn NodeLifecycle>,
            })
            .collect();
        Self::new(engine, nodes)
    }

    /// Bring the network up, run the session, and tear everything down.
    ///
    /// Teardown runs exactly once regardless of how the session ends:
    /// the running network is held by a guard whose drop performs the
    /// teardown if it has not already happened, so an unwinding session
    /// cannot leak daemons or namespaces.
    pub fn run<F>(&mut self, topology: &Topology, session: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        self.engine
            .build(topology)
            .wrap_err("emulation engine build failed")?;

        let mut net = RunningNetwork {
            engine: &mut self.engine,
            nodes: &mut self.nodes,
            stopped: false,
        };
        let outcome = net.start().and_then(|()| session());
        let errors = net.shutdown();
        if !errors.is_empty() {
            warn!("{} teardown error(s):", errors.len());
            for e in &errors {
                warn!("  {e:#}");
            }
        }
        outcome
    }
}

/// Scoped handle on the running network. `shutdown` is the single place
/// teardown happens; the `Drop` impl covers the unwinding path.
struct RunningNetwork<'a, E: EmulationEngine> {
    engine: &'a mut E,
    nodes: &'a mut Vec<NodeEntry>,
    stopped: bool,
}

impl<E: EmulationEngine> RunningNetwork<'_, E> {
    fn start(&mut self) -> Result<()> {
        self.engine
            .start()
            .wrap_err("emulation engine start failed")?;

        let mut failed = 0usize;
        for entry in self.nodes.iter_mut() {
            let up = entry
                .node
                .configure(&entry.config_dir)
                .and_then(|()| entry.node.start());
            if let Err(e) = up {
                failed += 1;
                warn!("Router '{}' failed to come up: {e}", entry.node.name());
            }
        }
        if failed > 0 {
            warn!(
                "{failed} of {} router(s) failed to come up; the rest continue",
                self.nodes.len()
            );
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Vec<Report> {
        if self.stopped {
            return Vec::new();
        }
        self.stopped = true;
        let started = Instant::now();

        let mut errors: Vec<Report> = Vec::new();
        for entry in self.nodes.iter_mut() {
            for e in entry.node.terminate() {
                errors.push(Report::new(e));
            }
        }
        errors.extend(self.engine.stop());

        info!("Network stopped in {:.2?}", started.elapsed());
        errors
    }
}

impl<E: EmulationEngine> Drop for RunningNetwork<'_, E> {
    fn drop(&mut self) {
        if !self.stopped {
            for e in self.shutdown() {
                warn!("Teardown (on drop): {e:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleError;
    use crate::topology::lab::ospf_lab;
    use color_eyre::eyre::eyre;
    use std::panic::AssertUnwindSafe;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<String>>>;

    struct RecordingEngine {
        events: Events,
    }

    impl EmulationEngine for RecordingEngine {
        fn build(&mut self, _topology: &Topology) -> Result<()> {
            self.events.lock().unwrap().push("engine:build".into());
            Ok(())
        }

        fn start(&mut self) -> Result<()> {
            self.events.lock().unwrap().push("engine:start".into());
            Ok(())
        }

        fn stop(&mut self) -> Vec<Report> {
            self.events.lock().unwrap().push("engine:stop".into());
            Vec::new()
        }
    }

    struct RecordingNode {
        name: String,
        events: Events,
        fail_configure: bool,
    }

    impl RecordingNode {
        fn entry(name: &str, events: &Events, fail_configure: bool) -> NodeEntry {
            NodeEntry {
                config_dir: PathBuf::from(format!("/cfg/{name}")),
                node: Box::new(RecordingNode {
                    name: name.to_string(),
                    events: events.clone(),
                    fail_configure,
                }),
            }
        }
    }

    impl NodeLifecycle for RecordingNode {
        fn name(&self) -> &str {
            &self.name
        }

        fn configure(&mut self, _config_dir: &Path) -> std::result::Result<(), LifecycleError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:configure", self.name));
            if self.fail_configure {
                return Err(LifecycleError::Context {
                    router: self.name.clone(),
                    reason: "injected failure".to_string(),
                });
            }
            Ok(())
        }

        fn start(&mut self) -> std::result::Result<(), LifecycleError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:start", self.name));
            Ok(())
        }

        fn terminate(&mut self) -> Vec<LifecycleError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:terminate", self.name));
            Vec::new()
        }
    }

    fn count(events: &Events, needle: &str) -> usize {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == needle)
            .count()
    }

    #[test]
    fn test_policy_explicit_request_always_regenerates() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("existing"), "x").unwrap();
        assert!(decide_generation_policy(true, tmp.path()));
    }

    #[test]
    fn test_policy_missing_root_regenerates() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(decide_generation_policy(false, &tmp.path().join("absent")));
    }

    #[test]
    fn test_policy_empty_root_regenerates() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(decide_generation_policy(false, tmp.path()));
    }

    #[test]
    fn test_policy_populated_root_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("R1")).unwrap();
        assert!(!decide_generation_policy(false, tmp.path()));
    }

    #[test]
    fn test_provision_skips_when_not_regenerating() {
        let tmp = tempfile::tempdir().unwrap();
        let template = ConfigTemplate::ensure_default(&tmp.path().join("template")).unwrap();
        let topo = ospf_lab().unwrap();
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());

        let report = provision(&topo, &template, &path_template, false);
        assert!(report.generated.is_empty());
        assert!(report.is_clean());
        assert!(!tmp.path().join("configs").exists());
    }

    #[test]
    fn test_provision_covers_every_router() {
        let tmp = tempfile::tempdir().unwrap();
        let template = ConfigTemplate::ensure_default(&tmp.path().join("template")).unwrap();
        let topo = ospf_lab().unwrap();
        let path_template = format!("{}/configs/{{name}}", tmp.path().display());

        let report = provision(&topo, &template, &path_template, true);
        assert!(report.is_clean());
        assert_eq!(report.generated.len(), 9);
        for router in topo.routers() {
            assert!(tmp
                .path()
                .join("configs")
                .join(router.name())
                .join("frr.conf")
                .exists());
        }
    }

    #[test]
    fn test_provision_isolates_per_router_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let template = ConfigTemplate::ensure_default(&tmp.path().join("template")).unwrap();
        let topo = ospf_lab().unwrap();
        let configs = tmp.path().join("configs");
        fs::create_dir_all(&configs).unwrap();
        // A plain file where R1's directory should go makes R1 fail.
        fs::write(configs.join("R1"), "in the way").unwrap();
        let path_template = format!("{}/{{name}}", configs.display());

        let report = provision(&topo, &template, &path_template, true);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "R1");
        assert_eq!(report.generated.len(), 8);
    }

    #[test]
    fn test_registry_lists_every_router() {
        let tmp = tempfile::tempdir().unwrap();
        let topo = ospf_lab().unwrap();
        let path = tmp.path().join("configs/lab_registry.json");
        write_node_registry(&topo, "frr-config/{name}", &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let routers = value["routers"].as_array().unwrap();
        assert_eq!(routers.len(), 9);
        assert_eq!(routers[0]["name"], "R1");
        assert_eq!(routers[0]["role"], "backbone");
        assert_eq!(routers[0]["config_dir"], "frr-config/R1");
    }

    #[test]
    fn test_run_tears_down_once_on_clean_exit() {
        let events: Events = Arc::default();
        let engine = RecordingEngine {
            events: events.clone(),
        };
        let nodes = vec![
            RecordingNode::entry("R1", &events, false),
            RecordingNode::entry("R2", &events, false),
        ];
        let topo = ospf_lab().unwrap();

        let mut orch = Orchestrator::new(engine, nodes);
        orch.run(&topo, || Ok(())).unwrap();

        let log = events.lock().unwrap().clone();
        assert_eq!(
            log,
            [
                "engine:build",
                "engine:start",
                "R1:configure",
                "R1:start",
                "R2:configure",
                "R2:start",
                "R1:terminate",
                "R2:terminate",
                "engine:stop",
            ]
        );
    }

    #[test]
    fn test_run_tears_down_once_when_session_fails() {
        let events: Events = Arc::default();
        let engine = RecordingEngine {
            events: events.clone(),
        };
        let nodes = vec![RecordingNode::entry("R1", &events, false)];
        let topo = ospf_lab().unwrap();

        let mut orch = Orchestrator::new(engine, nodes);
        let outcome = orch.run(&topo, || Err(eyre!("session blew up")));

        assert!(outcome.is_err());
        assert_eq!(count(&events, "engine:stop"), 1);
        assert_eq!(count(&events, "R1:terminate"), 1);
    }

    #[test]
    fn test_run_tears_down_once_when_session_panics() {
        let events: Events = Arc::default();
        let engine = RecordingEngine {
            events: events.clone(),
        };
        let nodes = vec![RecordingNode::entry("R1", &events, false)];
        let topo = ospf_lab().unwrap();

        let mut orch = Orchestrator::new(engine, nodes);
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = orch.run(&topo, || panic!("session panicked"));
        }));

        assert!(result.is_err());
        assert_eq!(count(&events, "engine:stop"), 1);
        assert_eq!(count(&events, "R1:terminate"), 1);
    }

    #[test]
    fn test_run_isolates_router_startup_failures() {
        let events: Events = Arc::default();
        let engine = RecordingEngine {
            events: events.clone(),
        };
        let nodes = vec![
            RecordingNode::entry("R1", &events, true),
            RecordingNode::entry("R2", &events, false),
        ];
        let topo = ospf_lab().unwrap();

        let mut orch = Orchestrator::new(engine, nodes);
        orch.run(&topo, || Ok(())).unwrap();

        // R1's failure never reached R2, and both were torn down.
        assert_eq!(count(&events, "R2:start"), 1);
        assert_eq!(count(&events, "R1:terminate"), 1);
        assert_eq!(count(&events, "R2:terminate"), 1);
    }
}
