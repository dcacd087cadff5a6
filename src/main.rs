use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};

use ospflab::confgen::{self, ConfigTemplate};
use ospflab::engine::CommandEngine;
use ospflab::orchestrator::{self, Orchestrator};
use ospflab::topology::lab;

/// Destination for each router's generated config; `{name}` is the
/// router's identity.
const CONFIG_PATH_TEMPLATE: &str = "frr-config/{name}";

/// Shared read-only template copied into every router's directory.
const TEMPLATE_DIR: &str = "templates/router";

/// Per-router execution-context state (netns run/log dirs).
const STATE_ROOT: &str = "/tmp/ospflab";

/// External emulation engine expected on PATH; it receives the manifest
/// path as its only argument and tears the fabric down on SIGTERM.
const ENGINE_PROGRAM: &str = "ospflab-fabric";

const MANIFEST_FILE: &str = "lab_manifest.yaml";
const REGISTRY_FILE: &str = "lab_registry.json";

/// Provisioning and lifecycle utility for reproducible FRR OSPF lab networks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Generate router config files. This will overwrite existing files
    #[arg(short, long)]
    generate_config: bool,

    /// Print detailed logs during network creation and stop
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Building the OSPF lab topology");
    let started = Instant::now();
    let topology = lab::ospf_lab().wrap_err("failed to build the lab topology")?;
    info!(
        "Topology ready in {:.2?}: {} routers, {} hosts, {} switches",
        started.elapsed(),
        topology.routers().len(),
        topology.hosts().len(),
        topology.switches().len()
    );

    let template = ConfigTemplate::ensure_default(Path::new(TEMPLATE_DIR))
        .wrap_err("failed to prepare the config template")?;
    let config_root = confgen::config_root(CONFIG_PATH_TEMPLATE);

    let regenerate = orchestrator::decide_generation_policy(args.generate_config, &config_root);
    let report = orchestrator::provision(&topology, &template, CONFIG_PATH_TEMPLATE, regenerate);
    if !report.is_clean() {
        warn!(
            "{} router(s) failed to provision; their daemons will not come up cleanly",
            report.failures.len()
        );
    }
    orchestrator::write_node_registry(
        &topology,
        CONFIG_PATH_TEMPLATE,
        &config_root.join(REGISTRY_FILE),
    )?;

    let engine = CommandEngine::new(ENGINE_PROGRAM, config_root.join(MANIFEST_FILE));
    let mut orch = Orchestrator::for_topology(
        engine,
        &topology,
        CONFIG_PATH_TEMPLATE,
        Path::new(STATE_ROOT),
    );
    orch.run(&topology, interactive_session)
}

/// Hold the network up until the operator exits. Thin by design: the
/// real interaction surface is vtysh inside each router's context.
fn interactive_session() -> Result<()> {
    println!("OSPF lab is running. Type 'exit' or Ctrl-D to stop the network.");
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("ospflab> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        match line.trim() {
            "exit" | "quit" => break,
            "" => {}
            other => println!("unknown command '{other}' (try 'exit')"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_defaults() {
        let args = Args::parse_from(["ospflab"]);
        assert!(!args.generate_config);
        assert!(!args.verbose);
    }

    #[test]
    fn test_cli_parsing_flags() {
        let args = Args::parse_from(["ospflab", "--generate-config", "-v"]);
        assert!(args.generate_config);
        assert!(args.verbose);
    }
}
