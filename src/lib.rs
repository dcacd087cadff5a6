//! # Ospflab - Provisioning utility for reproducible FRR OSPF lab networks
//!
//! This library builds a reproducible multi-router test network for
//! exercising link-state routing: a fixed topology of routers, switches
//! and hosts, per-router FRR configuration generated from a shared
//! template, and managed lifecycles for the control-plane daemons that
//! run inside each router's isolated execution context.
//!
//! ## Overview
//!
//! The lab is three star subnets — one switch, one backbone router, two
//! edge routers each serving a host — joined by a full mesh of direct
//! backbone links. That asymmetry (star subnets, mesh backbone) drives
//! the convergence behavior under test, so the shape is pinned in code.
//!
//! The network-emulation engine that realizes virtual links and bridges
//! is an external collaborator behind the [`engine::EmulationEngine`]
//! trait; the FRR daemons are opaque long-lived processes that are only
//! launched and signaled, never spoken to.
//!
//! ## Architecture
//!
//! - `topology`: node/link/subnet graph, builder invariants, lab shape
//! - `confgen`: shared template and per-router config materialization
//! - `lifecycle`: execution contexts, the FRR daemon set, router hooks
//! - `engine`: emulation-engine trait seam and topology manifest
//! - `orchestrator`: generation policy, provisioning pass, run contract
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ospflab::confgen::{self, ConfigTemplate};
//! use ospflab::topology::lab;
//!
//! let topology = lab::ospf_lab()?;
//! let template = ConfigTemplate::ensure_default("templates/router".as_ref())?;
//! for router in topology.routers() {
//!     confgen::generate(router, &template, "frr-config/{name}")?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Construction-time topology errors abort the build. Per-router
//! provisioning and lifecycle errors are isolated and aggregated into
//! reports for operator-visible logging. Application-level wiring uses
//! `color_eyre` for error context; module-level errors are `thiserror`
//! enums.

pub mod confgen;
pub mod engine;
pub mod lifecycle;
pub mod orchestrator;
pub mod topology;
