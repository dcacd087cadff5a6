//! Topology type definitions.
//!
//! Node, link and subnet types making up the frozen lab graph produced
//! by the builder. All structural invariants (name uniqueness, interface
//! uniqueness per node) are enforced at construction time; a `Topology`
//! value is immutable evidence that they hold.

use std::fmt;

/// Errors raised while constructing a topology.
///
/// All of these are fatal to the build step that raised them: a topology
/// that violates a structural invariant is unsound and must not be
/// handed to the emulation engine.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("duplicate node name '{0}'")]
    DuplicateName(String),

    #[error("link endpoint references unknown node '{0}'")]
    UnknownNode(String),

    #[error("interface '{iface}' is already assigned on node '{node}'")]
    DuplicateInterface { node: String, iface: String },

    #[error("invalid node name '{0}' (expected [A-Za-z][A-Za-z0-9_-]*)")]
    InvalidName(String),

    #[error("topology is frozen and can no longer be modified")]
    Frozen,
}

/// Role a router plays in the lab network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterRole {
    /// Transit router on the backbone mesh.
    Backbone,
    /// Router connecting a subnet switch to its attached hosts.
    Edge,
}

impl RouterRole {
    pub fn as_str(self) -> &'static str {
        match self {
            RouterRole::Backbone => "backbone",
            RouterRole::Edge => "edge",
        }
    }
}

impl fmt::Display for RouterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A router node. Interfaces are assigned through the builder and listed
/// in assignment order; the router's private configuration directory is
/// derived from its name by the config generator.
#[derive(Debug, Clone)]
pub struct Router {
    pub(super) name: String,
    pub(super) role: RouterRole,
    pub(super) interfaces: Vec<String>,
}

impl Router {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> RouterRole {
        self.role
    }

    /// Interface names in assignment order.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }
}

/// A host node with a static address. Immutable once created.
#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    /// Address with prefix length, e.g. `172.16.1.2/24`.
    pub ip: String,
    /// Default gateway address.
    pub gateway: String,
}

/// A switch node, the hub of one subnet.
#[derive(Debug, Clone)]
pub struct Switch {
    pub(super) name: String,
    pub(super) interfaces: Vec<String>,
}

impl Switch {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }
}

/// One side of a link: a node plus the interface name assigned on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub node: String,
    pub iface: String,
}

/// An ordered pair of endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub a: Endpoint,
    pub b: Endpoint,
}

impl Link {
    /// Returns the interface name this link assigns on `node`, if any.
    pub fn iface_on(&self, node: &str) -> Option<&str> {
        if self.a.node == node {
            Some(&self.a.iface)
        } else if self.b.node == node {
            Some(&self.b.iface)
        } else {
            None
        }
    }
}

/// One switch plus the routers and hosts attached to it. The backbone is
/// a separate mesh of direct router-router links and has no subnet.
#[derive(Debug, Clone)]
pub struct Subnet {
    pub switch: String,
    pub routers: Vec<String>,
    pub hosts: Vec<String>,
}

/// The frozen node/link/subnet graph.
///
/// Produced once by [`TopologyBuilder::build`](super::TopologyBuilder::build);
/// no mutation is possible afterwards.
#[derive(Debug)]
pub struct Topology {
    pub(super) routers: Vec<Router>,
    pub(super) hosts: Vec<Host>,
    pub(super) switches: Vec<Switch>,
    pub(super) links: Vec<Link>,
    pub(super) subnets: Vec<Subnet>,
}

impl Topology {
    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn router(&self, name: &str) -> Option<&Router> {
        self.routers.iter().find(|r| r.name == name)
    }
}
