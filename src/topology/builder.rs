//! Topology construction.
//!
//! [`TopologyBuilder`] registers nodes and links, enforcing the
//! structural invariants (unique node names, unique interface names per
//! node) as each element is added, and freezes the graph on `build`.

use std::collections::HashMap;

use regex::Regex;

use super::types::{
    Endpoint, Host, Link, Router, RouterRole, Subnet, Switch, Topology, TopologyError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Router,
    Host,
    Switch,
}

/// Incremental builder for the node/link/subnet graph.
///
/// Node names become netns names, directory names and FRR hostnames, so
/// they are validated on registration. After [`build`](Self::build) the
/// builder is frozen and every further call fails with
/// [`TopologyError::Frozen`].
pub struct TopologyBuilder {
    routers: Vec<Router>,
    hosts: Vec<Host>,
    switches: Vec<Switch>,
    links: Vec<Link>,
    kinds: HashMap<String, NodeKind>,
    /// Interface names assigned so far, in order, keyed by node name.
    ifaces: HashMap<String, Vec<String>>,
    name_re: Regex,
    frozen: bool,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self {
            routers: Vec::new(),
            hosts: Vec::new(),
            switches: Vec::new(),
            links: Vec::new(),
            kinds: HashMap::new(),
            ifaces: HashMap::new(),
            name_re: Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("static pattern"),
            frozen: false,
        }
    }

    /// Register a host with a static address and default gateway.
    pub fn add_host(
        &mut self,
        name: &str,
        ip: &str,
        gateway: &str,
    ) -> Result<&Host, TopologyError> {
        self.register(name, NodeKind::Host)?;
        self.hosts.push(Host {
            name: name.to_string(),
            ip: ip.to_string(),
            gateway: gateway.to_string(),
        });
        let idx = self.hosts.len() - 1;
        Ok(&self.hosts[idx])
    }

    /// Register a router. Its interface list starts empty and grows as
    /// links are added.
    pub fn add_router(&mut self, name: &str, role: RouterRole) -> Result<&Router, TopologyError> {
        self.register(name, NodeKind::Router)?;
        self.routers.push(Router {
            name: name.to_string(),
            role,
            interfaces: Vec::new(),
        });
        let idx = self.routers.len() - 1;
        Ok(&self.routers[idx])
    }

    /// Register a switch, the hub of one subnet.
    pub fn add_switch(&mut self, name: &str) -> Result<&Switch, TopologyError> {
        self.register(name, NodeKind::Switch)?;
        self.switches.push(Switch {
            name: name.to_string(),
            interfaces: Vec::new(),
        });
        let idx = self.switches.len() - 1;
        Ok(&self.switches[idx])
    }

    /// Link two registered nodes.
    ///
    /// An endpoint without an explicit interface name gets
    /// `<node>-eth<N>` auto-assigned. Switch endpoints must be left
    /// unnamed: the emulation engine manages bridge membership from the
    /// auto-assigned names, and an explicit name on a switch breaks
    /// automatic bridging.
    pub fn add_link(
        &mut self,
        a: &str,
        b: &str,
        iface_a: Option<&str>,
        iface_b: Option<&str>,
    ) -> Result<Link, TopologyError> {
        self.ensure_unfrozen()?;
        for node in [a, b] {
            if !self.kinds.contains_key(node) {
                return Err(TopologyError::UnknownNode(node.to_string()));
            }
        }

        let iface_a = self.assign_interface(a, iface_a)?;
        let iface_b = self.assign_interface(b, iface_b)?;
        let link = Link {
            a: Endpoint {
                node: a.to_string(),
                iface: iface_a,
            },
            b: Endpoint {
                node: b.to_string(),
                iface: iface_b,
            },
        };
        self.links.push(link.clone());
        Ok(link)
    }

    /// Freeze the graph and hand it over.
    ///
    /// Interface lists are written back onto routers and switches, and
    /// subnets are derived from switch attachment. Any later mutation
    /// (including a second `build`) fails with [`TopologyError::Frozen`].
    pub fn build(&mut self) -> Result<Topology, TopologyError> {
        self.ensure_unfrozen()?;
        self.frozen = true;

        for router in &mut self.routers {
            router.interfaces = self.ifaces.remove(&router.name).unwrap_or_default();
        }
        for switch in &mut self.switches {
            switch.interfaces = self.ifaces.remove(&switch.name).unwrap_or_default();
        }

        let subnets = derive_subnets(&self.switches, &self.links, &self.kinds);

        Ok(Topology {
            routers: std::mem::take(&mut self.routers),
            hosts: std::mem::take(&mut self.hosts),
            switches: std::mem::take(&mut self.switches),
            links: std::mem::take(&mut self.links),
            subnets,
        })
    }

    fn ensure_unfrozen(&self) -> Result<(), TopologyError> {
        if self.frozen {
            Err(TopologyError::Frozen)
        } else {
            Ok(())
        }
    }

    fn register(&mut self, name: &str, kind: NodeKind) -> Result<(), TopologyError> {
        self.ensure_unfrozen()?;
        if !self.name_re.is_match(name) {
            return Err(TopologyError::InvalidName(name.to_string()));
        }
        if self.kinds.contains_key(name) {
            return Err(TopologyError::DuplicateName(name.to_string()));
        }
        self.kinds.insert(name.to_string(), kind);
        self.ifaces.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn assign_interface(
        &mut self,
        node: &str,
        explicit: Option<&str>,
    ) -> Result<String, TopologyError> {
        let used = self
            .ifaces
            .get_mut(node)
            .ok_or_else(|| TopologyError::UnknownNode(node.to_string()))?;

        let iface = match explicit {
            Some(name) => {
                if used.iter().any(|i| i.as_str() == name) {
                    return Err(TopologyError::DuplicateInterface {
                        node: node.to_string(),
                        iface: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => {
                let mut n = used.len();
                let mut candidate = format!("{node}-eth{n}");
                while used.iter().any(|i| *i == candidate) {
                    n += 1;
                    candidate = format!("{node}-eth{n}");
                }
                candidate
            }
        };
        used.push(iface.clone());
        Ok(iface)
    }
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A subnet is a switch, the routers directly linked to it, and the
/// hosts hanging off those routers.
fn derive_subnets(
    switches: &[Switch],
    links: &[Link],
    kinds: &HashMap<String, NodeKind>,
) -> Vec<Subnet> {
    switches
        .iter()
        .map(|switch| {
            let routers: Vec<String> = links
                .iter()
                .filter_map(|l| peer_of(l, &switch.name))
                .filter(|peer| kinds.get(peer.as_str()) == Some(&NodeKind::Router))
                .collect();
            let hosts: Vec<String> = links
                .iter()
                .filter_map(|l| {
                    let (x, y) = (&l.a.node, &l.b.node);
                    if routers.contains(x) && kinds.get(y.as_str()) == Some(&NodeKind::Host) {
                        Some(y.clone())
                    } else if routers.contains(y) && kinds.get(x.as_str()) == Some(&NodeKind::Host)
                    {
                        Some(x.clone())
                    } else {
                        None
                    }
                })
                .collect();
            Subnet {
                switch: switch.name.clone(),
                routers,
                hosts,
            }
        })
        .collect()
}

fn peer_of(link: &Link, node: &str) -> Option<String> {
    if link.a.node == node {
        Some(link.b.node.clone())
    } else if link.b.node == node {
        Some(link.a.node.clone())
    } else {
        None
    }
}
