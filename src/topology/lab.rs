//! The fixed OSPF lab topology.
//!
//! Three star subnets (one switch, one backbone router, two edge routers
//! each serving one host) joined by a full triangular mesh of direct
//! backbone links. The asymmetry — star subnets, mesh backbone — is what
//! the protocol convergence behavior under test depends on, so the shape
//! is pinned here rather than configurable.

use super::builder::TopologyBuilder;
use super::types::{RouterRole, Topology, TopologyError};

/// Number of star subnets in the lab.
pub const SUBNET_COUNT: u32 = 3;

/// Edge routers (and therefore hosts) per subnet.
pub const EDGES_PER_SUBNET: u32 = 2;

/// Build the lab graph: `SUBNET_COUNT` star subnets plus the backbone
/// mesh. Subnet `i` addresses its hosts out of `172.(15+i).0.0/16`.
pub fn ospf_lab() -> Result<Topology, TopologyError> {
    let mut builder = TopologyBuilder::new();

    for i in 1..=SUBNET_COUNT {
        let net = 15 + i;
        let backbone = format!("R{i}");
        let switch = format!("S{i}");
        builder.add_router(&backbone, RouterRole::Backbone)?;
        builder.add_switch(&switch)?;

        // Star: every router in the subnet hangs off the switch. The
        // switch side of each link is left unnamed so the engine can
        // manage bridge membership from the auto-assigned names.
        builder.add_link(&switch, &backbone, None, Some(&format!("{backbone}-eth0")))?;

        for j in 1..=EDGES_PER_SUBNET {
            let edge = format!("R{i}_{j}");
            let host = format!("C{i}_{j}");
            builder.add_router(&edge, RouterRole::Edge)?;
            builder.add_host(
                &host,
                &format!("172.{net}.{j}.2/24"),
                &format!("172.{net}.{j}.1"),
            )?;
            builder.add_link(&switch, &edge, None, Some(&format!("{edge}-eth0")))?;
            builder.add_link(&host, &edge, None, Some(&format!("{edge}-eth1")))?;
        }
    }

    // Full mesh among the three backbone routers.
    builder.add_link("R1", "R2", Some("R1-eth1"), Some("R2-eth1"))?;
    builder.add_link("R1", "R3", Some("R1-eth2"), Some("R3-eth1"))?;
    builder.add_link("R2", "R3", Some("R2-eth2"), Some("R3-eth2"))?;

    builder.build()
}
