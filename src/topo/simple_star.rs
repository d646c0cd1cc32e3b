//! 简单星形拓扑
//!
//! ```text
//!  H1 ─┐            ┌─ H3
//!      E1 ── C ── E2
//!  H2 ─┘            └─ H4
//! ```
//!
//! E1–C 是瓶颈链路（带宽为其他链路的 1/10）。不使用 k。

use std::net::Ipv4Addr;

use tracing::info;

use super::{Topology, TopologyKind, TopoOpts, inject_link_failures};
use crate::error::BuildError;
use crate::net::{LinkSpec, NetWorld, Subnet};
use crate::sim::Simulator;

const NAME: &str = "simple-star";

pub fn build_simple_star(
    sim: &mut Simulator,
    world: &mut NetWorld,
    opts: &TopoOpts,
) -> Result<Topology, BuildError> {
    opts.validate()?;
    let spec = opts.link_spec();
    let bottleneck = LinkSpec {
        bandwidth_bps: (spec.bandwidth_bps / 10).max(1),
        ..spec
    };
    let net = &mut world.net;

    let addrs = [
        ("H1", Ipv4Addr::new(10, 1, 1, 1)),
        ("H2", Ipv4Addr::new(10, 1, 1, 2)),
        ("H3", Ipv4Addr::new(10, 2, 1, 1)),
        ("H4", Ipv4Addr::new(10, 2, 1, 2)),
    ];
    let mut hosts = Vec::with_capacity(addrs.len());
    for (name, addr) in addrs {
        hosts.push(net.add_host(name, addr)?);
    }

    let e1 = net.add_switch("E1", Some(3));
    let e2 = net.add_switch("E2", Some(3));
    let core = net.add_switch("C", Some(2));

    let left = Subnet::new(Ipv4Addr::new(10, 1, 0, 0), 16)?;
    let right = Subnet::new(Ipv4Addr::new(10, 2, 0, 0), 16)?;

    for (i, &h) in hosts.iter().enumerate() {
        let edge = if i < 2 { e1 } else { e2 };
        net.connect(h, edge, spec)?;
        net.assign_subnet_towards(h, edge, Subnet::DEFAULT_ROUTE)?;
        net.assign_subnet_towards(edge, h, Subnet::host(addrs[i].1))?;
    }

    net.connect(e1, core, bottleneck)?;
    net.connect(e2, core, spec)?;
    net.assign_subnet_towards(e1, core, right)?;
    net.assign_subnet_towards(e2, core, left)?;
    net.assign_subnet_towards(core, e1, left)?;
    net.assign_subnet_towards(core, e2, right)?;

    net.finalize(NAME)?;
    let failed_links = inject_link_failures(net, opts.link_failure_percent, sim.rng())?;
    info!(failed_links = failed_links.len(), "星形拓扑构建完成");

    Ok(Topology {
        kind: TopologyKind::SimpleStar,
        k: 0,
        hosts,
        edge_switches: vec![e1, e2],
        agg_switches: Vec::new(),
        core_switches: vec![core],
        failed_links,
    })
}
