//! 简化两层（leaf–spine）拓扑构建
//!
//! k 台 leaf，每台下挂 k/2 台主机并连到全部 k/2 台 spine。
//! 主机 `10.leaf.0.(h+2)`；leaf 面向主机 `/32`、上行 `0.0.0.0/0`；spine 面向 leaf `10.leaf.0.0/16`。

use std::net::Ipv4Addr;

use tracing::info;

use super::{Topology, TopologyKind, TopoOpts, inject_link_failures};
use crate::error::BuildError;
use crate::net::{NetWorld, Subnet};
use crate::sim::Simulator;

const NAME: &str = "two-tier";

pub fn build_two_tier(
    sim: &mut Simulator,
    world: &mut NetWorld,
    opts: &TopoOpts,
) -> Result<Topology, BuildError> {
    let k = opts.k;
    if k < 2 || k % 2 != 0 || k > 254 {
        return Err(BuildError::InvalidK {
            topology: NAME,
            k,
            stage: "validate",
        });
    }
    opts.validate()?;

    let half = k / 2;
    let spec = opts.link_spec();
    let net = &mut world.net;

    let spines: Vec<_> = (0..half)
        .map(|s| net.add_switch(format!("s{}", s), Some(k)))
        .collect();

    let mut leaves = Vec::with_capacity(k);
    let mut hosts = Vec::with_capacity(k * half);
    for leaf in 0..k {
        let leaf_id = net.add_switch(format!("l{}", leaf), Some(k));
        for h in 0..half {
            let addr = Ipv4Addr::new(10, leaf as u8, 0, (h + 2) as u8);
            let host_id = net.add_host(format!("h{}_{}", leaf, h), addr)?;
            net.connect(host_id, leaf_id, spec)?;
            net.assign_subnet_towards(host_id, leaf_id, Subnet::DEFAULT_ROUTE)?;
            net.assign_subnet_towards(leaf_id, host_id, Subnet::host(addr))?;
            hosts.push(host_id);
        }

        let leaf_subnet = Subnet::new(Ipv4Addr::new(10, leaf as u8, 0, 0), 16)?;
        for &spine_id in &spines {
            net.connect(leaf_id, spine_id, spec)?;
            net.assign_subnet_towards(leaf_id, spine_id, Subnet::DEFAULT_ROUTE)?;
            net.assign_subnet_towards(spine_id, leaf_id, leaf_subnet)?;
        }
        leaves.push(leaf_id);
    }

    net.finalize(NAME)?;
    let failed_links = inject_link_failures(net, opts.link_failure_percent, sim.rng())?;

    info!(
        k,
        spines = spines.len(),
        leaves = leaves.len(),
        hosts = hosts.len(),
        failed_links = failed_links.len(),
        "两层拓扑摘要"
    );

    Ok(Topology {
        kind: TopologyKind::TwoTier,
        k,
        hosts,
        edge_switches: leaves,
        agg_switches: Vec::new(),
        core_switches: spines,
        failed_links,
    })
}
