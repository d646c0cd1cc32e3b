//! Fat-tree 拓扑构建
//!
//! k 个 pod，每个 pod 有 k/2 台 edge 和 k/2 台 aggregation 交换机；(k/2)² 台 core 交换机；
//! 每台 edge 下挂 k/2 台主机。
//!
//! 地址与子网：
//! - 主机 `10.pod.edge.(h+2)`，主机端口 `0.0.0.0/0`
//! - edge：面向主机 `/32`，上行 `0.0.0.0/0`
//! - aggregation：面向 edge `10.pod.edge.0/24`，上行 `0.0.0.0/0`
//! - core：面向 pod `10.pod.0.0/16`

use std::net::Ipv4Addr;

use tracing::info;

use super::{Topology, TopologyKind, TopoOpts, inject_link_failures};
use crate::error::BuildError;
use crate::net::{NetWorld, NodeId, Subnet};
use crate::sim::Simulator;

const NAME: &str = "fat-tree";

/// 检查 k：偶数、>= 2，且 pod 编号能放进一个地址字节
pub fn validate_k(k: usize) -> Result<(), BuildError> {
    if k < 2 || k % 2 != 0 {
        return Err(BuildError::InvalidK {
            topology: NAME,
            k,
            stage: "validate",
        });
    }
    if k > 254 {
        return Err(BuildError::InvalidK {
            topology: NAME,
            k,
            stage: "addressing",
        });
    }
    Ok(())
}

pub fn host_addr(pod: usize, edge: usize, host: usize) -> Ipv4Addr {
    Ipv4Addr::new(10, pod as u8, edge as u8, (host + 2) as u8)
}

pub fn build_fat_tree(
    sim: &mut Simulator,
    world: &mut NetWorld,
    opts: &TopoOpts,
) -> Result<Topology, BuildError> {
    let k = opts.k;
    validate_k(k)?;
    opts.validate()?;

    let half = k / 2;
    let spec = opts.link_spec();
    let net = &mut world.net;

    let mut core_switches = Vec::with_capacity(half * half);
    for group in 0..half {
        for index in 0..half {
            let name = format!("c{}_{}", group, index);
            core_switches.push(net.add_switch(name, Some(k)));
        }
    }

    let mut hosts = Vec::with_capacity(k * half * half);
    let mut edge_switches = Vec::with_capacity(k * half);
    let mut agg_switches = Vec::with_capacity(k * half);
    let mut pod_edges: Vec<Vec<NodeId>> = Vec::with_capacity(k);
    let mut pod_aggs: Vec<Vec<NodeId>> = Vec::with_capacity(k);

    for pod in 0..k {
        let mut edges = Vec::with_capacity(half);
        let mut aggs = Vec::with_capacity(half);

        for edge in 0..half {
            edges.push(net.add_switch(format!("p{}_e{}", pod, edge), Some(k)));
        }
        for agg in 0..half {
            aggs.push(net.add_switch(format!("p{}_a{}", pod, agg), Some(k)));
        }

        for (edge_idx, &edge_id) in edges.iter().enumerate() {
            for host in 0..half {
                let addr = host_addr(pod, edge_idx, host);
                let host_id = net.add_host(format!("h{}_{}_{}", pod, edge_idx, host), addr)?;
                net.connect(host_id, edge_id, spec)?;
                net.assign_subnet_towards(host_id, edge_id, Subnet::DEFAULT_ROUTE)?;
                net.assign_subnet_towards(edge_id, host_id, Subnet::host(addr))?;
                hosts.push(host_id);
            }
        }

        edge_switches.extend(edges.iter().copied());
        agg_switches.extend(aggs.iter().copied());
        pod_edges.push(edges);
        pod_aggs.push(aggs);
    }

    for pod in 0..k {
        for edge in 0..half {
            let edge_id = pod_edges[pod][edge];
            let down = Subnet::new(Ipv4Addr::new(10, pod as u8, edge as u8, 0), 24)?;
            for &agg_id in &pod_aggs[pod] {
                net.connect(edge_id, agg_id, spec)?;
                net.assign_subnet_towards(edge_id, agg_id, Subnet::DEFAULT_ROUTE)?;
                net.assign_subnet_towards(agg_id, edge_id, down)?;
            }
        }
    }

    for pod in 0..k {
        let pod_subnet = Subnet::new(Ipv4Addr::new(10, pod as u8, 0, 0), 16)?;
        for agg in 0..half {
            let agg_id = pod_aggs[pod][agg];
            for index in 0..half {
                let core_id = core_switches[agg * half + index];
                net.connect(agg_id, core_id, spec)?;
                net.assign_subnet_towards(agg_id, core_id, Subnet::DEFAULT_ROUTE)?;
                net.assign_subnet_towards(core_id, agg_id, pod_subnet)?;
            }
        }
    }

    net.finalize(NAME)?;
    let failed_links = inject_link_failures(net, opts.link_failure_percent, sim.rng())?;

    info!(
        k,
        core = core_switches.len(),
        agg = agg_switches.len(),
        edge = edge_switches.len(),
        hosts = hosts.len(),
        failed_links = failed_links.len(),
        "Fat-tree 拓扑摘要"
    );

    Ok(Topology {
        kind: TopologyKind::FatTree,
        k,
        hosts,
        edge_switches,
        agg_switches,
        core_switches,
        failed_links,
    })
}
