//! 拓扑构建
//!
//! 各构建器负责创建节点、链路并为每个端口分配子网，最后可按比例静态注入链路故障。

pub mod fat_tree;
pub mod simple_star;
pub mod two_tier;

use std::net::Ipv4Addr;

use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BuildError;
use crate::net::{LinkId, LinkSpec, NetWorld, Network, NodeId, TopologyCounts};
use crate::sim::{SimTime, Simulator};

/// 拓扑种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyKind {
    #[default]
    FatTree,
    TwoTier,
    SimpleStar,
}

impl TopologyKind {
    pub fn label(&self) -> &'static str {
        match self {
            TopologyKind::FatTree => "fat-tree",
            TopologyKind::TwoTier => "two-tier",
            TopologyKind::SimpleStar => "simple-star",
        }
    }
}

/// 构建选项
#[derive(Debug, Clone)]
pub struct TopoOpts {
    /// 每台交换机的端口数
    pub k: usize,
    pub link_gbps: u64,
    pub link_latency: SimTime,
    /// 构建时静态故障的链路比例（0–100）
    pub link_failure_percent: f64,
    /// 每次传输失败的概率
    pub drop_prob: f64,
}

impl Default for TopoOpts {
    fn default() -> Self {
        Self {
            k: 4,
            link_gbps: 100,
            link_latency: SimTime::from_micros(2),
            link_failure_percent: 0.0,
            drop_prob: 0.0,
        }
    }
}

impl TopoOpts {
    pub fn validate(&self) -> Result<(), BuildError> {
        if !(0.0..=100.0).contains(&self.link_failure_percent) {
            return Err(BuildError::InvalidFailurePercent(self.link_failure_percent));
        }
        if !(0.0..=1.0).contains(&self.drop_prob) {
            return Err(BuildError::InvalidDropProbability(self.drop_prob));
        }
        Ok(())
    }

    pub fn link_spec(&self) -> LinkSpec {
        LinkSpec {
            latency: self.link_latency,
            bandwidth_bps: self.link_gbps.saturating_mul(1_000_000_000),
            failure_prob: self.drop_prob,
        }
    }
}

/// 构建完成的拓扑：各层节点以及静态故障的链路
#[derive(Debug, Clone)]
pub struct Topology {
    pub kind: TopologyKind,
    pub k: usize,
    pub hosts: Vec<NodeId>,
    /// 两层拓扑中为 leaf
    pub edge_switches: Vec<NodeId>,
    pub agg_switches: Vec<NodeId>,
    /// 两层拓扑中为 spine
    pub core_switches: Vec<NodeId>,
    pub failed_links: Vec<LinkId>,
}

impl Topology {
    fn half(&self) -> usize {
        self.k / 2
    }

    /// 以下索引方法只对 fat-tree 有意义
    pub fn host(&self, pod: usize, edge: usize, host: usize) -> NodeId {
        let half = self.half();
        let idx = (pod * half + edge) * half + host;
        self.hosts[idx]
    }

    pub fn edge(&self, pod: usize, edge: usize) -> NodeId {
        self.edge_switches[pod * self.half() + edge]
    }

    pub fn agg(&self, pod: usize, agg: usize) -> NodeId {
        self.agg_switches[pod * self.half() + agg]
    }

    pub fn core(&self, group: usize, index: usize) -> NodeId {
        self.core_switches[group * self.half() + index]
    }

    pub fn switch_count(&self) -> usize {
        self.edge_switches.len() + self.agg_switches.len() + self.core_switches.len()
    }

    /// 主机地址枚举（与 `hosts` 顺序一致）
    pub fn host_addresses(&self, net: &Network) -> Vec<(NodeId, Ipv4Addr)> {
        self.hosts
            .iter()
            .filter_map(|&h| Some((h, net.host(h)?.addr())))
            .collect()
    }

    pub fn counts(&self, net: &Network) -> TopologyCounts {
        TopologyCounts {
            hosts: self.hosts.len(),
            switches: self.switch_count(),
            links: net.links().len(),
            failed_links: self.failed_links.len(),
        }
    }
}

/// 每条链路以 `percent / 100` 的概率独立地静态置为故障（按链路 id 顺序抽样）。
pub fn inject_link_failures<R: Rng + ?Sized>(
    net: &mut Network,
    percent: f64,
    rng: &mut R,
) -> Result<Vec<LinkId>, BuildError> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(BuildError::InvalidFailurePercent(percent));
    }
    if percent == 0.0 {
        return Ok(Vec::new());
    }
    let p = percent / 100.0;
    let ids: Vec<LinkId> = net.links().iter().map(|l| l.id).collect();
    let mut failed = Vec::new();
    for id in ids {
        if rng.gen_bool(p) {
            if let Some(link) = net.link_mut(id) {
                link.fail();
                failed.push(id);
            }
        }
    }
    info!(
        percent,
        failed = failed.len(),
        total = net.links().len(),
        "链路故障注入完成"
    );
    Ok(failed)
}

/// 按种类构建拓扑
pub fn build(
    kind: TopologyKind,
    sim: &mut Simulator,
    world: &mut NetWorld,
    opts: &TopoOpts,
) -> Result<Topology, BuildError> {
    match kind {
        TopologyKind::FatTree => fat_tree::build_fat_tree(sim, world, opts),
        TopologyKind::TwoTier => two_tier::build_two_tier(sim, world, opts),
        TopologyKind::SimpleStar => simple_star::build_simple_star(sim, world, opts),
    }
}
