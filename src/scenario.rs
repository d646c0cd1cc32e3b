//! 场景运行
//!
//! 按配置构建拓扑、为每台主机调度发包活动、驱动调度器，最后汇总结果。

use serde::Serialize;
use tracing::info;

use crate::config::SimConfig;
use crate::error::BuildError;
use crate::net::{LinkId, LinkLoad, NetWorld, NodeId, PacketRecord, RoutingPolicy, RunSummary};
use crate::sim::{SimTime, Simulator};
use crate::topo::{self, Topology};

/// 单条链路的累计负载
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkLoadRecord {
    pub link: LinkId,
    pub a: NodeId,
    pub b: NodeId,
    pub failed: bool,
    pub load: LinkLoad,
}

/// 一次运行的完整结果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: SimConfig,
    pub summary: RunSummary,
    pub final_time: SimTime,
    pub events: u64,
    pub records: Vec<PacketRecord>,
    pub link_loads: Vec<LinkLoadRecord>,
}

/// 已构建、可运行的场景
pub struct Scenario {
    pub config: SimConfig,
    pub sim: Simulator,
    pub world: NetWorld,
    pub topo: Topology,
}

impl Scenario {
    /// 构建拓扑（含静态故障注入），尚未调度任何流量
    pub fn build(config: &SimConfig) -> Result<Self, BuildError> {
        let mut sim = Simulator::new(config.seed);
        let mut world = NetWorld::default();
        world.net.set_max_hops(config.max_hops);
        world.net.set_pkt_bytes(config.pkt_bytes);
        world.net.set_loop_capacity(config.loop_memory);
        world.net.set_policy(RoutingPolicy {
            fallback_budget: config.fallback_budget,
        });

        let topo = topo::build(config.topology, &mut sim, &mut world, &config.topo_opts())?;
        Ok(Self {
            config: config.clone(),
            sim,
            world,
            topo,
        })
    }

    /// 为每台主机调度 `packets_per_host` 个发包事件
    pub fn seed_traffic(&mut self) -> u64 {
        let count = self.config.packets_per_host;
        self.world.net.clear_loop_memory();
        let mut scheduled = 0;
        for &h in &self.topo.hosts {
            scheduled += self.world.net.start_traffic(h, count, &mut self.sim);
        }
        info!(hosts = self.topo.hosts.len(), scheduled, "流量已调度");
        scheduled
    }

    /// 驱动调度器，直到队列为空或到达时间上限
    pub fn run(&mut self) {
        match self.config.horizon() {
            Some(until) => self.sim.run_until(until, &mut self.world),
            None => self.sim.run(&mut self.world),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let net = &self.world.net;
        RunSummary::from_records(net.records(), net.stats.emitted, self.topo.counts(net))
    }

    pub fn into_report(self) -> RunReport {
        let summary = self.summary();
        let link_loads = self
            .world
            .net
            .links()
            .iter()
            .map(|l| LinkLoadRecord {
                link: l.id,
                a: l.ends[0].0,
                b: l.ends[1].0,
                failed: l.is_down(),
                load: l.load,
            })
            .collect();
        let records = self
            .world
            .net
            .records()
            .iter()
            .chain(self.world.net.in_flight_records())
            .cloned()
            .collect();
        RunReport {
            summary,
            final_time: self.sim.now(),
            events: self.sim.executed_events(),
            records,
            link_loads,
            config: self.config,
        }
    }
}

/// 构建、播种、运行并汇总
pub fn run(config: &SimConfig) -> Result<RunReport, BuildError> {
    let mut scenario = Scenario::build(config)?;
    scenario.seed_traffic();
    scenario.run();
    let report = scenario.into_report();
    info!(summary = %report.summary.one_line(), "运行结束");
    Ok(report)
}
