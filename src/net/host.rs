//! 主机节点
//!
//! 主机产生流量（发包活动）并记录送达。主机不重传：丢失/丢弃对发送方而言是终态。

use std::net::Ipv4Addr;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::emit_packet::EmitPacket;
use super::id::{NodeId, PortIdx};
use super::network::Network;
use super::node::{Interfaces, Node, NodeKind, Routable, Schedulable};
use super::packet::{DropReason, Packet, PacketStatus};
use crate::sim::{SimTime, Simulator};

/// 一次送达记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub pkt_id: u64,
    pub src: Ipv4Addr,
    pub at: SimTime,
    pub hops: u32,
}

/// 主机节点
#[derive(Debug)]
pub struct Host {
    id: NodeId,
    name: String,
    addr: Ipv4Addr,
    ifaces: Interfaces,
    sent: u64,
    arrivals: Vec<Arrival>,
}

impl Host {
    /// 创建新主机（单端口）
    pub fn new(id: NodeId, name: impl Into<String>, addr: Ipv4Addr) -> Self {
        Self {
            id,
            name: name.into(),
            addr,
            ifaces: Interfaces::with_limit(Some(1)),
            sent: 0,
            arrivals: Vec::new(),
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn arrivals(&self) -> &[Arrival] {
        &self.arrivals
    }

    /// 调度一次发包活动：`count` 个发送事件，间隔 `interval`，
    /// 每个目的地址从 `targets` 中（排除自身）均匀随机选择。返回实际调度的数量。
    #[tracing::instrument(skip(self, targets, interval, sim), fields(host = %self.name, interval = ?interval))]
    pub fn generate(
        &self,
        count: u64,
        targets: &[Ipv4Addr],
        interval: SimTime,
        sim: &mut Simulator,
    ) -> u64 {
        let others: Vec<Ipv4Addr> = targets.iter().copied().filter(|a| *a != self.addr).collect();
        if others.is_empty() {
            warn!("没有其他主机可作为目的地，跳过发包");
            return 0;
        }
        for i in 0..count {
            let Some(&dst) = others.choose(sim.rng()) else {
                break;
            };
            sim.schedule_in(interval.saturating_mul(i), EmitPacket { host: self.id, dst });
        }
        debug!(count, "发包活动已调度");
        count
    }

    /// 创建数据包并从唯一的端口发出
    pub fn emit(&mut self, dst: Ipv4Addr, sim: &mut Simulator, net: &mut Network) {
        let pkt = net.make_packet(self.id, self.addr, dst, sim.now());
        self.sent += 1;
        debug!(host = %self.name, pkt_id = pkt.id, dst = %dst, "📤 主机发包");
        self.ifaces.forward(self.id, pkt, None, sim, net);
    }
}

impl Schedulable for Host {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, pkt, sim, net), fields(node_name = %self.name(), node_id = ?self.id(), pkt_id = pkt.id))]
    fn on_packet(&mut self, pkt: Packet, _ingress: PortIdx, sim: &mut Simulator, net: &mut Network) {
        if pkt.dst != self.addr {
            debug!(dst = %pkt.dst, "目的地址不是本主机，丢弃");
            net.finish(pkt, PacketStatus::Dropped(DropReason::Misdelivered), sim.now());
            return;
        }

        info!(hops = pkt.hops, t = sim.now().0, "✅ 数据包送达");
        self.arrivals.push(Arrival {
            pkt_id: pkt.id,
            src: pkt.src,
            at: sim.now(),
            hops: pkt.hops,
        });
        net.finish(pkt, PacketStatus::Delivered, sim.now());
    }
}

impl Routable for Host {
    fn interfaces(&self) -> &Interfaces {
        &self.ifaces
    }

    fn interfaces_mut(&mut self) -> &mut Interfaces {
        &mut self.ifaces
    }
}

impl Node for Host {
    fn kind(&self) -> NodeKind {
        NodeKind::Host
    }

    fn address(&self) -> Option<Ipv4Addr> {
        Some(self.addr)
    }

    fn as_host(&self) -> Option<&Host> {
        Some(self)
    }

    fn as_host_mut(&mut self) -> Option<&mut Host> {
        Some(self)
    }
}
