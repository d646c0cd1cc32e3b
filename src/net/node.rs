//! 节点能力
//!
//! 用两个能力 trait 取代"节点 → 网络节点 → 主机/交换机"的继承层次：
//! `Schedulable`（能接收定时送达的数据包）和 `Routable`（拥有端口、能转发）。
//! 主机和交换机各自组合这两种能力。

use std::net::Ipv4Addr;

use super::host::Host;
use super::id::{NodeId, PortIdx};
use super::network::Network;
use super::packet::{Hop, Packet, PacketStatus};
use super::port::Port;
use super::routing::{Egress, ForwardingTable, select_egress};
use crate::error::BuildError;
use crate::sim::Simulator;
use tracing::{debug, trace};

/// 节点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Host,
    Switch,
}

/// 能接收定时事件（数据包到达）的能力
pub trait Schedulable: Send {
    /// 获取节点标识符
    fn id(&self) -> NodeId;

    /// 获取节点名称
    fn name(&self) -> &str;

    /// 处理从 `ingress` 端口到达的数据包
    fn on_packet(&mut self, pkt: Packet, ingress: PortIdx, sim: &mut Simulator, net: &mut Network);
}

/// 拥有端口、能转发数据包的能力
pub trait Routable {
    fn interfaces(&self) -> &Interfaces;
    fn interfaces_mut(&mut self) -> &mut Interfaces;

    fn ports(&self) -> &[Port] {
        &self.interfaces().ports
    }
}

/// 网络中的节点：两种能力的组合
pub trait Node: Schedulable + Routable {
    fn kind(&self) -> NodeKind;

    /// 节点地址（只有主机有）
    fn address(&self) -> Option<Ipv4Addr> {
        None
    }

    fn as_host(&self) -> Option<&Host> {
        None
    }

    fn as_host_mut(&mut self) -> Option<&mut Host> {
        None
    }
}

/// 节点的端口集合及由其子网分配派生的转发表
#[derive(Debug, Clone, Default)]
pub struct Interfaces {
    pub(crate) ports: Vec<Port>,
    table: ForwardingTable,
    max_ports: Option<usize>,
}

impl Interfaces {
    pub fn with_limit(max_ports: Option<usize>) -> Self {
        Self {
            ports: Vec::new(),
            table: ForwardingTable::default(),
            max_ports,
        }
    }

    pub fn max_ports(&self) -> Option<usize> {
        self.max_ports
    }

    pub fn table(&self) -> &ForwardingTable {
        &self.table
    }

    pub(crate) fn attach(&mut self, owner: &str, port: Port) -> Result<PortIdx, BuildError> {
        if let Some(limit) = self.max_ports {
            if self.ports.len() >= limit {
                return Err(BuildError::PortLimitExceeded {
                    node: owner.to_string(),
                    limit,
                });
            }
        }
        self.ports.push(port);
        Ok(PortIdx(self.ports.len() - 1))
    }

    pub(crate) fn port_mut(&mut self, idx: PortIdx) -> Option<&mut Port> {
        self.ports.get_mut(idx.0)
    }

    pub(crate) fn rebuild_table(&mut self) {
        self.table = ForwardingTable::from_ports(&self.ports);
    }

    pub(crate) fn clear_loop_memory(&mut self) {
        for port in &mut self.ports {
            port.loop_memory.clear();
        }
    }

    /// 选出端口并把数据包交给其链路；无法转发时让数据包进入终态。
    #[tracing::instrument(skip_all, fields(node = ?owner, pkt_id = pkt.id, hops = pkt.hops))]
    pub fn forward(
        &mut self,
        owner: NodeId,
        mut pkt: Packet,
        ingress: Option<PortIdx>,
        sim: &mut Simulator,
        net: &mut Network,
    ) {
        let policy = net.policy();
        let egress = {
            let links = net.links();
            select_egress(
                &self.table,
                &self.ports,
                |l| links[l.0].is_down(),
                &mut pkt,
                ingress,
                policy,
                sim.rng(),
            )
        };

        match egress {
            Egress::Forward(cand) => {
                let idx = cand.port();
                let port = &mut self.ports[idx.0];
                port.loop_memory.remember(pkt.id);
                let link = port.link;
                pkt.record_hop(Hop {
                    node: owner,
                    port: idx,
                    link,
                });
                if cand.is_fallback() {
                    debug!(port = %idx, "↪️  经回退端口转发");
                }
                trace!(t = sim.now().0, port = %idx, link = ?link, "forward");
                net.transmit(owner, link, pkt, sim);
            }
            Egress::Lost(cause) => net.finish(pkt, PacketStatus::Lost(cause), sim.now()),
            Egress::Dropped(reason) => net.finish(pkt, PacketStatus::Dropped(reason), sim.now()),
        }
    }
}
