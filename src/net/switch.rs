//! 交换机节点
//!
//! 多端口，按最窄子网转发，ECMP 选择，并在环路/链路故障时回退。

use super::id::{NodeId, PortIdx};
use super::network::Network;
use super::node::{Interfaces, Node, NodeKind, Routable, Schedulable};
use super::packet::Packet;
use crate::sim::Simulator;
use tracing::{debug, trace};

/// 交换机节点
#[derive(Debug)]
pub struct Switch {
    id: NodeId,
    name: String,
    ifaces: Interfaces,
}

impl Switch {
    /// 创建新交换机；`max_ports` 为 None 时端口数不受限
    pub fn new(id: NodeId, name: impl Into<String>, max_ports: Option<usize>) -> Self {
        Self {
            id,
            name: name.into(),
            ifaces: Interfaces::with_limit(max_ports),
        }
    }
}

impl Schedulable for Switch {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, pkt, sim, net), fields(node_name = %self.name(), node_id = ?self.id(), pkt_id = pkt.id))]
    fn on_packet(&mut self, pkt: Packet, ingress: PortIdx, sim: &mut Simulator, net: &mut Network) {
        debug!("🔀 Switch 处理数据包");
        trace!(dst = %pkt.dst, hops = pkt.hops, "数据包信息");
        self.ifaces.forward(self.id, pkt, Some(ingress), sim, net);
    }
}

impl Routable for Switch {
    fn interfaces(&self) -> &Interfaces {
        &self.ifaces
    }

    fn interfaces_mut(&mut self) -> &mut Interfaces {
        &mut self.ifaces
    }
}

impl Node for Switch {
    fn kind(&self) -> NodeKind {
        NodeKind::Switch
    }
}
