//! 数据包到达事件
//!
//! 链路传输完成后，在到达时刻把数据包交给对端节点。

use super::id::{NodeId, PortIdx};
use super::net_world::NetWorld;
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};
use tracing::{debug, trace};

/// 事件：把一个 packet 从 `ingress` 端口交给某个节点处理。
#[derive(Debug)]
pub struct DeliverPacket {
    pub to: NodeId,
    pub ingress: PortIdx,
    pub pkt: Packet,
}

impl Event for DeliverPacket {
    #[tracing::instrument(skip(self, sim, world), fields(pkt_id = self.pkt.id, to = ?self.to))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { to, ingress, pkt } = *self;

        debug!(
            t = sim.now().0,
            dst = %pkt.dst,
            hops = pkt.hops,
            ingress = %ingress,
            "📨 数据包到达节点"
        );

        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.deliver(to, ingress, pkt, sim);

        trace!("DeliverPacket::execute 完成");
    }
}
