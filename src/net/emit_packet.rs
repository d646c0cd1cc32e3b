//! 主机发包事件

use std::net::Ipv4Addr;

use super::id::NodeId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：主机 `host` 向 `dst` 发出一个新数据包。
#[derive(Debug)]
pub struct EmitPacket {
    pub host: NodeId,
    pub dst: Ipv4Addr,
}

impl Event for EmitPacket {
    #[tracing::instrument(skip(self, sim, world), fields(host = ?self.host, dst = %self.dst))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let w = world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .expect("world must be NetWorld");
        w.net.emit(self.host, self.dst, sim);
    }
}
