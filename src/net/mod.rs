//! 网络模拟模块
//!
//! 此模块包含网络模拟的核心组件，如地址、端口、节点、链路、数据包和路由。

// 子模块声明
mod addr;
mod deliver_packet;
mod emit_packet;
mod host;
mod id;
mod link;
mod net_world;
mod network;
mod node;
mod packet;
mod port;
mod routing;
mod stats;
mod switch;

// 重新导出公共接口
pub use addr::{AddrParseError, Subnet};
pub use deliver_packet::DeliverPacket;
pub use emit_packet::EmitPacket;
pub use host::{Arrival, Host};
pub use id::{LinkId, NodeId, PortIdx};
pub use link::{Link, LinkLoad, LinkSpec, Transmission};
pub use net_world::NetWorld;
pub use network::{DEFAULT_MAX_HOPS, DEFAULT_PKT_BYTES, Network};
pub use node::{Interfaces, Node, NodeKind, Routable, Schedulable};
pub use packet::{DropReason, Hop, LossCause, Packet, PacketRecord, PacketStatus};
pub use port::{DEFAULT_LOOP_MEMORY, LoopMemory, Port};
pub use routing::{
    Candidate, DEFAULT_FALLBACK_BUDGET, Egress, ForwardingTable, RoutePlan, RoutingPolicy,
    select_egress,
};
pub use stats::{RunSummary, Stats, TopologyCounts};
pub use switch::Switch;
