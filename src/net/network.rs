//! 网络拓扑管理
//!
//! 持有节点、链路、端口/子网连线，负责数据包的创建、交付、链路发送和终态记录。

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use super::addr::Subnet;
use super::deliver_packet::DeliverPacket;
use super::host::Host;
use super::id::{LinkId, NodeId, PortIdx};
use super::link::{Link, LinkSpec};
use super::node::{Node, NodeKind, Routable};
use super::packet::{Packet, PacketRecord, PacketStatus};
use super::port::{DEFAULT_LOOP_MEMORY, Port};
use super::routing::RoutingPolicy;
use super::stats::Stats;
use super::switch::Switch;
use crate::error::BuildError;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, info, trace, warn};

/// 默认最大跳数
pub const DEFAULT_MAX_HOPS: u32 = 16;
/// 默认包大小
pub const DEFAULT_PKT_BYTES: u32 = 1500;

/// 网络拓扑
pub struct Network {
    nodes: Vec<Option<Box<dyn Node>>>,
    links: Vec<Link>,
    hosts: Vec<NodeId>,
    host_by_addr: HashMap<Ipv4Addr, NodeId>,
    policy: RoutingPolicy,
    loop_capacity: usize,
    max_hops: u32,
    pkt_bytes: u32,
    next_pkt_id: u64,
    records: Vec<PacketRecord>,
    // 正在链路上传输的数据包的最新快照，按 id 排序
    in_flight: BTreeMap<u64, PacketRecord>,
    pub stats: Stats,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            hosts: Vec::new(),
            host_by_addr: HashMap::new(),
            policy: RoutingPolicy::default(),
            loop_capacity: DEFAULT_LOOP_MEMORY,
            max_hops: DEFAULT_MAX_HOPS,
            pkt_bytes: DEFAULT_PKT_BYTES,
            next_pkt_id: 0,
            records: Vec::new(),
            in_flight: BTreeMap::new(),
            stats: Stats::default(),
        }
    }
}

impl Network {
    pub fn set_policy(&mut self, policy: RoutingPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    pub fn set_max_hops(&mut self, max_hops: u32) {
        self.max_hops = max_hops;
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    pub fn set_pkt_bytes(&mut self, bytes: u32) {
        self.pkt_bytes = bytes;
    }

    pub fn pkt_bytes(&self) -> u32 {
        self.pkt_bytes
    }

    /// 之后创建的端口使用的环路记忆容量
    pub fn set_loop_capacity(&mut self, capacity: usize) {
        self.loop_capacity = capacity;
    }

    /// 添加主机节点
    pub fn add_host(&mut self, name: impl Into<String>, addr: Ipv4Addr) -> Result<NodeId, BuildError> {
        if self.host_by_addr.contains_key(&addr) {
            return Err(BuildError::DuplicateAddress(addr));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Box::new(Host::new(id, name, addr))));
        self.hosts.push(id);
        self.host_by_addr.insert(addr, id);
        Ok(id)
    }

    /// 添加交换机节点
    pub fn add_switch(&mut self, name: impl Into<String>, max_ports: Option<usize>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Box::new(Switch::new(id, name, max_ports))));
        id
    }

    /// 用一条全双工链路连接两个节点，各自新增一个（尚未分配子网的）端口
    pub fn connect(&mut self, a: NodeId, b: NodeId, spec: LinkSpec) -> Result<LinkId, BuildError> {
        let id = LinkId(self.links.len());
        let cap = self.loop_capacity;
        let pa = self.attach_port(a, Port::new(id, b, cap))?;
        let pb = self.attach_port(b, Port::new(id, a, cap))?;
        self.links.push(Link::new(id, (a, pa), (b, pb), spec));
        trace!(link = ?id, a = ?a, b = ?b, "创建链路");
        Ok(id)
    }

    fn attach_port(&mut self, node: NodeId, port: Port) -> Result<PortIdx, BuildError> {
        let n = self
            .nodes
            .get_mut(node.0)
            .and_then(|n| n.as_mut())
            .ok_or(BuildError::UnknownNode(node))?;
        let name = n.name().to_string();
        n.interfaces_mut().attach(&name, port)
    }

    /// 为端口分配子网
    pub fn assign_subnet(&mut self, node: NodeId, port: PortIdx, subnet: Subnet) -> Result<(), BuildError> {
        let n = self.node_mut(node).ok_or(BuildError::UnknownNode(node))?;
        let name = n.name().to_string();
        let p = n
            .interfaces_mut()
            .port_mut(port)
            .ok_or_else(|| BuildError::NotConnected {
                node: name,
                peer: format!("{port}"),
            })?;
        p.subnet = Some(subnet);
        Ok(())
    }

    /// 为 `node` 上通往 `peer` 的（第一个）端口分配子网
    pub fn assign_subnet_towards(&mut self, node: NodeId, peer: NodeId, subnet: Subnet) -> Result<PortIdx, BuildError> {
        let port = self.port_towards(node, peer).ok_or_else(|| BuildError::NotConnected {
            node: self.name_of(node),
            peer: self.name_of(peer),
        })?;
        self.assign_subnet(node, port, subnet)?;
        Ok(port)
    }

    /// `node` 上通往 `peer` 的端口
    pub fn port_towards(&self, node: NodeId, peer: NodeId) -> Option<PortIdx> {
        self.node(node)?
            .ports()
            .iter()
            .position(|p| p.peer == peer)
            .map(PortIdx)
    }

    /// 校验连线并构建各节点转发表。任何端口缺少子网、或限定端口数的交换机未接满，都是致命错误。
    pub fn finalize(&mut self, topology: &str) -> Result<(), BuildError> {
        for n in self.nodes.iter_mut().flatten() {
            let ifaces = n.interfaces();
            if let Some(port) = ifaces.ports.iter().position(|p| p.subnet.is_none()) {
                return Err(BuildError::PortWithoutSubnet {
                    topology: topology.to_string(),
                    node: n.name().to_string(),
                    port,
                });
            }
            if let Some(expected) = ifaces.max_ports() {
                if n.kind() == NodeKind::Switch && ifaces.ports.len() != expected {
                    return Err(BuildError::PortsNotFull {
                        topology: topology.to_string(),
                        node: n.name().to_string(),
                        expected,
                        actual: ifaces.ports.len(),
                    });
                }
            }
            n.interfaces_mut().rebuild_table();
        }
        info!(
            topology,
            nodes = self.nodes.len(),
            hosts = self.hosts.len(),
            links = self.links.len(),
            "🧱 拓扑构建完成"
        );
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        self.nodes.get(id.0)?.as_deref()
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut (dyn Node + 'static)> {
        self.nodes.get_mut(id.0)?.as_deref_mut()
    }

    pub fn host(&self, id: NodeId) -> Option<&Host> {
        self.node(id)?.as_host()
    }

    fn name_of(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| format!("{id}"))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn switch_count(&self) -> usize {
        self.nodes.len() - self.hosts.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(id.0)
    }

    /// 两个节点之间的（第一条）链路
    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        let port = self.port_towards(a, b)?;
        Some(self.node(a)?.ports()[port.0].link)
    }

    pub fn failed_links(&self) -> Vec<LinkId> {
        self.links.iter().filter(|l| l.is_down()).map(|l| l.id).collect()
    }

    pub fn hosts(&self) -> &[NodeId] {
        &self.hosts
    }

    /// 所有主机地址（按主机创建顺序）
    pub fn host_addresses(&self) -> Vec<Ipv4Addr> {
        self.hosts
            .iter()
            .filter_map(|&h| self.node(h)?.address())
            .collect()
    }

    pub fn host_by_addr(&self, addr: Ipv4Addr) -> Option<NodeId> {
        self.host_by_addr.get(&addr).copied()
    }

    /// 清空所有端口的环路记忆（每次运行开始时）
    pub fn clear_loop_memory(&mut self) {
        for n in self.nodes.iter_mut().flatten() {
            n.interfaces_mut().clear_loop_memory();
        }
    }

    /// 创建数据包
    pub fn make_packet(&mut self, src_node: NodeId, src: Ipv4Addr, dst: Ipv4Addr, now: SimTime) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        self.stats.emitted += 1;
        Packet::new(id, src_node, src, dst, self.pkt_bytes, self.max_hops, now)
    }

    /// 以主机上行链路的单跳时间为间隔，为主机调度 `count` 个发包事件
    pub fn start_traffic(&mut self, host: NodeId, count: u64, sim: &mut Simulator) -> u64 {
        let targets = self.host_addresses();
        let Some(h) = self.host(host) else {
            warn!(node = ?host, "不是主机，无法发包");
            return 0;
        };
        let interval = h
            .ports()
            .first()
            .and_then(|p| self.links.get(p.link.0))
            .map(|l| l.single_hop_time(self.pkt_bytes))
            .unwrap_or(SimTime::ZERO);
        h.generate(count, &targets, interval, sim)
    }

    /// 主机发包（由 EmitPacket 事件触发）
    pub fn emit(&mut self, host: NodeId, dst: Ipv4Addr, sim: &mut Simulator) {
        let Some(mut node) = self.nodes.get_mut(host.0).and_then(|n| n.take()) else {
            warn!(node = ?host, "发包节点不存在");
            return;
        };
        match node.as_host_mut() {
            Some(h) => h.emit(dst, sim, self),
            None => warn!(node = ?host, "发包节点不是主机"),
        }
        self.nodes[host.0] = Some(node);
    }

    /// 将数据包交付给节点处理
    #[tracing::instrument(skip(self, pkt, sim), fields(pkt_id = pkt.id, to = ?to))]
    pub fn deliver(&mut self, to: NodeId, ingress: PortIdx, pkt: Packet, sim: &mut Simulator) {
        // 暂时把节点取出来，避免 &mut self 与 &mut node 的重叠借用。
        let Some(mut node) = self.nodes.get_mut(to.0).and_then(|n| n.take()) else {
            warn!("目标节点不存在或正在处理中");
            return;
        };
        trace!(node_name = %node.name(), "取出节点");

        node.on_packet(pkt, ingress, sim, self);

        self.nodes[to.0] = Some(node);
    }

    /// 从 `from` 经 `link_id` 发送数据包；成功则调度到达事件，否则数据包以丢失终结
    pub fn transmit(&mut self, from: NodeId, link_id: LinkId, pkt: Packet, sim: &mut Simulator) {
        let now = sim.now();
        let Some(link) = self.links.get_mut(link_id.0) else {
            warn!(link = ?link_id, "链路不存在");
            return;
        };
        match link.transmit(&pkt, from, now, sim.rng()) {
            Ok(tx) => {
                debug!(
                    pkt_id = pkt.id,
                    link = ?link_id,
                    to = ?tx.to,
                    delay = ?tx.delay,
                    "🚀 调度数据包到达事件"
                );
                self.in_flight.insert(pkt.id, pkt.record());
                sim.schedule_in(
                    tx.delay,
                    DeliverPacket {
                        to: tx.to,
                        ingress: tx.to_port,
                        pkt,
                    },
                );
            }
            Err(cause) => {
                debug!(pkt_id = pkt.id, link = ?link_id, ?cause, "💥 链路传输失败");
                self.finish(pkt, PacketStatus::Lost(cause), now);
            }
        }
    }

    /// 数据包进入终态
    #[tracing::instrument(skip(self, pkt), fields(pkt_id = pkt.id))]
    pub fn finish(&mut self, mut pkt: Packet, status: PacketStatus, at: SimTime) {
        self.in_flight.remove(&pkt.id);
        if !pkt.finish(status, at) {
            warn!(current = ?pkt.status(), "数据包已处于终态");
            return;
        }
        self.stats.record(&pkt);
        debug!(
            status = ?status,
            hops = pkt.hops,
            loss_marks = pkt.loss_marks,
            t = at.0,
            "数据包终结"
        );
        self.records.push(pkt.record());
    }

    /// 已终结数据包的记录（按终结顺序）
    pub fn records(&self) -> &[PacketRecord] {
        &self.records
    }

    /// 仍在传输中的数据包（状态为 InFlight），按 id 升序
    pub fn in_flight_records(&self) -> impl Iterator<Item = &PacketRecord> {
        self.in_flight.values()
    }
}
