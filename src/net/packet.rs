//! 数据包类型
//!
//! 定义网络数据包、终态以及仿真结束后交给统计层的逐包记录。

use super::id::{LinkId, NodeId, PortIdx};
use crate::sim::SimTime;
use serde::Serialize;
use std::net::Ipv4Addr;

/// 局部丢失（随后在其他端口重试）或终态丢失的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LossCause {
    /// 端口的环路记忆中已有该包
    Loop,
    /// 链路在构建时被静态置为故障
    LinkDown,
    /// 单次传输按概率失败
    LinkFailure,
}

/// 丢弃原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// 超过最大跳数
    HopLimit,
    /// 没有任何候选端口
    NoRoute,
    /// 回退重试预算耗尽
    FallbackExhausted,
    /// 到达了非目的主机
    Misdelivered,
}

/// 数据包状态。只允许 InFlight → 终态，终态不可逆。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "cause", rename_all = "snake_case")]
pub enum PacketStatus {
    InFlight,
    Delivered,
    Lost(LossCause),
    Dropped(DropReason),
}

impl PacketStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PacketStatus::InFlight)
    }
}

/// 路径上的一跳：从哪个节点的哪个端口、经由哪条链路发出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub node: NodeId,
    pub port: PortIdx,
    pub link: LinkId,
}

/// 网络数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub src_node: NodeId,
    pub size_bytes: u32,
    pub created_at: SimTime,
    pub hops: u32,
    pub max_hops: u32,
    pub trace: Vec<Hop>,
    /// 在交换机处被标记为丢失、随后改走其他端口的次数
    pub loss_marks: u32,
    status: PacketStatus,
    finished_at: Option<SimTime>,
}

impl Packet {
    pub fn new(
        id: u64,
        src_node: NodeId,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        size_bytes: u32,
        max_hops: u32,
        created_at: SimTime,
    ) -> Self {
        Self {
            id,
            src,
            dst,
            src_node,
            size_bytes,
            created_at,
            hops: 0,
            max_hops,
            trace: Vec::new(),
            loss_marks: 0,
            status: PacketStatus::InFlight,
            finished_at: None,
        }
    }

    pub fn status(&self) -> PacketStatus {
        self.status
    }

    pub fn finished_at(&self) -> Option<SimTime> {
        self.finished_at
    }

    /// 是否已用尽跳数预算
    pub fn hop_limit_reached(&self) -> bool {
        self.hops >= self.max_hops
    }

    /// 记录一次成功的转发
    pub fn record_hop(&mut self, hop: Hop) {
        self.hops = self.hops.saturating_add(1);
        self.trace.push(hop);
    }

    /// 进入终态。已处于终态时保持原状并返回 false。
    pub fn finish(&mut self, status: PacketStatus, at: SimTime) -> bool {
        debug_assert!(status.is_terminal(), "finish() needs a terminal status");
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.finished_at = Some(at);
        true
    }

    /// 生成逐包记录
    pub fn record(&self) -> PacketRecord {
        PacketRecord {
            id: self.id,
            src: self.src,
            dst: self.dst,
            status: self.status,
            hops: self.hops,
            path: self.trace.iter().map(|h| h.node).collect(),
            links: self.trace.iter().map(|h| h.link).collect(),
            created_at: self.created_at,
            finished_at: self.finished_at,
            loss_marks: self.loss_marks,
        }
    }
}

/// 仿真结束后交给统计/可视化层的逐包记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecord {
    pub id: u64,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub status: PacketStatus,
    pub hops: u32,
    /// 每一跳的发送节点（不含最终接收方）
    pub path: Vec<NodeId>,
    pub links: Vec<LinkId>,
    pub created_at: SimTime,
    pub finished_at: Option<SimTime>,
    pub loss_marks: u32,
}
