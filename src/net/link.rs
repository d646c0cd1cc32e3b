//! 链路类型
//!
//! 定义全双工网络链路、传输时延计算、故障模型与负载计数。

use super::id::{LinkId, NodeId, PortIdx};
use super::packet::{LossCause, Packet};
use crate::sim::SimTime;
use rand::Rng;
use serde::Serialize;

/// 链路参数
#[derive(Debug, Clone, Copy)]
pub struct LinkSpec {
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    /// 单次传输失败的概率
    pub failure_prob: f64,
}

impl LinkSpec {
    pub fn new(latency: SimTime, bandwidth_bps: u64) -> Self {
        Self {
            latency,
            bandwidth_bps,
            failure_prob: 0.0,
        }
    }
}

/// 链路累计负载（供统计层使用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkLoad {
    pub packets: u64,
    pub bytes: u64,
    pub busy_ns: u64,
}

/// 一次成功发送的结果：对端以及到达时延
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub to: NodeId,
    pub to_port: PortIdx,
    pub delay: SimTime,
}

/// 网络链路，连接两个端口
#[derive(Debug)]
pub struct Link {
    pub id: LinkId,
    pub ends: [(NodeId, PortIdx); 2],
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    pub failure_prob: f64,
    failed: bool,
    /// 每个方向的串行化占用结束时间
    busy_until: [SimTime; 2],
    pub load: LinkLoad,
}

impl Link {
    /// 创建新链路
    pub fn new(id: LinkId, a: (NodeId, PortIdx), b: (NodeId, PortIdx), spec: LinkSpec) -> Self {
        Self {
            id,
            ends: [a, b],
            latency: spec.latency,
            bandwidth_bps: spec.bandwidth_bps,
            failure_prob: spec.failure_prob.clamp(0.0, 1.0),
            failed: false,
            busy_until: [SimTime::ZERO; 2],
            load: LinkLoad::default(),
        }
    }

    pub fn is_down(&self) -> bool {
        self.failed
    }

    /// 静态置为故障。运行期间不会恢复。
    pub fn fail(&mut self) {
        self.failed = true;
    }

    /// 从 `node` 看过去的对端
    pub fn peer_of(&self, node: NodeId) -> Option<(NodeId, PortIdx)> {
        match self.ends {
            [(a, _), b] if a == node => Some(b),
            [a, (b, _)] if b == node => Some(a),
            _ => None,
        }
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u32) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128) + (self.bandwidth_bps as u128 - 1))
            / self.bandwidth_bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }

    /// 空闲链路上单跳的估计时间（串行化 + 传播）
    pub fn single_hop_time(&self, bytes: u32) -> SimTime {
        self.tx_time(bytes).saturating_add(self.latency)
    }

    /// 从 `from` 端发送数据包。
    ///
    /// 成功时返回对端及到达时延，由调用方调度接收事件；失败时不调度任何事件。
    pub fn transmit<R: Rng>(
        &mut self,
        pkt: &Packet,
        from: NodeId,
        now: SimTime,
        rng: &mut R,
    ) -> Result<Transmission, LossCause> {
        let dir = if self.ends[0].0 == from { 0 } else { 1 };
        debug_assert!(
            self.ends[dir].0 == from,
            "{from:?} is not an endpoint of {:?}",
            self.id
        );
        if self.failed {
            return Err(LossCause::LinkDown);
        }

        let start = now.max(self.busy_until[dir]);
        let tx_time = self.tx_time(pkt.size_bytes);
        let depart = start.saturating_add(tx_time);
        self.busy_until[dir] = depart;
        self.load.packets += 1;
        self.load.bytes += pkt.size_bytes as u64;
        self.load.busy_ns = self.load.busy_ns.saturating_add(tx_time.0);

        // 故障率为 0 时不抽样
        if self.failure_prob > 0.0 && rng.gen_bool(self.failure_prob) {
            return Err(LossCause::LinkFailure);
        }

        let (to, to_port) = self.ends[1 - dir];
        let arrive = depart.saturating_add(self.latency);
        Ok(Transmission {
            to,
            to_port,
            delay: arrive.saturating_sub(now),
        })
    }
}
