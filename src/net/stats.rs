//! 统计信息
//!
//! 运行中累积的计数，以及从逐包记录汇总出的运行摘要。

use serde::Serialize;

use super::packet::{Packet, PacketRecord, PacketStatus};

/// 网络统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub emitted: u64,
    pub delivered: u64,
    pub delivered_bytes: u64,
    pub lost: u64,
    pub dropped: u64,
    /// 所有终结数据包上的局部丢失标记之和
    pub loss_marks: u64,
}

impl Stats {
    pub(crate) fn record(&mut self, pkt: &Packet) {
        match pkt.status() {
            PacketStatus::Delivered => {
                self.delivered += 1;
                self.delivered_bytes += pkt.size_bytes as u64;
            }
            PacketStatus::Lost(_) => self.lost += 1,
            PacketStatus::Dropped(_) => self.dropped += 1,
            PacketStatus::InFlight => return,
        }
        self.loss_marks += pkt.loss_marks as u64;
    }

    /// 尚未终结的数据包数
    pub fn in_flight(&self) -> u64 {
        self.emitted
            .saturating_sub(self.delivered + self.lost + self.dropped)
    }
}

/// 一次运行的汇总
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_packets: u64,
    pub delivered: u64,
    pub lost: u64,
    pub dropped: u64,
    pub in_flight: u64,
    /// 以下路径长度只统计已送达的数据包
    pub avg_path_len: f64,
    pub min_path_len: u32,
    pub max_path_len: u32,
    /// (lost + dropped + in_flight) / total
    pub percent_lost: f64,
    pub loss_marks: u64,
    /// 曾被标记丢失但最终送达的数据包数
    pub recovered: u64,
    pub failed_links: usize,
    pub num_hosts: usize,
    pub num_switches: usize,
    pub num_links: usize,
}

/// 拓扑规模，用于填充摘要
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TopologyCounts {
    pub hosts: usize,
    pub switches: usize,
    pub links: usize,
    pub failed_links: usize,
}

impl RunSummary {
    pub fn from_records(records: &[PacketRecord], emitted: u64, topo: TopologyCounts) -> Self {
        let mut s = RunSummary {
            total_packets: emitted,
            failed_links: topo.failed_links,
            num_hosts: topo.hosts,
            num_switches: topo.switches,
            num_links: topo.links,
            ..Default::default()
        };

        let mut path_sum = 0u64;
        let mut min_len = u32::MAX;
        for r in records {
            s.loss_marks += r.loss_marks as u64;
            match r.status {
                PacketStatus::Delivered => {
                    s.delivered += 1;
                    path_sum += r.hops as u64;
                    min_len = min_len.min(r.hops);
                    s.max_path_len = s.max_path_len.max(r.hops);
                    if r.loss_marks > 0 {
                        s.recovered += 1;
                    }
                }
                PacketStatus::Lost(_) => s.lost += 1,
                PacketStatus::Dropped(_) => s.dropped += 1,
                PacketStatus::InFlight => {}
            }
        }

        s.in_flight = emitted.saturating_sub(s.delivered + s.lost + s.dropped);
        if s.delivered > 0 {
            s.avg_path_len = path_sum as f64 / s.delivered as f64;
            s.min_path_len = min_len;
        }
        if emitted > 0 {
            s.percent_lost = (emitted - s.delivered) as f64 / emitted as f64 * 100.0;
        }
        s
    }

    /// 单行摘要
    pub fn one_line(&self) -> String {
        format!(
            "total={} delivered={} lost={} dropped={} in_flight={} avg_path={:.2} min_path={} max_path={} pct_lost={:.2} loss_marks={} recovered={} failed_links={}/{}",
            self.total_packets,
            self.delivered,
            self.lost,
            self.dropped,
            self.in_flight,
            self.avg_path_len,
            self.min_path_len,
            self.max_path_len,
            self.percent_lost,
            self.loss_marks,
            self.recovered,
            self.failed_links,
            self.num_links,
        )
    }
}
