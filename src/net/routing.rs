//! 路由（最窄子网匹配 + ECMP + 回退）
//!
//! 每个节点按端口分配的子网构建一张转发表。对到达的数据包：
//!
//! 1. 取包含目的地址的最窄子网，其端口集合为首选集（ECMP 候选）；
//! 2. 首选集内均匀随机选择；
//! 3. 选中端口若已转发过该包（环路记忆命中）或其链路已静态故障，
//!    给包打一次丢失标记，然后按回退顺序尝试其他端口：先横向绕行，再上行，
//!    对端已在路径上出现过的端口排在最后；
//! 4. 每次重试消耗一次本跳的回退预算，预算耗尽则终止该包。

use rand::Rng;
use rand::seq::SliceRandom;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

use super::addr::Subnet;
use super::id::{LinkId, PortIdx};
use super::packet::{DropReason, LossCause, Packet};
use super::port::Port;

/// 默认每跳回退预算
pub const DEFAULT_FALLBACK_BUDGET: usize = 4;

/// 路由策略参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPolicy {
    /// 首次尝试之外，每跳最多再尝试的端口数
    pub fallback_budget: usize,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            fallback_budget: DEFAULT_FALLBACK_BUDGET,
        }
    }
}

/// 候选出端口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// 最窄子网匹配到的端口
    Preferred(PortIdx),
    /// 回退端口（可能不匹配子网）
    Fallback(PortIdx),
}

impl Candidate {
    pub fn port(&self) -> PortIdx {
        match *self {
            Candidate::Preferred(p) | Candidate::Fallback(p) => p,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Candidate::Fallback(_))
    }
}

/// 对一个目的地址的候选端口排序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    pub preferred: Vec<PortIdx>,
    pub fallback: Vec<PortIdx>,
}

/// 路由决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Egress {
    Forward(Candidate),
    Lost(LossCause),
    Dropped(DropReason),
}

/// 转发表：子网 -> 分配了该子网的端口，按具体程度从高到低排列
#[derive(Debug, Clone, Default)]
pub struct ForwardingTable {
    entries: Vec<(Subnet, Vec<PortIdx>)>,
}

impl ForwardingTable {
    /// 由端口的子网分配构建。没有子网的端口不进入转发表。
    pub fn from_ports(ports: &[Port]) -> Self {
        let mut entries: Vec<(Subnet, Vec<PortIdx>)> = Vec::new();
        for (idx, port) in ports.iter().enumerate() {
            let Some(subnet) = port.subnet else { continue };
            match entries.iter_mut().find(|(s, _)| *s == subnet) {
                Some((_, ps)) => ps.push(PortIdx(idx)),
                None => entries.push((subnet, vec![PortIdx(idx)])),
            }
        }
        // 稳定排序：同等具体程度保持端口顺序
        entries.sort_by(|a, b| b.0.specificity().cmp(&a.0.specificity()));
        Self { entries }
    }

    pub fn entries(&self) -> &[(Subnet, Vec<PortIdx>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最窄匹配：返回包含 `dst` 的最具体子网及其端口
    pub fn lookup(&self, dst: Ipv4Addr) -> Option<(Subnet, &[PortIdx])> {
        self.entries
            .iter()
            .find(|(s, _)| s.contains(dst))
            .map(|(s, ps)| (*s, ps.as_slice()))
    }

    /// 计算候选顺序。
    ///
    /// 首选：最窄匹配的端口（排除入端口）。
    /// 回退按可信度递减：
    /// 1. 更宽但非默认路由的匹配端口（前缀由长到短）；
    /// 2. 不匹配的横向端口（前缀由短到长），跳过不含 `dst` 的 /32 主机路由；
    /// 3. 默认路由端口；
    /// 4. 入端口。
    pub fn plan(&self, dst: Ipv4Addr, ingress: Option<PortIdx>) -> RoutePlan {
        let not_ingress = |p: &&PortIdx| Some(**p) != ingress;

        let mut matching = self.entries.iter().filter(|(s, _)| s.contains(dst));
        let preferred: Vec<PortIdx> = matching
            .next()
            .map(|(_, ps)| ps.iter().filter(not_ingress).copied().collect())
            .unwrap_or_default();

        let (default, wider): (Vec<_>, Vec<_>) =
            matching.partition(|(s, _)| *s == Subnet::DEFAULT_ROUTE);
        let sideways = self
            .entries
            .iter()
            .rev()
            .filter(|(s, _)| !s.contains(dst) && !is_host_route(s));

        let mut fallback: Vec<PortIdx> = wider
            .into_iter()
            .chain(sideways)
            .chain(default)
            .flat_map(|(_, ps)| ps.iter().filter(not_ingress).copied())
            .collect();
        if let Some(p) = ingress {
            let usable = self
                .entries
                .iter()
                .any(|(s, ps)| ps.contains(&p) && (s.contains(dst) || !is_host_route(s)));
            if usable {
                fallback.push(p);
            }
        }

        RoutePlan {
            preferred,
            fallback,
        }
    }
}

// 主机不转发，通往其他主机的 /32 端口不能作为回退
fn is_host_route(s: &Subnet) -> bool {
    s.prefix_len() == 32
}

/// 把对端已在路径上出现过的回退端口挪到末尾（保持相对顺序，入端口仍在最后）
fn demote_visited(fallback: Vec<PortIdx>, ports: &[Port], pkt: &Packet) -> Vec<PortIdx> {
    let visited = |p: &PortIdx| pkt.trace.iter().any(|h| h.node == ports[p.0].peer);
    let (mut fresh, seen): (Vec<PortIdx>, Vec<PortIdx>) =
        fallback.into_iter().partition(|p| !visited(p));
    fresh.extend(seen);
    fresh
}

/// 为数据包选择出端口。
///
/// 会修改 `pkt.loss_marks`，但不修改端口的环路记忆：成功后由调用方记录。
pub fn select_egress<R, F>(
    table: &ForwardingTable,
    ports: &[Port],
    link_down: F,
    pkt: &mut Packet,
    ingress: Option<PortIdx>,
    policy: RoutingPolicy,
    rng: &mut R,
) -> Egress
where
    R: Rng + ?Sized,
    F: Fn(LinkId) -> bool,
{
    if pkt.hop_limit_reached() {
        debug!(pkt_id = pkt.id, hops = pkt.hops, max_hops = pkt.max_hops, "超过最大跳数");
        return Egress::Dropped(DropReason::HopLimit);
    }

    let RoutePlan {
        mut preferred,
        fallback,
    } = table.plan(pkt.dst, ingress);
    let fallback = demote_visited(fallback, ports, pkt);
    if preferred.len() > 1 {
        preferred.shuffle(rng);
    }
    if preferred.is_empty() {
        debug!(pkt_id = pkt.id, dst = %pkt.dst, "无子网匹配，直接回退");
    }

    let attempts = policy.fallback_budget.saturating_add(1);
    let candidates = preferred
        .into_iter()
        .map(Candidate::Preferred)
        .chain(fallback.into_iter().map(Candidate::Fallback));

    let mut tried = 0usize;
    let mut loops = 0usize;
    for cand in candidates.take(attempts) {
        tried += 1;
        let port = &ports[cand.port().0];
        if port.loop_memory.contains(pkt.id) {
            loops += 1;
            pkt.loss_marks += 1;
            debug!(pkt_id = pkt.id, port = %cand.port(), "🔁 环路记忆命中，标记丢失并重试");
            continue;
        }
        if link_down(port.link) {
            pkt.loss_marks += 1;
            debug!(pkt_id = pkt.id, port = %cand.port(), link = ?port.link, "⛔ 链路故障，标记丢失并重试");
            continue;
        }
        trace!(pkt_id = pkt.id, ?cand, tried, "选中出端口");
        return Egress::Forward(cand);
    }

    match (tried, loops) {
        (0, _) => Egress::Dropped(DropReason::NoRoute),
        (_, 0) => Egress::Lost(LossCause::LinkDown),
        _ => Egress::Dropped(DropReason::FallbackExhausted),
    }
}
