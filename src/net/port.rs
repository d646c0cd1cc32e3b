//! 端口
//!
//! 端口属于唯一一个节点、端接唯一一条链路，并携带分配的子网和环路记忆。

use std::collections::{HashSet, VecDeque};

use super::addr::Subnet;
use super::id::{LinkId, NodeId};

/// 默认环路记忆容量
pub const DEFAULT_LOOP_MEMORY: usize = 4096;

/// 已从本端口转发过的数据包 id 集合。容量满时按 FIFO 淘汰最旧的条目。
#[derive(Debug, Clone)]
pub struct LoopMemory {
    capacity: usize,
    order: VecDeque<u64>,
    seen: HashSet<u64>,
}

impl LoopMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn contains(&self, pkt_id: u64) -> bool {
        self.seen.contains(&pkt_id)
    }

    /// 记录 id；若是新条目返回 true
    pub fn remember(&mut self, pkt_id: u64) -> bool {
        if !self.seen.insert(pkt_id) {
            return false;
        }
        self.order.push_back(pkt_id);
        if self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

/// 网络端口
#[derive(Debug, Clone)]
pub struct Port {
    pub link: LinkId,
    /// 链路对端节点
    pub peer: NodeId,
    pub subnet: Option<Subnet>,
    pub loop_memory: LoopMemory,
}

impl Port {
    pub fn new(link: LinkId, peer: NodeId, loop_capacity: usize) -> Self {
        Self {
            link,
            peer,
            subnet: None,
            loop_memory: LoopMemory::new(loop_capacity),
        }
    }
}
