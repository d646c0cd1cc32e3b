//! 调度事件
//!
//! 定义调度事件结构、事件句柄及其优先级比较。

use super::event::Event;
use super::time::SimTime;
use serde::Serialize;
use std::cmp::Ordering;

/// 事件句柄：标识一次调度（不支持取消，仅用于追踪/断言）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventHandle {
    pub at: SimTime,
    pub seq: u64,
}

/// 调度事件，包含执行时间、序列号和事件对象。
pub struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) seq: u64,
    pub(crate) ev: Box<dyn Event>,
}

impl ScheduledEvent {
    pub(crate) fn handle(&self) -> EventHandle {
        EventHandle {
            at: self.at,
            seq: self.seq,
        }
    }
}

// BinaryHeap 是 max-heap；我们需要 (at, seq) 最小者优先，因此反向比较。
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq)).reverse()
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}
