//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间、事件队列和全局唯一的随机数发生器。

use super::error::SimError;
use super::event::Event;
use super::scheduled_event::{EventHandle, ScheduledEvent};
use super::time::SimTime;
use super::world::World;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
///
/// 所有随机性（ECMP 选择、链路故障抽样、目的地选择）都来自这里的 `rng`，
/// 因此相同种子的两次运行产生完全相同的结果。
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent>,
    rng: Pcg64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Simulator {
    /// 使用给定随机种子创建仿真器
    pub fn new(seed: u64) -> Self {
        Self::with_rng(Pcg64::seed_from_u64(seed))
    }

    /// 注入一个已构造的随机数发生器
    pub fn with_rng(rng: Pcg64) -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            executed: 0,
            q: BinaryHeap::new(),
            rng,
        }
    }

    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 仿真范围内唯一的随机数发生器
    pub fn rng(&mut self) -> &mut Pcg64 {
        &mut self.rng
    }

    /// 队列中尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 已执行的事件数
    pub fn executed_events(&self) -> u64 {
        self.executed
    }

    /// 在绝对时间 `at` 调度事件。`at` 早于当前时间属于致命错误。
    pub fn schedule_at<E: Event>(&mut self, at: SimTime, ev: E) -> Result<EventHandle, SimError> {
        if at < self.now {
            return Err(SimError::ScheduledInPast {
                now: self.now,
                at,
                action: ev.action(),
            });
        }
        Ok(self.push(at, Box::new(ev)))
    }

    /// 在当前时间之后 `delay` 调度事件。
    #[tracing::instrument(skip(self, ev), fields(action = ev.action()))]
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) -> EventHandle {
        let at = self.now.saturating_add(delay);
        self.push(at, Box::new(ev))
    }

    fn push(&mut self, at: SimTime, ev: Box<dyn Event>) -> EventHandle {
        let seq = self.next_seq;
        trace!(now = ?self.now, at = ?at, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        let item = ScheduledEvent { at, seq, ev };
        let handle = item.handle();
        self.q.push(item);

        debug!(queue_size = self.q.len(), "事件已加入队列");
        handle
    }

    fn step(&mut self, item: ScheduledEvent, world: &mut dyn World) {
        self.now = item.at;
        self.executed += 1;
        trace!(
            t = self.now.0,
            seq = item.seq,
            action = item.ev.action(),
            remaining_queue = self.q.len(),
            "执行事件"
        );
        item.ev.execute(self, world);
        world.on_tick(self);
    }

    /// 运行直到事件队列为空或到达 `until`（恰好在 `until` 的事件仍会执行）。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else { break };
            self.step(item, world);
        }
        self.now = self.now.max(until);
        debug!(now = ?self.now, pending = self.q.len(), "到达仿真时间上限");
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let start = self.executed;
        while let Some(item) = self.q.pop() {
            self.step(item, world);
        }

        info!(
            total_events = self.executed - start,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }
}
