//! 事件 trait
//!
//! 定义仿真事件接口。调度器只认识"时间、目标、动作"三元组，
//! 不关心数据包或交换机。

use super::simulator::Simulator;
use super::world::World;

/// 事件：可被调度执行。使用 `self: Box<Self>` 以支持 move/所有权转移。
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);

    /// 用于 trace 记录的动作名
    fn action(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}
