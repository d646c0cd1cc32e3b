//! 调度器错误
//!
//! 只有破坏不变式的致命错误；数据包层面的失败不会走这里。

use super::time::SimTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("event `{action}` scheduled in the past: at={at} < now={now}")]
    ScheduledInPast {
        now: SimTime,
        at: SimTime,
        action: &'static str,
    },
}
