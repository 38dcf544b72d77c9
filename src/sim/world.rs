//! 世界 trait
//!
//! 定义仿真世界接口。

use super::time::SimTime;

/// 仿真世界：由业务层实现（例如接口队列/链路/统计等）。
///
/// 事件以 `Box<dyn Event<W>>` 保存在队列里，因此世界类型必须是 `'static`。
pub trait World: 'static {
    /// 每个事件执行后调用，可用于周期性维护
    fn on_tick(&mut self, _now: SimTime) {}
}
