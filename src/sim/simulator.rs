//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::event::Event;
use super::scheduled_event::ScheduledEvent;
use super::time::SimTime;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
pub struct Simulator<W> {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent<W>>,
}

impl<W> Default for Simulator<W> {
    fn default() -> Self {
        Self {
            now: SimTime::ZERO,
            next_seq: 0,
            executed: 0,
            q: BinaryHeap::new(),
        }
    }
}

impl<W: World> Simulator<W> {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定时间执行；早于当前时间的事件按当前时间执行
    pub fn schedule<E: Event<W>>(&mut self, at: SimTime, ev: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        trace!(now = ?self.now, at = ?at, seq, "调度事件");
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
    }

    fn step(&mut self, item: ScheduledEvent<W>, world: &mut W) {
        self.now = item.at;
        self.executed += 1;
        item.ev.execute(self, world);
        world.on_tick(self.now);
    }

    /// 运行直到事件队列为空或到达 `until`。
    #[tracing::instrument(skip(self, world))]
    pub fn run_until(&mut self, until: SimTime, world: &mut W) {
        debug!(now = ?self.now, queue_size = self.q.len(), "▶️  开始运行仿真");
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else { break };
            self.step(item, world);
        }
        self.now = self.now.max(until);
        info!(
            total_events = self.executed,
            final_time = ?self.now,
            remaining = self.q.len(),
            "✅ 仿真完成"
        );
    }

    /// 运行所有事件直到队列为空。
    pub fn run(&mut self, world: &mut W) {
        while let Some(item) = self.q.pop() {
            self.step(item, world);
        }
    }
}
