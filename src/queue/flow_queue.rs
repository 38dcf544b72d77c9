//! 流队列
//!
//! 每个活跃流一个：包 FIFO 加上时延/状态记账。流在 New、Old、Empty 三种
//! 状态之间迁移（RFC 8290）：
//!
//! ```text
//!   Empty --到达--> New --服务一次/配额耗尽--> Old --排空--> Empty
//!                    |                          ^  |
//!                    +---------排空-------------+  +--配额耗尽--> Old
//! ```
//!
//! 状态迁移由接口和外部调度器驱动，这里只保存状态本身。

use std::collections::VecDeque;

use super::flow_list::Links;
use crate::net::{ClassId, ClassqPacket};
use crate::sim::SimTime;

/// 流在调度链表中的位置，任一时刻只取其一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// 不在任何链表上（刚创建，或刚从 empty 链表上重新激活）
    #[default]
    Untracked,
    /// 在 new 链表上，等待本轮首次服务
    New,
    /// 在 old 链表上，已服务过且仍非空
    Old,
    /// 在 empty 链表上，无包，保留以便快速复用
    Empty,
}

impl FlowState {
    /// 是否在 new/old 服务链表上
    pub fn is_active(self) -> bool {
        matches!(self, FlowState::New | FlowState::Old)
    }
}

/// 单个流的队列与记账
#[derive(Debug)]
pub struct FlowQueue<P> {
    pub(crate) pkts: VecDeque<P>,
    pub(crate) state: FlowState,
    pub(crate) bytes: u64,
    pub(crate) min_qdelay: SimTime,
    pub(crate) delay_high: bool,
    pub(crate) overwhelming: bool,
    pub(crate) last_dequeue: Option<SimTime>,
    pub(crate) next_deadline: SimTime,
    pub(crate) fc_capable: bool,
    pub(crate) fc_on: bool,
    pub(crate) deficit: i64,
    pub(crate) class: ClassId,
    pub(crate) flow_hash: u32,
    pub(crate) in_service_list: bool,
    pub(crate) purge_deadline: Option<SimTime>,
    /// 所在链表中的前后节点
    pub(crate) links: Links,
}

impl<P> Default for FlowQueue<P> {
    fn default() -> Self {
        Self {
            pkts: VecDeque::new(),
            state: FlowState::Untracked,
            bytes: 0,
            min_qdelay: SimTime::ZERO,
            delay_high: false,
            overwhelming: false,
            last_dequeue: None,
            next_deadline: SimTime::ZERO,
            fc_capable: false,
            fc_on: false,
            deficit: 0,
            class: ClassId::default(),
            flow_hash: 0,
            in_service_list: false,
            purge_deadline: None,
            links: Links::default(),
        }
    }
}

impl<P: ClassqPacket> FlowQueue<P> {
    /// 清零全部字段，保留包缓冲区的容量
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.pkts.is_empty());
        let pkts = std::mem::take(&mut self.pkts);
        *self = Self {
            pkts,
            ..Self::default()
        };
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.pkts.is_empty()
    }

    pub fn queued_packets(&self) -> usize {
        self.pkts.len()
    }

    pub fn queued_bytes(&self) -> u64 {
        self.bytes
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn flow_hash(&self) -> u32 {
        self.flow_hash
    }

    pub fn is_delay_high(&self) -> bool {
        self.delay_high
    }

    pub fn is_overwhelming(&self) -> bool {
        self.overwhelming
    }

    pub fn flow_control_capable(&self) -> bool {
        self.fc_capable
    }

    pub fn flow_control_on(&self) -> bool {
        self.fc_on
    }

    pub fn last_dequeue_time(&self) -> Option<SimTime> {
        self.last_dequeue
    }

    pub fn next_interval_deadline(&self) -> SimTime {
        self.next_deadline
    }

    pub fn min_qdelay_in_interval(&self) -> SimTime {
        self.min_qdelay
    }

    pub fn deficit(&self) -> i64 {
        self.deficit
    }

    /// 外部调度器补充配额
    pub fn grant_quantum(&mut self, quantum: u32) {
        self.deficit = self.deficit.saturating_add(i64::from(quantum));
    }

    /// 外部调度器按发送字节扣减配额
    pub fn charge_deficit(&mut self, bytes: u32) {
        self.deficit = self.deficit.saturating_sub(i64::from(bytes));
    }

    pub fn in_service_list(&self) -> bool {
        self.in_service_list
    }

    /// 由外部调度器维护：调度器把流放进自己的候选结构时置位，移出时清除。
    ///
    /// 只有持有自己候选结构的外部调度器才会设置它。接口自身的 new/old/empty
    /// 链表由 [`FlowState`] 表示；内置的 `DrrScheduler` 直接使用这些链表，
    /// 从不设置该标志。置位期间流不能被销毁。
    pub fn set_in_service_list(&mut self, on: bool) {
        self.in_service_list = on;
    }

    pub fn purge_deadline(&self) -> Option<SimTime> {
        self.purge_deadline
    }

    pub fn head(&self) -> Option<&P> {
        self.pkts.front()
    }

    pub fn tail(&self) -> Option<&P> {
        self.pkts.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.pkts.iter()
    }
}
