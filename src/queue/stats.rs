//! 统计信息
//!
//! 服务类（聚合计数桶）与接口级的计数器。由入队/出队路径在接口锁内更新，
//! 控制逻辑只读取其中的平均时延。

use serde::{Deserialize, Serialize};

use crate::sim::SimTime;

/// 丢包原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropCause {
    /// 分配流队列失败
    MemFailure,
    /// 流处于高时延/overwhelming 状态时的提前丢包
    Early,
    /// 接口达到上限时的公平丢包
    Overflow,
    /// 无法登记流控条目
    FlowControlFail,
}

/// 服务类统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStats {
    pub pkt_cnt: u64,
    pub byte_cnt: u64,
    pub newflows_cnt: u64,
    pub pkts_compressible: u64,
    pub pkts_compressed: u64,
    pub dequeue: u64,
    pub dequeue_bytes: u64,
    pub dequeue_stall: u64,
    pub overwhelming: u64,
    pub min_qdelay: SimTime,
    pub max_qdelay: SimTime,
    pub avg_qdelay: SimTime,
    pub drop_memfailure: u64,
    pub drop_early: u64,
    pub drop_overflow: u64,
    pub flow_control_fail: u64,
    pub flow_control: u64,
    pub flow_feedback: u64,
    pub empty_flows: u64,
    pub flows_purged: u64,
}

impl ClassStats {
    pub fn count_drop(&mut self, cause: DropCause, pkts: u64) {
        let slot = match cause {
            DropCause::MemFailure => &mut self.drop_memfailure,
            DropCause::Early => &mut self.drop_early,
            DropCause::Overflow => &mut self.drop_overflow,
            DropCause::FlowControlFail => &mut self.flow_control_fail,
        };
        *slot = slot.saturating_add(pkts);
    }

    pub fn drops(&self, cause: DropCause) -> u64 {
        match cause {
            DropCause::MemFailure => self.drop_memfailure,
            DropCause::Early => self.drop_early,
            DropCause::Overflow => self.drop_overflow,
            DropCause::FlowControlFail => self.flow_control_fail,
        }
    }
}

/// 接口级丢包计数（所有服务类合计，含队头丢弃）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub drop_pkts: u64,
    pub drop_bytes: u64,
}

/// 单个服务类的快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSnapshot {
    pub name: String,
    pub quantum: u32,
    pub new_flows: usize,
    pub old_flows: usize,
    pub stats: ClassStats,
}

/// 接口快照，用于导出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSnapshot {
    pub name: String,
    pub qlen: u32,
    pub qbytes: u64,
    pub flows: usize,
    pub empty_flows: usize,
    pub largest_flow_hash: Option<u32>,
    pub drops: InterfaceStats,
    pub classes: Vec<ClassSnapshot>,
}
