//! 标识符类型
//!
//! 定义流队列、服务类和流键的标识符。

use serde::{Deserialize, Serialize};

/// 流队列在接口 arena 中的槽位。
///
/// 只是索引，不持有所有权；流被销毁后该槽位可能被复用，所以接口在销毁时
/// 会同步清掉所有引用它的地方（服务链表、`largest_flow`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(pub usize);

/// 服务类（聚合计数桶）标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub usize);

/// 分类器键：流哈希 + 服务类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub flow_hash: u32,
    pub class: ClassId,
}

impl FlowKey {
    pub fn new(flow_hash: u32, class: ClassId) -> Self {
        Self { flow_hash, class }
    }
}
