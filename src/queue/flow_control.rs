//! 流控通告表
//!
//! 调度核心通过 [`FlowAdvisory`] 登记/撤销对某个流的降速通告。容量有上限，
//! 且与流队列对象池的容量相互独立。条目按 [`FlowKey`]（流哈希 + 服务类）区分，
//! 与分类器一致。

use std::collections::HashMap;

use tracing::trace;

use crate::net::{FlowKey, FlowSource};

/// 流控通告的外部协作方
pub trait FlowAdvisory: Send + std::fmt::Debug {
    /// 登记通告；已登记的流视为成功，表满时返回 false
    fn register(&mut self, key: FlowKey, source: FlowSource) -> bool;
    /// 撤销通告（流恢复正常）
    fn release(&mut self, key: FlowKey);
    /// 已登记条目的包来源
    fn registered_source(&self, key: FlowKey) -> Option<FlowSource>;

    fn is_registered(&self, key: FlowKey) -> bool {
        self.registered_source(key).is_some()
    }
}

/// 有界的流控表
#[derive(Debug)]
pub struct FlowControlTable {
    capacity: usize,
    entries: HashMap<FlowKey, FlowSource>,
}

impl FlowControlTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FlowAdvisory for FlowControlTable {
    fn register(&mut self, key: FlowKey, source: FlowSource) -> bool {
        if self.entries.contains_key(&key) {
            return true;
        }
        if self.entries.len() >= self.capacity {
            trace!(
                flow_hash = key.flow_hash,
                class = key.class.0,
                capacity = self.capacity,
                "flow control table full"
            );
            return false;
        }
        self.entries.insert(key, source);
        true
    }

    fn release(&mut self, key: FlowKey) {
        self.entries.remove(&key);
    }

    fn registered_source(&self, key: FlowKey) -> Option<FlowSource> {
        self.entries.get(&key).copied()
    }
}
