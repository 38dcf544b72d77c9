//! 队列策略（Queue disciplines）
//!
//! FQ-CoDel 的流队列核心：对象池、流队列、时延/停滞监测、丢包与公平性控制、
//! 包压缩，以及对外的入队/出队入口。流的分类和 new/old 链表的轮转由外部
//! 调度器驱动（参见 `sim::DrrScheduler`）。

mod admit;
mod compressor;
mod config;
mod dequeue;
mod flow_control;
mod flow_list;
mod flow_queue;
mod interface;
mod monitor;
mod pool;
mod stats;

pub use admit::{AdmitOutcome, AdmitResult};
pub use config::{ClassConfig, ConfigError, FqConfig};
pub use flow_control::{FlowAdvisory, FlowControlTable};
pub(crate) use flow_list::{Arena, FlowList};
pub use flow_queue::{FlowQueue, FlowState};
pub use interface::{FqInterface, ServiceClass, SharedInterface};
pub use pool::{FQ_ZONE_MAX, FlowPool, PoolError};
pub use stats::{ClassSnapshot, ClassStats, DropCause, InterfaceSnapshot, InterfaceStats};
