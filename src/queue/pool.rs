//! 流队列对象池
//!
//! 跨接口共享、有上限的流队列分配器。释放的对象留在缓存里复用，
//! 避免活跃流频繁创建/销毁带来的分配开销。

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use super::flow_list::Links;
use super::flow_queue::{FlowQueue, FlowState};
use crate::net::ClassqPacket;

/// 所有接口合计的流队列对象上限
pub const FQ_ZONE_MAX: usize = 32 * 1024;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("flow queue pool exhausted ({limit} objects in use)")]
    Exhausted { limit: usize },
}

#[derive(Debug)]
struct PoolInner<P> {
    in_use: usize,
    cache: Vec<Box<FlowQueue<P>>>,
}

/// 线程安全的流队列对象池
#[derive(Debug)]
pub struct FlowPool<P> {
    limit: usize,
    inner: Mutex<PoolInner<P>>,
}

impl<P: ClassqPacket> Default for FlowPool<P> {
    fn default() -> Self {
        Self::new(FQ_ZONE_MAX)
    }
}

impl<P: ClassqPacket> FlowPool<P> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            inner: Mutex::new(PoolInner {
                in_use: 0,
                cache: Vec::new(),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 当前被接口持有的对象数
    pub fn in_use(&self) -> usize {
        self.inner.lock().in_use
    }

    /// 缓存中可直接复用的对象数
    pub fn cached(&self) -> usize {
        self.inner.lock().cache.len()
    }

    /// 取一个全零的流队列对象
    pub fn acquire(&self) -> Result<Box<FlowQueue<P>>, PoolError> {
        let mut inner = self.inner.lock();
        if inner.in_use >= self.limit {
            warn!(limit = self.limit, "unable to allocate flow queue");
            return Err(PoolError::Exhausted { limit: self.limit });
        }
        inner.in_use += 1;
        let fq = inner.cache.pop().unwrap_or_default();
        Ok(fq)
    }

    /// 归还对象。
    ///
    /// 对象必须已经与所有链表脱离且不含任何包，否则是调用方的逻辑错误。
    pub fn release(&self, mut fq: Box<FlowQueue<P>>) {
        assert!(
            !fq.in_service_list,
            "releasing flow {:#x} still linked in a service list",
            fq.flow_hash
        );
        assert!(
            fq.is_empty() && fq.bytes == 0,
            "releasing flow {:#x} with {} bytes queued",
            fq.flow_hash,
            fq.bytes
        );
        assert_eq!(
            fq.state,
            FlowState::Untracked,
            "releasing flow {:#x} that is still tracked",
            fq.flow_hash
        );
        assert_eq!(
            fq.links,
            Links::default(),
            "releasing flow {:#x} that is still linked",
            fq.flow_hash
        );
        fq.reset();

        let mut inner = self.inner.lock();
        assert!(inner.in_use > 0, "flow pool release without a matching acquire");
        inner.in_use -= 1;
        inner.cache.push(fq);
    }

    /// 回收缓存：`purge` 为真时清空缓存，否则释放一半
    pub fn reap(&self, purge: bool) -> usize {
        let mut inner = self.inner.lock();
        let keep = if purge { 0 } else { inner.cache.len() / 2 };
        let reaped = inner.cache.len() - keep;
        inner.cache.truncate(keep);
        inner.cache.shrink_to_fit();
        debug!(reaped, purge, "reaped flow queue cache");
        reaped
    }
}
