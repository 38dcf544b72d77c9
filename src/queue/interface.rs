//! 接口级调度状态
//!
//! `FqInterface` 持有一个接口上的全部流队列（arena + 索引）、分类器映射、
//! 各服务类的计数桶与 new/old 链表、empty 链表、流控表以及 `largest_flow`。
//! 所有操作都以 `&mut self` 进行，即整个接口处于同一个互斥域内；
//! 多线程调用方通过 [`SharedInterface`] 加锁。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::config::{ConfigError, FqConfig};
use super::flow_control::{FlowAdvisory, FlowControlTable};
use super::flow_list::{Arena, FlowList};
use super::flow_queue::{FlowQueue, FlowState};
use super::pool::{FlowPool, PoolError};
use super::stats::{ClassSnapshot, ClassStats, InterfaceSnapshot, InterfaceStats};
use crate::net::{ClassId, ClassqPacket, FlowId, FlowKey, FlowSource, PacketFlags};
use crate::sim::SimTime;

/// 多线程共享的接口
pub type SharedInterface<P> = Arc<Mutex<FqInterface<P>>>;

/// 服务类：计数桶加上 new/old 服务链表
#[derive(Debug)]
pub struct ServiceClass {
    pub(crate) name: String,
    pub(crate) quantum: u32,
    pub(crate) new_flows: FlowList,
    pub(crate) old_flows: FlowList,
    pub(crate) stats: ClassStats,
}

impl ServiceClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantum(&self) -> u32 {
        self.quantum
    }

    pub fn stats(&self) -> &ClassStats {
        &self.stats
    }

    pub fn new_flow_count(&self) -> usize {
        self.new_flows.len()
    }

    pub fn old_flow_count(&self) -> usize {
        self.old_flows.len()
    }
}

/// 一个接口上的 FQ-CoDel 状态
#[derive(Debug)]
pub struct FqInterface<P: ClassqPacket> {
    name: String,
    pub(crate) cfg: FqConfig,
    pool: Arc<FlowPool<P>>,
    flows: Arena<P>,
    free_slots: Vec<usize>,
    index: HashMap<FlowKey, FlowId>,
    pub(crate) classes: Vec<ServiceClass>,
    empty_flows: FlowList,
    pub(crate) large_flow: Option<FlowId>,
    fc: Box<dyn FlowAdvisory>,
    pub(crate) qlen: u32,
    pub(crate) qbytes: u64,
    pub(crate) stats: InterfaceStats,
}

impl<P: ClassqPacket> FqInterface<P> {
    pub fn new(
        name: impl Into<String>,
        cfg: FqConfig,
        pool: Arc<FlowPool<P>>,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let classes = cfg
            .classes
            .iter()
            .map(|c| ServiceClass {
                name: c.name.clone(),
                quantum: c.quantum,
                new_flows: FlowList::default(),
                old_flows: FlowList::default(),
                stats: ClassStats::default(),
            })
            .collect();
        let fc = Box::new(FlowControlTable::new(cfg.flow_control_capacity));
        Ok(Self {
            name: name.into(),
            cfg,
            pool,
            flows: Vec::new(),
            free_slots: Vec::new(),
            index: HashMap::new(),
            classes,
            empty_flows: FlowList::default(),
            large_flow: None,
            fc,
            qlen: 0,
            qbytes: 0,
            stats: InterfaceStats::default(),
        })
    }

    /// 替换默认的流控表
    pub fn with_flow_advisory(mut self, fc: Box<dyn FlowAdvisory>) -> Self {
        self.fc = fc;
        self
    }

    pub fn into_shared(self) -> SharedInterface<P> {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &FqConfig {
        &self.cfg
    }

    pub fn flow_advisory(&self) -> &dyn FlowAdvisory {
        self.fc.as_ref()
    }

    /// 接口上排队的总包数
    pub fn qlen(&self) -> u32 {
        self.qlen
    }

    pub fn qbytes(&self) -> u64 {
        self.qbytes
    }

    pub fn interface_stats(&self) -> InterfaceStats {
        self.stats
    }

    pub fn largest_flow(&self) -> Option<FlowId> {
        self.large_flow
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class(&self, class: ClassId) -> &ServiceClass {
        &self.classes[class.0]
    }

    pub fn class_stats(&self, class: ClassId) -> &ClassStats {
        &self.classes[class.0].stats
    }

    pub fn class_stats_mut(&mut self, class: ClassId) -> &mut ClassStats {
        &mut self.classes[class.0].stats
    }

    pub fn flow(&self, id: FlowId) -> Option<&FlowQueue<P>> {
        self.flows.get(id.0).and_then(|f| f.as_deref())
    }

    pub fn flow_mut(&mut self, id: FlowId) -> Option<&mut FlowQueue<P>> {
        self.flows.get_mut(id.0).and_then(|f| f.as_deref_mut())
    }

    pub fn flow_count(&self) -> usize {
        self.index.len()
    }

    pub fn empty_flow_count(&self) -> usize {
        self.empty_flows.len()
    }

    /// 服务类 new 链表上的流，按服务顺序
    pub fn new_flows(&self, class: ClassId) -> impl Iterator<Item = FlowId> + '_ {
        self.classes[class.0].new_flows.iter(&self.flows)
    }

    /// 服务类 old 链表上的流，按服务顺序
    pub fn old_flows(&self, class: ClassId) -> impl Iterator<Item = FlowId> + '_ {
        self.classes[class.0].old_flows.iter(&self.flows)
    }

    pub fn lookup(&self, key: FlowKey) -> Option<FlowId> {
        self.index.get(&key).copied()
    }

    pub(crate) fn fq(&self, id: FlowId) -> &FlowQueue<P> {
        self.flow(id)
            .unwrap_or_else(|| panic!("stale flow id {:?} on {}", id, self.name))
    }

    pub(crate) fn fq_mut(&mut self, id: FlowId) -> &mut FlowQueue<P> {
        match self.flows.get_mut(id.0).and_then(|f| f.as_deref_mut()) {
            Some(fq) => fq,
            None => panic!("stale flow id {:?} on {}", id, self.name),
        }
    }

    pub fn at_drop_limit(&self) -> bool {
        self.qlen >= self.cfg.pkt_drop_limit
    }

    pub fn almost_at_drop_limit(&self) -> bool {
        self.qlen >= self.cfg.almost_full_pkts()
    }

    /// 分类器：查找流队列，不存在时从对象池创建。
    ///
    /// 处于 empty 链表上的流在这里被重新激活。
    pub fn find_or_create_flow(
        &mut self,
        key: FlowKey,
        source: FlowSource,
        now: SimTime,
    ) -> Result<FlowId, PoolError> {
        assert!(
            key.class.0 < self.classes.len(),
            "unknown service class {:?} on {}",
            key.class,
            self.name
        );
        if let Some(id) = self.lookup(key) {
            if self.fq(id).state == FlowState::Empty {
                self.detach(id);
                let fq = self.fq_mut(id);
                fq.state = FlowState::Untracked;
                fq.purge_deadline = None;
                trace!(flow_hash = key.flow_hash, "reusing empty flow");
            }
            return Ok(id);
        }

        let mut fq = self.pool.acquire()?;
        fq.class = key.class;
        fq.flow_hash = key.flow_hash;
        fq.next_deadline = now.saturating_add(self.cfg.update_interval());
        fq.fc_capable = source.supports_flow_control();

        let id = match self.free_slots.pop() {
            Some(slot) => {
                self.flows[slot] = Some(fq);
                FlowId(slot)
            }
            None => {
                self.flows.push(Some(fq));
                FlowId(self.flows.len() - 1)
            }
        };
        self.index.insert(key, id);
        debug!(
            iface = %self.name,
            flow_hash = key.flow_hash,
            class = key.class.0,
            ?id,
            "allocated flow queue"
        );
        Ok(id)
    }

    /// 把空闲流挂到所属服务类 new 链表尾部，并给予一个配额
    pub(crate) fn insert_new(&mut self, id: FlowId) {
        let fq = self.fq(id);
        assert_eq!(
            fq.state,
            FlowState::Untracked,
            "flow {:#x} linked twice",
            fq.flow_hash
        );
        let class = fq.class;
        let quantum = self.classes[class.0].quantum;
        let fq = self.fq_mut(id);
        fq.state = FlowState::New;
        fq.deficit = i64::from(quantum);
        let cl = &mut self.classes[class.0];
        cl.new_flows.push_back(&mut self.flows, id);
        cl.stats.newflows_cnt += 1;
    }

    /// 下一个候选流：new 链表优先
    pub fn candidate(&self, class: ClassId) -> Option<FlowId> {
        let cl = &self.classes[class.0];
        cl.new_flows.front().or(cl.old_flows.front())
    }

    /// 把活跃流移到 old 链表尾部（New 首次服务后、或配额耗尽时）
    pub fn rotate_to_old(&mut self, id: FlowId) {
        assert!(
            self.fq(id).state.is_active(),
            "rotating inactive flow {:?}",
            id
        );
        self.detach(id);
        let fq = self.fq_mut(id);
        fq.state = FlowState::Old;
        let class = fq.class;
        self.classes[class.0].old_flows.push_back(&mut self.flows, id);
    }

    /// 流已排空：移出服务链表，挂到 empty 链表等待复用或老化回收
    pub fn move_to_empty(&mut self, id: FlowId, now: SimTime) {
        let purge_delay = self.cfg.empty_purge_delay();
        let fq = self.fq(id);
        assert!(
            fq.is_empty() && fq.bytes == 0,
            "flow {:#x} moved to empty list with {} bytes queued",
            fq.flow_hash,
            fq.bytes
        );
        assert_ne!(fq.state, FlowState::Empty, "flow {:#x} already empty", fq.flow_hash);
        self.detach(id);
        if self.large_flow == Some(id) {
            self.large_flow = None;
        }
        let fq = self.fq_mut(id);
        fq.state = FlowState::Empty;
        fq.purge_deadline = Some(now.saturating_add(purge_delay));
        fq.delay_high = false;
        fq.overwhelming = false;
        fq.last_dequeue = None;
        let class = fq.class;
        self.empty_flows.push_back(&mut self.flows, id);
        self.classes[class.0].stats.empty_flows += 1;
    }

    /// 从当前所在链表摘下，状态不变
    fn detach(&mut self, id: FlowId) {
        let (class, state) = {
            let fq = self.fq(id);
            (fq.class, fq.state)
        };
        let list = match state {
            FlowState::Untracked => return,
            FlowState::New => &mut self.classes[class.0].new_flows,
            FlowState::Old => &mut self.classes[class.0].old_flows,
            FlowState::Empty => &mut self.empty_flows,
        };
        list.unlink(&mut self.flows, id);
    }

    /// 销毁流队列并归还对象池。
    ///
    /// 流必须已经脱离所有链表且不含任何包，否则 panic。
    pub fn destroy(&mut self, id: FlowId) {
        let fq = self.fq(id);
        assert!(
            !fq.in_service_list,
            "destroying flow {:#x} still in the active service list",
            fq.flow_hash
        );
        assert!(
            fq.is_empty() && fq.bytes == 0,
            "destroying flow {:#x} with {} bytes queued",
            fq.flow_hash,
            fq.bytes
        );
        assert_eq!(
            fq.state,
            FlowState::Untracked,
            "destroying flow {:#x} before it was detached",
            fq.flow_hash
        );
        let key = FlowKey::new(fq.flow_hash, fq.class);
        let fc_on = fq.fc_on;
        if fc_on {
            self.fc.release(key);
        }
        self.index.remove(&key);
        if self.large_flow == Some(id) {
            self.large_flow = None;
        }
        let Some(fq) = self.flows[id.0].take() else {
            unreachable!("flow checked above")
        };
        self.free_slots.push(id.0);
        self.pool.release(fq);
        trace!(iface = %self.name, flow_hash = key.flow_hash, "destroyed flow queue");
    }

    /// empty 链表老化：销毁超过保留期的空流，返回销毁数量
    pub fn purge_empty(&mut self, now: SimTime) -> usize {
        let mut purged = 0;
        while let Some(id) = self.empty_flows.front() {
            let fq = self.fq(id);
            match fq.purge_deadline {
                Some(deadline) if deadline <= now => {}
                _ => break,
            }
            let class = fq.class;
            self.empty_flows.unlink(&mut self.flows, id);
            self.fq_mut(id).state = FlowState::Untracked;
            self.destroy(id);
            self.classes[class.0].stats.flows_purged += 1;
            purged += 1;
        }
        if purged > 0 {
            debug!(iface = %self.name, purged, "purged idle flow queues");
        }
        purged
    }

    /// 拆除接口：丢弃全部包并销毁全部流，返回被丢弃的包
    pub fn teardown(&mut self) -> Vec<P> {
        let mut dropped = Vec::new();
        let ids: Vec<FlowId> = self.index.values().copied().collect();
        for id in ids {
            while let Some(pkt) = self.head_drop(id) {
                dropped.push(pkt);
            }
            self.detach(id);
            let fq = self.fq_mut(id);
            fq.state = FlowState::Untracked;
            fq.in_service_list = false;
            self.destroy(id);
        }
        info!(iface = %self.name, dropped = dropped.len(), "interface torn down");
        dropped
    }

    /// 判断流是否成为新的 largest flow（公平丢包的受害者）
    pub(crate) fn update_large_flow(&mut self, id: FlowId) {
        let limit = self.cfg.large_flow_bytes;
        if let Some(large) = self.large_flow {
            if self.fq(large).bytes < limit {
                self.large_flow = None;
            }
        }
        let (bytes, empty) = {
            let fq = self.fq(id);
            (fq.bytes, fq.is_empty())
        };
        if bytes < limit {
            return;
        }
        match self.large_flow {
            None => {
                if !empty {
                    self.large_flow = Some(id);
                }
            }
            Some(prev) => {
                if bytes > self.fq(prev).bytes {
                    self.large_flow = Some(id);
                }
            }
        }
    }

    /// 以包的来源登记流控条目，成功时置 `fc_on`
    pub(crate) fn register_flow_control(&mut self, id: FlowId, source: FlowSource) -> bool {
        let fq = self.fq(id);
        let key = FlowKey::new(fq.flow_hash, fq.class);
        if !self.fc.register(key, source) {
            return false;
        }
        self.fq_mut(id).fc_on = true;
        self.classes[key.class.0].stats.flow_control += 1;
        true
    }

    /// 流恢复正常：撤销流控通告
    pub(crate) fn flow_feedback(&mut self, id: FlowId) {
        let fq = self.fq_mut(id);
        fq.fc_on = false;
        let (hash, class) = (fq.flow_hash, fq.class);
        self.fc.release(FlowKey::new(hash, class));
        self.classes[class.0].stats.flow_feedback += 1;
        trace!(flow_hash = hash, "flow control released");
    }

    pub(crate) fn count_interface_drop(&mut self, pkts: u64, bytes: u64) {
        self.stats.drop_pkts = self.stats.drop_pkts.saturating_add(pkts);
        self.stats.drop_bytes = self.stats.drop_bytes.saturating_add(bytes);
    }

    /// 从队头取出一个包，只做计数，不做时延记账
    pub(crate) fn take_head(&mut self, id: FlowId) -> Option<P> {
        let fq = self.fq_mut(id);
        let pkt = fq.pkts.pop_front()?;
        let plen = u64::from(pkt.len_bytes());
        assert!(
            fq.bytes >= plen,
            "flow {:#x} byte count {} below packet length {}",
            fq.flow_hash,
            fq.bytes,
            plen
        );
        fq.bytes -= plen;
        if fq.is_empty() {
            // 空闲时间不计入后续的时延测量
            fq.last_dequeue = None;
        }
        let class = fq.class;
        let st = &mut self.classes[class.0].stats;
        st.byte_cnt -= plen;
        st.pkt_cnt -= 1;
        self.qlen -= 1;
        self.qbytes -= plen;
        Some(pkt)
    }

    /// 队头丢弃一个包，计入接口丢包数
    pub(crate) fn head_drop(&mut self, id: FlowId) -> Option<P> {
        let mut pkt = self.take_head(id)?;
        pkt.set_timestamp(SimTime::ZERO);
        pkt.flags_mut().remove(PacketFlags::GUARDED);
        self.count_interface_drop(1, u64::from(pkt.len_bytes()));
        Some(pkt)
    }

    /// 从 largest flow 队头丢一个包，为其他流的新包腾出空间
    pub(crate) fn drop_from_largest(&mut self, now: SimTime) -> Option<P> {
        let id = self.large_flow?;
        // 受害流不应因此被误判为出队停滞
        self.fq_mut(id).last_dequeue = Some(now);
        let pkt = self.head_drop(id)?;
        let (class, empty, state) = {
            let fq = self.fq(id);
            (fq.class, fq.is_empty(), fq.state)
        };
        self.classes[class.0].stats.drop_overflow += 1;
        if empty {
            self.large_flow = None;
            if state.is_active() {
                self.move_to_empty(id, now);
            }
        }
        Some(pkt)
    }

    pub fn snapshot(&self) -> InterfaceSnapshot {
        InterfaceSnapshot {
            name: self.name.clone(),
            qlen: self.qlen,
            qbytes: self.qbytes,
            flows: self.index.len(),
            empty_flows: self.empty_flows.len(),
            largest_flow_hash: self.large_flow.map(|id| self.fq(id).flow_hash),
            drops: self.stats,
            classes: self
                .classes
                .iter()
                .map(|c| ClassSnapshot {
                    name: c.name.clone(),
                    quantum: c.quantum,
                    new_flows: c.new_flows.len(),
                    old_flows: c.old_flows.len(),
                    stats: c.stats.clone(),
                })
                .collect(),
        }
    }
}

impl<P: ClassqPacket> Drop for FqInterface<P> {
    fn drop(&mut self) {
        if self.index.is_empty() {
            return;
        }
        let dropped = self.teardown();
        if !dropped.is_empty() {
            warn!(iface = %self.name, dropped = dropped.len(), "dropping interface with queued packets");
        }
    }
}
