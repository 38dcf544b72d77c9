//! 时延与停滞监测
//!
//! - 入队前：检测出队停滞（有积压但长时间没有出队）；
//! - 出队时：计算排队时延，维护区间最小值与服务类的 min/max/平均时延；
//! - 区间翻转：CoDel 控制律，区间最小时延超过目标即置 `delay_high`，
//!   任意一个区间低于目标即清除。

use tracing::{info, warn};

use super::flow_queue::FlowQueue;
use super::interface::FqInterface;
use super::stats::ClassStats;
use crate::net::{ClassqPacket, FlowId};
use crate::sim::SimTime;

impl<P: ClassqPacket> FlowQueue<P> {
    /// 是否满足出队停滞条件
    pub(crate) fn is_dequeue_stalled(
        &self,
        now: SimTime,
        min_backlog: u64,
        update_interval: SimTime,
    ) -> bool {
        let Some(last) = self.last_dequeue else {
            return false;
        };
        if self.delay_high || self.is_empty() || self.bytes < min_backlog {
            return false;
        }
        now > last.saturating_add(update_interval)
    }

    /// 更新本区间的最小排队时延
    pub(crate) fn observe_qdelay(&mut self, qdelay: SimTime) {
        if self.min_qdelay.is_zero() || (!qdelay.is_zero() && qdelay < self.min_qdelay) {
            self.min_qdelay = qdelay;
        }
    }

    /// 区间到期时执行 CoDel 判定；返回 `true` 表示 `delay_high` 刚被置位
    pub(crate) fn roll_interval(
        &mut self,
        now: SimTime,
        target: SimTime,
        update_interval: SimTime,
    ) -> bool {
        if now < self.next_deadline {
            return false;
        }
        let raised = if self.min_qdelay > target {
            let was_high = self.delay_high;
            self.delay_high = true;
            !was_high
        } else {
            self.delay_high = false;
            false
        };
        self.next_deadline = now.saturating_add(update_interval);
        self.min_qdelay = SimTime::ZERO;
        raised
    }
}

impl ClassStats {
    /// 记录一次出队的时延样本；返回 `true` 表示平均值因溢出被重置
    pub(crate) fn record_dequeue(&mut self, qdelay: SimTime, bytes: u64) -> bool {
        if self.min_qdelay.is_zero() || (!qdelay.is_zero() && qdelay < self.min_qdelay) {
            self.min_qdelay = qdelay;
        }
        if self.max_qdelay.is_zero() || qdelay > self.max_qdelay {
            self.max_qdelay = qdelay;
        }

        let n = self.dequeue;
        let mut reset = false;
        if n == 0 {
            self.avg_qdelay = qdelay;
        } else if !qdelay.is_zero() {
            let avg = n.checked_add(1).and_then(|n1| {
                self.avg_qdelay
                    .as_nanos()
                    .checked_mul(n)
                    .and_then(|sum| sum.checked_add(qdelay.as_nanos()))
                    .map(|sum| sum / n1)
            });
            match avg {
                Some(avg) => self.avg_qdelay = SimTime(avg),
                None => {
                    // 溢出：用当前样本重新起算
                    self.avg_qdelay = qdelay;
                    self.dequeue = 0;
                    self.dequeue_bytes = 0;
                    reset = true;
                }
            }
        }
        self.dequeue = self.dequeue.saturating_add(1);
        self.dequeue_bytes = self.dequeue_bytes.saturating_add(bytes);
        reset
    }
}

impl<P: ClassqPacket> FqInterface<P> {
    /// 入队前的停滞检测，每个停滞间隔只计一次
    pub(crate) fn detect_dequeue_stall(&mut self, id: FlowId, now: SimTime) {
        let min_backlog = self.cfg.min_stall_backlog_bytes;
        let interval = self.cfg.update_interval();
        let fq = self.fq_mut(id);
        if !fq.is_dequeue_stalled(now, min_backlog, interval) {
            return;
        }
        fq.delay_high = true;
        let (hash, class, bytes) = (fq.flow_hash, fq.class, fq.bytes);
        let since = fq
            .last_dequeue
            .map(|last| now.saturating_sub(last))
            .unwrap_or_default();
        let st = &mut self.classes[class.0].stats;
        st.dequeue_stall += 1;
        let stalls = st.dequeue_stall;
        warn!(
            iface = %self.name(),
            flow_hash = hash,
            class = class.0,
            bytes,
            stalled_ns = since.as_nanos(),
            stalls,
            "dequeue stall"
        );
    }

    /// 出队后的时延记账与标志维护
    pub(crate) fn account_dequeue(&mut self, id: FlowId, qdelay: SimTime, plen: u64, now: SimTime) {
        let target = self.cfg.target_delay();
        let interval = self.cfg.update_interval();

        let fq = self.fq_mut(id);
        fq.observe_qdelay(qdelay);
        let class = fq.class;
        let hash = fq.flow_hash;

        if self.classes[class.0].stats.record_dequeue(qdelay, plen) {
            info!(iface = %self.name(), flow_hash = hash, "dequeue count overflow, average reset");
        }

        let fq = self.fq_mut(id);
        let min_qdelay = fq.min_qdelay;
        if fq.roll_interval(now, target, interval) {
            warn!(
                iface = %self.name(),
                flow_hash = hash,
                class = class.0,
                min_qdelay_ns = min_qdelay.as_nanos(),
                "high delay"
            );
        }

        let keep_overwhelming = self.large_flow == Some(id) && self.almost_at_drop_limit();
        let fq = self.fq_mut(id);
        if !keep_overwhelming {
            fq.overwhelming = false;
        }
        if fq.is_empty() {
            fq.delay_high = false;
        }
        let release_fc = fq.fc_on && !fq.delay_high && !fq.overwhelming;
        fq.last_dequeue = if fq.is_empty() { None } else { Some(now) };

        if release_fc {
            self.flow_feedback(id);
        }
        self.update_large_flow(id);
    }
}
