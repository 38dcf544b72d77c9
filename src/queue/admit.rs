//! 入队
//!
//! [`FqInterface::admit`] 把同属一个流的一串包放入该流的队列，途中依次经过
//! 停滞检测、过载处理（流控通告或队头丢弃）、接口容量/公平性处理和压缩。

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::flow_queue::FlowState;
use super::interface::FqInterface;
use super::stats::DropCause;
use crate::net::{ClassId, ClassqPacket, FlowId, FlowKey, PacketFlags};
use crate::sim::SimTime;

/// 入队结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmitResult {
    Accepted,
    /// 已入队，同时向发送方发出降速通告
    AcceptedWithFlowControl,
    /// 因流控被丢弃
    DroppedFlowControl,
    Dropped,
}

impl AdmitResult {
    pub fn is_dropped(self) -> bool {
        matches!(self, AdmitResult::Dropped | AdmitResult::DroppedFlowControl)
    }

    pub fn is_flow_controlled(self) -> bool {
        matches!(
            self,
            AdmitResult::AcceptedWithFlowControl | AdmitResult::DroppedFlowControl
        )
    }
}

/// 一次入队的完整结果
#[derive(Debug)]
pub struct AdmitOutcome<P> {
    pub result: AdmitResult,
    /// 包所属的流；分配失败时为 `None`
    pub flow: Option<FlowId>,
    /// 本次调用丢弃的包：被拒绝的整串包，以及为腾出空间而队头丢弃的包
    pub dropped: Vec<P>,
    /// 被压缩替换掉的旧尾包
    pub replaced: Option<P>,
}

impl<P> AdmitOutcome<P> {
    pub fn compressed(&self) -> bool {
        self.replaced.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropType {
    NoDrop,
    Forced,
    Early,
}

fn release_chain<P: ClassqPacket>(chain: &mut [P]) {
    for pkt in chain {
        pkt.flags_mut().remove(PacketFlags::GUARDED);
    }
}

impl<P: ClassqPacket> FqInterface<P> {
    /// 入队一串同流的包。
    ///
    /// "当前时间"取链首包的时间戳（调用方须在入队前打好时间戳）。
    /// 链中的包必须属于同一流，且都不在调度路径上。
    pub fn admit(&mut self, class: ClassId, mut chain: Vec<P>) -> AdmitOutcome<P> {
        assert!(!chain.is_empty(), "admit called with an empty chain");
        for pkt in chain.iter_mut() {
            assert!(pkt.len_bytes() > 0, "zero-length packet admitted");
            let flags = pkt.flags_mut();
            assert!(
                !flags.contains(PacketFlags::GUARDED),
                "packet admitted while already queued"
            );
            flags.insert(PacketFlags::GUARDED);
        }

        let head = &chain[0];
        let now = head.timestamp();
        let flow_hash = head.flow_hash();
        let source = head.flow_source();
        let proto = head.protocol();
        let advisory = head.flags().contains(PacketFlags::FLOW_ADVISORY);
        let cnt = chain.len() as u64;
        let chain_bytes: u64 = chain.iter().map(|p| u64::from(p.len_bytes())).sum();

        let id = match self.find_or_create_flow(FlowKey::new(flow_hash, class), source, now) {
            Ok(id) => id,
            Err(err) => {
                warn!(iface = %self.name(), flow_hash, %err, "memory failure drop");
                self.classes[class.0]
                    .stats
                    .count_drop(DropCause::MemFailure, cnt);
                self.count_interface_drop(cnt, chain_bytes);
                release_chain(&mut chain);
                return AdmitOutcome {
                    result: AdmitResult::Dropped,
                    flow: None,
                    dropped: chain,
                    replaced: None,
                };
            }
        };
        trace!(
            flow_hash,
            class = class.0,
            flow_bytes = self.fq(id).bytes,
            chain_bytes,
            "enqueue"
        );

        self.detect_dequeue_stall(id, now);

        let mut droptype = DropType::NoDrop;
        let mut fc_adv = false;
        let mut result = AdmitResult::Accepted;
        let mut dropped = Vec::new();

        let fq = self.fq(id);
        let fc_capable = fq.fc_capable;
        if fq.delay_high || fq.overwhelming {
            if fc_capable && advisory {
                fc_adv = true;
                // 不能响应通告的协议直接丢弃整串
                if !proto.honors_flow_advisory() {
                    droptype = DropType::Early;
                    self.classes[class.0].stats.count_drop(DropCause::Early, cnt);
                }
            } else {
                // 从本流队头丢弃，为新包腾出空间
                if !self.fq(id).is_empty() {
                    for _ in 0..cnt {
                        dropped.extend(self.head_drop(id));
                    }
                } else {
                    droptype = DropType::Early;
                }
                self.classes[class.0].stats.count_drop(DropCause::Early, cnt);
            }
        }

        if fc_adv && droptype != DropType::Forced {
            if self.register_flow_control(id, source) {
                result = if droptype == DropType::NoDrop {
                    AdmitResult::AcceptedWithFlowControl
                } else {
                    AdmitResult::DroppedFlowControl
                };
            } else {
                // 流控表满，无法通告时只能丢包
                droptype = DropType::Forced;
                result = AdmitResult::DroppedFlowControl;
                self.classes[class.0]
                    .stats
                    .count_drop(DropCause::FlowControlFail, 1);
            }
        }

        // 接口到达上限：从 largest flow 的队头丢包
        if droptype == DropType::NoDrop && self.at_drop_limit() {
            match self.large_flow {
                Some(large) if large == id => {
                    for _ in 0..cnt {
                        dropped.extend(self.head_drop(id));
                    }
                    self.classes[class.0].stats.count_drop(DropCause::Overflow, cnt);
                    debug!(flow_hash, cnt, "large flow self head drop");

                    // TCP/QUIC 会对队头丢包作出反应；其他协议需要显式通告
                    if fc_capable
                        && advisory
                        && !proto.honors_flow_advisory()
                        && self.register_flow_control(id, source)
                    {
                        self.fq_mut(id).overwhelming = true;
                        self.classes[class.0].stats.overwhelming += 1;
                        result = AdmitResult::AcceptedWithFlowControl;
                        info!(iface = %self.name(), flow_hash, "flow overwhelming");
                    }
                }
                None => {
                    droptype = DropType::Forced;
                    result = AdmitResult::Dropped;
                    self.classes[class.0].stats.count_drop(DropCause::Overflow, cnt);
                    debug!(flow_hash, cnt, "no large flow, dropping chain");
                }
                Some(large) => {
                    debug!(
                        flow_hash,
                        victim = self.fq(large).flow_hash,
                        cnt,
                        "dropping from large flow"
                    );
                    for _ in 0..cnt {
                        dropped.extend(self.drop_from_largest(now));
                    }
                }
            }
        }

        if droptype != DropType::NoDrop {
            self.settle_idle(id, now);
            self.count_interface_drop(cnt, chain_bytes);
            release_chain(&mut chain);
            dropped.extend(chain);
            if !result.is_dropped() {
                result = AdmitResult::Dropped;
            }
            return AdmitOutcome {
                result,
                flow: Some(id),
                dropped,
                replaced: None,
            };
        }

        // 只压缩单包入队
        let replaced = if chain.len() == 1 {
            self.compress(id, &mut chain[0])
        } else {
            None
        };
        if let Some(old) = replaced.as_ref() {
            trace!(flow_hash, old_len = old.len_bytes(), "compressed");
        }

        let fq = self.fq_mut(id);
        fq.pkts.extend(chain);
        fq.bytes += chain_bytes;
        let st = &mut self.classes[class.0].stats;
        st.byte_cnt += chain_bytes;
        st.pkt_cnt += cnt;
        self.qlen += cnt as u32;
        self.qbytes += chain_bytes;

        self.update_large_flow(id);

        if !self.fq(id).state.is_active() {
            self.insert_new(id);
        }

        AdmitOutcome {
            result,
            flow: Some(id),
            dropped,
            replaced,
        }
    }

    /// 被丢弃整串后，若流仍为空且不在服务链表上，则挂到 empty 链表
    fn settle_idle(&mut self, id: FlowId, now: SimTime) {
        let fq = self.fq(id);
        if fq.is_empty() && fq.state == FlowState::Untracked {
            self.move_to_empty(id, now);
        }
    }
}
