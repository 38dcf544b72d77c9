//! DRR 调度器
//!
//! 接口核心之外的参考调度器：在服务类之间轮转，在类内按 RFC 8290 的
//! new/old 链表做 Deficit Round Robin，并调用接口的出队入口。

use tracing::trace;

use super::time::SimTime;
use crate::net::{ClassId, ClassqPacket};
use crate::queue::{FlowState, FqInterface};

/// Deficit Round Robin 调度器
#[derive(Debug, Default)]
pub struct DrrScheduler {
    next_class: usize,
}

impl DrrScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 选出下一个要发送的包
    pub fn dequeue<P: ClassqPacket>(
        &mut self,
        ifq: &mut FqInterface<P>,
        now: SimTime,
    ) -> Option<P> {
        let n = ifq.class_count();
        for i in 0..n {
            let class = ClassId((self.next_class + i) % n);
            if let Some(pkt) = Self::dequeue_class(ifq, class, now) {
                self.next_class = (class.0 + 1) % n;
                return Some(pkt);
            }
        }
        None
    }

    fn dequeue_class<P: ClassqPacket>(
        ifq: &mut FqInterface<P>,
        class: ClassId,
        now: SimTime,
    ) -> Option<P> {
        let quantum = ifq.class(class).quantum();
        while let Some(id) = ifq.candidate(class) {
            let (deficit, state) = {
                let fq = ifq.flow(id)?;
                (fq.deficit(), fq.state())
            };
            if deficit <= 0 {
                // 配额耗尽：补充配额并移到 old 链表尾部
                ifq.flow_mut(id)?.grant_quantum(quantum);
                ifq.rotate_to_old(id);
                continue;
            }
            match ifq.remove(id, now) {
                Some(pkt) => {
                    ifq.flow_mut(id)?.charge_deficit(pkt.len_bytes());
                    return Some(pkt);
                }
                None if state == FlowState::New => {
                    // 新流排空后先进入 old 链表
                    ifq.rotate_to_old(id);
                }
                None => {
                    trace!(?id, "old flow drained");
                    ifq.move_to_empty(id, now);
                }
            }
        }
        None
    }
}
