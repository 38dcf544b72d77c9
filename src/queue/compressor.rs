//! 包压缩
//!
//! 新到达的单个包与流尾部的包属于同一可压缩代数时，用新包替换旧包。
//! 新包继承旧包的入队时间戳，时延按信息最初到达的时间计算。

use tracing::trace;

use super::interface::FqInterface;
use crate::net::{ClassqPacket, FlowId, PacketFlags};
use crate::sim::SimTime;

impl<P: ClassqPacket> FqInterface<P> {
    /// 尝试用 `pkt` 替换流尾部的包；发生替换时返回被替换的旧包
    pub(crate) fn compress(&mut self, id: FlowId, pkt: &mut P) -> Option<P> {
        if !self.cfg.compression {
            return None;
        }
        let comp_gen = pkt.comp_gen();
        if comp_gen == 0 {
            return None;
        }

        let class = self.fq(id).class;
        self.classes[class.0].stats.pkts_compressible += 1;

        let fq = self.fq_mut(id);
        if fq.tail()?.comp_gen() != comp_gen {
            return None;
        }
        let mut old = fq.pkts.pop_back()?;
        let old_len = u64::from(old.len_bytes());
        fq.bytes -= old_len;
        let hash = fq.flow_hash;

        let st = &mut self.classes[class.0].stats;
        st.byte_cnt -= old_len;
        st.pkt_cnt -= 1;
        st.pkts_compressed += 1;
        self.qlen -= 1;
        self.qbytes -= old_len;

        pkt.set_timestamp(old.timestamp());
        old.set_timestamp(SimTime::ZERO);
        old.flags_mut().remove(PacketFlags::GUARDED);
        trace!(flow_hash = hash, comp_gen, old_len, "compressed tail packet");
        Some(old)
    }
}
