//! 出队
//!
//! 外部调度器选定流后调用 [`FqInterface::remove`] 取队头包。

use super::interface::FqInterface;
use crate::net::{ClassqPacket, FlowId, PacketFlags};
use crate::sim::SimTime;

impl<P: ClassqPacket> FqInterface<P> {
    /// 取出流的队头包；流为空时返回 `None`。
    ///
    /// 成功时完成时延记账（区间最小值、服务类 min/max/avg、CoDel 判定），
    /// 并清除包的时间戳与调度路径标记。
    pub fn remove(&mut self, id: FlowId, now: SimTime) -> Option<P> {
        let mut pkt = self.take_head(id)?;
        let qdelay = now.saturating_sub(pkt.timestamp());
        self.account_dequeue(id, qdelay, u64::from(pkt.len_bytes()), now);

        pkt.set_timestamp(SimTime::ZERO);
        pkt.flags_mut().remove(PacketFlags::GUARDED);
        Some(pkt)
    }
}
