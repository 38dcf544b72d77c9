//! 出口链路
//!
//! 接口队列之后的发送链路：一次只发送一个包，按带宽计算发送时延。

use super::time::SimTime;

/// 出口链路
#[derive(Debug)]
pub struct Link {
    pub bandwidth_bps: u64,
    /// 当前是否有包在发送
    pub busy: bool,
    pub tx_pkts: u64,
    pub tx_bytes: u64,
}

impl Link {
    /// 创建新链路
    pub fn new(bandwidth_bps: u64) -> Self {
        Self {
            bandwidth_bps,
            busy: false,
            tx_pkts: 0,
            tx_bytes: 0,
        }
    }

    /// 计算传输指定字节数所需的时间
    pub fn tx_time(&self, bytes: u32) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128)
            + (self.bandwidth_bps as u128 - 1))
            / self.bandwidth_bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }
}
