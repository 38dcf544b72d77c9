mod compressor;
mod config;
mod drr;
mod lifecycle;
mod sim_time;

use std::sync::Arc;

use crate::net::{ClassId, FlowId, FlowKey, Packet};
use crate::queue::{FQ_ZONE_MAX, FlowPool, FqConfig, FqInterface};
use crate::sim::SimTime;

/// best-effort 服务类
pub(crate) const BE: ClassId = ClassId(1);

pub(crate) fn iface(cfg: FqConfig) -> FqInterface<Packet> {
    FqInterface::new("test0", cfg, Arc::new(FlowPool::new(FQ_ZONE_MAX))).expect("valid config")
}

pub(crate) fn pkt(id: u64, flow_hash: u32, size_bytes: u32, ts_ms: u64) -> Packet {
    Packet::new(id, flow_hash, size_bytes, SimTime::from_millis(ts_ms))
}

pub(crate) fn flow_of(ifq: &FqInterface<Packet>, flow_hash: u32) -> FlowId {
    ifq.lookup(FlowKey::new(flow_hash, BE)).expect("flow exists")
}

/// 流的字节/包计数必须与实际驻留的包一致
pub(crate) fn assert_accounting(ifq: &FqInterface<Packet>, id: FlowId) {
    let fq = ifq.flow(id).expect("flow exists");
    let sum: u64 = fq.iter().map(|p| u64::from(p.size_bytes)).sum();
    assert_eq!(fq.queued_bytes(), sum);
    assert_eq!(fq.queued_packets(), fq.iter().count());
    assert_eq!(fq.queued_bytes() == 0, fq.queued_packets() == 0);
}
