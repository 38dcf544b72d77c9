//! AQM 仿真世界
//!
//! 把接口队列、DRR 调度器和出口链路组合在一起，并定义驱动它们的事件：
//! 流按固定间隔注入包，链路发送完一个包后向调度器要下一个。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::drr::DrrScheduler;
use super::event::Event;
use super::link::Link;
use super::scenario::{FlowSpec, ScenarioSpec};
use super::simulator::Simulator;
use super::time::SimTime;
use super::world::World;
use crate::net::{ClassqPacket, Packet};
use crate::queue::{AdmitResult, ConfigError, FQ_ZONE_MAX, FlowPool, FqInterface};

/// empty 链表老化的检查周期
const PURGE_PERIOD: SimTime = SimTime(100_000_000);

/// 单个流的收发统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow_hash: u32,
    pub class: usize,
    pub sent_pkts: u64,
    pub sent_bytes: u64,
    pub dropped_pkts: u64,
    pub compressed_pkts: u64,
    pub flow_control_signals: u64,
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
}

/// AQM 仿真世界
#[derive(Debug)]
pub struct AqmWorld {
    pub ifq: FqInterface<Packet>,
    pub drr: DrrScheduler,
    pub link: Link,
    flows: Vec<FlowSpec>,
    reports: Vec<FlowReport>,
    by_hash: HashMap<u32, usize>,
    next_pkt_id: u64,
    next_purge: SimTime,
}

impl AqmWorld {
    pub fn new(spec: &ScenarioSpec) -> Result<Self, ConfigError> {
        spec.validate()?;
        let pool = Arc::new(FlowPool::new(spec.pool_limit.unwrap_or(FQ_ZONE_MAX)));
        let ifq = FqInterface::new("sim0", spec.fq.clone(), pool)?;
        let reports = spec
            .flows
            .iter()
            .map(|f| FlowReport {
                flow_hash: f.flow_hash,
                class: f.class.0,
                ..FlowReport::default()
            })
            .collect();
        let by_hash = spec
            .flows
            .iter()
            .enumerate()
            .map(|(i, f)| (f.flow_hash, i))
            .collect();
        Ok(Self {
            ifq,
            drr: DrrScheduler::new(),
            link: Link::new(spec.link_mbps.saturating_mul(1_000_000)),
            flows: spec.flows.clone(),
            reports,
            by_hash,
            next_pkt_id: 0,
            next_purge: PURGE_PERIOD,
        })
    }

    pub fn reports(&self) -> &[FlowReport] {
        &self.reports
    }

    fn report_mut(&mut self, flow_hash: u32) -> Option<&mut FlowReport> {
        let idx = *self.by_hash.get(&flow_hash)?;
        self.reports.get_mut(idx)
    }

    fn make_packet(&mut self, idx: usize, seq: u64, now: SimTime) -> Packet {
        let spec = &self.flows[idx];
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        let mut pkt = Packet::new(id, spec.flow_hash, spec.pkt_bytes, now).with_proto(spec.proto);
        if spec.from_socket {
            pkt = pkt.from_socket();
        }
        if spec.comp_gen_run > 0 {
            let generation = seq / u64::from(spec.comp_gen_run) + 1;
            pkt = pkt.with_comp_gen(u32::try_from(generation).unwrap_or(u32::MAX));
        }
        pkt
    }
}

impl World for AqmWorld {
    fn on_tick(&mut self, now: SimTime) {
        if now >= self.next_purge {
            self.ifq.purge_empty(now);
            self.next_purge = now.saturating_add(PURGE_PERIOD);
        }
    }
}

/// 链路空闲时向调度器要下一个包
fn try_transmit(sim: &mut Simulator<AqmWorld>, world: &mut AqmWorld) {
    if world.link.busy {
        return;
    }
    let now = sim.now();
    let Some(pkt) = world.drr.dequeue(&mut world.ifq, now) else {
        return;
    };
    world.link.busy = true;
    let done = now.saturating_add(world.link.tx_time(pkt.len_bytes()));
    sim.schedule(done, TxDone { pkt });
}

/// 流按间隔注入一串包
pub struct InjectFlow {
    pub idx: usize,
    pub seq: u64,
    pub remaining: Option<u64>,
}

impl Event<AqmWorld> for InjectFlow {
    fn execute(self: Box<Self>, sim: &mut Simulator<AqmWorld>, world: &mut AqmWorld) {
        let InjectFlow {
            idx,
            mut seq,
            remaining,
        } = *self;
        let now = sim.now();
        let (class, chain_len, gap) = {
            let spec = &world.flows[idx];
            (spec.class, spec.chain, SimTime::from_micros(spec.gap_us))
        };

        let mut chain = Vec::with_capacity(chain_len as usize);
        for _ in 0..chain_len {
            chain.push(world.make_packet(idx, seq, now));
            seq += 1;
        }
        let sent_bytes: u64 = chain.iter().map(|p| u64::from(p.size_bytes)).sum();
        let outcome = world.ifq.admit(class, chain);
        trace!(idx, result = ?outcome.result, "注入完成");

        let report = &mut world.reports[idx];
        report.sent_pkts += u64::from(chain_len);
        report.sent_bytes += sent_bytes;
        if outcome.result.is_flow_controlled() {
            report.flow_control_signals += 1;
        }
        if outcome.replaced.is_some() {
            report.compressed_pkts += 1;
        }
        for pkt in &outcome.dropped {
            if let Some(r) = world.report_mut(pkt.flow_hash) {
                r.dropped_pkts += 1;
            }
        }
        if outcome.result == AdmitResult::Dropped {
            debug!(idx, "chain dropped");
        }

        try_transmit(sim, world);

        let remaining = remaining.map(|r| r.saturating_sub(1));
        if remaining != Some(0) {
            sim.schedule(
                now.saturating_add(gap),
                InjectFlow {
                    idx,
                    seq,
                    remaining,
                },
            );
        }
    }
}

/// 链路发送完成
pub struct TxDone {
    pub pkt: Packet,
}

impl Event<AqmWorld> for TxDone {
    fn execute(self: Box<Self>, sim: &mut Simulator<AqmWorld>, world: &mut AqmWorld) {
        let TxDone { pkt } = *self;
        world.link.busy = false;
        world.link.tx_pkts += 1;
        world.link.tx_bytes += u64::from(pkt.size_bytes);
        if let Some(r) = world.report_mut(pkt.flow_hash) {
            r.delivered_pkts += 1;
            r.delivered_bytes += u64::from(pkt.size_bytes);
        }
        try_transmit(sim, world);
    }
}
