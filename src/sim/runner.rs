//! 场景运行
//!
//! 根据场景描述搭建世界、注入所有流并运行到结束时间，最后汇总报告。

use serde::{Deserialize, Serialize};
use tracing::info;

use super::aqm_world::{AqmWorld, FlowReport, InjectFlow};
use super::scenario::ScenarioSpec;
use super::simulator::Simulator;
use super::time::SimTime;
use crate::queue::{ConfigError, InterfaceSnapshot};

/// 仿真结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    pub until: SimTime,
    pub events: u64,
    pub link_tx_pkts: u64,
    pub link_tx_bytes: u64,
    pub interface: InterfaceSnapshot,
    pub flows: Vec<FlowReport>,
}

/// 运行一个场景
#[tracing::instrument(skip(spec), fields(flows = spec.flows.len(), until_ms = spec.until_ms))]
pub fn run_scenario(spec: &ScenarioSpec) -> Result<SimReport, ConfigError> {
    let mut world = AqmWorld::new(spec)?;
    let mut sim: Simulator<AqmWorld> = Simulator::default();

    for (idx, f) in spec.flows.iter().enumerate() {
        sim.schedule(
            SimTime::from_micros(f.start_us),
            InjectFlow {
                idx,
                seq: 0,
                remaining: f.bursts,
            },
        );
    }

    let until = SimTime::from_millis(spec.until_ms);
    sim.run_until(until, &mut world);

    let report = SimReport {
        until: sim.now(),
        events: sim.executed(),
        link_tx_pkts: world.link.tx_pkts,
        link_tx_bytes: world.link.tx_bytes,
        interface: world.ifq.snapshot(),
        flows: world.reports().to_vec(),
    };
    info!(
        tx_pkts = report.link_tx_pkts,
        drops = report.interface.drops.drop_pkts,
        "scenario finished"
    );
    Ok(report)
}
