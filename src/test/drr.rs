use super::{BE, iface, pkt};
use crate::net::{ClassId, Protocol};
use crate::queue::{FlowState, FqConfig};
use crate::sim::{DrrScheduler, FlowSpec, ScenarioSpec, SimTime, run_scenario};

#[test]
fn sparse_flow_is_not_stuck_behind_a_backlog() {
    let mut ifq = iface(FqConfig::default());
    for i in 0..10 {
        ifq.admit(BE, vec![pkt(i, 0xa, 1500, 0)]);
    }
    ifq.admit(BE, vec![pkt(100, 0xb, 1500, 0)]);
    ifq.admit(BE, vec![pkt(101, 0xb, 1500, 0)]);

    let mut drr = DrrScheduler::new();
    let mut order = Vec::new();
    while let Some(p) = drr.dequeue(&mut ifq, SimTime::from_millis(1)) {
        order.push(p.flow_hash);
    }
    assert_eq!(order.len(), 12);
    let sparse: Vec<usize> = order
        .iter()
        .enumerate()
        .filter(|(_, h)| **h == 0xb)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(sparse, vec![2, 3]);
    assert_eq!(ifq.qlen(), 0);
}

#[test]
fn drained_flows_end_up_on_the_empty_list() {
    let mut ifq = iface(FqConfig::default());
    ifq.admit(BE, vec![pkt(1, 0xa, 100, 0)]);
    let mut drr = DrrScheduler::new();
    assert!(drr.dequeue(&mut ifq, SimTime::from_millis(1)).is_some());
    assert!(drr.dequeue(&mut ifq, SimTime::from_millis(1)).is_none());
    assert_eq!(ifq.empty_flow_count(), 1);
    let id = super::flow_of(&ifq, 0xa);
    assert_eq!(ifq.flow(id).expect("flow").state(), FlowState::Empty);
}

#[test]
fn drained_flows_can_be_purged() {
    let mut ifq = iface(FqConfig::default());
    ifq.admit(BE, vec![pkt(1, 0xa, 100, 0)]);
    ifq.admit(BE, vec![pkt(2, 0xb, 100, 0)]);
    let mut drr = DrrScheduler::new();
    while drr.dequeue(&mut ifq, SimTime::from_millis(1)).is_some() {}

    for hash in [0xa, 0xb] {
        let id = super::flow_of(&ifq, hash);
        assert!(!ifq.flow(id).expect("flow").in_service_list());
    }
    assert_eq!(ifq.purge_empty(SimTime::from_millis(1001)), 2);
    assert_eq!(ifq.flow_count(), 0);
}

#[test]
fn classes_are_served_round_robin() {
    let mut ifq = iface(FqConfig::default());
    let vo = ClassId(3);
    for i in 0..3 {
        ifq.admit(BE, vec![pkt(i, 0xa, 100, 0)]);
        ifq.admit(vo, vec![pkt(10 + i, 0xb, 100, 0)]);
    }
    let mut drr = DrrScheduler::new();
    let order: Vec<u32> = std::iter::from_fn(|| drr.dequeue(&mut ifq, SimTime::from_millis(1)))
        .map(|p| p.flow_hash)
        .collect();
    assert_eq!(order, vec![0xa, 0xb, 0xa, 0xb, 0xa, 0xb]);
}

fn flow(flow_hash: u32, proto: Protocol, from_socket: bool, gap_us: u64) -> FlowSpec {
    FlowSpec {
        flow_hash,
        class: BE,
        proto,
        from_socket,
        pkt_bytes: 1500,
        gap_us,
        start_us: 0,
        bursts: None,
        chain: 1,
        comp_gen_run: 0,
    }
}

#[test]
fn scenario_protects_light_flows_from_a_heavy_one() {
    let spec = ScenarioSpec {
        schema_version: 1,
        fq: FqConfig::default(),
        link_mbps: 10,
        until_ms: 400,
        pool_limit: None,
        flows: vec![
            flow(1, Protocol::Tcp, true, 12_000),
            flow(2, Protocol::Tcp, true, 12_000),
            flow(0xbeef, Protocol::Udp, false, 600),
        ],
    };
    let report = run_scenario(&spec).expect("scenario runs");

    let heavy = &report.flows[2];
    assert!(heavy.dropped_pkts > 0, "{heavy:?}");
    for light in &report.flows[..2] {
        assert_eq!(light.dropped_pkts, 0, "{light:?}");
        assert!(light.delivered_pkts + 2 >= light.sent_pkts, "{light:?}");
    }
    assert!(report.interface.classes[1].stats.drop_early > 0);
    assert!(report.interface.drops.drop_pkts >= heavy.dropped_pkts);
    assert!(report.link_tx_pkts > 0);
}

#[test]
fn scenario_rejects_unknown_classes() {
    let mut bad = flow(1, Protocol::Tcp, false, 1000);
    bad.class = ClassId(9);
    let spec = ScenarioSpec {
        schema_version: 1,
        fq: FqConfig::default(),
        link_mbps: 10,
        until_ms: 10,
        pool_limit: None,
        flows: vec![bad],
    };
    assert!(run_scenario(&spec).is_err());
}
