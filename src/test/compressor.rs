use super::{BE, assert_accounting, flow_of, iface, pkt};
use crate::net::{ClassqPacket, PacketFlags};
use crate::queue::{AdmitResult, FqConfig};
use crate::sim::SimTime;

#[test]
fn same_generation_replaces_the_tail() {
    let mut ifq = iface(FqConfig::default());
    let first = ifq.admit(BE, vec![pkt(1, 7, 100, 10).with_comp_gen(5)]);
    assert!(!first.compressed());

    let out = ifq.admit(BE, vec![pkt(2, 7, 120, 20).with_comp_gen(5)]);
    assert_eq!(out.result, AdmitResult::Accepted);
    let old = out.replaced.expect("tail replaced");
    assert_eq!(old.id, 1);
    assert!(!old.flags().contains(PacketFlags::GUARDED));

    let id = flow_of(&ifq, 7);
    let fq = ifq.flow(id).expect("flow");
    assert_eq!(fq.queued_packets(), 1);
    assert_eq!(fq.queued_bytes(), 120);
    let tail = fq.tail().expect("tail");
    assert_eq!(tail.id, 2);
    assert_eq!(tail.timestamp(), SimTime::from_millis(10));
    assert_accounting(&ifq, id);

    let st = ifq.class_stats(BE);
    assert_eq!(st.pkt_cnt, 1);
    assert_eq!(st.byte_cnt, 120);
    assert_eq!(st.pkts_compressible, 2);
    assert_eq!(st.pkts_compressed, 1);
    assert_eq!(ifq.qlen(), 1);
    assert_eq!(ifq.qbytes(), 120);
}

#[test]
fn delay_of_a_merged_packet_counts_from_the_original_arrival() {
    let mut ifq = iface(FqConfig::default());
    ifq.admit(BE, vec![pkt(1, 7, 100, 10).with_comp_gen(5)]);
    ifq.admit(BE, vec![pkt(2, 7, 120, 20).with_comp_gen(5)]);
    let id = flow_of(&ifq, 7);
    ifq.remove(id, SimTime::from_millis(30)).expect("pkt");
    let st = ifq.class_stats(BE);
    assert_eq!(st.avg_qdelay, SimTime::from_millis(20));
    assert_eq!(st.max_qdelay, SimTime::from_millis(20));
}

#[test]
fn different_generations_are_kept_apart() {
    let mut ifq = iface(FqConfig::default());
    ifq.admit(BE, vec![pkt(1, 7, 100, 0).with_comp_gen(5)]);
    let out = ifq.admit(BE, vec![pkt(2, 7, 100, 0).with_comp_gen(6)]);
    assert!(!out.compressed());
    let id = flow_of(&ifq, 7);
    assert_eq!(ifq.flow(id).expect("flow").queued_packets(), 2);
    assert_eq!(ifq.class_stats(BE).pkts_compressible, 2);
    assert_eq!(ifq.class_stats(BE).pkts_compressed, 0);
}

#[test]
fn generation_zero_is_never_compressible() {
    let mut ifq = iface(FqConfig::default());
    ifq.admit(BE, vec![pkt(1, 7, 100, 0)]);
    let out = ifq.admit(BE, vec![pkt(2, 7, 100, 0)]);
    assert!(!out.compressed());
    assert_eq!(ifq.class_stats(BE).pkts_compressible, 0);
}

#[test]
fn compression_can_be_switched_off() {
    let cfg = FqConfig {
        compression: false,
        ..FqConfig::default()
    };
    let mut ifq = iface(cfg);
    ifq.admit(BE, vec![pkt(1, 7, 100, 0).with_comp_gen(5)]);
    let out = ifq.admit(BE, vec![pkt(2, 7, 100, 0).with_comp_gen(5)]);
    assert!(!out.compressed());
    assert_eq!(ifq.qlen(), 2);
    assert_eq!(ifq.class_stats(BE).pkts_compressible, 0);
}

#[test]
fn chains_are_appended_without_compression() {
    let mut ifq = iface(FqConfig::default());
    ifq.admit(BE, vec![pkt(1, 7, 100, 0).with_comp_gen(5)]);
    let chain = vec![
        pkt(2, 7, 100, 0).with_comp_gen(5),
        pkt(3, 7, 100, 0).with_comp_gen(5),
    ];
    let out = ifq.admit(BE, chain);
    assert!(!out.compressed());
    assert_eq!(ifq.flow(flow_of(&ifq, 7)).expect("flow").queued_packets(), 3);
    assert_eq!(ifq.class_stats(BE).pkts_compressed, 0);
}
