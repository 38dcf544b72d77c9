use std::sync::Arc;

use super::{BE, flow_of, pkt};
use crate::net::{FlowKey, Packet};
use crate::queue::{FlowPool, FlowState, FqConfig, FqInterface};
use crate::sim::SimTime;

fn ms(v: u64) -> SimTime {
    SimTime::from_millis(v)
}

fn iface_with_pool(limit: usize) -> (FqInterface<Packet>, Arc<FlowPool<Packet>>) {
    let pool = Arc::new(FlowPool::new(limit));
    let ifq = FqInterface::new("test0", FqConfig::default(), pool.clone()).expect("valid config");
    (ifq, pool)
}

/// 入队一个包、取走并交给 empty 链表
fn drain_to_empty(ifq: &mut FqInterface<Packet>, flow_hash: u32, at_ms: u64) {
    ifq.admit(BE, vec![pkt(u64::from(flow_hash), flow_hash, 100, at_ms)]);
    let id = flow_of(ifq, flow_hash);
    ifq.remove(id, ms(at_ms + 1)).expect("pkt");
    ifq.move_to_empty(id, ms(at_ms + 1));
}

#[test]
fn empty_flows_are_purged_after_the_retention_delay() {
    let (mut ifq, pool) = iface_with_pool(8);
    drain_to_empty(&mut ifq, 7, 0);
    let id = flow_of(&ifq, 7);
    assert_eq!(ifq.flow(id).expect("flow").purge_deadline(), Some(ms(1001)));

    assert_eq!(ifq.purge_empty(ms(1000)), 0);
    assert_eq!(ifq.flow_count(), 1);

    assert_eq!(ifq.purge_empty(ms(1001)), 1);
    assert_eq!(ifq.flow_count(), 0);
    assert_eq!(ifq.empty_flow_count(), 0);
    assert!(ifq.flow(id).is_none());
    assert!(ifq.lookup(FlowKey::new(7, BE)).is_none());
    assert_eq!(ifq.class_stats(BE).flows_purged, 1);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.cached(), 1);
}

#[test]
fn purge_stops_at_the_first_flow_still_retained() {
    let (mut ifq, pool) = iface_with_pool(8);
    drain_to_empty(&mut ifq, 1, 0);
    drain_to_empty(&mut ifq, 2, 500);
    assert_eq!(ifq.purge_empty(ms(1200)), 1);
    assert_eq!(ifq.flow_count(), 1);
    assert_eq!(pool.in_use(), 1);
    assert_eq!(ifq.purge_empty(ms(1600)), 1);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn arrival_reactivates_an_empty_flow() {
    let (mut ifq, pool) = iface_with_pool(8);
    drain_to_empty(&mut ifq, 7, 0);
    let id = flow_of(&ifq, 7);

    ifq.admit(BE, vec![pkt(2, 7, 100, 50)]);
    assert_eq!(flow_of(&ifq, 7), id);
    let fq = ifq.flow(id).expect("flow");
    assert_eq!(fq.state(), FlowState::New);
    assert_eq!(fq.purge_deadline(), None);
    assert_eq!(fq.deficit(), 1514);
    assert_eq!(ifq.empty_flow_count(), 0);
    assert_eq!(ifq.new_flows(BE).collect::<Vec<_>>(), vec![id]);
    assert_eq!(ifq.class_stats(BE).newflows_cnt, 2);
    assert_eq!(pool.in_use(), 1);

    // 已重新激活的流不会被老化回收
    assert_eq!(ifq.purge_empty(ms(5_000)), 0);
    assert_eq!(ifq.flow_count(), 1);
}

#[test]
fn freed_slots_are_reused() {
    let (mut ifq, _pool) = iface_with_pool(8);
    drain_to_empty(&mut ifq, 7, 0);
    let old = flow_of(&ifq, 7);
    ifq.purge_empty(ms(2_000));
    ifq.admit(BE, vec![pkt(9, 9, 100, 2_000)]);
    assert_eq!(flow_of(&ifq, 9), old);
}

#[test]
fn teardown_returns_every_queued_packet() {
    let (mut ifq, pool) = iface_with_pool(8);
    ifq.admit(BE, vec![pkt(1, 1, 100, 0), pkt(2, 1, 100, 0)]);
    ifq.admit(BE, vec![pkt(3, 2, 100, 0)]);
    drain_to_empty(&mut ifq, 3, 0);
    assert_eq!(pool.in_use(), 3);

    let mut ids: Vec<u64> = ifq.teardown().into_iter().map(|p| p.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(ifq.qlen(), 0);
    assert_eq!(ifq.flow_count(), 0);
    assert_eq!(ifq.empty_flow_count(), 0);
    assert_eq!(ifq.class(BE).new_flow_count(), 0);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn dropping_an_interface_returns_flows_to_the_pool() {
    let (mut ifq, pool) = iface_with_pool(8);
    ifq.admit(BE, vec![pkt(1, 1, 100, 0)]);
    ifq.admit(BE, vec![pkt(2, 2, 100, 0)]);
    assert_eq!(pool.in_use(), 2);
    drop(ifq);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn interfaces_share_one_pool() {
    let pool = Arc::new(FlowPool::new(2));
    let mut a: FqInterface<Packet> =
        FqInterface::new("a", FqConfig::default(), pool.clone()).expect("valid config");
    let mut b: FqInterface<Packet> =
        FqInterface::new("b", FqConfig::default(), pool.clone()).expect("valid config");
    a.admit(BE, vec![pkt(1, 1, 100, 0)]);
    b.admit(BE, vec![pkt(2, 1, 100, 0)]);
    let out = b.admit(BE, vec![pkt(3, 2, 100, 0)]);
    assert!(out.flow.is_none());
    assert_eq!(b.class_stats(BE).drop_memfailure, 1);
}

#[test]
fn shared_interface_serializes_callers() {
    let (ifq, _pool) = iface_with_pool(64);
    let shared = ifq.into_shared();
    let workers: Vec<_> = (0..4u32)
        .map(|w| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..50u64 {
                    shared.lock().admit(BE, vec![pkt(i, w, 100, i)]);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().expect("worker panicked");
    }
    let ifq = shared.lock();
    assert_eq!(ifq.qlen(), 200);
    assert_eq!(ifq.flow_count(), 4);
    assert_eq!(ifq.new_flows(BE).count(), 4);
}

#[test]
#[should_panic(expected = "bytes queued")]
fn destroying_a_backlogged_flow_panics() {
    let (mut ifq, _pool) = iface_with_pool(8);
    ifq.admit(BE, vec![pkt(1, 7, 100, 0)]);
    let id = flow_of(&ifq, 7);
    ifq.destroy(id);
}

#[test]
#[should_panic(expected = "before it was detached")]
fn destroying_a_linked_flow_panics() {
    let (mut ifq, _pool) = iface_with_pool(8);
    ifq.admit(BE, vec![pkt(1, 7, 100, 0)]);
    let id = flow_of(&ifq, 7);
    ifq.remove(id, ms(1)).expect("pkt");
    ifq.destroy(id);
}

#[test]
#[should_panic(expected = "active service list")]
fn destroying_a_flow_held_by_the_scheduler_panics() {
    let (mut ifq, _pool) = iface_with_pool(8);
    drain_to_empty(&mut ifq, 7, 0);
    let id = flow_of(&ifq, 7);
    ifq.flow_mut(id).expect("flow").set_in_service_list(true);
    ifq.destroy(id);
}
