use crate::sim::SimTime;

#[test]
fn sim_time_unit_conversions() {
    assert_eq!(SimTime::from_micros(1), SimTime(1_000));
    assert_eq!(SimTime::from_millis(1), SimTime(1_000_000));
    assert_eq!(SimTime::from_secs(1), SimTime(1_000_000_000));
}

#[test]
fn sim_time_unit_conversions_saturate_on_overflow() {
    assert_eq!(SimTime::from_micros(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime::from_millis(u64::MAX), SimTime(u64::MAX));
    assert_eq!(SimTime::from_secs(u64::MAX), SimTime(u64::MAX));
}

#[test]
fn sim_time_sub_clamps_at_zero() {
    let t = SimTime::from_millis(5);
    assert_eq!(t.saturating_sub(SimTime::from_millis(2)), SimTime::from_millis(3));
    assert_eq!(SimTime::from_millis(2).saturating_sub(t), SimTime::ZERO);
    assert_eq!(SimTime::MAX.saturating_add(t), SimTime::MAX);
}

#[test]
fn sim_time_serializes_as_plain_nanos() {
    let raw = serde_json::to_string(&SimTime::from_micros(3)).expect("serialize");
    assert_eq!(raw, "3000");
    let t: SimTime = serde_json::from_str("42").expect("deserialize");
    assert_eq!(t, SimTime(42));
}
