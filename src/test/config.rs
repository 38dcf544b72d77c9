use crate::queue::{ClassConfig, ConfigError, FqConfig};
use crate::sim::SimTime;

#[test]
fn defaults_are_valid() {
    let cfg = FqConfig::default();
    cfg.validate().expect("defaults validate");
    assert_eq!(cfg.target_delay(), SimTime::from_millis(10));
    assert_eq!(cfg.update_interval(), SimTime::from_millis(100));
    assert_eq!(cfg.empty_purge_delay(), SimTime::from_secs(1));
    assert_eq!(cfg.classes.len(), 4);
    assert_eq!(cfg.almost_full_pkts(), 1638);
}

#[test]
fn partial_json_fills_in_defaults() {
    let cfg = FqConfig::from_json_str(
        r#"{ "pkt_drop_limit": 64, "classes": [ { "name": "be" }, { "name": "vo", "quantum": 600 } ] }"#,
    )
    .expect("parse");
    assert_eq!(cfg.pkt_drop_limit, 64);
    assert_eq!(cfg.target_delay_us, 10_000);
    assert_eq!(
        cfg.classes,
        vec![ClassConfig::new("be", 1514), ClassConfig::new("vo", 600)]
    );
    assert_eq!(cfg.almost_full_pkts(), 51);
}

#[test]
fn malformed_json_is_reported() {
    let err = FqConfig::from_json_str("{ not json").expect_err("should fail");
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn inconsistent_values_are_rejected() {
    let cases = [
        FqConfig {
            classes: Vec::new(),
            ..FqConfig::default()
        },
        FqConfig {
            classes: vec![ClassConfig::new("be", 0)],
            ..FqConfig::default()
        },
        FqConfig {
            pkt_drop_limit: 0,
            ..FqConfig::default()
        },
        FqConfig {
            target_delay_us: 100_000,
            ..FqConfig::default()
        },
        FqConfig {
            almost_full_pct: 0,
            ..FqConfig::default()
        },
    ];
    for cfg in cases {
        let err = cfg.validate().expect_err("should be rejected");
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("fqcodel-rs-no-such-config.json");
    let err = FqConfig::from_path(&path).expect_err("missing file");
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("no-such-config"));
}
