use evio_stream::config;
use evio_core::ProtocolVersion;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
pipeline:
  supply_timeout_ms: 5000
limits:
  max_attachmentz: 9 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("invalid yaml"));
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.protocol_version(), ProtocolVersion::V5);
    assert_eq!(cfg.pipeline.supply_timeout_ms, 30_000);
    assert_eq!(cfg.limits.max_frame_bytes, 1 << 20);
}

#[test]
fn version_gate() {
    let bad = r#"
version: 2
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn protocol_version_range_checked() {
    let bad = r#"
version: 1
protocol_version: 9
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("unsupported protocol version"));
}

#[test]
fn timeout_range_checked() {
    let bad = r#"
version: 1
pipeline:
  supply_timeout_ms: 5
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("supply_timeout_ms"));
}

#[test]
fn selected_grammar_reaches_the_decoder() {
    let ok = r#"
version: 1
protocol_version: 3
limits:
  max_frame_bytes: 64
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.protocol_version(), ProtocolVersion::V3);
    assert_eq!(cfg.limits.to_decode_limits().max_frame_bytes, 64);
}
