//! Frame conformance vectors, one JSON file per fixture.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use evio_core::{Decoder, GrammarRules, ProtocolVersion};

mod vector_loader;
use vector_loader::{value_to_json, TestVector};

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[test]
fn frame_vectors() {
    let files = [
        "connect_bare.json",
        "disconnect_namespace.json",
        "event_default.json",
        "event_namespace_ack.json",
        "error_namespace.json",
        "binary_event_placeholder.json",
        "connect_payload.json",
        "connect_error_rename.json",
        "namespace_query.json",
        "ack_no_data.json",
        "v2_inline_base64.json",
        "binary_zero_attachments.json",
        "bad_type_byte.json",
        "binary_event_under_v1.json",
        "binary_ack_under_v3.json",
        "prefix_mismatch.json",
        "placeholder_out_of_range.json",
        "empty_frame.json",
        "unterminated_data.json",
        "prefix_stray_byte.json",
    ];

    for file in files {
        let vector = load(file);
        let version = ProtocolVersion::from_u8(vector.version).unwrap();
        let frame = vector.frame.decode();

        let mut decoder = Decoder::new(version);
        let result = decoder.push(&frame).and_then(|_| decoder.finish());

        if let Some(err) = &vector.expect_error {
            let e = result.expect_err("expected error");
            assert_eq!(
                e.kind().as_str(),
                err.kind,
                "vector={} error={e}",
                vector.description
            );
            continue;
        }

        let packet = result.expect("expected ok packet");
        let expect = vector.expect.expect("missing expect block");
        let rules = GrammarRules::for_version(version);

        assert_eq!(
            packet.packet_type.name(&rules),
            expect.packet_type,
            "vector={}",
            vector.description
        );
        assert_eq!(packet.namespace, expect.namespace, "vector={}", vector.description);
        assert_eq!(packet.ack_id, expect.ack_id, "vector={}", vector.description);
        assert_eq!(
            packet.data.as_ref().map(value_to_json),
            expect.data,
            "vector={}",
            vector.description
        );
        assert_eq!(
            decoder.attachment_count(),
            expect.attachments,
            "vector={}",
            vector.description
        );
    }
}
