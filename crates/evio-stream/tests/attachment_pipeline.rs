//! End-to-end attachment pipeline tests.

use bytes::Bytes;
use futures_util::StreamExt;

use evio_core::{encode, Packet, PacketType, ProtocolVersion, Value};
use evio_stream::{
    decode_frame, AttachmentRegistry, PipelineConfig, PipelineError, ReaderSource, SlotState,
};

fn binary_event(payloads: &[&'static [u8]]) -> Packet {
    let mut items = vec![Value::from("upload")];
    items.extend(payloads.iter().map(|p| Value::Binary(Bytes::from_static(p))));
    Packet::new(PacketType::Event).with_data(Value::List(items))
}

fn short_timeout() -> PipelineConfig {
    PipelineConfig {
        supply_timeout_ms: 100,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn fixture_frame_end_to_end() {
    let frame = br#"51-["hello",{"_placeholder":true,"num":0}]"#;
    let (packet, mut registry) = decode_frame(frame, ProtocolVersion::V5).unwrap();
    assert_eq!(packet.packet_type, PacketType::BinaryEvent);
    assert_eq!(registry.len(), 1);

    let reader = registry.reader(0).unwrap();
    registry.supply(0, Bytes::from_static(&[1, 2, 3])).unwrap();
    let payload = reader.bytes().await.unwrap();
    assert_eq!(payload, Bytes::from_static(&[1, 2, 3]));
    assert_eq!(registry.state(0).unwrap(), SlotState::Done);

    let mut data = packet.data.unwrap();
    data.resolve_placeholders(&[payload]).unwrap();
    assert_eq!(
        data,
        Value::List(vec![
            Value::from("hello"),
            Value::Binary(Bytes::from_static(&[1, 2, 3])),
        ])
    );
}

#[tokio::test]
async fn encode_then_decode_restores_attachment_bytes() {
    let packet = binary_event(&[b"first payload", b"second payload"]);
    let (frame, attachments) = encode(packet.clone(), ProtocolVersion::V5).unwrap();
    assert_eq!(attachments.len(), 2);

    let (decoded, mut registry) = decode_frame(&frame, ProtocolVersion::V5).unwrap();
    assert_eq!(decoded.packet_type, PacketType::BinaryEvent);
    assert_eq!(registry.len(), 2);

    let mut payloads = Vec::new();
    for (slot, bytes) in attachments.iter().enumerate() {
        let reader = registry.reader(slot).unwrap();
        registry.supply(slot, bytes.clone()).unwrap();
        payloads.push(reader.bytes().await.unwrap());
    }
    assert_eq!(payloads, attachments);

    let mut data = decoded.data.unwrap();
    data.resolve_placeholders(&payloads).unwrap();
    assert_eq!(Some(data), packet.data);
}

#[tokio::test]
async fn reader_waits_for_a_late_source() {
    let (_, mut registry) =
        decode_frame(br#"51-[{"_placeholder":true,"num":0}]"#, ProtocolVersion::V5).unwrap();
    let reader = registry.reader(0).unwrap();
    assert_eq!(registry.state(0).unwrap(), SlotState::AwaitingSource);

    let collect = tokio::spawn(reader.bytes());
    tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    registry.supply(0, Bytes::from_static(b"late")).unwrap();

    assert_eq!(collect.await.unwrap().unwrap(), Bytes::from_static(b"late"));
}

#[tokio::test]
async fn slots_accept_sources_out_of_order() {
    let packet = binary_event(&[b"zero", b"one"]);
    let (frame, attachments) = encode(packet, ProtocolVersion::V5).unwrap();
    let (_, mut registry) = decode_frame(&frame, ProtocolVersion::V5).unwrap();

    let reader0 = registry.reader(0).unwrap();
    let reader1 = registry.reader(1).unwrap();
    registry.supply(1, attachments[1].clone()).unwrap();
    registry.supply(0, attachments[0].clone()).unwrap();

    assert_eq!(reader1.bytes().await.unwrap(), Bytes::from_static(b"one"));
    assert_eq!(reader0.bytes().await.unwrap(), Bytes::from_static(b"zero"));
}

#[tokio::test]
async fn missing_source_times_out() {
    let mut registry = AttachmentRegistry::with_config(1, &short_timeout());
    let mut reader = registry.reader(0).unwrap();
    let err = reader.next_chunk().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SupplyTimeout { slot: 0, millis: 100 }
    ));
}

#[tokio::test]
async fn cancelled_slot_fails_its_reader() {
    let mut registry = AttachmentRegistry::with_config(1, &short_timeout());
    let mut reader = registry.reader(0).unwrap();
    registry.cancel(0).unwrap();
    assert_eq!(registry.state(0).unwrap(), SlotState::Failed);

    let err = reader.next_chunk().await.unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled(0)));

    // A cancelled slot refuses a late source.
    assert!(matches!(
        registry.supply(0, Bytes::from_static(b"late")),
        Err(PipelineError::Cancelled(0))
    ));
}

#[tokio::test]
async fn each_slot_has_one_reader_and_one_source() {
    let mut registry = AttachmentRegistry::new(1);
    let _reader = registry.reader(0).unwrap();
    assert!(matches!(
        registry.reader(0),
        Err(PipelineError::AlreadyClaimed(0))
    ));

    registry.supply(0, Bytes::from_static(b"x")).unwrap();
    assert!(matches!(
        registry.supply(0, Bytes::from_static(b"y")),
        Err(PipelineError::AlreadySupplied(0))
    ));
}

#[tokio::test]
async fn out_of_range_slots_are_rejected() {
    let mut registry = AttachmentRegistry::new(1);
    assert!(matches!(
        registry.reader(3),
        Err(PipelineError::SlotOutOfRange(3, 1))
    ));
    assert!(matches!(
        registry.supply(3, Bytes::from_static(b"x")),
        Err(PipelineError::SlotOutOfRange(3, 1))
    ));
}

#[tokio::test]
async fn async_read_sources_stream_in_chunks() {
    let mut registry = AttachmentRegistry::new(1);
    let mut reader = registry.reader(0).unwrap();

    let payload: &[u8] = b"a payload large enough to split across several chunks";
    registry
        .supply(0, ReaderSource::with_chunk_bytes(payload, 8))
        .unwrap();

    let mut collected = Vec::new();
    let mut chunks = 0;
    while let Some(chunk) = reader.next_chunk().await.unwrap() {
        assert!(chunk.len() <= 8);
        collected.extend_from_slice(&chunk);
        chunks += 1;
    }
    assert!(chunks > 1, "expected the payload to arrive in pieces");
    assert_eq!(collected, payload);
}

#[tokio::test]
async fn reader_works_as_a_stream() {
    let mut registry = AttachmentRegistry::new(1);
    let reader = registry.reader(0).unwrap();
    registry.supply(0, Bytes::from_static(b"streamed")).unwrap();

    let chunks: Vec<_> = reader.collect().await;
    let total: usize = chunks
        .iter()
        .map(|c| c.as_ref().map(|b| b.len()).unwrap_or(0))
        .sum();
    assert_eq!(total, b"streamed".len());
    assert!(chunks.iter().all(|c| c.is_ok()));
}

#[tokio::test]
async fn empty_attachment_is_a_clean_end() {
    let mut registry = AttachmentRegistry::new(1);
    let reader = registry.reader(0).unwrap();
    registry.supply(0, Bytes::new()).unwrap();
    assert_eq!(reader.bytes().await.unwrap(), Bytes::new());
}
