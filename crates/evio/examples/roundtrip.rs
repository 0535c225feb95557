//! Encode a binary event through tiny buffers, decode it back, and stream
//! the attachment through the pipeline.
//!
//! Run with `RUST_LOG=debug cargo run -p evio --example roundtrip`.

use bytes::Bytes;
use tracing_subscriber::{fmt, EnvFilter};

use evio::core::{Encoder, Packet, PacketType, ProtocolVersion, Value};
use evio::stream::FrameDecoder;

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let packet = Packet::new(PacketType::Event)
        .with_namespace("/files")
        .with_ack(7)
        .with_data(Value::List(vec![
            Value::from("upload"),
            Value::Binary(Bytes::from_static(b"attachment payload")),
        ]));

    // Encode through a deliberately tiny buffer to show resumption.
    let mut encoder = Encoder::new(packet, ProtocolVersion::V5).expect("plan frame");
    tracing::info!(frame_len = encoder.frame_len(), "frame planned");

    let mut frame = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = encoder.read(&mut buf).expect("encode");
        if n == 0 {
            break;
        }
        frame.extend_from_slice(&buf[..n]);
    }
    let attachments: Vec<Bytes> = encoder.attachments().cloned().collect();
    println!("frame: {}", String::from_utf8_lossy(&frame));
    println!("attachments: {}", attachments.len());

    // Decode in chunks, then feed the attachment through the registry.
    let mut decoder = FrameDecoder::new(ProtocolVersion::V5);
    for chunk in frame.chunks(5) {
        decoder.push(chunk).expect("decode chunk");
    }
    let (decoded, mut registry) = decoder.finish().expect("finish");

    let reader = registry.reader(0).expect("claim reader");
    registry
        .supply(0, attachments[0].clone())
        .expect("supply source");
    let payload = reader.bytes().await.expect("collect payload");

    let mut data = decoded.data.expect("data field");
    data.resolve_placeholders(&[payload]).expect("resolve");
    println!("decoded data: {data:?}");
}
