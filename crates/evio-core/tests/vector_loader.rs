//! JSON test vector loader shared by the frame conformance tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use evio_core::Value;

#[derive(Debug, Deserialize)]
pub struct TestVector {
    pub description: String,
    pub version: u8,
    pub frame: FrameData,
    #[serde(default)]
    pub expect: Option<ExpectPacket>,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
pub struct FrameData {
    pub encoding: String,
    pub data: String,
}

impl FrameData {
    pub fn decode(&self) -> Vec<u8> {
        match self.encoding.as_str() {
            "utf8" => self.data.as_bytes().to_vec(),
            "hex" => hex::decode(&self.data).expect("invalid hex in test vector"),
            other => panic!("unsupported encoding: {other}"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpectPacket {
    #[serde(rename = "type")]
    pub packet_type: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub ack_id: u64,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub attachments: usize,
}

fn default_namespace() -> String {
    "/".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub kind: String,
}

/// Render a decoded payload tree back to plain JSON for comparison:
/// placeholders as their wire markers, binary leaves as base64 wrappers.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Value::Number(n.clone()),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
        Value::Binary(bytes) => {
            let mut obj = serde_json::Map::new();
            obj.insert("base64".to_string(), serde_json::Value::Bool(true));
            obj.insert(
                "data".to_string(),
                serde_json::Value::String(BASE64.encode(bytes)),
            );
            serde_json::Value::Object(obj)
        }
        Value::Placeholder(num) => {
            let mut obj = serde_json::Map::new();
            obj.insert("_placeholder".to_string(), serde_json::Value::Bool(true));
            obj.insert("num".to_string(), serde_json::Value::from(*num as u64));
            serde_json::Value::Object(obj)
        }
    }
}
