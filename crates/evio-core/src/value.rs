//! Structured payload model for packet data.
//!
//! The data field of a packet is a small tagged tree rather than a raw
//! JSON value: binary leaves are first-class, and how they reach the wire
//! is a grammar decision (out-of-band placeholder, inline base64 wrapper,
//! or a hard error) rather than a runtime type check.
//!
//! Placeholder detection is deliberately narrow: only an object with
//! exactly the two members `"_placeholder": true` and `"num": <uint>`
//! converts, and only while decoding a binary packet under a placeholder
//! grammar. Legacy grammars never run the detection, so user data that
//! happens to contain those keys passes through untouched.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Number;

use crate::error::{EvioError, Result};
use crate::grammar::{BinaryMode, GrammarRules};

/// A packet payload node.
///
/// Maps keep insertion order so that binary-leaf discovery is
/// deterministic; key order carries no semantic weight.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    Str(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    /// Opaque binary payload, carried out-of-band (or inline under V2).
    Binary(Bytes),
    /// Decode-side reference to attachment slot `n`, resolved against the
    /// attachment registry once the slot's bytes arrive.
    Placeholder(usize),
}

impl Value {
    /// Convenience constructor for an ordered map.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Number of binary leaves, in depth-first left-to-right order.
    pub fn binary_leaves(&self) -> usize {
        match self {
            Value::Binary(_) => 1,
            Value::List(items) => items.iter().map(Value::binary_leaves).sum(),
            Value::Map(entries) => entries.iter().map(|(_, v)| v.binary_leaves()).sum(),
            _ => 0,
        }
    }

    /// Replace `Placeholder(n)` leaves with the collected payloads, in
    /// place. `payloads[n]` must exist for every referenced slot.
    pub fn resolve_placeholders(&mut self, payloads: &[Bytes]) -> Result<()> {
        match self {
            Value::Placeholder(num) => {
                let bytes = payloads.get(*num).cloned().ok_or({
                    EvioError::PlaceholderOutOfRange {
                        num: *num as u64,
                        count: payloads.len(),
                    }
                })?;
                *self = Value::Binary(bytes);
                Ok(())
            }
            Value::List(items) => {
                for item in items {
                    item.resolve_placeholders(payloads)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (_, v) in entries {
                    v.resolve_placeholders(payloads)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Depth-first rewrite for the wire: binary leaves are substituted per
    /// the grammar's binary mode, and extracted payloads land on `out` in
    /// encounter order (slot N is the N-th leaf met).
    pub(crate) fn to_wire_json(
        &self,
        rules: &GrammarRules,
        out: &mut Vec<Bytes>,
    ) -> Result<serde_json::Value> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => Ok(serde_json::Value::Number(n.clone())),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::List(items) => {
                let mut arr = Vec::with_capacity(items.len());
                for item in items {
                    arr.push(item.to_wire_json(rules, out)?);
                }
                Ok(serde_json::Value::Array(arr))
            }
            Value::Map(entries) => {
                let mut obj = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    obj.insert(k.clone(), v.to_wire_json(rules, out)?);
                }
                Ok(serde_json::Value::Object(obj))
            }
            Value::Binary(bytes) => match rules.binary {
                BinaryMode::Forbidden => Err(EvioError::BinaryUnsupported(rules.version)),
                BinaryMode::Inline => {
                    let mut obj = serde_json::Map::with_capacity(2);
                    obj.insert("base64".to_string(), serde_json::Value::Bool(true));
                    obj.insert(
                        "data".to_string(),
                        serde_json::Value::String(BASE64.encode(bytes)),
                    );
                    Ok(serde_json::Value::Object(obj))
                }
                BinaryMode::Placeholder => {
                    let num = out.len();
                    out.push(bytes.clone());
                    let mut obj = serde_json::Map::with_capacity(2);
                    obj.insert("_placeholder".to_string(), serde_json::Value::Bool(true));
                    obj.insert("num".to_string(), serde_json::Value::from(num as u64));
                    Ok(serde_json::Value::Object(obj))
                }
            },
            Value::Placeholder(_) => Err(EvioError::Usage(
                "placeholder leaves cannot be re-encoded; resolve attachments first",
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Number::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(Number::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Binary(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Inverse of [`Value::to_wire_json`]: walks parsed wire JSON and rebuilds
/// the payload tree, converting the grammar's binary substitutions back
/// into leaves. Tracks which attachment slots were referenced so the
/// driver can enforce the count invariant.
pub(crate) struct WireReader<'a> {
    rules: &'a GrammarRules,
    /// Placeholder detection is on only for binary packet types under a
    /// placeholder grammar.
    detect_placeholders: bool,
    seen: Vec<bool>,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(rules: &'a GrammarRules, detect_placeholders: bool, slots: usize) -> Self {
        Self {
            rules,
            detect_placeholders,
            seen: vec![false; slots],
        }
    }

    /// Distinct attachment slots referenced so far.
    pub(crate) fn found(&self) -> usize {
        self.seen.iter().filter(|s| **s).count()
    }

    pub(crate) fn read(&mut self, json: &serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => Ok(Value::Number(n.clone())),
            serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(self.read(item)?);
                }
                Ok(Value::List(list))
            }
            serde_json::Value::Object(obj) => {
                if self.detect_placeholders {
                    if let Some(leaf) = self.try_placeholder(obj)? {
                        return Ok(leaf);
                    }
                }
                if self.rules.binary == BinaryMode::Inline {
                    if let Some(leaf) = try_base64_wrapper(obj)? {
                        return Ok(leaf);
                    }
                }
                let mut entries = Vec::with_capacity(obj.len());
                for (k, v) in obj {
                    entries.push((k.clone(), self.read(v)?));
                }
                Ok(Value::Map(entries))
            }
        }
    }

    /// Exact-shape placeholder match. An object that carries the
    /// `_placeholder` key but deviates from the shape is a protocol error,
    /// not user data: the attachment budget has already been committed.
    fn try_placeholder(
        &mut self,
        obj: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<Value>> {
        if !obj.contains_key("_placeholder") {
            return Ok(None);
        }
        let marker = matches!(obj.get("_placeholder"), Some(serde_json::Value::Bool(true)));
        let num = obj.get("num").and_then(serde_json::Value::as_u64);
        let (true, Some(num), 2) = (marker, num, obj.len()) else {
            return Err(EvioError::BadData(
                "malformed attachment placeholder".to_string(),
            ));
        };
        let slot = usize::try_from(num).map_err(|_| EvioError::PlaceholderOutOfRange {
            num,
            count: self.seen.len(),
        })?;
        match self.seen.get_mut(slot) {
            None => Err(EvioError::PlaceholderOutOfRange {
                num,
                count: self.seen.len(),
            }),
            Some(seen) if *seen => Err(EvioError::BadData(format!(
                "attachment slot {slot} referenced twice"
            ))),
            Some(seen) => {
                *seen = true;
                Ok(Some(Value::Placeholder(slot)))
            }
        }
    }
}

/// Exact-shape match of the V2 inline wrapper `{"base64":true,"data":...}`.
/// Anything else (extra keys, wrong types) is treated as user data, since
/// V2 carries no attachment budget to validate against.
fn try_base64_wrapper(
    obj: &serde_json::Map<String, serde_json::Value>,
) -> Result<Option<Value>> {
    if obj.len() != 2 {
        return Ok(None);
    }
    let marker = matches!(obj.get("base64"), Some(serde_json::Value::Bool(true)));
    let data = obj.get("data").and_then(serde_json::Value::as_str);
    let (true, Some(data)) = (marker, data) else {
        return Ok(None);
    };
    let bytes = BASE64
        .decode(data)
        .map_err(|e| EvioError::BadData(format!("invalid base64 payload: {e}")))?;
    Ok(Some(Value::Binary(Bytes::from(bytes))))
}
