//! V2-era msgpack record form for binary-bearing data fields.
//!
//! Protocol v2 predates out-of-band attachments: a transport that could
//! carry raw binary shipped the whole data tree as one msgpack document
//! instead of JSON text, with binary leaves as native `bin` values. V3
//! drops this form together with the inline base64 wrapper. The codec
//! never selects it on its own; the envelope opts in per record.

use bytes::Bytes;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::error::{EvioError, Result};
use crate::grammar::{BinaryMode, GrammarRules};
use crate::value::Value;

/// Marshal a data tree as one msgpack record. Only meaningful under the
/// inline-binary grammar (V2); placeholder grammars carry attachments
/// out-of-band instead.
pub fn encode_record(value: &Value, rules: &GrammarRules) -> Result<Vec<u8>> {
    if rules.binary != BinaryMode::Inline {
        return Err(EvioError::Usage(
            "msgpack records are a v2 mechanism; later grammars stream attachments",
        ));
    }
    rmp_serde::to_vec(&MsgpackTree(value)).map_err(|e| EvioError::BadData(e.to_string()))
}

/// Inverse of [`encode_record`].
pub fn decode_record(bytes: &[u8], rules: &GrammarRules) -> Result<Value> {
    if rules.binary != BinaryMode::Inline {
        return Err(EvioError::Usage(
            "msgpack records are a v2 mechanism; later grammars stream attachments",
        ));
    }
    let MsgpackValue(value) =
        rmp_serde::from_slice(bytes).map_err(|e| EvioError::BadData(e.to_string()))?;
    Ok(value)
}

struct MsgpackTree<'a>(&'a Value);

impl Serialize for MsgpackTree<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&MsgpackTree(item))?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, &MsgpackTree(v))?;
                }
                map.end()
            }
            Value::Binary(bytes) => serializer.serialize_bytes(bytes),
            Value::Placeholder(_) => Err(S::Error::custom(
                "placeholder leaves cannot appear in a legacy record",
            )),
        }
    }
}

struct MsgpackValue(Value);

impl<'de> serde::Deserialize<'de> for MsgpackValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(TreeVisitor).map(MsgpackValue)
    }
}

struct TreeVisitor;

impl<'de> Visitor<'de> for TreeVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a legacy record value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> std::result::Result<Value, E> {
        self.visit_f64(f64::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom("non-finite float in legacy record"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Value, E> {
        Ok(Value::Binary(Bytes::copy_from_slice(v)))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
        Ok(Value::Binary(Bytes::from(v)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(MsgpackValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, MsgpackValue(value))) = map.next_entry::<String, MsgpackValue>()? {
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::grammar::ProtocolVersion;

    #[test]
    fn binary_bearing_tree_roundtrips() {
        let rules = GrammarRules::for_version(ProtocolVersion::V2);
        let tree = Value::map([
            ("name", Value::from("upload")),
            ("payload", Value::Binary(Bytes::from_static(&[0, 1, 2, 255]))),
            ("tags", Value::List(vec![Value::from("a"), Value::from(7)])),
        ]);
        let record = encode_record(&tree, &rules).unwrap();
        assert_eq!(decode_record(&record, &rules).unwrap(), tree);
    }

    #[test]
    fn placeholder_grammars_refuse_records() {
        let rules = GrammarRules::for_version(ProtocolVersion::V3);
        let tree = Value::from("x");
        assert!(matches!(
            encode_record(&tree, &rules),
            Err(EvioError::Usage(_))
        ));
        assert!(matches!(
            decode_record(&[0xc0], &rules),
            Err(EvioError::Usage(_))
        ));
    }
}
