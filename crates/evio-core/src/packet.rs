//! Packet model and the numeric type registry.

use crate::error::{EvioError, Result};
use crate::grammar::GrammarRules;
use crate::value::Value;

/// Semantic packet types, shared by all protocol revisions.
///
/// Each type occupies a single ASCII digit on the wire. Which digits are
/// legal is version-dependent; the lookup is gated by `GrammarRules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Connect,
    Disconnect,
    Event,
    Ack,
    /// Wire byte `4`. Named `error` through V4, `connect_error` from V5.
    Error,
    /// Event whose payload references out-of-band attachments (V3+).
    BinaryEvent,
    /// Ack whose payload references out-of-band attachments (V4+).
    BinaryAck,
}

impl PacketType {
    /// The single ASCII digit this type occupies on the wire.
    pub fn wire_byte(self) -> u8 {
        match self {
            PacketType::Connect => b'0',
            PacketType::Disconnect => b'1',
            PacketType::Event => b'2',
            PacketType::Ack => b'3',
            PacketType::Error => b'4',
            PacketType::BinaryEvent => b'5',
            PacketType::BinaryAck => b'6',
        }
    }

    /// Reverse lookup, gated by the grammar in effect.
    pub fn from_wire_byte(byte: u8, rules: &GrammarRules) -> Result<Self> {
        let ptype = match byte {
            b'0' => PacketType::Connect,
            b'1' => PacketType::Disconnect,
            b'2' => PacketType::Event,
            b'3' => PacketType::Ack,
            b'4' => PacketType::Error,
            b'5' => PacketType::BinaryEvent,
            b'6' => PacketType::BinaryAck,
            other => return Err(EvioError::BadTypeByte(other)),
        };
        if !ptype.supported_by(rules) {
            return Err(EvioError::TypeUnsupported(ptype, rules.version));
        }
        Ok(ptype)
    }

    /// Whether this type is part of the given grammar at all.
    pub fn supported_by(self, rules: &GrammarRules) -> bool {
        match self {
            PacketType::BinaryEvent => rules.placeholders(),
            PacketType::BinaryAck => rules.binary_ack,
            _ => true,
        }
    }

    /// Registry name. The `4` byte renames under V5.
    pub fn name(self, rules: &GrammarRules) -> &'static str {
        match self {
            PacketType::Connect => "connect",
            PacketType::Disconnect => "disconnect",
            PacketType::Event => "event",
            PacketType::Ack => "ack",
            PacketType::Error => {
                if rules.connect_error_name {
                    "connect_error"
                } else {
                    "error"
                }
            }
            PacketType::BinaryEvent => "binary_event",
            PacketType::BinaryAck => "binary_ack",
        }
    }

    /// Types that announce an attachment-count prefix.
    pub fn is_binary(self) -> bool {
        matches!(self, PacketType::BinaryEvent | PacketType::BinaryAck)
    }
}

/// One structural protocol message.
///
/// A packet is built fluently and then driven exactly once per run as a
/// byte source (`Encoder`) or produced by a byte sink (`Decoder`). It is a
/// single-reader/single-writer object, like a file cursor; attachment byte
/// streams live outside the structural frame and outlive it.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub packet_type: PacketType,
    /// `""` and `"/"` both mean the default namespace; the wire form omits
    /// it entirely.
    pub namespace: String,
    /// `0` means "no ack requested" and is never transmitted. An explicit
    /// ack id of 0 is therefore indistinguishable from "no ack" on the
    /// wire; the quirk is inherited from the legacy grammar.
    pub ack_id: u64,
    pub data: Option<Value>,
}

impl Packet {
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            namespace: "/".to_string(),
            ack_id: 0,
            data: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_ack(mut self, ack_id: u64) -> Self {
        self.ack_id = ack_id;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// True for `""` and `"/"`, which are never written to the wire.
    pub fn default_namespace(&self) -> bool {
        self.namespace.is_empty() || self.namespace == "/"
    }

    /// Number of binary leaves in `data`, in depth-first traversal order.
    pub fn binary_leaf_count(&self) -> usize {
        self.data.as_ref().map_or(0, Value::binary_leaves)
    }
}
