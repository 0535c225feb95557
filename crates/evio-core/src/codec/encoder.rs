//! Incremental packet encoder (pull byte-source).

use bytes::Bytes;

use crate::codec::fields::{ack_field, data_field, namespace_field, prefix_field, type_field, ByteRun};
use crate::error::{EvioError, Result};
use crate::grammar::{BinaryMode, GrammarRules, ProtocolVersion};
use crate::packet::{Packet, PacketType};

/// One planned field: its name for tracing plus its drain cursor.
#[derive(Debug)]
struct PlannedField {
    name: &'static str,
    run: ByteRun,
}

/// Resumable structural-frame encoder.
///
/// The whole frame is planned up front: every field derives its bytes
/// exactly once, then [`Encoder::read`] drains them into caller buffers of
/// any size. A short write keeps the cursor; the next call resumes where
/// the previous one stopped. `Ok(0)` on a non-empty buffer signals
/// end-of-frame exactly once; a further call re-initializes the run from
/// the packet fields and encodes again.
#[derive(Debug)]
pub struct Encoder {
    packet: Packet,
    rules: GrammarRules,
    fields: Vec<PlannedField>,
    current: usize,
    attachments: Vec<Bytes>,
    wire_type: PacketType,
    produced: u64,
    end_signalled: bool,
}

impl Encoder {
    pub fn new(packet: Packet, version: ProtocolVersion) -> Result<Self> {
        let rules = GrammarRules::for_version(version);
        let (fields, attachments, wire_type) = plan(&packet, &rules)?;
        Ok(Self {
            packet,
            rules,
            fields,
            current: 0,
            attachments,
            wire_type,
            produced: 0,
            end_signalled: false,
        })
    }

    /// Pull as many frame bytes as fit into `buf`.
    ///
    /// `Ok(0)` with a non-empty `buf` is the end-of-frame signal. Calling
    /// again afterwards starts a fresh run over the same packet.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.end_signalled {
            self.reinit()?;
        }
        let mut written = 0;
        while written < buf.len() && self.current < self.fields.len() {
            let field = &mut self.fields[self.current];
            let progress = field.run.write_into(&mut buf[written..]);
            written += progress.written;
            if progress.complete {
                tracing::trace!(field = field.name, "field drained");
                self.current += 1;
            } else {
                break;
            }
        }
        if written == 0 && self.current >= self.fields.len() {
            self.end_signalled = true;
            tracing::debug!(
                version = %self.rules.version,
                wire_type = ?self.wire_type,
                bytes = self.produced,
                attachments = self.attachments.len(),
                "frame encoded"
            );
            return Ok(0);
        }
        self.produced += written as u64;
        Ok(written)
    }

    /// Start the next run: everything per-run is re-derived from the
    /// packet fields.
    fn reinit(&mut self) -> Result<()> {
        let (fields, attachments, wire_type) = plan(&self.packet, &self.rules)?;
        self.fields = fields;
        self.attachments = attachments;
        self.wire_type = wire_type;
        self.current = 0;
        self.produced = 0;
        self.end_signalled = false;
        Ok(())
    }

    /// True once every field has drained.
    pub fn is_complete(&self) -> bool {
        self.current >= self.fields.len()
    }

    /// Exact frame length; always equals the bytes a full run produces.
    pub fn frame_len(&self) -> usize {
        self.fields.iter().map(|f| f.run.len()).sum()
    }

    /// Frame bytes produced so far in the current run.
    pub fn bytes_produced(&self) -> u64 {
        self.produced
    }

    /// The wire-effective packet type, possibly promoted from the declared
    /// type when binary leaves were extracted.
    pub fn wire_type(&self) -> PacketType {
        self.wire_type
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    /// Cursor over the outgoing attachments, consumed in encounter order
    /// once the structural frame has drained.
    pub fn attachments(&self) -> AttachmentCursor<'_> {
        AttachmentCursor {
            list: &self.attachments,
            next: 0,
        }
    }

    pub fn attachment_payloads(&self) -> &[Bytes] {
        &self.attachments
    }

    pub fn into_attachments(self) -> Vec<Bytes> {
        self.attachments
    }
}

/// Cursor over an encoder's outgoing attachment list.
#[derive(Debug)]
pub struct AttachmentCursor<'a> {
    list: &'a [Bytes],
    next: usize,
}

impl<'a> AttachmentCursor<'a> {
    pub fn remaining(&self) -> usize {
        self.list.len() - self.next
    }
}

impl<'a> Iterator for AttachmentCursor<'a> {
    type Item = &'a Bytes;

    fn next(&mut self) -> Option<&'a Bytes> {
        let item = self.list.get(self.next)?;
        self.next += 1;
        Some(item)
    }
}

/// Derive the full field plan for one run.
///
/// Data goes first: binary extraction decides the wire type and the
/// attachment prefix. The namespace comma is written only when the
/// namespace is non-default and an ack id or data follows.
fn plan(
    packet: &Packet,
    rules: &GrammarRules,
) -> Result<(Vec<PlannedField>, Vec<Bytes>, PacketType)> {
    if packet.packet_type == PacketType::Connect
        && packet.data.is_some()
        && !rules.connect_payload
    {
        return Err(EvioError::ConnectPayloadUnsupported(rules.version));
    }

    let mut attachments = Vec::new();
    let data_run = match &packet.data {
        Some(value) => Some(data_field::encode(value, rules, &mut attachments)?),
        None => None,
    };
    let wire_type = effective_type(packet.packet_type, attachments.len(), rules)?;

    let mut fields = Vec::with_capacity(5);
    fields.push(PlannedField {
        name: "type",
        run: type_field::encode(wire_type, rules)?,
    });
    if wire_type.is_binary() {
        fields.push(PlannedField {
            name: "attachment count",
            run: prefix_field::encode(attachments.len()),
        });
    }
    if !packet.default_namespace() {
        let followed = packet.ack_id != 0 || data_run.is_some();
        fields.push(PlannedField {
            name: "namespace",
            run: namespace_field::encode(&packet.namespace, followed),
        });
    }
    if packet.ack_id != 0 {
        fields.push(PlannedField {
            name: "ack id",
            run: ack_field::encode(packet.ack_id),
        });
    }
    if let Some(run) = data_run {
        fields.push(PlannedField {
            name: "data",
            run,
        });
    }
    Ok((fields, attachments, wire_type))
}

/// Resolve the declared type against the extracted binary leaves.
///
/// Under placeholder grammars an event or ack carrying binary is promoted
/// to its binary twin; a twin the version lacks is a capability error.
/// Inline grammars keep the declared type (the leaves stayed in the text).
fn effective_type(
    declared: PacketType,
    binary_leaves: usize,
    rules: &GrammarRules,
) -> Result<PacketType> {
    if binary_leaves == 0 || rules.binary != BinaryMode::Placeholder {
        if !declared.supported_by(rules) {
            return Err(EvioError::TypeUnsupported(declared, rules.version));
        }
        return Ok(declared);
    }
    let promoted = match declared {
        PacketType::Event | PacketType::BinaryEvent => PacketType::BinaryEvent,
        PacketType::Ack | PacketType::BinaryAck => PacketType::BinaryAck,
        other => return Err(EvioError::BinaryNotAllowed(other)),
    };
    if !promoted.supported_by(rules) {
        return Err(EvioError::TypeUnsupported(promoted, rules.version));
    }
    Ok(promoted)
}

/// Encode a packet in one call: the full structural frame plus its
/// outgoing attachments in traversal order.
pub fn encode(packet: Packet, version: ProtocolVersion) -> Result<(Vec<u8>, Vec<Bytes>)> {
    let mut encoder = Encoder::new(packet, version)?;
    let mut frame = vec![0u8; encoder.frame_len()];
    let mut filled = 0;
    loop {
        let n = encoder.read(&mut frame[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    frame.truncate(filled);
    Ok((frame, encoder.into_attachments()))
}
