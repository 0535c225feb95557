//! Incremental packet decoder (push byte-sink).

use crate::codec::fields::{ack_field, data_field, namespace_field, prefix_field, type_field};
use crate::error::{EvioError, Result};
use crate::grammar::{GrammarRules, ProtocolVersion};
use crate::packet::{Packet, PacketType};

/// Hard bounds applied while decoding hostile input.
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    /// Upper bound on one structural frame.
    pub max_frame_bytes: usize,
    /// Upper bound on the attachment-count prefix.
    pub max_attachments: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1 << 20,
            max_attachments: 256,
        }
    }
}

/// Field sequence of one decode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Type,
    AttachCount,
    Namespace,
    AckId,
    Data,
    Done,
    Failed,
}

/// Resumable structural-frame decoder.
///
/// Feed chunks of any size with [`Decoder::push`]; signal end-of-record
/// with [`Decoder::finish`]. A short read is never an error: the decoder
/// keeps its position and picks up exactly where the previous chunk
/// stopped. Structural and capability failures abort the packet; the
/// decoder stays poisoned until [`Decoder::reset`].
#[derive(Debug)]
pub struct Decoder {
    rules: GrammarRules,
    limits: DecodeLimits,
    state: DecodeState,
    consumed: u64,
    type_parser: type_field::Parser,
    prefix_parser: prefix_field::Parser,
    namespace_parser: namespace_field::Parser,
    ack_parser: ack_field::Parser,
    data_parser: data_field::Parser,
    packet_type: Option<PacketType>,
    declared: usize,
}

impl Decoder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_limits(version, DecodeLimits::default())
    }

    pub fn with_limits(version: ProtocolVersion, limits: DecodeLimits) -> Self {
        Self {
            rules: GrammarRules::for_version(version),
            limits,
            state: DecodeState::Type,
            consumed: 0,
            type_parser: type_field::Parser::default(),
            prefix_parser: prefix_field::Parser::default(),
            namespace_parser: namespace_field::Parser::default(),
            ack_parser: ack_field::Parser::default(),
            data_parser: data_field::Parser::default(),
            packet_type: None,
            declared: 0,
        }
    }

    pub fn rules(&self) -> &GrammarRules {
        &self.rules
    }

    /// Frame bytes consumed so far in this run.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Slots announced by the attachment-count prefix; 0 for non-binary
    /// packets. Final once [`Decoder::finish`] has succeeded.
    pub fn attachment_count(&self) -> usize {
        self.declared
    }

    /// Feed one chunk of frame bytes. Returns the bytes consumed, which is
    /// the whole chunk unless the decoder had already failed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<usize> {
        match self.state {
            DecodeState::Done => return Err(EvioError::Usage("push after finish")),
            DecodeState::Failed => return Err(EvioError::Usage("decoder aborted")),
            _ => {}
        }
        if self.consumed.saturating_add(chunk.len() as u64) > self.limits.max_frame_bytes as u64 {
            return Err(self.fail(EvioError::FrameTooLarge {
                limit: self.limits.max_frame_bytes,
            }));
        }

        let mut offset = 0;
        while offset < chunk.len() {
            let rest = &chunk[offset..];
            let progress = match self.state {
                DecodeState::Type => {
                    let progress = match self.type_parser.parse(rest, &self.rules) {
                        Ok(p) => p,
                        Err(e) => return Err(self.fail(e)),
                    };
                    if progress.complete {
                        self.packet_type = self.type_parser.value();
                        let binary = self.packet_type.is_some_and(PacketType::is_binary);
                        self.state = if binary {
                            DecodeState::AttachCount
                        } else {
                            DecodeState::Namespace
                        };
                        tracing::trace!(packet_type = ?self.packet_type, "type parsed");
                    }
                    progress
                }
                DecodeState::AttachCount => {
                    let progress = match self.prefix_parser.parse(rest) {
                        Ok(p) => p,
                        Err(e) => return Err(self.fail(e)),
                    };
                    if progress.complete {
                        let count = self.prefix_parser.value().unwrap_or(0);
                        if count > self.limits.max_attachments {
                            return Err(self.fail(EvioError::TooManyAttachments {
                                count,
                                limit: self.limits.max_attachments,
                            }));
                        }
                        self.declared = count;
                        self.state = DecodeState::Namespace;
                        tracing::trace!(count, "attachment prefix parsed");
                    }
                    progress
                }
                DecodeState::Namespace => {
                    let progress = match self.namespace_parser.parse(rest) {
                        Ok(p) => p,
                        Err(e) => return Err(self.fail(e)),
                    };
                    if progress.complete {
                        self.state = DecodeState::AckId;
                    }
                    progress
                }
                DecodeState::AckId => {
                    let progress = match self.ack_parser.parse(rest) {
                        Ok(p) => p,
                        Err(e) => return Err(self.fail(e)),
                    };
                    if progress.complete {
                        self.state = DecodeState::Data;
                    }
                    progress
                }
                DecodeState::Data => self.data_parser.parse(rest),
                DecodeState::Done | DecodeState::Failed => {
                    return Err(EvioError::Usage("decoder not accepting input"))
                }
            };
            offset += progress.consumed;
            if progress.consumed == 0 && !progress.complete {
                break;
            }
        }
        self.consumed += offset as u64;
        Ok(offset)
    }

    /// Signal end-of-record: commit the in-flight field, enforce the
    /// placeholder budget, and yield the packet.
    pub fn finish(&mut self) -> Result<Packet> {
        let detect = self.packet_type.is_some_and(PacketType::is_binary) && self.rules.placeholders();
        let (namespace, ack_id, data, found) = match self.state {
            DecodeState::Type => return Err(self.fail(EvioError::UnexpectedEnd("packet type"))),
            DecodeState::AttachCount => {
                return Err(self.fail(EvioError::UnexpectedEnd("attachment count")))
            }
            DecodeState::Namespace => {
                let namespace = match self.namespace_parser.commit() {
                    Ok(ns) => ns,
                    Err(e) => return Err(self.fail(e)),
                };
                (namespace, 0, None, 0)
            }
            DecodeState::AckId => {
                let namespace = match self.namespace_parser.commit() {
                    Ok(ns) => ns,
                    Err(e) => return Err(self.fail(e)),
                };
                let ack_id = match self.ack_parser.commit() {
                    Ok(id) => id,
                    Err(e) => return Err(self.fail(e)),
                };
                (namespace, ack_id, None, 0)
            }
            DecodeState::Data => {
                let namespace = match self.namespace_parser.commit() {
                    Ok(ns) => ns,
                    Err(e) => return Err(self.fail(e)),
                };
                let ack_id = match self.ack_parser.commit() {
                    Ok(id) => id,
                    Err(e) => return Err(self.fail(e)),
                };
                let (data, found) =
                    match self.data_parser.commit(&self.rules, detect, self.declared) {
                        Ok(parsed) => parsed,
                        Err(e) => return Err(self.fail(e)),
                    };
                (namespace, ack_id, data, found)
            }
            DecodeState::Done => return Err(EvioError::Usage("finish after completion")),
            DecodeState::Failed => return Err(EvioError::Usage("decoder aborted")),
        };

        let Some(packet_type) = self.packet_type else {
            return Err(self.fail(EvioError::Usage("no packet type parsed")));
        };
        if packet_type.is_binary() && found != self.declared {
            return Err(self.fail(EvioError::AttachmentCountMismatch {
                declared: self.declared,
                found,
            }));
        }

        self.state = DecodeState::Done;
        tracing::debug!(
            version = %self.rules.version,
            packet_type = ?packet_type,
            namespace = %namespace,
            ack_id,
            attachments = self.declared,
            bytes = self.consumed,
            "frame decoded"
        );
        Ok(Packet {
            packet_type,
            namespace,
            ack_id,
            data,
        })
    }

    /// Drop all per-run state and start a fresh packet.
    pub fn reset(&mut self) {
        *self = Self::with_limits(self.rules.version, self.limits);
    }

    fn fail(&mut self, error: EvioError) -> EvioError {
        self.state = DecodeState::Failed;
        tracing::debug!(error = %error, "decode aborted");
        error
    }
}

/// Decode one complete record in a single call.
pub fn decode(frame: &[u8], version: ProtocolVersion) -> Result<Packet> {
    let mut decoder = Decoder::new(version);
    decoder.push(frame)?;
    decoder.finish()
}
