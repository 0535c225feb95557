//! The four per-field codecs sequenced by the packet drivers.
//!
//! Outbound, every field derives its bytes exactly once and drains them
//! through a cursor, so a short write never re-computes anything.
//! Inbound, every field is an explicit-state parser that consumes only the
//! bytes belonging to it and reports how far it got. Short reads and short
//! writes are normal outcomes carried in the progress structs, never
//! errors.

use bytes::Bytes;

use crate::error::{EvioError, Result};
use crate::grammar::GrammarRules;
use crate::packet::PacketType;
use crate::value::{Value, WireReader};

/// Progress of one serialize-into-buffer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProgress {
    pub written: usize,
    pub complete: bool,
}

/// Progress of one parse-from-buffer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    pub consumed: usize,
    pub complete: bool,
}

impl ReadProgress {
    fn more(consumed: usize) -> Self {
        Self {
            consumed,
            complete: false,
        }
    }

    fn done(consumed: usize) -> Self {
        Self {
            consumed,
            complete: true,
        }
    }
}

/// One field's serialized bytes plus a drain cursor.
#[derive(Debug, Default)]
pub(crate) struct ByteRun {
    bytes: Vec<u8>,
    pos: usize,
}

impl ByteRun {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Copy as many remaining bytes as fit into `dst`.
    pub(crate) fn write_into(&mut self, dst: &mut [u8]) -> WriteProgress {
        let n = (self.bytes.len() - self.pos).min(dst.len());
        dst[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
        self.pos += n;
        WriteProgress {
            written: n,
            complete: self.pos == self.bytes.len(),
        }
    }
}

/// Digit runs longer than a u64 can hold are rejected outright.
const MAX_DIGIT_RUN: usize = 20;

// --------------------
// type: single ASCII digit
// --------------------
pub(crate) mod type_field {
    use super::*;

    /// An unknown or version-foreign type on encode is a hard error.
    pub(crate) fn encode(ptype: PacketType, rules: &GrammarRules) -> Result<ByteRun> {
        if !ptype.supported_by(rules) {
            return Err(EvioError::TypeUnsupported(ptype, rules.version));
        }
        Ok(ByteRun::new(vec![ptype.wire_byte()]))
    }

    #[derive(Debug, Default)]
    pub(crate) struct Parser {
        parsed: Option<PacketType>,
    }

    impl Parser {
        pub(crate) fn parse(&mut self, input: &[u8], rules: &GrammarRules) -> Result<ReadProgress> {
            if self.parsed.is_some() {
                return Ok(ReadProgress::done(0));
            }
            let Some(&byte) = input.first() else {
                return Ok(ReadProgress::more(0));
            };
            self.parsed = Some(PacketType::from_wire_byte(byte, rules)?);
            Ok(ReadProgress::done(1))
        }

        pub(crate) fn value(&self) -> Option<PacketType> {
            self.parsed
        }
    }
}

// --------------------
// attachment count prefix: 1*DIGIT "-"
// --------------------
pub(crate) mod prefix_field {
    use super::*;

    /// Written only for binary packet types, count of out-of-band records.
    pub(crate) fn encode(count: usize) -> ByteRun {
        ByteRun::new(format!("{count}-").into_bytes())
    }

    #[derive(Debug, Default)]
    pub(crate) struct Parser {
        digits: String,
        value: Option<usize>,
    }

    impl Parser {
        /// Digits accumulate until the `-` terminator; anything else inside
        /// the run is a structural error.
        pub(crate) fn parse(&mut self, input: &[u8]) -> Result<ReadProgress> {
            let mut used = 0;
            for &byte in input {
                used += 1;
                match byte {
                    b'0'..=b'9' => {
                        if self.digits.len() >= MAX_DIGIT_RUN {
                            return Err(EvioError::Malformed {
                                field: "attachment count",
                                reason: "digit run too long".to_string(),
                            });
                        }
                        self.digits.push(byte as char);
                    }
                    b'-' => {
                        if self.digits.is_empty() {
                            return Err(EvioError::Malformed {
                                field: "attachment count",
                                reason: "empty digit run".to_string(),
                            });
                        }
                        let count =
                            self.digits
                                .parse::<usize>()
                                .map_err(|e| EvioError::Malformed {
                                    field: "attachment count",
                                    reason: e.to_string(),
                                })?;
                        self.value = Some(count);
                        return Ok(ReadProgress::done(used));
                    }
                    other => {
                        return Err(EvioError::Malformed {
                            field: "attachment count",
                            reason: format!("unexpected byte {other:#04x}"),
                        })
                    }
                }
            }
            Ok(ReadProgress::more(used))
        }

        pub(crate) fn value(&self) -> Option<usize> {
            self.value
        }
    }
}

// --------------------
// namespace: "/" *(pchar), "," or end-of-record terminated
// --------------------
pub(crate) mod namespace_field {
    use super::*;

    /// The default namespace is omitted entirely. A trailing comma is
    /// written only when an ack id or data follows; `followed` carries that
    /// exact conditional.
    pub(crate) fn encode(namespace: &str, followed: bool) -> ByteRun {
        let mut bytes = Vec::with_capacity(namespace.len() + 2);
        if !namespace.starts_with('/') {
            bytes.push(b'/');
        }
        bytes.extend_from_slice(namespace.as_bytes());
        if followed {
            bytes.push(b',');
        }
        ByteRun::new(bytes)
    }

    #[derive(Debug, Default)]
    pub(crate) struct Parser {
        buf: Vec<u8>,
        started: bool,
        done: bool,
    }

    impl Parser {
        /// Completes immediately (consuming nothing) unless the field opens
        /// with `/`; otherwise runs to the comma or end-of-record. The
        /// comma is consumed but is not part of the namespace.
        pub(crate) fn parse(&mut self, input: &[u8]) -> Result<ReadProgress> {
            if self.done {
                return Ok(ReadProgress::done(0));
            }
            let mut used = 0;
            if !self.started {
                let Some(&byte) = input.first() else {
                    return Ok(ReadProgress::more(0));
                };
                if byte != b'/' {
                    // Default namespace; the byte belongs to the next field.
                    self.done = true;
                    return Ok(ReadProgress::done(0));
                }
                self.started = true;
                self.buf.push(b'/');
                used = 1;
            }
            for &byte in &input[used..] {
                used += 1;
                if byte == b',' {
                    self.done = true;
                    return Ok(ReadProgress::done(used));
                }
                self.buf.push(byte);
            }
            Ok(ReadProgress::more(used))
        }

        /// Commit the field: strip any `?query` suffix and canonicalize the
        /// default forms to `/`. Callable mid-field at end-of-record.
        pub(crate) fn commit(&mut self) -> Result<String> {
            let raw = std::mem::take(&mut self.buf);
            let s = String::from_utf8(raw).map_err(|_| EvioError::Malformed {
                field: "namespace",
                reason: "invalid utf-8".to_string(),
            })?;
            let s = match s.find('?') {
                Some(i) => s[..i].to_string(),
                None => s,
            };
            if s.is_empty() || s == "/" {
                Ok("/".to_string())
            } else {
                Ok(s)
            }
        }
    }
}

// --------------------
// ack id: 1*DIGIT, terminated by the first non-digit
// --------------------
pub(crate) mod ack_field {
    use super::*;

    /// Ack id 0 means "absent" and writes nothing.
    pub(crate) fn encode(ack_id: u64) -> ByteRun {
        if ack_id == 0 {
            ByteRun::default()
        } else {
            ByteRun::new(ack_id.to_string().into_bytes())
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct Parser {
        digits: String,
    }

    impl Parser {
        /// Digits accumulate until the first non-digit, which is left in
        /// the input for the data field.
        pub(crate) fn parse(&mut self, input: &[u8]) -> Result<ReadProgress> {
            let mut used = 0;
            for &byte in input {
                if !byte.is_ascii_digit() {
                    return Ok(ReadProgress::done(used));
                }
                if self.digits.len() >= MAX_DIGIT_RUN {
                    return Err(EvioError::Malformed {
                        field: "ack id",
                        reason: "digit run too long".to_string(),
                    });
                }
                self.digits.push(byte as char);
                used += 1;
            }
            Ok(ReadProgress::more(used))
        }

        /// Commit the run; an empty run is the absent ack (0).
        pub(crate) fn commit(&mut self) -> Result<u64> {
            if self.digits.is_empty() {
                return Ok(0);
            }
            self.digits.parse::<u64>().map_err(|e| EvioError::Malformed {
                field: "ack id",
                reason: e.to_string(),
            })
        }
    }
}

// --------------------
// data: value-tree JSON text, binary leaves substituted
// --------------------
pub(crate) mod data_field {
    use super::*;

    /// Materialize the field once; extracted payloads land on
    /// `attachments` in traversal order.
    pub(crate) fn encode(
        value: &Value,
        rules: &GrammarRules,
        attachments: &mut Vec<Bytes>,
    ) -> Result<ByteRun> {
        let wire = value.to_wire_json(rules, attachments)?;
        let text = serde_json::to_vec(&wire).map_err(|e| EvioError::BadData(e.to_string()))?;
        Ok(ByteRun::new(text))
    }

    #[derive(Debug, Default)]
    pub(crate) struct Parser {
        buf: Vec<u8>,
    }

    impl Parser {
        /// The data field claims every remaining byte of the record; it can
        /// only complete at end-of-record.
        pub(crate) fn parse(&mut self, input: &[u8]) -> ReadProgress {
            self.buf.extend_from_slice(input);
            ReadProgress::more(input.len())
        }

        /// Commit at end-of-record. An empty buffer means "no data field at
        /// all", distinct from an empty list or object, which arrive as
        /// two bytes of JSON text.
        pub(crate) fn commit(
            &mut self,
            rules: &GrammarRules,
            detect_placeholders: bool,
            slots: usize,
        ) -> Result<(Option<Value>, usize)> {
            if self.buf.is_empty() {
                return Ok((None, 0));
            }
            let json: serde_json::Value =
                serde_json::from_slice(&self.buf).map_err(|e| EvioError::BadData(e.to_string()))?;
            let mut reader = WireReader::new(rules, detect_placeholders, slots);
            let value = reader.read(&json)?;
            Ok((Some(value), reader.found()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::grammar::ProtocolVersion;

    fn rules(v: ProtocolVersion) -> GrammarRules {
        GrammarRules::for_version(v)
    }

    #[test]
    fn byte_run_short_writes_resume() {
        let mut run = ByteRun::new(b"abcdef".to_vec());
        let mut dst = [0u8; 4];
        let p = run.write_into(&mut dst);
        assert_eq!((p.written, p.complete), (4, false));
        let p = run.write_into(&mut dst);
        assert_eq!((p.written, p.complete), (2, true));
        assert_eq!(&dst[..2], b"ef");
    }

    #[test]
    fn namespace_parser_strips_query() {
        let mut p = namespace_field::Parser::default();
        let progress = p.parse(b"/admin?x=1,rest").unwrap();
        assert!(progress.complete);
        assert_eq!(progress.consumed, "/admin?x=1,".len());
        assert_eq!(p.commit().unwrap(), "/admin");
    }

    #[test]
    fn namespace_parser_completes_on_non_slash() {
        let mut p = namespace_field::Parser::default();
        let progress = p.parse(b"[\"hello\"]").unwrap();
        assert!(progress.complete);
        assert_eq!(progress.consumed, 0);
        assert_eq!(p.commit().unwrap(), "/");
    }

    #[test]
    fn namespace_parser_resumes_across_chunks() {
        let mut p = namespace_field::Parser::default();
        assert!(!p.parse(b"/ad").unwrap().complete);
        assert!(!p.parse(b"min").unwrap().complete);
        assert!(p.parse(b",42").unwrap().complete);
        assert_eq!(p.commit().unwrap(), "/admin");
    }

    #[test]
    fn bare_slash_commits_to_default() {
        let mut p = namespace_field::Parser::default();
        assert!(!p.parse(b"/").unwrap().complete);
        assert_eq!(p.commit().unwrap(), "/");
    }

    #[test]
    fn ack_parser_stops_at_json_opener() {
        let mut p = ack_field::Parser::default();
        let progress = p.parse(b"456[\"x\"]").unwrap();
        assert!(progress.complete);
        assert_eq!(progress.consumed, 3);
        assert_eq!(p.commit().unwrap(), 456);
    }

    #[test]
    fn ack_parser_empty_run_is_absent() {
        let mut p = ack_field::Parser::default();
        let progress = p.parse(b"{\"a\":1}").unwrap();
        assert!(progress.complete);
        assert_eq!(progress.consumed, 0);
        assert_eq!(p.commit().unwrap(), 0);
    }

    #[test]
    fn prefix_parser_requires_terminator() {
        let mut p = prefix_field::Parser::default();
        assert!(!p.parse(b"12").unwrap().complete);
        assert!(p.parse(b"-").unwrap().complete);
        assert_eq!(p.value(), Some(12));
    }

    #[test]
    fn prefix_parser_rejects_stray_bytes() {
        let mut p = prefix_field::Parser::default();
        let err = p.parse(b"1x").unwrap_err();
        assert!(matches!(err, EvioError::Malformed { field: "attachment count", .. }));
    }

    #[test]
    fn data_commit_distinguishes_empty_and_absent() {
        let r = rules(ProtocolVersion::V5);

        let mut absent = data_field::Parser::default();
        assert_eq!(absent.commit(&r, false, 0).unwrap(), (None, 0));

        let mut empty = data_field::Parser::default();
        empty.parse(b"[]");
        assert_eq!(
            empty.commit(&r, false, 0).unwrap(),
            (Some(Value::List(Vec::new())), 0)
        );
    }

    #[test]
    fn data_commit_rejects_unterminated_text() {
        let r = rules(ProtocolVersion::V5);
        let mut p = data_field::Parser::default();
        p.parse(b"[\"hello\"");
        assert!(matches!(p.commit(&r, false, 0), Err(EvioError::BadData(_))));
    }
}
