//! Shared error type across evio crates.

use thiserror::Error;

use crate::grammar::ProtocolVersion;
use crate::packet::PacketType;

/// Coarse failure classes (stable API).
///
/// Short reads and short writes are *not* errors: the drivers report them
/// through their progress results and the caller simply resumes with more
/// buffer or more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The wire bytes violate the packet grammar.
    Structural,
    /// The packet asks for something its protocol version cannot express.
    Capability,
    /// Input ended mid-field after the caller signalled end-of-record.
    UnexpectedEnd,
    /// The codec API was driven out of order.
    Usage,
}

impl ErrorKind {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Structural => "STRUCTURAL",
            ErrorKind::Capability => "CAPABILITY",
            ErrorKind::UnexpectedEnd => "UNEXPECTED_END",
            ErrorKind::Usage => "USAGE",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, EvioError>;

/// Unified error type used by the codec core and the attachment pipeline.
#[derive(Debug, Error)]
pub enum EvioError {
    #[error("bad packet type byte {0:#04x}")]
    BadTypeByte(u8),
    #[error("packet type {0:?} is not part of protocol {1}")]
    TypeUnsupported(PacketType, ProtocolVersion),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
    #[error("malformed data payload: {0}")]
    BadData(String),
    #[error("placeholder num {num} out of range for {count} attachment slots")]
    PlaceholderOutOfRange { num: u64, count: usize },
    #[error("attachment count mismatch: prefix declared {declared}, data referenced {found}")]
    AttachmentCountMismatch { declared: usize, found: usize },
    #[error("binary payloads are not supported by protocol {0}")]
    BinaryUnsupported(ProtocolVersion),
    #[error("packet type {0:?} cannot carry binary attachments")]
    BinaryNotAllowed(PacketType),
    #[error("connect payloads are not supported by protocol {0}")]
    ConnectPayloadUnsupported(ProtocolVersion),
    #[error("frame exceeds {limit} byte limit")]
    FrameTooLarge { limit: usize },
    #[error("attachment count {count} exceeds limit {limit}")]
    TooManyAttachments { count: usize, limit: usize },
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEnd(&'static str),
    #[error("codec misuse: {0}")]
    Usage(&'static str),
}

impl EvioError {
    /// Map to the coarse class the envelope layer keys its handling on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvioError::BadTypeByte(_)
            | EvioError::Malformed { .. }
            | EvioError::BadData(_)
            | EvioError::PlaceholderOutOfRange { .. }
            | EvioError::AttachmentCountMismatch { .. }
            | EvioError::FrameTooLarge { .. }
            | EvioError::TooManyAttachments { .. } => ErrorKind::Structural,
            EvioError::TypeUnsupported(..)
            | EvioError::UnsupportedVersion(_)
            | EvioError::BinaryUnsupported(_)
            | EvioError::BinaryNotAllowed(_)
            | EvioError::ConnectPayloadUnsupported(_) => ErrorKind::Capability,
            EvioError::UnexpectedEnd(_) => ErrorKind::UnexpectedEnd,
            EvioError::Usage(_) => ErrorKind::Usage,
        }
    }
}
