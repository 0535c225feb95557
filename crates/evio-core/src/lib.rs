//! evio core: transport-agnostic packet codec for the evio event protocol.
//!
//! This crate owns the wire-level contract of a single packet: the value
//! tree used as its payload, the per-version grammar rules, the four
//! incremental field codecs, and the resumable encode/decode drivers. It
//! intentionally carries no async runtime dependency so it can be driven
//! from any transport loop; the out-of-band attachment plumbing lives in
//! `evio-stream`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `EvioError`/`Result` so a hostile
//! frame can never crash the process that parses it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod error;
pub mod grammar;
pub mod packet;
pub mod value;

pub use codec::{decode, encode, AttachmentCursor, DecodeLimits, Decoder, Encoder};
pub use error::{ErrorKind, EvioError, Result};
pub use grammar::{BinaryMode, GrammarRules, ProtocolVersion};
pub use packet::{Packet, PacketType};
pub use value::Value;
