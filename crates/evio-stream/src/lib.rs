//! evio stream: attachment pipeline for the evio packet codec.
//!
//! The structural frame of a packet is synchronous and resumable; the
//! binary attachments it references are not: they arrive as separate
//! records, interleaved with or after the structural text. This crate owns
//! that async half: a fixed-size slot registry allocated while the frame
//! decodes, short-lived relay tasks that copy supplied sources into slot
//! pipes, and lazy readers the application can hold before any byte has
//! arrived. Every wait is bounded: an attachment that never shows up
//! surfaces as a timeout, not a hung task.

pub mod config;
pub mod decode;
pub mod error;
pub mod registry;
pub mod source;

mod relay;

pub use config::{LimitsSection, PipelineConfig, StackConfig};
pub use decode::{decode_frame, FrameDecoder};
pub use error::{PipelineError, Result};
pub use registry::{AttachmentRegistry, BinaryReader, SlotState};
pub use source::{AttachmentSource, ReaderSource};
