//! Decode-once coupling of the structural frame and its attachments.

use evio_core::{DecodeLimits, Decoder, Packet, ProtocolVersion};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::registry::AttachmentRegistry;

/// Structural-frame decoder that hands back an attachment registry sized
/// to the frame's attachment-count prefix.
///
/// The inner decoder stays synchronous and resumable; only the registry it
/// allocates touches the async runtime.
#[derive(Debug)]
pub struct FrameDecoder {
    inner: Decoder,
    pipeline: PipelineConfig,
}

impl FrameDecoder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self::with_config(version, PipelineConfig::default(), DecodeLimits::default())
    }

    pub fn with_config(
        version: ProtocolVersion,
        pipeline: PipelineConfig,
        limits: DecodeLimits,
    ) -> Self {
        Self {
            inner: Decoder::with_limits(version, limits),
            pipeline,
        }
    }

    /// Feed one chunk of frame bytes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<usize> {
        Ok(self.inner.push(chunk)?)
    }

    /// Slots announced by the attachment-count prefix so far. Known as
    /// soon as the prefix field completes, before the data field parses.
    pub fn attachments_announced(&self) -> usize {
        self.inner.attachment_count()
    }

    /// Signal end-of-record: yields the packet plus a registry with one
    /// slot per announced attachment (zero slots for non-binary packets).
    pub fn finish(&mut self) -> Result<(Packet, AttachmentRegistry)> {
        let packet = self.inner.finish()?;
        let registry =
            AttachmentRegistry::with_config(self.inner.attachment_count(), &self.pipeline);
        tracing::trace!(
            packet_type = ?packet.packet_type,
            slots = registry.len(),
            "attachment registry allocated"
        );
        Ok((packet, registry))
    }

    /// Drop all per-run state and start a fresh packet.
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Decode one complete record in a single call.
pub fn decode_frame(
    frame: &[u8],
    version: ProtocolVersion,
) -> Result<(Packet, AttachmentRegistry)> {
    let mut decoder = FrameDecoder::new(version);
    decoder.push(frame)?;
    decoder.finish()
}
