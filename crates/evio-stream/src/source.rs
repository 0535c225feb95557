//! Attachment byte sources supplied by the envelope layer.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

const DEFAULT_CHUNK_BYTES: usize = 8 * 1024;

/// Anything the envelope can hand the pipeline as one attachment's bytes.
///
/// A relay task pulls the source chunk by chunk; `Ok(None)` is
/// end-of-stream. Chunk boundaries carry no meaning, only the
/// concatenated bytes do.
#[async_trait]
pub trait AttachmentSource: Send {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>>;
}

/// A fully materialized payload: delivered as a single chunk.
#[async_trait]
impl AttachmentSource for Bytes {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        if self.is_empty() {
            Ok(None)
        } else {
            Ok(Some(std::mem::take(self)))
        }
    }
}

/// Adapts any `AsyncRead` (socket half, file, in-memory pipe).
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
    chunk_bytes: usize,
}

impl<R: AsyncRead + Send + Unpin> ReaderSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    pub fn with_chunk_bytes(inner: R, chunk_bytes: usize) -> Self {
        Self {
            inner,
            chunk_bytes: chunk_bytes.max(1),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Send + Unpin> AttachmentSource for ReaderSource<R> {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        let mut buf = vec![0u8; self.chunk_bytes];
        let n = self.inner.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }
}
