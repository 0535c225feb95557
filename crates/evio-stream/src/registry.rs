//! Attachment slot registry.
//!
//! Decoding a binary packet announces up front how many out-of-band byte
//! streams belong to it; the registry allocates exactly that many slots.
//! Each slot is a small state machine wired to an internal pipe. Slots are
//! independent of one another: supply and drain order across slots is
//! unconstrained, while bytes within a slot preserve source order.
//!
//! The consumer side is lazy: a [`BinaryReader`] can be claimed and even
//! awaited before the envelope has supplied the slot's source. Every await
//! is bounded by the configured supply timeout, and a slot can be
//! cancelled outright, so a source that never arrives cannot park a task
//! forever.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::relay;
use crate::source::AttachmentSource;

/// Lifecycle of one attachment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Allocated; neither reader nor source wired yet.
    Empty,
    /// A reader is claimed and waiting; no source supplied yet.
    AwaitingSource,
    /// A relay task is copying source bytes into the slot pipe.
    Streaming,
    /// End-of-stream reached; every byte delivered to the pipe.
    Done,
    /// The source failed or the slot was cancelled.
    Failed,
}

/// State cell shared between the registry, the relay task, and the reader.
#[derive(Debug)]
pub(crate) struct SlotShared {
    state: Mutex<SlotState>,
}

impl SlotShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
        }
    }

    pub(crate) fn get(&self) -> SlotState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn set(&self, state: SlotState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }
}

type ChunkResult = std::result::Result<Bytes, PipelineError>;

#[derive(Debug)]
struct Slot {
    shared: Arc<SlotShared>,
    tx: Option<mpsc::Sender<ChunkResult>>,
    rx: Option<mpsc::Receiver<ChunkResult>>,
    relay: Option<JoinHandle<()>>,
}

impl Slot {
    fn new(pipe_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(pipe_depth.max(1));
        Self {
            shared: Arc::new(SlotShared::new()),
            tx: Some(tx),
            rx: Some(rx),
            relay: None,
        }
    }
}

/// Fixed-size registry of attachment slots for one decoded packet.
#[derive(Debug)]
pub struct AttachmentRegistry {
    slots: Vec<Slot>,
    supply_timeout: Duration,
}

impl AttachmentRegistry {
    pub fn new(count: usize) -> Self {
        Self::with_config(count, &PipelineConfig::default())
    }

    pub fn with_config(count: usize, config: &PipelineConfig) -> Self {
        Self {
            slots: (0..count).map(|_| Slot::new(config.pipe_depth)).collect(),
            supply_timeout: Duration::from_millis(config.supply_timeout_ms),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn state(&self, slot: usize) -> Result<SlotState> {
        Ok(self.slot(slot)?.shared.get())
    }

    /// Claim the lazy reader for `slot`. Valid before any bytes arrive;
    /// each slot has exactly one reader.
    pub fn reader(&mut self, slot: usize) -> Result<BinaryReader> {
        let supply_timeout = self.supply_timeout;
        let entry = self.slot_mut(slot)?;
        let rx = entry.rx.take().ok_or(PipelineError::AlreadyClaimed(slot))?;
        if entry.shared.get() == SlotState::Empty {
            entry.shared.set(SlotState::AwaitingSource);
        }
        Ok(BinaryReader {
            slot,
            rx,
            shared: entry.shared.clone(),
            supply_timeout,
            finished: false,
        })
    }

    /// Wire `slot` to a byte source. A short-lived relay task copies the
    /// source into the slot pipe and reports end-of-stream or failure back
    /// through it.
    pub fn supply<S: AttachmentSource + 'static>(&mut self, slot: usize, source: S) -> Result<()> {
        let entry = self.slot_mut(slot)?;
        if entry.shared.get() == SlotState::Failed {
            return Err(PipelineError::Cancelled(slot));
        }
        let tx = entry.tx.take().ok_or(PipelineError::AlreadySupplied(slot))?;
        entry.shared.set(SlotState::Streaming);
        let shared = entry.shared.clone();
        entry.relay = Some(tokio::spawn(relay::run(slot, source, tx, shared)));
        tracing::trace!(slot, "attachment source supplied");
        Ok(())
    }

    /// Abort the slot: stop any relay in flight and fail the pipe. A slot
    /// that already finished is left alone.
    pub fn cancel(&mut self, slot: usize) -> Result<()> {
        let entry = self.slot_mut(slot)?;
        if matches!(entry.shared.get(), SlotState::Done | SlotState::Failed) {
            return Ok(());
        }
        if let Some(handle) = entry.relay.take() {
            handle.abort();
        }
        entry.shared.set(SlotState::Failed);
        if let Some(tx) = entry.tx.take() {
            // No relay ever ran; unblock a waiting reader explicitly.
            let _ = tx.try_send(Err(PipelineError::Cancelled(slot)));
        }
        tracing::debug!(slot, "attachment slot cancelled");
        Ok(())
    }

    fn slot(&self, slot: usize) -> Result<&Slot> {
        self.slots
            .get(slot)
            .ok_or(PipelineError::SlotOutOfRange(slot, self.slots.len()))
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut Slot> {
        let count = self.slots.len();
        self.slots
            .get_mut(slot)
            .ok_or(PipelineError::SlotOutOfRange(slot, count))
    }
}

/// Lazy consumer handle for one attachment slot.
///
/// Every await is bounded by the pipeline's supply timeout, so a slot
/// whose source never arrives surfaces as [`PipelineError::SupplyTimeout`]
/// instead of blocking forever.
#[derive(Debug)]
pub struct BinaryReader {
    slot: usize,
    rx: mpsc::Receiver<ChunkResult>,
    shared: Arc<SlotShared>,
    supply_timeout: Duration,
    finished: bool,
}

impl BinaryReader {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> SlotState {
        self.shared.get()
    }

    /// Next chunk of the payload; `Ok(None)` is end-of-stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.finished {
            return Ok(None);
        }
        let received = timeout(self.supply_timeout, self.rx.recv())
            .await
            .map_err(|_| PipelineError::SupplyTimeout {
                slot: self.slot,
                millis: self.supply_timeout.as_millis() as u64,
            })?;
        match received {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => {
                self.finished = true;
                Err(e)
            }
            None => {
                self.finished = true;
                self.end_of_pipe()
            }
        }
    }

    /// Collect the whole payload into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Map a closed pipe to its meaning: clean end versus a relay that
    /// died before signalling end-of-stream.
    fn end_of_pipe(&self) -> Result<Option<Bytes>> {
        match self.shared.get() {
            SlotState::Done => Ok(None),
            SlotState::Failed => Err(PipelineError::Cancelled(self.slot)),
            _ => Err(PipelineError::SourceFailed {
                slot: self.slot,
                reason: "pipe closed before end-of-stream".to_string(),
            }),
        }
    }
}

/// Chunk stream view; the timeout contract lives on
/// [`BinaryReader::next_chunk`], polling here is unbounded.
impl futures_util::Stream for BinaryReader {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                match this.end_of_pipe() {
                    Ok(None) => Poll::Ready(None),
                    Err(e) => Poll::Ready(Some(Err(e))),
                    Ok(Some(_)) => Poll::Ready(None),
                }
            }
        }
    }
}
